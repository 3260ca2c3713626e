//! Cluster and library DTOs

use serde::{Deserialize, Serialize};

use crate::domain::cluster::ClusterInfo;
use crate::domain::library::Library;

/// Response of `clusters/list`
///
/// The service omits `clusters` entirely when there are none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListClustersResponse {
    #[serde(default)]
    pub clusters: Vec<ClusterInfo>,
}

/// Request body of `libraries/install`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallLibraries {
    pub cluster_id: String,
    pub libraries: Vec<Library>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_clusters_field_means_none() {
        let resp: ListClustersResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.clusters.is_empty());
    }
}
