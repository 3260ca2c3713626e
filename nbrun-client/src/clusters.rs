//! Cluster-related API endpoints

use crate::ClusterClient;
use crate::error::{ClientError, Result};
use nbrun_core::domain::cluster::{ClusterInfo, ClusterRef};
use nbrun_core::domain::library::Library;
use nbrun_core::dto::cluster::{InstallLibraries, ListClustersResponse};
use std::time::{Duration, Instant};
use tracing::{debug, info};

impl ClusterClient {
    // =============================================================================
    // Cluster Lookup
    // =============================================================================

    /// List all clusters visible to the token
    pub async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        let response: ListClustersResponse = self.get("clusters/list").await?;
        Ok(response.clusters)
    }

    /// Resolve a cluster by its exact name
    ///
    /// The first cluster whose name matches is returned.
    ///
    /// # Errors
    /// `ClientError::NotFound` if no cluster has that name.
    pub async fn resolve_cluster(&self, name: &str) -> Result<ClusterRef> {
        let clusters = self.list_clusters().await?;

        let cluster = clusters
            .iter()
            .find(|c| c.cluster_name == name)
            .map(ClusterInfo::to_ref)
            .ok_or_else(|| ClientError::NotFound(format!("No cluster named '{}'", name)))?;

        debug!(
            "Resolved cluster '{}' to {}",
            cluster.cluster_name, cluster.cluster_id
        );
        Ok(cluster)
    }

    /// Get the current record of a cluster
    pub async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        self.get_with_query("clusters/get", &[("cluster_id", cluster_id)])
            .await
    }

    /// Wait until a cluster is running
    ///
    /// Polls every `interval`. Fails as soon as the cluster reports a state it
    /// cannot recover from on its own, or once `timeout` has elapsed.
    pub async fn wait_for_cluster(
        &self,
        cluster_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<ClusterInfo> {
        let start = Instant::now();

        loop {
            let cluster = self.get_cluster(cluster_id).await?;

            if cluster.state.is_active() {
                info!("Cluster {} is {}", cluster_id, cluster.state);
                return Ok(cluster);
            }

            if cluster.state.is_unavailable() {
                return Err(ClientError::ClusterUnavailable {
                    cluster_id: cluster_id.to_string(),
                    state: cluster.state,
                });
            }

            if start.elapsed() > timeout {
                return Err(ClientError::ClusterTimeout {
                    cluster_id: cluster_id.to_string(),
                    timeout,
                    state: cluster.state,
                });
            }

            debug!(
                "Cluster {} is {}, checking again in {:?}",
                cluster_id, cluster.state, interval
            );
            tokio::time::sleep(interval).await;
        }
    }

    // =============================================================================
    // Libraries
    // =============================================================================

    /// Install libraries on a running cluster
    pub async fn install_libraries(&self, cluster_id: &str, libraries: &[Library]) -> Result<()> {
        if libraries.is_empty() {
            return Ok(());
        }

        info!(
            "Installing {} librar{} on cluster {}",
            libraries.len(),
            if libraries.len() == 1 { "y" } else { "ies" },
            cluster_id
        );

        self.post_empty(
            "libraries/install",
            &InstallLibraries {
                cluster_id: cluster_id.to_string(),
                libraries: libraries.to_vec(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{FakeCluster, TOKEN};
    use nbrun_core::domain::cluster::ClusterState;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_cluster_by_name() {
        let fake = FakeCluster::new()
            .with_cluster("c-1", "etl", "RUNNING")
            .with_cluster("c-2", "build", "TERMINATED")
            .with_cluster("c-3", "build", "RUNNING");
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let cluster = client.resolve_cluster("build").await.unwrap();
        assert_eq!(cluster.cluster_id, "c-2");
        assert_eq!(cluster.cluster_name, "build");

        let cluster = client.resolve_cluster("etl").await.unwrap();
        assert_eq!(cluster.cluster_id, "c-1");
    }

    #[tokio::test]
    async fn test_resolve_missing_cluster_is_not_found() {
        let fake = FakeCluster::new().with_cluster("c-1", "etl", "RUNNING");
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let err = client.resolve_cluster("Build").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_with_no_clusters_is_not_found() {
        let client = ClusterClient::new(FakeCluster::new().serve().await, TOKEN);

        assert!(client.list_clusters().await.unwrap().is_empty());
        let err = client.resolve_cluster("anything").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_wait_for_cluster_until_running() {
        let fake = FakeCluster::new()
            .with_cluster("c-1", "etl", "PENDING")
            .with_cluster_states("c-1", &["PENDING", "RESTARTING", "RUNNING"]);
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let cluster = client
            .wait_for_cluster("c-1", Duration::from_millis(10), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cluster.state, ClusterState::Running);
        assert_eq!(fake.requests_to("clusters/get").len(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_terminated_cluster_fails_fast() {
        let fake = FakeCluster::new().with_cluster("c-1", "etl", "TERMINATED");
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let err = client
            .wait_for_cluster("c-1", Duration::from_millis(10), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ClusterUnavailable {
                state: ClusterState::Terminated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_wait_for_cluster_times_out() {
        let fake = FakeCluster::new().with_cluster("c-1", "etl", "PENDING");
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let err = client
            .wait_for_cluster("c-1", Duration::from_millis(20), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ClusterTimeout { .. }));
    }

    #[tokio::test]
    async fn test_install_libraries_body() {
        let fake = FakeCluster::new();
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        client.install_libraries("c-1", &[]).await.unwrap();
        assert!(fake.requests_to("libraries/install").is_empty());

        client
            .install_libraries("c-1", &[Library::maven("com.acme:widgets:1.0")])
            .await
            .unwrap();
        let sent = fake.requests_to("libraries/install");
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            json!({
                "cluster_id": "c-1",
                "libraries": [{"maven": {"coordinates": "com.acme:widgets:1.0"}}]
            })
        );
    }
}
