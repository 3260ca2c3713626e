//! Cluster domain types

use serde::{Deserialize, Serialize};

/// A cluster resolved by name
///
/// Resolved once and treated as read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRef {
    pub cluster_id: String,
    pub cluster_name: String,
}

/// Cluster record as listed by the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: String,
    pub cluster_name: String,
    #[serde(default = "ClusterState::unknown")]
    pub state: ClusterState,
    #[serde(default)]
    pub state_message: Option<String>,
}

impl ClusterInfo {
    /// Reference to this cluster, for use in run submissions
    pub fn to_ref(&self) -> ClusterRef {
        ClusterRef {
            cluster_id: self.cluster_id.clone(),
            cluster_name: self.cluster_name.clone(),
        }
    }
}

/// Cluster state
///
/// The remote service may add states over time, so unrecognized values
/// are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClusterState {
    Pending,
    Running,
    Restarting,
    Resizing,
    Terminating,
    Terminated,
    Error,
    Unknown,
    Other(String),
}

impl ClusterState {
    fn unknown() -> Self {
        ClusterState::Unknown
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClusterState::Pending => "PENDING",
            ClusterState::Running => "RUNNING",
            ClusterState::Restarting => "RESTARTING",
            ClusterState::Resizing => "RESIZING",
            ClusterState::Terminating => "TERMINATING",
            ClusterState::Terminated => "TERMINATED",
            ClusterState::Error => "ERROR",
            ClusterState::Unknown => "UNKNOWN",
            ClusterState::Other(s) => s,
        }
    }

    /// Whether runs can be scheduled on the cluster right now
    pub fn is_active(&self) -> bool {
        matches!(self, ClusterState::Running | ClusterState::Resizing)
    }

    /// Whether the cluster will not become active without outside action
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ClusterState::Terminating | ClusterState::Terminated | ClusterState::Error
        )
    }
}

impl From<String> for ClusterState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => ClusterState::Pending,
            "RUNNING" => ClusterState::Running,
            "RESTARTING" => ClusterState::Restarting,
            "RESIZING" => ClusterState::Resizing,
            "TERMINATING" => ClusterState::Terminating,
            "TERMINATED" => ClusterState::Terminated,
            "ERROR" => ClusterState::Error,
            "UNKNOWN" => ClusterState::Unknown,
            _ => ClusterState::Other(value),
        }
    }
}

impl From<ClusterState> for String {
    fn from(value: ClusterState) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
