//! Error types for the nbrun client

use nbrun_core::domain::cluster::ClusterState;
use nbrun_core::domain::run::{LifeCycleState, ResultState};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the cluster client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request could not be sent or its body could not be read
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned a non-success status code
    #[error("API error (status {status}): {message}")]
    Transport {
        /// HTTP status code
        status: u16,
        /// Response body returned by the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A named lookup returned no match
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The run terminated with a result other than success
    #[error("Run '{run_name}' for {task} failed with result state {result_state}: {run_page_url}")]
    JobFailed {
        task: String,
        result_state: ResultState,
        run_name: String,
        run_page_url: String,
    },

    /// The local wait budget ran out before the run terminated
    #[error("Run '{run_name}' for {task} timed out in {timeout:?} ({last_state}): {run_page_url}")]
    JobTimeout {
        task: String,
        timeout: Duration,
        last_state: LifeCycleState,
        run_name: String,
        run_page_url: String,
    },

    /// Reading a local artifact failed
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cluster reached a state from which it will not become active
    #[error("Cluster {cluster_id} is unavailable (state {state})")]
    ClusterUnavailable {
        cluster_id: String,
        state: ClusterState,
    },

    /// Cluster did not become active in time
    #[error("Cluster {cluster_id} not running after {timeout:?} (state {state})")]
    ClusterTimeout {
        cluster_id: String,
        timeout: Duration,
        state: ClusterState,
    },

    /// A background monitor stopped before delivering a result
    #[error("Monitor stopped: {0}")]
    MonitorAborted(String),
}

impl ClientError {
    /// Create a transport error from status code and response body
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::Transport { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Transport { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Transport { status, .. } if *status >= 500)
    }

    /// Check if this error describes the remote run rather than the call
    pub fn is_job_outcome(&self) -> bool {
        matches!(self, Self::JobFailed { .. } | Self::JobTimeout { .. })
    }
}
