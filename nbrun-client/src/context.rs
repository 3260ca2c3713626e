//! Job context
//!
//! Bundles what every submission on one cluster shares:
//! - The client (and its connection pool)
//! - The target cluster, resolved once at construction
//! - Default libraries and remote timeout for new runs

use nbrun_core::domain::cluster::ClusterRef;
use nbrun_core::domain::library::Library;
use nbrun_core::domain::run::{DEFAULT_RUN_TIMEOUT, RunHandle, RunRequest};
use nbrun_core::params::Params;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::ClusterClient;
use crate::error::Result;
use crate::monitor::{MonitorHandle, MonitorSettings, RunMonitor};

/// Shared state for submitting and watching runs on one cluster
#[derive(Debug, Clone)]
pub struct JobContext {
    client: Arc<ClusterClient>,
    cluster: ClusterRef,
    libraries: Vec<Library>,
    run_timeout: Duration,
}

impl JobContext {
    /// Resolves `cluster_name` and builds a context around it
    ///
    /// # Errors
    /// `ClientError::NotFound` if no cluster has that name.
    pub async fn connect(client: Arc<ClusterClient>, cluster_name: &str) -> Result<Self> {
        let cluster = client.resolve_cluster(cluster_name).await?;
        info!(
            "Using cluster '{}' ({})",
            cluster.cluster_name, cluster.cluster_id
        );
        Ok(Self::new(client, cluster))
    }

    /// Builds a context around an already resolved cluster
    pub fn new(client: Arc<ClusterClient>, cluster: ClusterRef) -> Self {
        Self {
            client,
            cluster,
            libraries: Vec::new(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Libraries attached to every run submitted through this context
    pub fn with_libraries(mut self, libraries: Vec<Library>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Remote timeout of every run submitted through this context
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn client(&self) -> &Arc<ClusterClient> {
        &self.client
    }

    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    /// Looks up another cluster by name; the context's own cluster is unchanged
    pub async fn resolve_cluster(&self, name: &str) -> Result<ClusterRef> {
        self.client.resolve_cluster(name).await
    }

    pub async fn upload_artifact(&self, local: impl AsRef<Path>, remote: &str) -> Result<()> {
        self.client.upload_artifact(local, remote).await
    }

    /// A request for `task_path` with the context's cluster, libraries and timeout
    pub fn run_request(&self, task_path: &str) -> RunRequest {
        RunRequest::new(self.cluster.cluster_id.clone(), task_path)
            .with_libraries(self.libraries.clone())
            .with_timeout(self.run_timeout)
    }

    /// Submit `task_path` with notebook parameters
    pub async fn submit(&self, task_path: &str, params: Params) -> Result<RunHandle> {
        self.client
            .submit_run(&self.run_request(task_path).with_parameters(params))
            .await
    }

    /// Submit a fully built request, e.g. one with its own timeout
    pub async fn submit_request(&self, req: &RunRequest) -> Result<RunHandle> {
        self.client.submit_run(req).await
    }

    /// Start watching a run on its own task
    ///
    /// Polling stops when the returned handle is joined or dropped; a dropped
    /// handle leaves the remote run untouched.
    pub fn monitor(
        &self,
        handle: RunHandle,
        task: impl Into<String>,
        settings: MonitorSettings,
    ) -> MonitorHandle {
        RunMonitor::new(self.client.clone(), settings).spawn(handle, task)
    }

    pub async fn cancel(&self, handle: RunHandle) -> Result<()> {
        self.client.cancel_run(handle).await
    }

    /// Cancel every active run on the context's cluster
    pub async fn cancel_all(&self) -> Result<Vec<RunHandle>> {
        self.client
            .cancel_all_on_cluster(&self.cluster.cluster_id)
            .await
    }
}
