//! Notebook batch
//!
//! Uploads every notebook of a local directory into a fresh workspace folder,
//! runs each one on the configured cluster and collects the outcomes.
//! Each notebook is driven on its own task; a semaphore bounds how many runs
//! are in flight at once.

use anyhow::{Context, Result};
use nbrun_client::{ClientError, ClusterClient, JobContext, MonitorSettings};
use nbrun_core::domain::run::RunHandle;
use nbrun_core::params::Params;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;

/// How a single notebook ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotebookStatus {
    Succeeded,
    /// Upload, submission or the run itself failed
    Failed(String),
    /// The run did not terminate within the wait budget
    TimedOut(String),
}

#[derive(Debug, Clone)]
pub struct NotebookResult {
    pub notebook: String,
    pub run: Option<RunHandle>,
    pub status: NotebookStatus,
}

impl NotebookResult {
    fn failed(notebook: &str, run: Option<RunHandle>, message: impl Into<String>) -> Self {
        Self {
            notebook: notebook.to_string(),
            run,
            status: NotebookStatus::Failed(message.into()),
        }
    }
}

/// Outcome of a whole batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Workspace folder the notebooks were uploaded to
    pub folder: String,
    pub results: Vec<NotebookResult>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, NotebookStatus::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, NotebookStatus::Failed(_)))
    }

    pub fn timed_out(&self) -> usize {
        self.count(|s| matches!(s, NotebookStatus::TimedOut(_)))
    }

    pub fn is_success(&self) -> bool {
        self.succeeded() == self.results.len()
    }

    fn count(&self, pred: impl Fn(&NotebookStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }
}

/// Runs a directory of notebooks on one cluster
pub struct NotebookBatch {
    config: Config,
    client: Arc<ClusterClient>,
    semaphore: Arc<Semaphore>,
}

impl NotebookBatch {
    pub fn new(config: Config, client: Arc<ClusterClient>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_runs));
        Self {
            config,
            client,
            semaphore,
        }
    }

    /// Run the whole batch
    ///
    /// Fails only when the batch cannot start (no notebooks, unknown or
    /// unavailable cluster, folder creation refused). Per-notebook failures
    /// are reported in the summary.
    pub async fn run(&self) -> Result<BatchSummary> {
        let notebooks = discover_notebooks(&self.config.notebook_dir).await?;
        if notebooks.is_empty() {
            anyhow::bail!(
                "No .ipynb files found in {}",
                self.config.notebook_dir.display()
            );
        }
        info!("Found {} notebook(s) to run", notebooks.len());

        let ctx = JobContext::connect(self.client.clone(), &self.config.cluster_name)
            .await
            .with_context(|| format!("Failed to resolve cluster '{}'", self.config.cluster_name))?
            .with_libraries(self.config.libraries.clone())
            .with_run_timeout(self.config.run_timeout);

        if self.config.wait_for_cluster {
            self.client
                .wait_for_cluster(
                    &ctx.cluster().cluster_id,
                    self.config.poll_interval,
                    self.config.cluster_timeout,
                )
                .await
                .context("Cluster did not become available")?;
        }

        let folder = format!(
            "{}/{}",
            self.config.workspace_dir.trim_end_matches('/'),
            Uuid::new_v4()
        );
        self.client
            .make_directory(&folder)
            .await
            .with_context(|| format!("Failed to create workspace folder {}", folder))?;
        info!("Uploading notebooks to {}", folder);

        let results = self.run_all(&ctx, &folder, notebooks).await;
        let summary = BatchSummary {
            folder: folder.clone(),
            results,
        };

        if summary.timed_out() > 0 {
            warn!(
                "{} run(s) timed out, cancelling active runs on cluster {}",
                summary.timed_out(),
                ctx.cluster().cluster_id
            );
            match ctx.cancel_all().await {
                Ok(cancelled) => info!("Cancelled {} run(s)", cancelled.len()),
                Err(e) => warn!("Failed to cancel active runs: {}", e),
            }
        }

        if let Err(e) = self.client.delete_directory(&folder, true).await {
            warn!("Failed to remove workspace folder {}: {}", folder, e);
        }

        Ok(summary)
    }

    async fn run_all(
        &self,
        ctx: &JobContext,
        folder: &str,
        notebooks: Vec<PathBuf>,
    ) -> Vec<NotebookResult> {
        let settings = MonitorSettings {
            interval: self.config.poll_interval,
            timeout: self.config.run_timeout,
            verbose: false,
        };

        let mut handles = Vec::new();
        for path in notebooks {
            let name = notebook_name(&path);
            let remote = format!("{}/{}", folder, name);
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return NotebookResult::failed(&task_name, None, e.to_string()),
                };
                run_notebook(&ctx, &task_name, &path, &remote, settings).await
            });
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Notebook task for {} panicked: {}", name, e);
                    results.push(NotebookResult::failed(&name, None, e.to_string()));
                }
            }
        }
        results
    }
}

/// Upload, submit and wait for one notebook
async fn run_notebook(
    ctx: &JobContext,
    name: &str,
    local: &Path,
    remote: &str,
    settings: MonitorSettings,
) -> NotebookResult {
    if let Err(e) = ctx.upload_artifact(local, remote).await {
        error!("Failed to upload {}: {}", name, e);
        return NotebookResult::failed(name, None, e.to_string());
    }

    let handle = match ctx.submit(remote, Params::new()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to submit {}: {}", name, e);
            return NotebookResult::failed(name, None, e.to_string());
        }
    };
    info!("{} submitted as run {}", name, handle);

    let status = match ctx.monitor(handle, name, settings).join().await {
        Ok(()) => NotebookStatus::Succeeded,
        Err(e @ ClientError::JobTimeout { .. }) => {
            warn!("{}", e);
            NotebookStatus::TimedOut(e.to_string())
        }
        Err(e) => {
            error!("{}", e);
            NotebookStatus::Failed(e.to_string())
        }
    };

    NotebookResult {
        notebook: name.to_string(),
        run: Some(handle),
        status,
    }
}

/// `.ipynb` files directly inside `dir`, sorted by path
pub async fn discover_notebooks(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read notebook directory {}", dir.display()))?;

    let mut notebooks = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_notebook = path.extension().is_some_and(|ext| ext == "ipynb");
        if is_notebook && entry.file_type().await?.is_file() {
            notebooks.push(path);
        }
    }

    notebooks.sort();
    Ok(notebooks)
}

fn notebook_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbrun_client::test_server::{FakeCluster, Step, TOKEN};
    use std::time::Duration;

    fn notebook_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"{\"cells\": []}").unwrap();
        }
        dir
    }

    fn test_config(url: String, dir: &Path, run_timeout: Duration) -> Config {
        let mut config = Config::new(url, TOKEN.to_string(), "etl".to_string());
        config.notebook_dir = dir.to_path_buf();
        config.poll_interval = Duration::from_millis(10);
        config.run_timeout = run_timeout;
        config.max_parallel_runs = 2;
        config
    }

    #[tokio::test]
    async fn test_discover_notebooks_filters_and_sorts() {
        let dir = notebook_dir(&["b.ipynb", "a.ipynb", "notes.txt"]);
        std::fs::create_dir(dir.path().join("nested.ipynb")).unwrap();

        let found = discover_notebooks(dir.path()).await.unwrap();
        let names: Vec<String> = found.iter().map(|p| notebook_name(p)).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_batch_all_succeed() {
        let fake = FakeCluster::new().with_cluster("c-1", "etl", "RUNNING");
        let dir = notebook_dir(&["one.ipynb", "two.ipynb", "three.ipynb"]);
        let config = test_config(fake.serve().await, dir.path(), Duration::from_secs(5));
        let client = Arc::new(ClusterClient::new(config.api_url.as_str(), TOKEN));

        let summary = NotebookBatch::new(config, client).run().await.unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.succeeded(), 3);
        assert!(summary.folder.starts_with("/Shared/nbrun/"));
        assert!(summary.results.iter().all(|r| r.run.is_some()));

        let imports = fake.requests_to("workspace/import");
        assert_eq!(imports.len(), 3);
        assert!(imports.iter().all(|r| {
            r.body["path"]
                .as_str()
                .unwrap()
                .starts_with(&format!("{}/", summary.folder))
        }));

        assert_eq!(fake.requests_to("workspace/mkdirs").len(), 1);
        let deletes = fake.requests_to("workspace/delete");
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].body["path"], summary.folder.as_str());
        assert_eq!(deletes[0].body["recursive"], true);
        assert!(fake.requests_to("jobs/runs/list").is_empty());
    }

    #[tokio::test]
    async fn test_batch_timeout_cancels_cluster_runs() {
        let fake = FakeCluster::new()
            .with_cluster("c-1", "etl", "RUNNING")
            .with_submit_script(vec![Step::running()])
            .with_active_run(500, "c-1");
        let dir = notebook_dir(&["slow.ipynb"]);
        let config = test_config(fake.serve().await, dir.path(), Duration::from_millis(50));
        let client = Arc::new(ClusterClient::new(config.api_url.as_str(), TOKEN));

        let summary = NotebookBatch::new(config, client).run().await.unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.timed_out(), 1);
        let submits = fake.requests_to("jobs/runs/submit");
        assert_eq!(submits[0].body["timeout_seconds"], 1);
        let cancelled = fake.requests_to("jobs/runs/cancel");
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].body["run_id"], 500);
        assert_eq!(fake.requests_to("workspace/delete").len(), 1);
    }

    #[tokio::test]
    async fn test_batch_reports_failed_runs() {
        let fake = FakeCluster::new()
            .with_cluster("c-1", "etl", "RUNNING")
            .with_submit_script(vec![Step::running(), Step::terminated("FAILED")]);
        let dir = notebook_dir(&["broken.ipynb"]);
        let config = test_config(fake.serve().await, dir.path(), Duration::from_secs(5));
        let client = Arc::new(ClusterClient::new(config.api_url.as_str(), TOKEN));

        let summary = NotebookBatch::new(config, client).run().await.unwrap();

        assert_eq!(summary.failed(), 1);
        match &summary.results[0].status {
            NotebookStatus::Failed(message) => {
                assert!(message.contains("FAILED"));
                assert!(message.contains("https://fake.cloud/#job/1/run/1"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(fake.requests_to("jobs/runs/list").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_cluster_stops_before_upload() {
        let fake = FakeCluster::new().with_cluster("c-1", "other", "RUNNING");
        let dir = notebook_dir(&["one.ipynb"]);
        let config = test_config(fake.serve().await, dir.path(), Duration::from_secs(5));
        let client = Arc::new(ClusterClient::new(config.api_url.as_str(), TOKEN));

        assert!(NotebookBatch::new(config, client).run().await.is_err());
        assert!(fake.requests_to("workspace/mkdirs").is_empty());
        assert!(fake.requests_to("workspace/import").is_empty());
    }

    #[tokio::test]
    async fn test_empty_directory_is_an_error() {
        let fake = FakeCluster::new().with_cluster("c-1", "etl", "RUNNING");
        let dir = notebook_dir(&["readme.md"]);
        let config = test_config(fake.serve().await, dir.path(), Duration::from_secs(5));
        let client = Arc::new(ClusterClient::new(config.api_url.as_str(), TOKEN));

        assert!(NotebookBatch::new(config, client).run().await.is_err());
        assert!(fake.requests_to("clusters/list").is_empty());
    }
}
