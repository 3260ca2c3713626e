//! Runner configuration
//!
//! Connection settings, the notebook batch to run and the timing knobs for
//! polling and waiting.

use anyhow::Context;
use nbrun_core::domain::library::Library;
use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Service base URL (e.g., "https://example.cloud")
    pub api_url: String,

    /// Personal access token
    pub token: String,

    /// Name of the cluster every notebook runs on
    pub cluster_name: String,

    /// Local directory holding the `.ipynb` files to run
    pub notebook_dir: PathBuf,

    /// Workspace folder under which each batch gets its own subfolder
    pub workspace_dir: String,

    /// Time between two status checks of a run
    pub poll_interval: Duration,

    /// Remote timeout of each run, also used as the local wait budget
    pub run_timeout: Duration,

    /// Max runs in flight at once
    pub max_parallel_runs: usize,

    /// Libraries attached to every run
    pub libraries: Vec<Library>,

    /// Wait for the cluster to be running before uploading anything
    pub wait_for_cluster: bool,

    /// How long to wait for the cluster when `wait_for_cluster` is set
    pub cluster_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(api_url: String, token: String, cluster_name: String) -> Self {
        Self {
            api_url,
            token,
            cluster_name,
            notebook_dir: PathBuf::from("notebooks"),
            workspace_dir: "/Shared/nbrun".to_string(),
            poll_interval: Duration::from_secs(10),
            run_timeout: Duration::from_secs(600),
            max_parallel_runs: 4,
            libraries: Vec::new(),
            wait_for_cluster: false,
            cluster_timeout: Duration::from_secs(1200),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - NBRUN_API_URL (required)
    /// - NBRUN_TOKEN (required)
    /// - NBRUN_CLUSTER (required)
    /// - NBRUN_NOTEBOOK_DIR (optional, default: notebooks)
    /// - NBRUN_WORKSPACE_DIR (optional, default: /Shared/nbrun)
    /// - NBRUN_POLL_INTERVAL (optional, seconds, default: 10)
    /// - NBRUN_RUN_TIMEOUT (optional, seconds, default: 600)
    /// - NBRUN_MAX_PARALLEL_RUNS (optional, default: 4)
    /// - NBRUN_LIBRARIES (optional, comma-separated `kind:value` list)
    /// - NBRUN_WAIT_FOR_CLUSTER (optional, true/false, default: false)
    /// - NBRUN_CLUSTER_TIMEOUT (optional, seconds, default: 1200)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable not set", key))
        };
        let seconds = |key: &str| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        let mut config = Self::new(
            required("NBRUN_API_URL")?,
            required("NBRUN_TOKEN")?,
            required("NBRUN_CLUSTER")?,
        );

        if let Some(dir) = lookup("NBRUN_NOTEBOOK_DIR") {
            config.notebook_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("NBRUN_WORKSPACE_DIR") {
            config.workspace_dir = dir;
        }
        if let Some(interval) = seconds("NBRUN_POLL_INTERVAL") {
            config.poll_interval = interval;
        }
        if let Some(timeout) = seconds("NBRUN_RUN_TIMEOUT") {
            config.run_timeout = timeout;
        }
        if let Some(max) = lookup("NBRUN_MAX_PARALLEL_RUNS").and_then(|s| s.parse().ok()) {
            config.max_parallel_runs = max;
        }
        if let Some(libraries) = lookup("NBRUN_LIBRARIES") {
            config.libraries = parse_libraries(&libraries)?;
        }
        if let Some(wait) = lookup("NBRUN_WAIT_FOR_CLUSTER") {
            config.wait_for_cluster = matches!(wait.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(timeout) = seconds("NBRUN_CLUSTER_TIMEOUT") {
            config.cluster_timeout = timeout;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.is_empty() {
            anyhow::bail!("token cannot be empty");
        }

        if self.cluster_name.is_empty() {
            anyhow::bail!("cluster_name cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if !self.workspace_dir.starts_with('/') {
            anyhow::bail!("workspace_dir must be an absolute workspace path");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.run_timeout.is_zero() {
            anyhow::bail!("run_timeout must be greater than 0");
        }

        if self.max_parallel_runs == 0 {
            anyhow::bail!("max_parallel_runs must be greater than 0");
        }

        Ok(())
    }
}

/// Parses a comma-separated list of `kind:value` libraries
fn parse_libraries(list: &str) -> anyhow::Result<Vec<Library>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<Library>()
                .with_context(|| format!("Invalid NBRUN_LIBRARIES entry '{}'", entry))
        })
        .collect()
}
