//! nbrun Runner
//!
//! Batch-runs a directory of notebooks on a remote cluster.
//!
//! Architecture:
//! - Configuration: Load settings from the environment
//! - Client: HTTP communication with the cluster service
//! - Scheduler: Upload, submit, monitor and clean up the batch
//!
//! Exits non-zero when any notebook fails or times out.

mod config;
mod scheduler;

use anyhow::{Context, Result};
use nbrun_client::ClusterClient;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::scheduler::{BatchSummary, NotebookBatch, NotebookStatus};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nbrun_runner=info,nbrun_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting nbrun runner");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: api_url={}, cluster={}, notebooks={}",
        config.api_url,
        config.cluster_name,
        config.notebook_dir.display()
    );
    info!(
        "Poll interval: {:?}, run timeout: {:?}, max parallel runs: {}",
        config.poll_interval, config.run_timeout, config.max_parallel_runs
    );

    let client = Arc::new(ClusterClient::new(config.api_url.as_str(), &config.token));

    let summary = NotebookBatch::new(config, client).run().await?;
    report(&summary);

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} notebook(s) did not succeed",
            summary.results.len() - summary.succeeded(),
            summary.results.len()
        );
    }

    Ok(())
}

/// Log one line per notebook and a final tally
fn report(summary: &BatchSummary) {
    info!("Results for batch folder {}:", summary.folder);
    for result in &summary.results {
        let run = result
            .run
            .map(|handle| handle.to_string())
            .unwrap_or_else(|| "-".to_string());
        match &result.status {
            NotebookStatus::Succeeded => info!("  ok       {} (run {})", result.notebook, run),
            NotebookStatus::Failed(message) => {
                error!("  failed   {} (run {}): {}", result.notebook, run, message)
            }
            NotebookStatus::TimedOut(message) => {
                warn!("  timeout  {} (run {}): {}", result.notebook, run, message)
            }
        }
    }

    info!(
        "{} succeeded, {} failed, {} timed out",
        summary.succeeded(),
        summary.failed(),
        summary.timed_out()
    );
}
