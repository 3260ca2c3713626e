//! Cluster command handlers
//!
//! Lists clusters, resolves names to ids and waits for a cluster to start.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use nbrun_client::ClusterClient;
use nbrun_core::domain::cluster::{ClusterInfo, ClusterState};
use std::time::Duration;

/// Cluster subcommands
#[derive(Subcommand)]
pub enum ClusterCommands {
    /// List all clusters
    List,
    /// Print the id of the cluster with this exact name
    Resolve {
        /// Cluster name
        name: String,
    },
    /// Show the current state of a cluster
    Status {
        /// Cluster name
        name: String,
    },
    /// Wait until a cluster is running
    Wait {
        /// Cluster name
        name: String,

        /// Seconds between state checks
        #[arg(long, default_value_t = 10)]
        interval: u64,

        /// Seconds to wait before giving up
        #[arg(long, default_value_t = 1200)]
        timeout: u64,
    },
}

/// Handle cluster commands
pub async fn handle_cluster_command(
    command: ClusterCommands,
    client: &ClusterClient,
) -> Result<()> {
    match command {
        ClusterCommands::List => list_clusters(client).await,
        ClusterCommands::Resolve { name } => resolve_cluster(client, &name).await,
        ClusterCommands::Status { name } => cluster_status(client, &name).await,
        ClusterCommands::Wait {
            name,
            interval,
            timeout,
        } => {
            wait_for_cluster(
                client,
                &name,
                Duration::from_secs(interval),
                Duration::from_secs(timeout),
            )
            .await
        }
    }
}

async fn list_clusters(client: &ClusterClient) -> Result<()> {
    let clusters = client.list_clusters().await?;

    if clusters.is_empty() {
        println!("{}", "No clusters found.".yellow());
    } else {
        println!("{}", format!("Found {} cluster(s):", clusters.len()).bold());
        println!();
        for cluster in clusters {
            print_cluster_summary(&cluster);
        }
    }

    Ok(())
}

async fn resolve_cluster(client: &ClusterClient, name: &str) -> Result<()> {
    let cluster = client.resolve_cluster(name).await?;
    println!("{}", cluster.cluster_id);
    Ok(())
}

async fn cluster_status(client: &ClusterClient, name: &str) -> Result<()> {
    let cluster = client.resolve_cluster(name).await?;
    let info = client
        .get_cluster(&cluster.cluster_id)
        .await
        .with_context(|| format!("Failed to get state of cluster '{}'", name))?;

    println!("{}", "Cluster Details:".bold());
    println!("  ID:      {}", info.cluster_id.cyan());
    println!("  Name:    {}", info.cluster_name);
    println!("  State:   {}", colorize_state(&info.state));
    if let Some(message) = &info.state_message {
        if !message.is_empty() {
            println!("  Message: {}", message.dimmed());
        }
    }

    Ok(())
}

async fn wait_for_cluster(
    client: &ClusterClient,
    name: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let cluster = client.resolve_cluster(name).await?;
    println!(
        "{}",
        format!("Waiting for cluster '{}' to start...", name).dimmed()
    );

    let info = client
        .wait_for_cluster(&cluster.cluster_id, interval, timeout)
        .await?;

    println!(
        "{} Cluster '{}' is {}",
        "✓".green(),
        name,
        colorize_state(&info.state)
    );
    Ok(())
}

fn print_cluster_summary(cluster: &ClusterInfo) {
    println!("  {} {}", "▸".cyan(), cluster.cluster_name.bold());
    println!("    ID:    {}", cluster.cluster_id.dimmed());
    println!("    State: {}", colorize_state(&cluster.state));
    println!();
}

/// Colorize cluster state for display
pub fn colorize_state(state: &ClusterState) -> ColoredString {
    let text = state.as_str().to_string();
    if state.is_active() {
        text.green()
    } else if state.is_unavailable() {
        text.red()
    } else {
        text.yellow()
    }
}
