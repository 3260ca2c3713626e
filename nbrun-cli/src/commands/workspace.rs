//! Workspace command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use nbrun_client::ClusterClient;
use std::path::PathBuf;

/// Workspace subcommands
#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Create a directory, including missing parents
    Mkdir {
        /// Workspace path
        path: String,
    },
    /// Delete a path
    Rm {
        /// Workspace path
        path: String,

        /// Fail instead of deleting a non-empty directory
        #[arg(long)]
        no_recursive: bool,
    },
    /// Upload a local notebook, replacing any existing one
    Upload {
        /// Local .ipynb file
        local: PathBuf,
        /// Destination workspace path
        remote: String,
    },
}

/// Handle workspace commands
pub async fn handle_workspace_command(
    command: WorkspaceCommands,
    client: &ClusterClient,
) -> Result<()> {
    match command {
        WorkspaceCommands::Mkdir { path } => {
            client
                .make_directory(&path)
                .await
                .with_context(|| format!("Failed to create {}", path))?;
            println!("{} Created {}", "✓".green(), path.cyan());
        }
        WorkspaceCommands::Rm { path, no_recursive } => {
            client
                .delete_directory(&path, !no_recursive)
                .await
                .with_context(|| format!("Failed to delete {}", path))?;
            println!("{} Deleted {}", "✓".green(), path.cyan());
        }
        WorkspaceCommands::Upload { local, remote } => {
            client.upload_artifact(&local, &remote).await?;
            println!(
                "{} Uploaded {} to {}",
                "✓".green(),
                local.display(),
                remote.cyan()
            );
        }
    }

    Ok(())
}
