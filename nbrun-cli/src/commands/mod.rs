//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod cluster;
mod run;
mod workspace;

pub use cluster::ClusterCommands;
pub use run::RunCommands;
pub use workspace::WorkspaceCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Cluster lookup and state
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
    /// Workspace folders and notebook upload
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
    /// Run submission, monitoring and cancellation
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Cluster { command } => cluster::handle_cluster_command(command, &client).await,
        Commands::Workspace { command } => {
            workspace::handle_workspace_command(command, &client).await
        }
        Commands::Run { command } => run::handle_run_command(command, client).await,
    }
}
