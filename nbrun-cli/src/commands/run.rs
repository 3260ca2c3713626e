//! Run command handlers
//!
//! Handles submission, status, monitoring and cancellation of notebook runs.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use nbrun_client::monitor::outcome_to_result;
use nbrun_client::{ClusterClient, JobContext, MonitorSettings, RunMonitor};
use nbrun_core::domain::library::Library;
use nbrun_core::domain::run::{LifeCycleState, ResultState, Run, RunHandle, RunOutcome};
use nbrun_core::params::Params;
use std::sync::Arc;
use std::time::Duration;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Submit a notebook run on a named cluster
    Submit {
        /// Cluster name
        #[arg(long)]
        cluster: String,

        /// Workspace path of the notebook
        path: String,

        /// Remote timeout in seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,

        /// Library to attach, as kind:value (e.g. maven:com.acme:lib:1.0)
        #[arg(long = "library")]
        libraries: Vec<Library>,

        /// Notebook parameter, as key=value
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Display name of the run
        #[arg(long)]
        name: Option<String>,

        /// Wait for the run to finish
        #[arg(long)]
        wait: bool,

        /// Seconds between status checks while waiting
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
    /// Get run details
    Get {
        /// Run id
        id: i64,
    },
    /// Watch a run until it finishes
    Monitor {
        /// Run id
        id: i64,

        /// Seconds between status checks
        #[arg(long, default_value_t = 10)]
        interval: u64,

        /// Seconds to wait before giving up
        #[arg(long, default_value_t = 600)]
        timeout: u64,

        /// Print every status check
        #[arg(short, long)]
        verbose: bool,
    },
    /// Cancel a run
    Cancel {
        /// Run id
        id: i64,
    },
    /// List active runs
    List,
    /// Cancel every active run on a named cluster
    CancelAll {
        /// Cluster name
        #[arg(long)]
        cluster: String,
    },
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, client: Arc<ClusterClient>) -> Result<()> {
    match command {
        RunCommands::Submit {
            cluster,
            path,
            timeout,
            libraries,
            params,
            name,
            wait,
            interval,
        } => {
            let ctx = JobContext::connect(client, &cluster)
                .await?
                .with_libraries(libraries)
                .with_run_timeout(Duration::from_secs(timeout));
            let settings = MonitorSettings {
                interval: Duration::from_secs(interval),
                timeout: Duration::from_secs(timeout),
                verbose: true,
            };
            submit_run(&ctx, &path, params.into_iter().collect(), name, wait, settings).await
        }
        RunCommands::Get { id } => get_run(&client, RunHandle(id)).await,
        RunCommands::Monitor {
            id,
            interval,
            timeout,
            verbose,
        } => {
            let settings = MonitorSettings {
                interval: Duration::from_secs(interval),
                timeout: Duration::from_secs(timeout),
                verbose,
            };
            monitor_run(client, RunHandle(id), settings).await
        }
        RunCommands::Cancel { id } => {
            client
                .cancel_run(RunHandle(id))
                .await
                .with_context(|| format!("Failed to cancel run {}", id))?;
            println!("{} Cancellation requested for run {}", "✓".green(), id);
            Ok(())
        }
        RunCommands::List => list_active_runs(&client).await,
        RunCommands::CancelAll { cluster } => {
            let ctx = JobContext::connect(client, &cluster).await?;
            let cancelled = ctx.cancel_all().await?;
            if cancelled.is_empty() {
                println!(
                    "{}",
                    format!("No active runs on cluster '{}'.", cluster).yellow()
                );
            } else {
                println!(
                    "{} Cancelled {} run(s) on cluster '{}'",
                    "✓".green(),
                    cancelled.len(),
                    cluster
                );
                for handle in cancelled {
                    println!("  {} {}", "▸".cyan(), handle);
                }
            }
            Ok(())
        }
    }
}

async fn submit_run(
    ctx: &JobContext,
    path: &str,
    params: Params,
    name: Option<String>,
    wait: bool,
    settings: MonitorSettings,
) -> Result<()> {
    let mut req = ctx.run_request(path).with_parameters(params);
    if let Some(name) = name {
        req = req.with_run_name(name);
    }

    let handle = ctx.submit_request(&req).await?;
    println!(
        "{} Submitted {} as run {}",
        "✓".green(),
        path.cyan(),
        handle.to_string().bold()
    );

    if wait {
        println!("{}", "Waiting for the run to finish...".dimmed());
        ctx.monitor(handle, path, settings).join().await?;
        println!("{} {} succeeded", "✓".green(), path);
    }

    Ok(())
}

async fn get_run(client: &ClusterClient, handle: RunHandle) -> Result<()> {
    let run = client.get_run(handle).await?;
    print_run_details(&run);
    Ok(())
}

async fn monitor_run(
    client: Arc<ClusterClient>,
    handle: RunHandle,
    settings: MonitorSettings,
) -> Result<()> {
    let task = format!("run {}", handle);
    let monitor = RunMonitor::new(client, settings);

    let outcome = monitor.watch(handle, &task).await?;
    print_outcome(&outcome);

    outcome_to_result(outcome, &task, settings.timeout)?;
    Ok(())
}

async fn list_active_runs(client: &ClusterClient) -> Result<()> {
    let runs = client.list_active_runs().await?;

    if runs.is_empty() {
        println!("{}", "No active runs.".yellow());
    } else {
        println!("{}", format!("Found {} active run(s):", runs.len()).bold());
        println!();
        for run in runs {
            print_run_summary(&run);
        }
    }

    Ok(())
}

/// Parse a `key=value` notebook parameter
fn parse_param(input: &str) -> std::result::Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", input)),
    }
}

fn print_run_summary(run: &Run) {
    println!(
        "  {} Run {} {}",
        "▸".cyan(),
        run.run_id.to_string().bold(),
        run.run_name.dimmed()
    );
    println!(
        "    State:   {}",
        colorize_life_cycle(&run.state.life_cycle_state)
    );
    if let Some(cluster_id) = run.cluster_id() {
        println!("    Cluster: {}", cluster_id.dimmed());
    }
    if let Some(started) = run.started_at() {
        println!(
            "    Started: {}",
            started.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    println!();
}

fn print_run_details(run: &Run) {
    println!("{}", "Run Details:".bold());
    println!("  ID:      {}", run.run_id.to_string().cyan());
    println!("  Name:    {}", run.run_name);
    println!(
        "  State:   {}",
        colorize_life_cycle(&run.state.life_cycle_state)
    );
    if let Some(result) = &run.state.result_state {
        println!("  Result:  {}", colorize_result(result));
    }
    if let Some(message) = &run.state.state_message {
        if !message.is_empty() {
            println!("  Message: {}", message.dimmed());
        }
    }
    if let Some(cluster_id) = run.cluster_id() {
        println!("  Cluster: {}", cluster_id);
    }
    if let Some(started) = run.started_at() {
        println!("  Started: {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if !run.run_page_url.is_empty() {
        println!("  Page:    {}", run.run_page_url.underline());
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Success => println!("{} Run succeeded", "✓".green()),
        RunOutcome::Failed {
            result_state,
            run_name,
            run_page_url,
        } => {
            println!(
                "{} Run '{}' ended with {}",
                "✗".red(),
                run_name,
                colorize_result(result_state)
            );
            println!("  {}", run_page_url.underline());
        }
        RunOutcome::TimedOut {
            last_state,
            run_name,
            run_page_url,
        } => {
            println!(
                "{} Run '{}' still {} when the wait ran out",
                "⚠".yellow(),
                run_name,
                colorize_life_cycle(last_state)
            );
            println!("  {}", run_page_url.underline());
        }
    }
}

fn colorize_life_cycle(state: &LifeCycleState) -> ColoredString {
    let text = state.as_str().to_string();
    match state {
        LifeCycleState::Pending => text.yellow(),
        LifeCycleState::Running => text.cyan(),
        LifeCycleState::Terminating => text.dimmed(),
        LifeCycleState::Terminated => text.green(),
        LifeCycleState::Skipped => text.dimmed(),
        LifeCycleState::InternalError => text.red(),
        LifeCycleState::Other(_) => text.normal(),
    }
}

fn colorize_result(result: &ResultState) -> ColoredString {
    let text = result.as_str().to_string();
    match result {
        ResultState::Success => text.green(),
        ResultState::Canceled => text.dimmed(),
        _ => text.red(),
    }
}
