//! nbrun CLI
//!
//! Command-line interface for the cluster execution service.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{AuthArg, Config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nbrun")]
#[command(about = "Submit and monitor notebook runs on a remote cluster", long_about = None)]
struct Cli {
    /// Base URL of the service
    #[arg(long, env = "NBRUN_API_URL")]
    api_url: String,

    /// Personal access token
    #[arg(long, env = "NBRUN_TOKEN", hide_env_values = true)]
    token: String,

    /// How the token is sent
    #[arg(long, value_enum, default_value_t = AuthArg::Basic)]
    auth: AuthArg,

    #[command(subcommand)]
    command: Commands,
}

/// Log filter used when `RUST_LOG` is unset
///
/// Monitor status lines are logged at info only when `--verbose` is given.
const DEFAULT_LOG_FILTER: &str = "nbrun_client=warn,nbrun_client::monitor=info";

fn default_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_LOG_FILTER)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config {
        api_url: cli.api_url,
        token: cli.token,
        auth: cli.auth.into(),
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbrun_client::test_server::{FakeCluster, Step, TOKEN};
    use nbrun_client::{ClusterClient, MonitorSettings, RunMonitor};
    use nbrun_core::domain::run::RunHandle;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Log sink shared between the subscriber and the test
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Watch a RUNNING -> SUCCESS run under the default filter, return the log
    async fn watch_under_default_filter(verbose: bool) -> String {
        let fake = FakeCluster::new().with_run(
            1,
            vec![Step::running(), Step::terminated("SUCCESS")],
        );
        let client = Arc::new(ClusterClient::new(fake.serve().await, TOKEN));

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(default_filter())
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let monitor = RunMonitor::new(
            client,
            MonitorSettings {
                interval: Duration::from_millis(10),
                timeout: Duration::from_secs(5),
                verbose,
            },
        );
        monitor.watch(RunHandle(1), "/nb/etl").await.unwrap();

        captured.text()
    }

    #[tokio::test]
    async fn test_verbose_status_lines_are_shown_by_default() {
        let log = watch_under_default_filter(true).await;

        assert!(log.contains("Run 1 (/nb/etl): RUNNING / -"), "log was: {log}");
        assert!(log.contains("Run 1 (/nb/etl): TERMINATED / SUCCESS"), "log was: {log}");
    }

    #[tokio::test]
    async fn test_quiet_monitor_prints_nothing_by_default() {
        let log = watch_under_default_filter(false).await;

        assert!(!log.contains("RUNNING"), "log was: {log}");
    }
}
