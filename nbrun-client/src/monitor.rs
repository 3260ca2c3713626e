//! Run monitor
//!
//! Polls a submitted run until it terminates or a local wait budget runs out,
//! then classifies the result. Each monitored run can be driven on its own
//! tokio task, so many runs are watched concurrently over one shared client.
//!
//! The wait budget is purely local: timing out does not cancel the remote
//! run, and cancelling a run does not stop its monitor. A cancelled run is
//! reported through the failure path once it terminates.

use async_trait::async_trait;
use nbrun_core::domain::run::{ResultState, Run, RunHandle, RunOutcome, RunState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ClusterClient;
use crate::error::{ClientError, Result};

/// Source of run status for the monitor
#[async_trait]
pub trait RunStatusSource: Send + Sync {
    /// Current lifecycle and (once terminal) result state of a run
    async fn run_state(&self, handle: RunHandle) -> Result<RunState>;

    /// Full run record, used for the display name and page URL
    async fn run_details(&self, handle: RunHandle) -> Result<Run>;
}

#[async_trait]
impl RunStatusSource for ClusterClient {
    async fn run_state(&self, handle: RunHandle) -> Result<RunState> {
        Ok(self.get_run(handle).await?.state)
    }

    async fn run_details(&self, handle: RunHandle) -> Result<Run> {
        self.get_run(handle).await
    }
}

/// Poll interval, local wait budget and verbosity of a monitor
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// Time between two status checks
    pub interval: Duration,
    /// Wall-clock budget for the whole wait
    pub timeout: Duration,
    /// Log every status check at info level instead of debug
    pub verbose: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
            verbose: false,
        }
    }
}

/// Watches runs until they terminate
#[derive(Clone)]
pub struct RunMonitor {
    source: Arc<dyn RunStatusSource>,
    settings: MonitorSettings,
}

impl RunMonitor {
    pub fn new(source: Arc<dyn RunStatusSource>, settings: MonitorSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Wait for a run and turn a non-success outcome into an error
    ///
    /// # Arguments
    /// * `handle` - The run to watch
    /// * `task` - Task description used in log lines and error messages
    ///
    /// # Errors
    /// `JobFailed` or `JobTimeout` for the run itself; any transport error
    /// raised while polling ends the wait immediately.
    pub async fn wait(&self, handle: RunHandle, task: &str) -> Result<()> {
        let outcome = self.watch(handle, task).await?;
        outcome_to_result(outcome, task, self.settings.timeout)
    }

    /// Poll a run until it terminates or the wait budget elapses
    pub async fn watch(&self, handle: RunHandle, task: &str) -> Result<RunOutcome> {
        let MonitorSettings {
            interval, timeout, ..
        } = self.settings;
        let start = Instant::now();

        let mut state = self.check(handle, task).await?;
        let mut result = terminal_result(handle, &state)?;

        while result.is_none() {
            tokio::time::sleep(interval).await;
            if start.elapsed() > timeout {
                break;
            }
            state = self.check(handle, task).await?;
            result = terminal_result(handle, &state)?;
        }

        let details = self.source.run_details(handle).await?;
        Ok(RunOutcome::classify(result, state.life_cycle_state, &details))
    }

    /// Run `wait` on its own task
    ///
    /// The task lives as long as the returned handle; drop it to stop polling.
    pub fn spawn(&self, handle: RunHandle, task: impl Into<String>) -> MonitorHandle {
        let monitor = self.clone();
        let task = task.into();
        let join = tokio::spawn(async move { monitor.wait(handle, &task).await });
        MonitorHandle {
            handle,
            join: Some(join),
        }
    }

    async fn check(&self, handle: RunHandle, task: &str) -> Result<RunState> {
        let state = self.source.run_state(handle).await?;
        let result = state
            .result_state
            .as_ref()
            .map(ResultState::as_str)
            .unwrap_or("-");
        if self.settings.verbose {
            info!(
                "Run {} ({}): {} / {}",
                handle, task, state.life_cycle_state, result
            );
        } else {
            debug!(
                "Run {} ({}): {} / {}",
                handle, task, state.life_cycle_state, result
            );
        }
        Ok(state)
    }
}

/// Result state of a terminated run, `None` while it is still going
fn terminal_result(handle: RunHandle, state: &RunState) -> Result<Option<ResultState>> {
    if !state.life_cycle_state.is_terminal() {
        return Ok(None);
    }

    state.result_state.clone().map(Some).ok_or_else(|| {
        ClientError::ParseError(format!(
            "Run {} is {} but has no result_state",
            handle, state.life_cycle_state
        ))
    })
}

/// Turn an outcome into the error callers observe
pub fn outcome_to_result(outcome: RunOutcome, task: &str, timeout: Duration) -> Result<()> {
    match outcome {
        RunOutcome::Success => {
            info!("{} succeeded", task);
            Ok(())
        }
        RunOutcome::Failed {
            result_state,
            run_name,
            run_page_url,
        } => Err(ClientError::JobFailed {
            task: task.to_string(),
            result_state,
            run_name,
            run_page_url,
        }),
        RunOutcome::TimedOut {
            last_state,
            run_name,
            run_page_url,
        } => Err(ClientError::JobTimeout {
            task: task.to_string(),
            timeout,
            last_state,
            run_name,
            run_page_url,
        }),
    }
}

/// A run being watched on its own task
///
/// Awaiting `join` yields exactly one terminal result: success or one error.
/// Dropping the handle without joining aborts the poll task; the remote run
/// is left untouched.
#[must_use = "dropping a MonitorHandle stops watching the run"]
pub struct MonitorHandle {
    handle: RunHandle,
    join: Option<JoinHandle<Result<()>>>,
}

impl MonitorHandle {
    pub fn run_handle(&self) -> RunHandle {
        self.handle
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop watching; the remote run is left untouched
    pub fn abort(&self) {
        if let Some(join) = &self.join {
            join.abort();
        }
    }

    pub async fn join(mut self) -> Result<()> {
        let Some(join) = self.join.take() else {
            return Err(ClientError::MonitorAborted(format!(
                "monitor for run {} was already joined",
                self.handle
            )));
        };

        match join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ClientError::MonitorAborted(format!(
                "monitor for run {} was aborted",
                self.handle
            ))),
            Err(e) => Err(ClientError::MonitorAborted(format!(
                "monitor for run {} panicked: {}",
                self.handle, e
            ))),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(join) = &self.join {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{FakeCluster, Step, TOKEN};
    use nbrun_core::domain::run::LifeCycleState;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves scripted states; the last one repeats
    struct ScriptedSource {
        states: Mutex<VecDeque<Result<RunState>>>,
        state_calls: AtomicUsize,
        detail_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(states: Vec<(&str, Option<&str>)>) -> Arc<Self> {
            let states = states
                .into_iter()
                .map(|(life_cycle, result)| {
                    Ok(RunState {
                        life_cycle_state: life_cycle.to_string().into(),
                        result_state: result.map(|r| r.to_string().into()),
                        state_message: None,
                    })
                })
                .collect();
            Arc::new(Self {
                states: Mutex::new(states),
                state_calls: AtomicUsize::new(0),
                detail_calls: AtomicUsize::new(0),
            })
        }

        fn failing_after(states: Vec<(&str, Option<&str>)>, status: u16) -> Arc<Self> {
            let source = Self::new(states);
            source
                .states
                .lock()
                .unwrap()
                .push_back(Err(ClientError::transport(status, "unavailable")));
            source
        }
    }

    #[async_trait]
    impl RunStatusSource for ScriptedSource {
        async fn run_state(&self, _handle: RunHandle) -> Result<RunState> {
            self.state_calls.fetch_add(1, Ordering::SeqCst);
            let mut states = self.states.lock().unwrap();
            if states.len() == 1 {
                if let Some(Ok(state)) = states.front() {
                    return Ok(state.clone());
                }
            }
            states
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::ParseError("script exhausted".into())))
        }

        async fn run_details(&self, handle: RunHandle) -> Result<Run> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(json!({
                "run_id": handle.0,
                "run_name": "scripted",
                "run_page_url": format!("https://host/#job/1/run/{}", handle.0),
                "state": {"life_cycle_state": "RUNNING"}
            }))
            .unwrap())
        }
    }

    fn settings(interval_ms: u64, timeout_ms: u64) -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            verbose: true,
        }
    }

    #[tokio::test]
    async fn test_immediate_success_checks_once() {
        let source = ScriptedSource::new(vec![("TERMINATED", Some("SUCCESS"))]);
        let monitor = RunMonitor::new(source.clone(), settings(1_000, 60_000));

        let start = Instant::now();
        monitor.wait(RunHandle(1), "/nb/ok").await.unwrap();

        assert_eq!(source.state_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_timeout_shorter_than_interval() {
        let source = ScriptedSource::new(vec![("RUNNING", None)]);
        let monitor = RunMonitor::new(source.clone(), settings(100, 10));

        let start = Instant::now();
        let err = monitor.wait(RunHandle(3), "/nb/slow").await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            ClientError::JobTimeout {
                last_state,
                run_page_url,
                run_name,
                timeout,
                ..
            } => {
                assert_eq!(last_state, LifeCycleState::Running);
                assert_eq!(run_page_url, "https://host/#job/1/run/3");
                assert_eq!(run_name, "scripted");
                assert_eq!(timeout, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(source.state_calls.load(Ordering::SeqCst), 1);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_pending_running_then_failed() {
        let source = ScriptedSource::new(vec![
            ("PENDING", None),
            ("RUNNING", None),
            ("TERMINATED", Some("FAILED")),
        ]);
        let monitor = RunMonitor::new(source.clone(), settings(5, 5_000));

        let err = monitor.wait(RunHandle(4), "/nb/broken").await.unwrap_err();
        match err {
            ClientError::JobFailed {
                result_state, task, ..
            } => {
                assert_eq!(result_state, ResultState::Failed);
                assert_eq!(task, "/nb/broken");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(source.state_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_error_mid_poll_is_fatal() {
        let source = ScriptedSource::failing_after(vec![("PENDING", None)], 503);
        let monitor = RunMonitor::new(source.clone(), settings(5, 5_000));

        let err = monitor.wait(RunHandle(5), "/nb/flaky").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { status: 503, .. }));
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_terminated_without_result_is_parse_error() {
        let source = ScriptedSource::new(vec![("TERMINATED", None)]);
        let monitor = RunMonitor::new(source, settings(5, 5_000));

        let err = monitor.wait(RunHandle(6), "/nb/odd").await.unwrap_err();
        assert!(matches!(err, ClientError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_watch_returns_outcome() {
        let source = ScriptedSource::new(vec![("RUNNING", None), ("TERMINATED", Some("CANCELED"))]);
        let monitor = RunMonitor::new(source, settings(5, 5_000));

        let outcome = monitor.watch(RunHandle(8), "/nb/cancelled").await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                result_state: ResultState::Canceled,
                run_name: "scripted".to_string(),
                run_page_url: "https://host/#job/1/run/8".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_monitors_over_shared_client() {
        let fake = FakeCluster::new()
            .with_run(
                1,
                vec![Step::pending(), Step::running(), Step::terminated("SUCCESS")],
            )
            .with_run(2, vec![Step::running(), Step::terminated("FAILED")])
            .with_run(3, vec![Step::running()]);
        let client = Arc::new(ClusterClient::new(fake.serve().await, TOKEN));
        let monitor = RunMonitor::new(client, settings(10, 300));

        let handles = vec![
            monitor.spawn(RunHandle(1), "/nb/one"),
            monitor.spawn(RunHandle(2), "/nb/two"),
            monitor.spawn(RunHandle(3), "/nb/three"),
        ];

        let mut results = Vec::new();
        for handle in handles {
            results.push((handle.run_handle(), handle.join().await));
        }

        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(ClientError::JobFailed {
                result_state: ResultState::Failed,
                ..
            })
        ));
        match &results[2].1 {
            Err(ClientError::JobTimeout {
                run_page_url,
                run_name,
                ..
            }) => {
                assert_eq!(run_page_url, "https://fake.cloud/#job/1/run/3");
                assert_eq!(run_name, "fake-run-3");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_handle_surfaces_transport_error() {
        let fake = FakeCluster::new();
        let client = Arc::new(ClusterClient::new(fake.serve().await, TOKEN));
        let monitor = RunMonitor::new(client, settings(10, 300));

        let err = monitor.wait(RunHandle(404), "/nb/none").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_aborted_monitor_reports_once() {
        let source = ScriptedSource::new(vec![("RUNNING", None)]);
        let monitor = RunMonitor::new(source, settings(1_000, 60_000));

        let handle = monitor.spawn(RunHandle(9), "/nb/forever");
        handle.abort();
        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, ClientError::MonitorAborted(_)));
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_polling() {
        let source = ScriptedSource::new(vec![("RUNNING", None)]);
        let monitor = RunMonitor::new(source.clone(), settings(10, 60_000));

        let handle = monitor.spawn(RunHandle(10), "/nb/discarded");
        tokio::time::sleep(Duration::from_millis(35)).await;
        drop(handle);
        let calls_at_drop = source.state_calls.load(Ordering::SeqCst);
        assert!(calls_at_drop >= 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.state_calls.load(Ordering::SeqCst), calls_at_drop);
    }
}
