//! Run domain types
//!
//! A run is one remote execution of a notebook task on a cluster. Runs are
//! identified by the handle returned at submission time and move through a
//! coarse lifecycle (`PENDING` -> `RUNNING` -> `TERMINATED`). Only once the
//! lifecycle is terminal does the service record a result state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::library::Library;
use crate::params::Params;

/// Run name used when the caller does not pick one
pub const DEFAULT_RUN_NAME: &str = "nbrun";

/// Remote timeout applied to a run when the caller does not pick one
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(600);

/// Opaque run identifier returned by a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunHandle(pub i64);

impl std::fmt::Display for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse run progress marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifeCycleState {
    Pending,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    Other(String),
}

impl LifeCycleState {
    pub fn as_str(&self) -> &str {
        match self {
            LifeCycleState::Pending => "PENDING",
            LifeCycleState::Running => "RUNNING",
            LifeCycleState::Terminating => "TERMINATING",
            LifeCycleState::Terminated => "TERMINATED",
            LifeCycleState::Skipped => "SKIPPED",
            LifeCycleState::InternalError => "INTERNAL_ERROR",
            LifeCycleState::Other(s) => s,
        }
    }

    /// Only `TERMINATED` carries a result state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifeCycleState::Terminated)
    }
}

impl From<String> for LifeCycleState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => LifeCycleState::Pending,
            "RUNNING" => LifeCycleState::Running,
            "TERMINATING" => LifeCycleState::Terminating,
            "TERMINATED" => LifeCycleState::Terminated,
            "SKIPPED" => LifeCycleState::Skipped,
            "INTERNAL_ERROR" => LifeCycleState::InternalError,
            _ => LifeCycleState::Other(value),
        }
    }
}

impl From<LifeCycleState> for String {
    fn from(value: LifeCycleState) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for LifeCycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded once the lifecycle is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultState {
    Success,
    Failed,
    TimedOut,
    Canceled,
    Other(String),
}

impl ResultState {
    pub fn as_str(&self) -> &str {
        match self {
            ResultState::Success => "SUCCESS",
            ResultState::Failed => "FAILED",
            ResultState::TimedOut => "TIMEDOUT",
            ResultState::Canceled => "CANCELED",
            ResultState::Other(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultState::Success)
    }
}

impl From<String> for ResultState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SUCCESS" => ResultState::Success,
            "FAILED" => ResultState::Failed,
            "TIMEDOUT" => ResultState::TimedOut,
            "CANCELED" => ResultState::Canceled,
            _ => ResultState::Other(value),
        }
    }
}

impl From<ResultState> for String {
    fn from(value: ResultState) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ResultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a run at the time it was fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub life_cycle_state: LifeCycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_state: Option<ResultState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_message: Option<String>,
}

/// Cluster a run was scheduled on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInstance {
    #[serde(default)]
    pub cluster_id: Option<String>,
}

/// Run record as returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunHandle,
    #[serde(default)]
    pub run_name: String,
    #[serde(default)]
    pub run_page_url: String,
    pub state: RunState,
    #[serde(default)]
    pub cluster_instance: Option<ClusterInstance>,
    /// Epoch milliseconds
    #[serde(default)]
    pub start_time: Option<i64>,
}

impl Run {
    /// Cluster the run was scheduled on, if it has been placed yet
    pub fn cluster_id(&self) -> Option<&str> {
        self.cluster_instance
            .as_ref()
            .and_then(|c| c.cluster_id.as_deref())
    }

    pub fn started_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.start_time
            .filter(|ms| *ms > 0)
            .and_then(chrono::DateTime::from_timestamp_millis)
    }
}

/// Everything needed to submit one notebook run
///
/// Constructed per submission; not persisted.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_name: String,
    pub cluster_id: String,
    pub task_path: String,
    pub libraries: Vec<Library>,
    pub base_parameters: Params,
    pub timeout: Duration,
}

impl RunRequest {
    pub fn new(cluster_id: impl Into<String>, task_path: impl Into<String>) -> Self {
        Self {
            run_name: DEFAULT_RUN_NAME.to_string(),
            cluster_id: cluster_id.into(),
            task_path: task_path.into(),
            libraries: Vec::new(),
            base_parameters: Params::new(),
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_libraries(mut self, libraries: Vec<Library>) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn with_parameters(mut self, parameters: Params) -> Self {
        self.base_parameters = parameters;
        self
    }

    pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = run_name.into();
        self
    }

    /// Remote timeout in whole seconds, rounded up
    ///
    /// The service reads 0 as "no timeout", so a partial second never
    /// truncates to 0.
    pub fn timeout_seconds(&self) -> u64 {
        let secs = self.timeout.as_secs();
        if self.timeout.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Terminal classification of a monitored run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed {
        result_state: ResultState,
        run_name: String,
        run_page_url: String,
    },
    TimedOut {
        last_state: LifeCycleState,
        run_name: String,
        run_page_url: String,
    },
}

impl RunOutcome {
    /// Classifies the end of a wait
    ///
    /// `result` is the result state observed before the wait ended (if any),
    /// `last_state` the last lifecycle state seen, and `run` a fresh fetch
    /// used for the display name and page URL.
    pub fn classify(result: Option<ResultState>, last_state: LifeCycleState, run: &Run) -> Self {
        match result {
            Some(ResultState::Success) => RunOutcome::Success,
            Some(result_state) => RunOutcome::Failed {
                result_state,
                run_name: run.run_name.clone(),
                run_page_url: run.run_page_url.clone(),
            },
            None => RunOutcome::TimedOut {
                last_state,
                run_name: run.run_name.clone(),
                run_page_url: run.run_page_url.clone(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}
