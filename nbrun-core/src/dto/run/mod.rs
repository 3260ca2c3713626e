//! Run DTOs

use serde::{Deserialize, Serialize};

use crate::domain::library::Library;
use crate::domain::run::{Run, RunHandle, RunRequest};
use crate::params::Params;

/// Request body of `jobs/runs/submit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRun {
    pub run_name: String,
    pub existing_cluster_id: String,
    pub timeout_seconds: u64,
    pub notebook_task: NotebookTask,
    pub libraries: Vec<Library>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookTask {
    pub notebook_path: String,
    #[serde(default)]
    pub base_parameters: Params,
}

impl From<&RunRequest> for SubmitRun {
    fn from(req: &RunRequest) -> Self {
        Self {
            run_name: req.run_name.clone(),
            existing_cluster_id: req.cluster_id.clone(),
            timeout_seconds: req.timeout_seconds(),
            notebook_task: NotebookTask {
                notebook_path: req.task_path.clone(),
                base_parameters: req.base_parameters.clone(),
            },
            libraries: req.libraries.clone(),
        }
    }
}

/// Response of `jobs/runs/submit`
///
/// `run_id` is optional here so that a malformed response surfaces as a
/// named error rather than a generic decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRunResponse {
    #[serde(default)]
    pub run_id: Option<RunHandle>,
}

/// Request body of `jobs/runs/cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRun {
    pub run_id: RunHandle,
}

/// One page of `jobs/runs/list`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRunsResponse {
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub has_more: bool,
}
