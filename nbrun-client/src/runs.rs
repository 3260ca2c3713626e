//! Run-related API endpoints

use crate::ClusterClient;
use crate::error::{ClientError, Result};
use nbrun_core::domain::run::{Run, RunHandle, RunRequest};
use nbrun_core::dto::run::{CancelRun, ListRunsResponse, SubmitRun, SubmitRunResponse};
use tracing::{debug, info};

/// Page size used when walking the active run listing
const RUNS_PAGE_SIZE: usize = 25;

impl ClusterClient {
    // =============================================================================
    // Run Lifecycle
    // =============================================================================

    /// Submit a one-off notebook run
    ///
    /// The task path is not validated locally; the service is authoritative.
    ///
    /// # Returns
    /// The handle used for every later status check or cancellation
    pub async fn submit_run(&self, req: &RunRequest) -> Result<RunHandle> {
        let response: SubmitRunResponse =
            self.post("jobs/runs/submit", &SubmitRun::from(req)).await?;

        let handle = response.run_id.ok_or_else(|| {
            ClientError::ParseError("Submit response is missing run_id".to_string())
        })?;

        info!(
            "Submitted {} on cluster {} as run {}",
            req.task_path, req.cluster_id, handle
        );
        Ok(handle)
    }

    /// Get the current record of a run
    pub async fn get_run(&self, handle: RunHandle) -> Result<Run> {
        self.get_with_query("jobs/runs/get", &[("run_id", handle.0)])
            .await
    }

    /// Ask the service to cancel a run
    ///
    /// Returns once the request is accepted; the run terminates asynchronously.
    pub async fn cancel_run(&self, handle: RunHandle) -> Result<()> {
        info!("Cancelling run {}", handle);
        self.post_empty("jobs/runs/cancel", &CancelRun { run_id: handle })
            .await
    }

    // =============================================================================
    // Active Runs
    // =============================================================================

    /// List every active run, following pagination to the end
    pub async fn list_active_runs(&self) -> Result<Vec<Run>> {
        let mut runs = Vec::new();
        let mut offset = 0usize;

        loop {
            let offset_param = offset.to_string();
            let limit_param = RUNS_PAGE_SIZE.to_string();
            let page: ListRunsResponse = self
                .get_with_query(
                    "jobs/runs/list",
                    &[
                        ("active_only", "true"),
                        ("offset", offset_param.as_str()),
                        ("limit", limit_param.as_str()),
                    ],
                )
                .await?;

            let fetched = page.runs.len();
            runs.extend(page.runs);
            offset += fetched;

            if !page.has_more || fetched == 0 {
                break;
            }
        }

        debug!("Found {} active run(s)", runs.len());
        Ok(runs)
    }

    /// Cancel every active run placed on a cluster
    ///
    /// Runs are cancelled one at a time; the first failure stops the sweep.
    ///
    /// # Returns
    /// The handles that were cancelled
    pub async fn cancel_all_on_cluster(&self, cluster_id: &str) -> Result<Vec<RunHandle>> {
        let targets: Vec<RunHandle> = self
            .list_active_runs()
            .await?
            .into_iter()
            .filter(|run| run.cluster_id() == Some(cluster_id))
            .map(|run| run.run_id)
            .collect();

        info!(
            "Cancelling {} active run(s) on cluster {}",
            targets.len(),
            cluster_id
        );

        for handle in &targets {
            self.cancel_run(*handle).await?;
        }

        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{FakeCluster, Step, TOKEN};
    use nbrun_core::domain::library::Library;
    use nbrun_core::domain::run::LifeCycleState;
    use nbrun_core::params::Params;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_run_sends_spec_and_returns_handle() {
        let fake = FakeCluster::new();
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let params: Params = [("env", "test"), ("date", "2026-10-19")].into_iter().collect();
        let req = RunRequest::new("c-9", "/a/b.py")
            .with_timeout(Duration::from_secs(120))
            .with_libraries(vec![Library::pypi("requests")])
            .with_parameters(params);

        let handle = client.submit_run(&req).await.unwrap();
        assert_eq!(handle, RunHandle(1));

        let sent = fake.requests_to("jobs/runs/submit");
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            json!({
                "run_name": "nbrun",
                "existing_cluster_id": "c-9",
                "timeout_seconds": 120,
                "notebook_task": {
                    "notebook_path": "/a/b.py",
                    "base_parameters": {"env": "test", "date": "2026-10-19"}
                },
                "libraries": [{"pypi": {"package": "requests"}}]
            })
        );
    }

    #[tokio::test]
    async fn test_get_run_and_unknown_handle() {
        let fake = FakeCluster::new().with_run(5, vec![Step::running()]);
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let run = client.get_run(RunHandle(5)).await.unwrap();
        assert_eq!(run.state.life_cycle_state, LifeCycleState::Running);
        assert_eq!(run.run_page_url, "https://fake.cloud/#job/1/run/5");

        let err = client.get_run(RunHandle(99)).await.unwrap_err();
        match err {
            ClientError::Transport { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("RESOURCE_DOES_NOT_EXIST"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_unknown_handle_is_transport_error() {
        let fake = FakeCluster::new().with_run(5, vec![Step::running()]);
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        client.cancel_run(RunHandle(5)).await.unwrap();
        assert_eq!(
            fake.requests_to("jobs/runs/cancel")[0].body,
            json!({"run_id": 5})
        );

        let err = client.cancel_run(RunHandle(6)).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_list_active_runs_follows_pages() {
        let mut fake = FakeCluster::new();
        for id in 1..=60 {
            fake = fake.with_active_run(id, "c-1");
        }
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let runs = client.list_active_runs().await.unwrap();
        assert_eq!(runs.len(), 60);
        assert_eq!(runs[59].run_id, RunHandle(60));

        let pages = fake.requests_to("jobs/runs/list");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].query["offset"], "25");
        assert_eq!(pages[0].query["active_only"], "true");
    }

    #[tokio::test]
    async fn test_cancel_all_only_targets_cluster() {
        let fake = FakeCluster::new()
            .with_active_run(1, "c-x")
            .with_active_run(2, "c-other")
            .with_active_run(3, "c-x")
            .with_active_run(4, "c-other")
            .with_active_run(5, "c-x");
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        let cancelled = client.cancel_all_on_cluster("c-x").await.unwrap();
        assert_eq!(cancelled, vec![RunHandle(1), RunHandle(3), RunHandle(5)]);

        let sent: Vec<i64> = fake
            .requests_to("jobs/runs/cancel")
            .iter()
            .map(|r| r.body["run_id"].as_i64().unwrap())
            .collect();
        assert_eq!(sent, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_cancel_all_with_no_active_runs() {
        let fake = FakeCluster::new();
        let client = ClusterClient::new(fake.serve().await, TOKEN);

        assert!(client.cancel_all_on_cluster("c-x").await.unwrap().is_empty());
        assert!(fake.requests_to("jobs/runs/cancel").is_empty());
    }
}
