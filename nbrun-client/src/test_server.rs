//! In-process fake of the cluster API for tests
//!
//! Serves the subset of endpoints the client uses from scripted state, and
//! records every authenticated request so tests can assert on what was sent.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "test-token";

/// One scripted answer to `jobs/runs/get`
#[derive(Debug, Clone)]
pub enum Step {
    /// Reply with this `state` object
    State(Value),
    /// Reply with this HTTP status
    Fail(u16),
}

impl Step {
    pub fn pending() -> Self {
        Step::State(json!({"life_cycle_state": "PENDING"}))
    }

    pub fn running() -> Self {
        Step::State(json!({"life_cycle_state": "RUNNING"}))
    }

    pub fn terminated(result: &str) -> Self {
        Step::State(json!({"life_cycle_state": "TERMINATED", "result_state": result}))
    }
}

/// A request received by the fake
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Value,
}

#[derive(Default)]
struct FakeRun {
    cluster_id: String,
    /// Steps still to serve; the last one repeats forever
    steps: VecDeque<Step>,
}

pub struct FakeCluster {
    clusters: Mutex<Vec<Value>>,
    cluster_states: Mutex<HashMap<String, VecDeque<String>>>,
    runs: Mutex<HashMap<i64, FakeRun>>,
    submit_script: Mutex<Vec<Step>>,
    active_runs: Mutex<Vec<Value>>,
    next_run_id: AtomicI64,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clusters: Mutex::new(Vec::new()),
            cluster_states: Mutex::new(HashMap::new()),
            runs: Mutex::new(HashMap::new()),
            submit_script: Mutex::new(vec![Step::terminated("SUCCESS")]),
            active_runs: Mutex::new(Vec::new()),
            next_run_id: AtomicI64::new(1),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_cluster(self: Arc<Self>, id: &str, name: &str, state: &str) -> Arc<Self> {
        self.clusters.lock().unwrap().push(json!({
            "cluster_id": id,
            "cluster_name": name,
            "state": state,
        }));
        self.cluster_states
            .lock()
            .unwrap()
            .insert(id.to_string(), VecDeque::from([state.to_string()]));
        self
    }

    /// States served by successive `clusters/get` calls; the last repeats
    pub fn with_cluster_states(self: Arc<Self>, id: &str, states: &[&str]) -> Arc<Self> {
        self.cluster_states.lock().unwrap().insert(
            id.to_string(),
            states.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Registers an existing run with scripted status steps
    pub fn with_run(self: Arc<Self>, run_id: i64, steps: Vec<Step>) -> Arc<Self> {
        self.runs.lock().unwrap().insert(
            run_id,
            FakeRun {
                cluster_id: "c-1".to_string(),
                steps: steps.into(),
            },
        );
        self
    }

    /// Steps given to every run created through `jobs/runs/submit`
    pub fn with_submit_script(self: Arc<Self>, steps: Vec<Step>) -> Arc<Self> {
        *self.submit_script.lock().unwrap() = steps;
        self
    }

    /// Adds an entry to the active run listing
    pub fn with_active_run(self: Arc<Self>, run_id: i64, cluster_id: &str) -> Arc<Self> {
        self.active_runs.lock().unwrap().push(json!({
            "run_id": run_id,
            "run_name": format!("run-{}", run_id),
            "state": {"life_cycle_state": "RUNNING"},
            "cluster_instance": {"cluster_id": cluster_id},
        }));
        self.runs.lock().unwrap().insert(
            run_id,
            FakeRun {
                cluster_id: cluster_id.to_string(),
                steps: VecDeque::from([Step::running()]),
            },
        );
        self
    }

    /// Starts serving on an ephemeral local port and returns the base URL
    pub async fn serve(self: &Arc<Self>) -> String {
        let app = Router::new().fallback(dispatch).with_state(Arc::clone(self));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Requests received for an endpoint path such as `jobs/runs/cancel`
    pub fn requests_to(&self, endpoint: &str) -> Vec<Recorded> {
        let path = format!("/api/2.0/{}", endpoint);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    fn next_step(&self, run_id: i64) -> Option<Step> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs.get_mut(&run_id)?;
        if run.steps.len() > 1 {
            run.steps.pop_front()
        } else {
            run.steps.front().cloned()
        }
    }
}

fn parse_query(uri: &Uri) -> HashMap<String, String> {
    uri.query()
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn error(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(json!({"error_code": code, "message": message})),
    )
        .into_response()
}

fn run_does_not_exist(run_id: i64) -> Response {
    error(
        StatusCode::BAD_REQUEST,
        "RESOURCE_DOES_NOT_EXIST",
        format!("Run {} does not exist.", run_id),
    )
}

async fn dispatch(
    State(fake): State<Arc<FakeCluster>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let basic = format!("Basic {}", STANDARD.encode(format!("token:{}", TOKEN)));
    let bearer = format!("Bearer {}", TOKEN);
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == basic || v == bearer);
    if !authorized {
        return error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
            "Invalid access token.".to_string(),
        );
    }

    let query = parse_query(&uri);
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = uri.path().to_string();
    fake.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        body: body.clone(),
    });

    let endpoint = path.trim_start_matches("/api/2.0/");
    match (method, endpoint) {
        (Method::GET, "clusters/list") => {
            let clusters = fake.clusters.lock().unwrap().clone();
            if clusters.is_empty() {
                Json(json!({})).into_response()
            } else {
                Json(json!({"clusters": clusters})).into_response()
            }
        }
        (Method::GET, "clusters/get") => {
            let id = query.get("cluster_id").cloned().unwrap_or_default();
            let mut states = fake.cluster_states.lock().unwrap();
            let Some(queue) = states.get_mut(&id) else {
                return error(
                    StatusCode::BAD_REQUEST,
                    "INVALID_PARAMETER_VALUE",
                    format!("Cluster {} does not exist", id),
                );
            };
            let state = if queue.len() > 1 {
                queue.pop_front().unwrap_or_default()
            } else {
                queue.front().cloned().unwrap_or_default()
            };
            Json(json!({"cluster_id": id, "cluster_name": "fake", "state": state}))
                .into_response()
        }
        (Method::POST, "libraries/install") => Json(json!({})).into_response(),
        (Method::POST, "jobs/runs/submit") => {
            let run_id = fake.next_run_id.fetch_add(1, Ordering::SeqCst);
            let steps = fake.submit_script.lock().unwrap().clone();
            fake.runs.lock().unwrap().insert(
                run_id,
                FakeRun {
                    cluster_id: body["existing_cluster_id"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    steps: steps.into(),
                },
            );
            Json(json!({"run_id": run_id})).into_response()
        }
        (Method::GET, "jobs/runs/get") => {
            let run_id: i64 = query
                .get("run_id")
                .and_then(|v| v.parse().ok())
                .unwrap_or(-1);
            let cluster_id = fake
                .runs
                .lock()
                .unwrap()
                .get(&run_id)
                .map(|r| r.cluster_id.clone());
            match (fake.next_step(run_id), cluster_id) {
                (Some(Step::State(state)), Some(cluster_id)) => Json(json!({
                    "run_id": run_id,
                    "run_name": format!("fake-run-{}", run_id),
                    "run_page_url": format!("https://fake.cloud/#job/1/run/{}", run_id),
                    "state": state,
                    "cluster_instance": {"cluster_id": cluster_id},
                    "start_time": 1700000000000i64,
                }))
                .into_response(),
                (Some(Step::Fail(status)), _) => error(
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    "TEMPORARILY_UNAVAILABLE",
                    "scripted failure".to_string(),
                ),
                _ => run_does_not_exist(run_id),
            }
        }
        (Method::POST, "jobs/runs/cancel") => {
            let run_id = body["run_id"].as_i64().unwrap_or(-1);
            if fake.runs.lock().unwrap().contains_key(&run_id) {
                Json(json!({})).into_response()
            } else {
                run_does_not_exist(run_id)
            }
        }
        (Method::GET, "jobs/runs/list") => {
            let offset: usize = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
            let limit: usize = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
            let active = fake.active_runs.lock().unwrap();
            let page: Vec<Value> = active.iter().skip(offset).take(limit).cloned().collect();
            let has_more = offset + page.len() < active.len();
            if page.is_empty() {
                Json(json!({"has_more": false})).into_response()
            } else {
                Json(json!({"runs": page, "has_more": has_more})).into_response()
            }
        }
        (Method::POST, "workspace/mkdirs")
        | (Method::POST, "workspace/delete")
        | (Method::POST, "workspace/import") => Json(json!({})).into_response(),
        _ => error(
            StatusCode::NOT_FOUND,
            "ENDPOINT_NOT_FOUND",
            format!("No API found for '{}'", path),
        ),
    }
}
