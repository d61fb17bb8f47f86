//! Mock pipeline store server on axum.
//!
//! Provides `FakePipelineApi::spawn()` — starts an HTTP server on a random
//! port that enforces the optimistic-concurrency contract: saves carrying a
//! stale `base_updated_at` are answered with 409 unless `force` is set.

#![allow(clippy::expect_used)]

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering}
  }
};

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  routing::{get, post}
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;

/// Stored pipeline data.
#[derive(Debug, Clone)]
pub struct StoredPipeline {
  pub id: String,
  pub name: String,
  pub description: String,
  pub nodes: Value,
  pub edges: Value,
  pub version: u64,
  pub updated_at: String
}

/// Internal state of the fake store.
#[derive(Debug)]
pub struct FakeState {
  pub pipelines: RwLock<HashMap<String, StoredPipeline>>,
  ops: RwLock<Vec<(String, Value)>>,
  next_id: AtomicU64,
  clock: AtomicU64,
  save_failures: AtomicUsize,
  ops_failures: AtomicUsize,
  save_attempts: AtomicUsize,
  list_as_page: AtomicBool
}

impl FakeState {
  fn new() -> Self {
    Self {
      pipelines: RwLock::new(HashMap::new()),
      ops: RwLock::new(Vec::new()),
      next_id: AtomicU64::new(1),
      clock: AtomicU64::new(0),
      save_failures: AtomicUsize::new(0),
      ops_failures: AtomicUsize::new(0),
      save_attempts: AtomicUsize::new(0),
      list_as_page: AtomicBool::new(false)
    }
  }

  /// Pre-create a pipeline server-side; returns its id.
  pub async fn seed(&self, name: &str, description: &str) -> String {
    let id = format!("p-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
    let pipeline = StoredPipeline {
      id: id.clone(),
      name: name.to_string(),
      description: description.to_string(),
      nodes: json!([]),
      edges: json!([]),
      version: 0,
      updated_at: self.tick()
    };
    self.pipelines.write().await.insert(id.clone(), pipeline);
    id
  }

  /// Simulate another client touching a pipeline: bump version and token.
  pub async fn touch(&self, id: &str) -> (u64, String) {
    let updated_at = self.tick();
    let mut pipelines = self.pipelines.write().await;
    let pipeline = pipelines.get_mut(id).expect("touch unknown pipeline");
    pipeline.version += 1;
    pipeline.updated_at.clone_from(&updated_at);
    (pipeline.version, updated_at)
  }

  /// Make the next `count` saves fail with 500 (still counted).
  pub fn fail_next_saves(&self, count: usize) {
    self.save_failures.store(count, Ordering::SeqCst);
  }

  /// Make the next `count` journal appends fail with 500.
  pub fn fail_next_ops(&self, count: usize) {
    self.ops_failures.store(count, Ordering::SeqCst);
  }

  /// Serve the listing as `{"items": [...], "total": n}` instead of a
  /// bare array.
  pub fn serve_list_as_page(&self) {
    self.list_as_page.store(true, Ordering::SeqCst);
  }

  /// Total save attempts seen, including failed and conflicted ones.
  pub fn save_attempts(&self) -> usize {
    self.save_attempts.load(Ordering::SeqCst)
  }

  /// Snapshot of a stored pipeline.
  pub async fn stored(&self, id: &str) -> Option<StoredPipeline> {
    self.pipelines.read().await.get(id).cloned()
  }

  /// Recorded op batches as `(pipeline id, raw JSON array)`, in order.
  pub async fn recorded_ops(&self) -> Vec<(String, Value)> {
    self.ops.read().await.clone()
  }

  fn tick(&self) -> String {
    let n = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
    format!("2026-01-01T00:00:00.{n:06}Z")
  }
}

/// Fake pipeline store — start and get base URL + state.
pub struct FakePipelineApi;

impl FakePipelineApi {
  /// Start a fake store server on a random port.
  pub async fn spawn() -> (String, Arc<FakeState>) {
    let state = Arc::new(FakeState::new());

    let app = Router::new()
      .route("/api/v1/pipelines", get(handle_list).post(handle_create))
      .route("/api/v1/pipelines/:id", get(handle_get).put(handle_save))
      .route("/api/v1/pipelines/:id/ops", post(handle_ops))
      .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
      .await
      .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let base_url = format!("http://{addr}");

    tokio::spawn(async move {
      axum::serve(listener, app).await.expect("serve");
    });

    // Wait for the server to start.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (base_url, state)
  }
}

// -- JSON bodies --

#[derive(Deserialize)]
struct CreateBody {
  name: String,
  #[serde(default)]
  description: String,
  nodes: Option<Value>,
  edges: Option<Value>
}

#[derive(Deserialize)]
struct SaveBody {
  name: String,
  #[serde(default)]
  description: String,
  nodes: Option<Value>,
  edges: Option<Value>
}

#[derive(Deserialize)]
struct SaveQuery {
  #[allow(dead_code)]
  autosave: Option<bool>,
  #[serde(default)]
  force: bool,
  base_updated_at: Option<String>
}

fn document_json(p: &StoredPipeline) -> Value {
  json!({
    "id": p.id,
    "name": p.name,
    "description": p.description,
    "nodes": p.nodes,
    "edges": p.edges,
    "version": p.version,
    "updated_at": p.updated_at
  })
}

fn not_found() -> axum::response::Response {
  (
    StatusCode::NOT_FOUND,
    Json(json!({
      "error_code": "NOT_FOUND",
      "message": "pipeline not found"
    }))
  )
    .into_response()
}

// -- Handlers --

async fn handle_create(
  State(state): State<Arc<FakeState>>,
  Json(body): Json<CreateBody>
) -> impl IntoResponse {
  let id = format!("p-{}", state.next_id.fetch_add(1, Ordering::SeqCst));
  let pipeline = StoredPipeline {
    id: id.clone(),
    name: body.name,
    description: body.description,
    nodes: body.nodes.unwrap_or_else(|| json!([])),
    edges: body.edges.unwrap_or_else(|| json!([])),
    version: 0,
    updated_at: state.tick()
  };

  let resp = document_json(&pipeline);
  state.pipelines.write().await.insert(id, pipeline);

  (StatusCode::CREATED, Json(resp)).into_response()
}

async fn handle_get(
  State(state): State<Arc<FakeState>>,
  Path(id): Path<String>
) -> impl IntoResponse {
  let pipelines = state.pipelines.read().await;
  match pipelines.get(&id) {
    Some(pipeline) => Json(document_json(pipeline)).into_response(),
    None => not_found()
  }
}

async fn handle_list(State(state): State<Arc<FakeState>>) -> impl IntoResponse {
  let pipelines = state.pipelines.read().await;
  let mut summaries: Vec<Value> = pipelines
    .values()
    .map(|p| {
      json!({
        "id": p.id,
        "name": p.name,
        "description": p.description,
        "version": p.version,
        "updated_at": p.updated_at
      })
    })
    .collect();
  summaries.sort_by_key(|s| s["id"].as_str().map(String::from));

  if state.list_as_page.load(Ordering::SeqCst) {
    Json(json!({"items": summaries, "total": summaries.len()})).into_response()
  } else {
    Json(Value::Array(summaries)).into_response()
  }
}

async fn handle_save(
  State(state): State<Arc<FakeState>>,
  Path(id): Path<String>,
  Query(q): Query<SaveQuery>,
  Json(body): Json<SaveBody>
) -> impl IntoResponse {
  state.save_attempts.fetch_add(1, Ordering::SeqCst);

  let failures = state.save_failures.load(Ordering::SeqCst);
  if failures > 0 {
    state.save_failures.store(failures - 1, Ordering::SeqCst);
    return (
      StatusCode::INTERNAL_SERVER_ERROR,
      Json(json!({
        "error_code": "STORE_DOWN",
        "message": "simulated outage"
      }))
    )
      .into_response();
  }

  let mut pipelines = state.pipelines.write().await;
  let Some(pipeline) = pipelines.get_mut(&id) else {
    return not_found();
  };

  let base = q.base_updated_at.unwrap_or_default();
  if !q.force && base != pipeline.updated_at {
    return (
      StatusCode::CONFLICT,
      Json(json!({
        "current_version": pipeline.version,
        "current_updated_at": pipeline.updated_at
      }))
    )
      .into_response();
  }

  pipeline.name = body.name;
  pipeline.description = body.description;
  pipeline.nodes = body.nodes.unwrap_or_else(|| json!([]));
  pipeline.edges = body.edges.unwrap_or_else(|| json!([]));
  pipeline.version += 1;
  pipeline.updated_at = state.tick();

  Json(json!({
    "version": pipeline.version,
    "updated_at": pipeline.updated_at
  }))
  .into_response()
}

async fn handle_ops(
  State(state): State<Arc<FakeState>>,
  Path(id): Path<String>,
  Json(batch): Json<Value>
) -> impl IntoResponse {
  state.ops.write().await.push((id.clone(), batch.clone()));

  let failures = state.ops_failures.load(Ordering::SeqCst);
  if failures > 0 {
    state.ops_failures.store(failures - 1, Ordering::SeqCst);
    return (
      StatusCode::INTERNAL_SERVER_ERROR,
      Json(json!({
        "error_code": "STORE_DOWN",
        "message": "simulated outage"
      }))
    )
      .into_response();
  }

  if !state.pipelines.read().await.contains_key(&id) {
    return not_found();
  }

  // Enforce the wire shape: an array of {ts, kind, data} objects.
  let Some(entries) = batch.as_array() else {
    return (
      StatusCode::BAD_REQUEST,
      Json(json!({
        "error_code": "BAD_BATCH",
        "message": "ops payload must be an array"
      }))
    )
      .into_response();
  };
  for entry in entries {
    let well_formed = entry.get("ts").is_some_and(Value::is_string)
      && entry.get("kind").is_some_and(Value::is_string)
      && entry.get("data").is_some();
    if !well_formed {
      return (
        StatusCode::BAD_REQUEST,
        Json(json!({
          "error_code": "BAD_BATCH",
          "message": "each op needs ts, kind and data"
        }))
      )
        .into_response();
    }
  }

  StatusCode::NO_CONTENT.into_response()
}
