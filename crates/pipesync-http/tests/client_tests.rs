//! Store client tests via FakePipelineApi.

#![allow(clippy::expect_used)]

mod common;

use common::FakePipelineApi;
use pipesync_core::{OpKind, Operation, PipelineDocument, PipelineNode, SaveOptions, SaveOutcome};
use pipesync_http::client::Client;

/// Timeout for async tests (30s — HTTP server operations).
const TEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Create a client connected to the fake store.
async fn setup() -> (Client, std::sync::Arc<common::FakeState>) {
  let (base_url, state) = FakePipelineApi::spawn().await;
  let client = Client::new(&base_url, Some("test-token")).expect("client");
  (client, state)
}

/// A copy of `created` with one extra node per id in `node_ids`.
fn local_doc(created: &PipelineDocument, node_ids: &[&str]) -> PipelineDocument {
  let mut document = created.clone();
  for node_id in node_ids {
    document.nodes.push(PipelineNode {
      id: (*node_id).to_string(),
      kind: "transform".to_string(),
      label: (*node_id).to_string(),
      x: 0.0,
      y: 0.0,
      params: serde_json::json!({})
    });
  }
  document
}

fn autosave_against(base: &str) -> SaveOptions {
  SaveOptions {
    autosave: true,
    base_updated_at: base.to_string(),
    force: false
  }
}

#[tokio::test]
async fn test_create_then_get() {
  eprintln!("[TEST] test_create_then_get");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, _state) = setup().await;

    let created = client.create_pipeline("Demo", "first draft").await.expect("create");
    assert_eq!(created.id.as_deref(), Some("p-1"));
    assert_eq!(created.name, "Demo");
    assert_eq!(created.description, "first draft");
    assert_eq!(created.version, 0);
    assert!(!created.updated_at.is_empty(), "server must hand out a token");

    let fetched = client.get_pipeline("p-1").await.expect("get");
    assert_eq!(fetched.id.as_deref(), Some("p-1"));
    assert_eq!(fetched.name, "Demo");
    assert_eq!(fetched.version, 0);
    assert_eq!(fetched.updated_at, created.updated_at);
  }).await.expect("test timed out — possible deadlock");
}

#[tokio::test]
async fn test_save_bumps_version() {
  eprintln!("[TEST] test_save_bumps_version");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, state) = setup().await;
    let created = client.create_pipeline("Demo", "").await.expect("create");
    let id = created.id.clone().expect("id");

    let document = local_doc(&created, &["n1"]);
    let outcome = client
      .save_pipeline(&id, &document, &autosave_against(&created.updated_at))
      .await
      .expect("save");

    match outcome {
      SaveOutcome::Saved { version, updated_at } => {
        assert_eq!(version, 1);
        assert_ne!(updated_at, created.updated_at, "token must rotate on save");
      }
      SaveOutcome::Conflict { .. } => panic!("fresh base must not conflict")
    }

    let stored = state.stored(&id).await.expect("stored");
    assert_eq!(stored.version, 1);
    assert_eq!(stored.nodes.as_array().expect("nodes").len(), 1);
  }).await.expect("test timed out — possible deadlock");
}

#[tokio::test]
async fn test_stale_save_conflicts() {
  eprintln!("[TEST] test_stale_save_conflicts");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, state) = setup().await;
    let created = client.create_pipeline("Demo", "").await.expect("create");
    let id = created.id.clone().expect("id");

    // Another client moves the server copy on.
    let (server_version, server_token) = state.touch(&id).await;

    let document = local_doc(&created, &["n1"]);
    let outcome = client
      .save_pipeline(&id, &document, &autosave_against(&created.updated_at))
      .await
      .expect("save call itself succeeds");

    assert_eq!(
      outcome,
      SaveOutcome::Conflict {
        current_version: server_version,
        current_updated_at: server_token
      }
    );

    // The rejected snapshot must not have touched the stored copy.
    let stored = state.stored(&id).await.expect("stored");
    assert_eq!(stored.version, server_version);
    assert_eq!(stored.nodes.as_array().expect("nodes").len(), 0);
  }).await.expect("test timed out — possible deadlock");
}

#[tokio::test]
async fn test_forced_save_overwrites() {
  eprintln!("[TEST] test_forced_save_overwrites");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, state) = setup().await;
    let created = client.create_pipeline("Demo", "").await.expect("create");
    let id = created.id.clone().expect("id");

    let (server_version, _) = state.touch(&id).await;

    let document = local_doc(&created, &["n1", "n2"]);
    let outcome = client
      .save_pipeline(
        &id,
        &document,
        &SaveOptions {
          autosave: false,
          base_updated_at: created.updated_at.clone(),
          force: true
        }
      )
      .await
      .expect("forced save");

    match outcome {
      SaveOutcome::Saved { version, .. } => assert_eq!(version, server_version + 1),
      SaveOutcome::Conflict { .. } => panic!("force must bypass the version check")
    }

    let stored = state.stored(&id).await.expect("stored");
    assert_eq!(stored.nodes.as_array().expect("nodes").len(), 2, "local copy wins");
  }).await.expect("test timed out — possible deadlock");
}

#[tokio::test]
async fn test_missing_pipeline_not_found() {
  eprintln!("[TEST] test_missing_pipeline_not_found");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, _state) = setup().await;

    let result = client.get_pipeline("p-404").await;
    let err_msg = result.expect_err("missing id must error").to_string();
    assert!(
      err_msg.contains("pipeline not found"),
      "error should contain 'pipeline not found': {err_msg}"
    );

    // A save against a missing id is an error too, not a conflict.
    let document = PipelineDocument::blank();
    let result = client
      .save_pipeline("p-404", &document, &autosave_against("whatever"))
      .await;
    assert!(result.is_err(), "save to missing pipeline should error");
  }).await.expect("test timed out — possible deadlock");
}

#[tokio::test]
async fn test_server_error_is_error() {
  eprintln!("[TEST] test_server_error_is_error");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, state) = setup().await;
    let created = client.create_pipeline("Demo", "").await.expect("create");
    let id = created.id.clone().expect("id");

    state.fail_next_saves(1);
    let document = local_doc(&created, &["n1"]);
    let options = autosave_against(&created.updated_at);

    let err_msg = client
      .save_pipeline(&id, &document, &options)
      .await
      .expect_err("500 must surface as an error")
      .to_string();
    assert!(err_msg.contains("HTTP 500"), "got: {err_msg}");

    // The outage did not consume the base token; a retry goes through.
    let outcome = client
      .save_pipeline(&id, &document, &options)
      .await
      .expect("retry");
    assert!(matches!(outcome, SaveOutcome::Saved { version: 1, .. }));
  }).await.expect("test timed out — possible deadlock");
}

#[tokio::test]
async fn test_list_both_shapes() {
  eprintln!("[TEST] test_list_both_shapes");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, state) = setup().await;
    client.create_pipeline("One", "").await.expect("create one");
    client.create_pipeline("Two", "").await.expect("create two");

    let listed = client.list_pipelines().await.expect("list array");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "p-1");
    assert_eq!(listed[1].id, "p-2");

    state.serve_list_as_page();
    let paged = client.list_pipelines().await.expect("list page");
    assert_eq!(paged.len(), 2);
    assert_eq!(paged[0].name, "One");
  }).await.expect("test timed out — possible deadlock");
}

#[tokio::test]
async fn test_ops_batch_recorded() {
  eprintln!("[TEST] test_ops_batch_recorded");
  tokio::time::timeout(TEST_TIMEOUT, async {
    let (client, state) = setup().await;
    let created = client.create_pipeline("Demo", "").await.expect("create");
    let id = created.id.clone().expect("id");

    let batch = vec![
      Operation {
        ts: "2026-01-01T00:00:00Z".to_string(),
        kind: OpKind::NodeAdd,
        data: serde_json::json!({"id": "n1"})
      },
      Operation {
        ts: "2026-01-01T00:00:01Z".to_string(),
        kind: OpKind::NodeMove,
        data: serde_json::json!({"id": "n1", "x": 4.0, "y": 2.0})
      }
    ];
    client.append_operations(&id, &batch).await.expect("append");

    let recorded = state.recorded_ops().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, id);

    let entries = recorded[0].1.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "node:add");
    assert_eq!(entries[1]["kind"], "node:move");
    assert_eq!(entries[1]["data"]["x"], 4.0);
  }).await.expect("test timed out — possible deadlock");
}
