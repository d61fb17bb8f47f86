//! Append-only operation journal.
//!
//! A secondary audit trail of discrete edits, flushed opportunistically as
//! part of each save cycle — never on its own schedule. The full-document
//! snapshot remains the source of truth; replaying or duplicating journal
//! entries on the server is acceptable.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Operation kind, serialized with the wire names (`node:add`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
  /// A node was added.
  #[serde(rename = "node:add")]
  NodeAdd,
  /// A node was removed.
  #[serde(rename = "node:remove")]
  NodeRemove,
  /// A node was repositioned.
  #[serde(rename = "node:move")]
  NodeMove,
  /// A node's label or parameters changed.
  #[serde(rename = "node:update")]
  NodeUpdate,
  /// An edge was added.
  #[serde(rename = "edge:add")]
  EdgeAdd,
  /// An edge was removed.
  #[serde(rename = "edge:remove")]
  EdgeRemove,
  /// Document name or description changed.
  #[serde(rename = "pipe:meta")]
  PipeMeta
}

/// One journaled edit, as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
  /// Client-side RFC 3339 timestamp of the edit.
  pub ts: String,
  /// Operation kind.
  pub kind: OpKind,
  /// Kind-specific payload.
  pub data: Value
}

/// In-memory FIFO buffer of operations pending flush.
///
/// Single producer, single consumer (both the engine worker), so a failed
/// batch can be spliced back in front of anything recorded meanwhile
/// without reordering.
#[derive(Debug, Default)]
pub struct OperationJournal {
  buffer: VecDeque<Operation>
}

impl OperationJournal {
  /// Create an empty journal.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Append an operation.
  ///
  /// No-op while `document_id` is `None`: operations describe edits to a
  /// specific remote document, and an unsaved draft has none.
  pub fn record(&mut self, document_id: Option<&str>, kind: OpKind, data: Value) {
    if document_id.is_none() {
      debug!(?kind, "operation not journaled: document has no id");
      return;
    }

    self.buffer.push_back(Operation {
      ts: chrono::Utc::now().to_rfc3339(),
      kind,
      data
    });
  }

  /// Drain the whole buffer as one ordered batch.
  pub fn take_batch(&mut self) -> Vec<Operation> {
    self.buffer.drain(..).collect()
  }

  /// Splice a failed batch back in FRONT of the buffer.
  ///
  /// Operations recorded after the batch was taken stay behind it, so the
  /// next flush resends everything in the original order.
  pub fn requeue(&mut self, batch: Vec<Operation>) {
    for op in batch.into_iter().rev() {
      self.buffer.push_front(op);
    }
  }

  /// Drop all pending operations (document switch or reload).
  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Number of pending operations.
  #[must_use]
  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  /// Whether the buffer is empty.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
  use super::*;
  use serde_json::json;

  fn kinds(batch: &[Operation]) -> Vec<OpKind> {
    batch.iter().map(|op| op.kind).collect()
  }

  #[test]
  fn record_requires_document_id() {
    let mut journal = OperationJournal::new();

    journal.record(None, OpKind::NodeAdd, json!({ "id": "a" }));
    assert!(journal.is_empty());

    journal.record(Some("p1"), OpKind::NodeAdd, json!({ "id": "a" }));
    assert_eq!(journal.len(), 1);
  }

  #[test]
  fn take_batch_drains_in_order() {
    let mut journal = OperationJournal::new();
    journal.record(Some("p1"), OpKind::NodeAdd, json!({}));
    journal.record(Some("p1"), OpKind::NodeMove, json!({}));

    let batch = journal.take_batch();
    assert_eq!(kinds(&batch), vec![OpKind::NodeAdd, OpKind::NodeMove]);
    assert!(journal.is_empty());
  }

  #[test]
  fn requeue_keeps_global_order() {
    let mut journal = OperationJournal::new();
    journal.record(Some("p1"), OpKind::NodeAdd, json!({ "n": 1 }));
    journal.record(Some("p1"), OpKind::NodeMove, json!({ "n": 2 }));

    // Flush fails, a new edit arrives, the batch is put back.
    let failed = journal.take_batch();
    journal.record(Some("p1"), OpKind::EdgeAdd, json!({ "n": 3 }));
    journal.requeue(failed);

    let batch = journal.take_batch();
    assert_eq!(
      kinds(&batch),
      vec![OpKind::NodeAdd, OpKind::NodeMove, OpKind::EdgeAdd]
    );
  }

  #[test]
  fn operation_serializes_wire_shape() {
    let op = Operation {
      ts: "2024-05-01T10:00:00Z".to_string(),
      kind: OpKind::EdgeRemove,
      data: json!({ "id": "e1" })
    };

    let value = serde_json::to_value(&op).expect("serialize");
    assert_eq!(value["kind"], json!("edge:remove"));
    assert_eq!(value["ts"], json!("2024-05-01T10:00:00Z"));
    assert_eq!(value["data"]["id"], json!("e1"));
  }

  #[test]
  fn clear_drops_everything() {
    let mut journal = OperationJournal::new();
    journal.record(Some("p1"), OpKind::PipeMeta, json!({}));
    journal.clear();
    assert!(journal.is_empty());
  }
}
