//! Pipeline document model and the typed edit event stream.
//!
//! The editing surface owns the visual graph and emits `EditEvent`s; the
//! engine mirrors them into its working copy via [`PipelineDocument::apply`]
//! and journals each one. `version`/`updated_at` are advanced only from
//! confirmed server responses — the client never predicts the next value.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::journal::OpKind;

/// A processing step in the pipeline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
  /// Node id, unique within the document.
  pub id: String,
  /// Step kind (registry identifier, e.g. `"filter"`).
  pub kind: String,
  /// Human-readable label.
  pub label: String,
  /// Canvas position.
  pub x: f64,
  /// Canvas position.
  pub y: f64,
  /// Step parameters, opaque to the engine.
  #[serde(default)]
  pub params: Value
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEdge {
  /// Edge id, unique within the document.
  pub id: String,
  /// Source node id.
  pub source: String,
  /// Target node id.
  pub target: String
}

/// The versioned pipeline document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDocument {
  /// Server-assigned id; `None` until the document is created or loaded.
  pub id: Option<String>,
  /// Document name; saving requires it to be non-empty.
  pub name: String,
  /// Free-form description.
  #[serde(default)]
  pub description: String,
  /// Graph nodes.
  #[serde(default)]
  pub nodes: Vec<PipelineNode>,
  /// Graph edges.
  #[serde(default)]
  pub edges: Vec<PipelineEdge>,
  /// Server-assigned monotonic version.
  #[serde(default)]
  pub version: u64,
  /// Opaque server timestamp; echoed back as the optimistic-concurrency
  /// base token on save. Never parsed or compared locally.
  #[serde(default)]
  pub updated_at: String
}

impl PipelineDocument {
  /// An unsaved blank draft (no id, no name, empty graph).
  #[must_use]
  pub fn blank() -> Self {
    Self {
      id: None,
      name: String::new(),
      description: String::new(),
      nodes: Vec::new(),
      edges: Vec::new(),
      version: 0,
      updated_at: String::new()
    }
  }

  /// Apply a local edit to the working copy.
  ///
  /// Returns `false` when the event had no effect (e.g. it targets a node
  /// that does not exist); such events are neither journaled nor do they
  /// mark the document dirty.
  pub fn apply(&mut self, event: &EditEvent) -> bool {
    match event {
      EditEvent::NodeAdded { node } => {
        if let Some(existing) = self.nodes.iter_mut().find(|n| n.id == node.id) {
          *existing = node.clone();
        } else {
          self.nodes.push(node.clone());
        }
        true
      }
      EditEvent::NodeRemoved { id } => {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != *id);
        if self.nodes.len() == before {
          return false;
        }
        // Edges referencing a removed node go with it.
        self.edges.retain(|e| e.source != *id && e.target != *id);
        true
      }
      EditEvent::NodeMoved { id, x, y } => {
        match self.nodes.iter_mut().find(|n| n.id == *id) {
          Some(node) => {
            node.x = *x;
            node.y = *y;
            true
          }
          None => false
        }
      }
      EditEvent::NodeUpdated { id, label, params } => {
        match self.nodes.iter_mut().find(|n| n.id == *id) {
          Some(node) => {
            if let Some(label) = label {
              node.label.clone_from(label);
            }
            if let Some(params) = params {
              node.params = params.clone();
            }
            true
          }
          None => false
        }
      }
      EditEvent::EdgeAdded { edge } => {
        if let Some(existing) = self.edges.iter_mut().find(|e| e.id == edge.id) {
          *existing = edge.clone();
        } else {
          self.edges.push(edge.clone());
        }
        true
      }
      EditEvent::EdgeRemoved { id } => {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != *id);
        self.edges.len() != before
      }
      EditEvent::MetaChanged { name, description } => {
        if name.is_none() && description.is_none() {
          return false;
        }
        if let Some(name) = name {
          self.name.clone_from(name);
        }
        if let Some(description) = description {
          self.description.clone_from(description);
        }
        true
      }
    }
  }
}

/// A discrete change emitted by the editing surface.
///
/// Each variant maps to exactly one journal operation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditEvent {
  /// A node was added (or replaced wholesale).
  NodeAdded {
    /// The new node.
    node: PipelineNode
  },
  /// A node was removed; its incident edges are removed too.
  NodeRemoved {
    /// Node id.
    id: String
  },
  /// A node was dragged to a new canvas position.
  NodeMoved {
    /// Node id.
    id: String,
    /// New position.
    x: f64,
    /// New position.
    y: f64
  },
  /// A node's label and/or parameters changed.
  NodeUpdated {
    /// Node id.
    id: String,
    /// New label, if it changed.
    label: Option<String>,
    /// New parameters, if they changed.
    params: Option<Value>
  },
  /// An edge was added.
  EdgeAdded {
    /// The new edge.
    edge: PipelineEdge
  },
  /// An edge was removed.
  EdgeRemoved {
    /// Edge id.
    id: String
  },
  /// Name and/or description changed.
  MetaChanged {
    /// New name, if it changed.
    name: Option<String>,
    /// New description, if it changed.
    description: Option<String>
  }
}

impl EditEvent {
  /// The journal operation kind this event records as.
  #[must_use]
  pub const fn op_kind(&self) -> OpKind {
    match self {
      Self::NodeAdded { .. } => OpKind::NodeAdd,
      Self::NodeRemoved { .. } => OpKind::NodeRemove,
      Self::NodeMoved { .. } => OpKind::NodeMove,
      Self::NodeUpdated { .. } => OpKind::NodeUpdate,
      Self::EdgeAdded { .. } => OpKind::EdgeAdd,
      Self::EdgeRemoved { .. } => OpKind::EdgeRemove,
      Self::MetaChanged { .. } => OpKind::PipeMeta
    }
  }

  /// The journal operation payload for this event.
  #[must_use]
  pub fn op_data(&self) -> Value {
    match self {
      Self::NodeAdded { node } => json!({ "node": node }),
      Self::NodeRemoved { id } | Self::EdgeRemoved { id } => json!({ "id": id }),
      Self::NodeMoved { id, x, y } => json!({ "id": id, "x": x, "y": y }),
      Self::NodeUpdated { id, label, params } => {
        json!({ "id": id, "label": label, "params": params })
      }
      Self::EdgeAdded { edge } => json!({ "edge": edge }),
      Self::MetaChanged { name, description } => {
        json!({ "name": name, "description": description })
      }
    }
  }
}
