//! Wire schemas for the pipeline store API.
//!
//! Request bodies carry only document content; `version` and `updated_at`
//! always come back from the server, never up from the client body (the
//! concurrency token travels in the query string instead).

use pipesync_core::{DocumentSummary, PipelineDocument, PipelineEdge, PipelineNode};
use serde::{Deserialize, Serialize};

/// 2xx reply to a save: the newly confirmed version metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveResponse {
  /// Version the server assigned to this save.
  pub version: u64,
  /// Opaque modification token to echo in the next save.
  pub updated_at: String
}

/// 409 reply to a save: where the server actually is.
#[derive(Debug, Clone, Deserialize)]
pub struct ConflictBody {
  /// Version currently stored on the server.
  pub current_version: u64,
  /// Modification token currently stored on the server.
  pub current_updated_at: String
}

/// Error body the store attaches to non-2xx replies.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
  /// Machine-readable error code.
  pub error_code: String,
  /// Human-readable detail.
  #[serde(default)]
  pub message: String
}

/// Body of a create request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest {
  /// Document name.
  pub name: String,
  /// Free-form description.
  pub description: String,
  /// Initial nodes (usually empty).
  pub nodes: Vec<PipelineNode>,
  /// Initial edges (usually empty).
  pub edges: Vec<PipelineEdge>
}

/// Body of a save request, borrowed straight from the working copy.
#[derive(Debug, Serialize)]
pub struct SavePayload<'a> {
  /// Document name.
  pub name: &'a str,
  /// Free-form description.
  pub description: &'a str,
  /// Full node set.
  pub nodes: &'a [PipelineNode],
  /// Full edge set.
  pub edges: &'a [PipelineEdge]
}

impl<'a> From<&'a PipelineDocument> for SavePayload<'a> {
  fn from(document: &'a PipelineDocument) -> Self {
    Self {
      name: &document.name,
      description: &document.description,
      nodes: &document.nodes,
      edges: &document.edges
    }
  }
}

/// Listing reply; deployments answer with either a bare array or a page
/// object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
  /// Paged shape: `{"items": [...], "total": n}`.
  Page {
    /// The summaries on this page.
    items: Vec<DocumentSummary>,
    /// Total number of documents on the server.
    total: u64
  },
  /// Bare array shape.
  Plain(Vec<DocumentSummary>)
}

impl ListResponse {
  /// The summaries regardless of which shape the server chose.
  #[must_use]
  pub fn into_items(self) -> Vec<DocumentSummary> {
    match self {
      Self::Page { items, .. } => items,
      Self::Plain(items) => items
    }
  }
}
