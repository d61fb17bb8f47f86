//! Remote document store seam.
//!
//! The engine decides WHEN to persist; the store decides HOW to talk to
//! whatever holds the authoritative copy. A version-mismatch rejection is a
//! semantic outcome, not an error — `Err` from [`DocumentStore::save`]
//! always means a transient condition worth retrying.

use serde::{Deserialize, Serialize};

use crate::{
  document::PipelineDocument,
  journal::Operation
};

/// Store for versioned pipeline documents.
pub trait DocumentStore: Send + Sync + 'static {
  /// Create a new, empty document; the server assigns id and version 0.
  fn create(
    &self,
    name: &str,
    description: &str
  ) -> impl Future<Output = anyhow::Result<PipelineDocument>> + Send;

  /// Fetch the authoritative document by id.
  fn fetch(&self, id: &str) -> impl Future<Output = anyhow::Result<PipelineDocument>> + Send;

  /// List available documents (metadata only).
  fn list(&self) -> impl Future<Output = anyhow::Result<Vec<DocumentSummary>>> + Send;

  /// Persist a full-document snapshot under optimistic concurrency.
  ///
  /// `options.base_updated_at` carries the last `updated_at` the client
  /// observed; the server rejects the save when its copy has moved, unless
  /// `options.force` is set.
  fn save(
    &self,
    id: &str,
    document: &PipelineDocument,
    options: &SaveOptions
  ) -> impl Future<Output = anyhow::Result<SaveOutcome>> + Send;

  /// Append a batch of journal operations (audit trail).
  fn append_ops(
    &self,
    id: &str,
    batch: &[Operation]
  ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// How a save request should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
  /// Whether this save was triggered automatically (logging/UX only).
  pub autosave: bool,
  /// The `updated_at` the client last observed.
  pub base_updated_at: String,
  /// Skip the version check and overwrite.
  pub force: bool
}

/// What the server said about a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
  /// Accepted; the client adopts the returned version/timestamp.
  Saved {
    /// New document version.
    version: u64,
    /// New `updated_at` token.
    updated_at: String
  },
  /// Rejected: the remote copy moved since `base_updated_at`.
  Conflict {
    /// The version the server holds now.
    current_version: u64,
    /// The `updated_at` the server holds now.
    current_updated_at: String
  }
}

/// One row of a document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
  /// Document id.
  pub id: String,
  /// Document name.
  pub name: String,
  /// Description.
  #[serde(default)]
  pub description: String,
  /// Current version.
  pub version: u64,
  /// Current `updated_at` token.
  #[serde(default)]
  pub updated_at: String
}
