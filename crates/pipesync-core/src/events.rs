//! Engine event handler for UIs, CLIs and logs.

use std::time::Duration;

use crate::state::{ConflictRecord, Resolution, SyncStatus};

/// Log level for the generic log channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
  /// Debug detail.
  Debug,
  /// Informational message.
  Info,
  /// Warning.
  Warn,
  /// Error.
  Error
}

/// Callbacks for engine transitions.
///
/// All methods have no-op defaults, so an implementor overrides only what
/// its surface needs.
#[allow(unused_variables)]
pub trait SyncEventHandler: Send + Sync + 'static {
  /// The derived sync status changed.
  fn on_status(&self, status: SyncStatus) {}

  /// A save request left for the server.
  fn on_save_started(&self, document_id: &str, autosave: bool) {}

  /// The server confirmed a save.
  fn on_saved(&self, document_id: &str, version: u64) {}

  /// The save guard declined to save (validation or lifecycle reason).
  fn on_save_skipped(&self, reason: &str) {}

  /// The server rejected a save because the remote copy moved.
  fn on_conflict(&self, record: &ConflictRecord) {}

  /// A save failed transiently; a retry fires after `retry_in`.
  fn on_transient_error(&self, message: &str, retry_in: Duration) {}

  /// A conflict was resolved.
  fn on_resolved(&self, resolution: Resolution, version: u64) {}

  /// Journal flush failed; the batch will ride along with the next save.
  fn on_journal_error(&self, message: &str) {}

  /// A document finished loading (open or reload).
  fn on_document_opened(&self, document_id: &str, version: u64) {}

  /// A document was created on the server.
  fn on_document_created(&self, document_id: &str) {}

  /// Free-form log message.
  fn on_log(&self, level: LogLevel, message: &str) {}
}

/// Empty handler (tests, headless CLI runs).
pub struct NoopEventHandler;

impl SyncEventHandler for NoopEventHandler {}
