//! Dirty tracking, conflict records and the sync status machine.
//!
//! Everything here is pure state — no timers, no network, no UI — so the
//! whole save/conflict lifecycle is testable with plain assertions.

use serde::{Deserialize, Serialize};

/// Monotonic edit counter plus the dirty flag.
///
/// A save captures the token when it starts; on completion the dirty flag
/// is cleared only if no further edit advanced the token in the meantime.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyTracker {
  token: u64,
  dirty: bool
}

impl DirtyTracker {
  /// Register a local mutation: advance the token, set the dirty flag.
  pub fn mark_dirty(&mut self) -> u64 {
    self.token += 1;
    self.dirty = true;
    self.token
  }

  /// Snapshot the current token (taken when a save starts).
  #[must_use]
  pub const fn capture_token(&self) -> u64 {
    self.token
  }

  /// Whether unsaved edits exist.
  #[must_use]
  pub const fn is_dirty(&self) -> bool {
    self.dirty
  }

  /// Clear the dirty flag only if `token` is still current.
  ///
  /// Returns `false` (and leaves the flag set) when edits arrived while the
  /// save was in flight — those edits still need a save of their own.
  pub fn commit_if_unchanged(&mut self, token: u64) -> bool {
    if self.token == token {
      self.dirty = false;
      true
    } else {
      false
    }
  }

  /// Clear the dirty flag unconditionally (reload / document switch).
  ///
  /// The token keeps counting so stale captures can never match again.
  pub fn reset(&mut self) {
    self.dirty = false;
  }
}

/// What the server reported when it rejected a save.
///
/// Populated only by a version-mismatch rejection; cleared by a successful
/// reload or forced overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
  /// The version the server currently holds.
  pub server_version: u64,
  /// The server's current `updated_at` token.
  pub server_updated_at: String
}

/// The two explicit ways out of a conflict. Never chosen automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  /// Discard local edits and re-fetch the authoritative document.
  Reload,
  /// Save again with the version check bypassed.
  ForceOverwrite
}

/// Where the document sits in the save lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
  /// No unsaved edits.
  Clean,
  /// Unsaved edits, autosave pending.
  Dirty,
  /// A save is in flight.
  Saving,
  /// A save failed transiently; a retry is scheduled.
  Retrying,
  /// The remote copy moved; waiting for an explicit resolution.
  Conflicted
}

/// Derive the status from the engine's raw flags.
///
/// Precedence: `Conflicted` > `Saving` > `Retrying` > `Dirty` > `Clean`.
/// A conflicted document stays `Conflicted` even while edits accumulate or
/// a forced save is in flight — the user's next step is resolution either
/// way.
#[must_use]
pub const fn derive_status(
  dirty: bool,
  saving: bool,
  retry_pending: bool,
  conflicted: bool
) -> SyncStatus {
  if conflicted {
    SyncStatus::Conflicted
  } else if saving {
    SyncStatus::Saving
  } else if retry_pending {
    SyncStatus::Retrying
  } else if dirty {
    SyncStatus::Dirty
  } else {
    SyncStatus::Clean
  }
}
