//! pipesync-core — client-side sync engine for `PipeSync`.
//!
//! Contains:
//! - `SyncEngine` — sync orchestration (debounce, guarded saves, retry, conflicts)
//! - `DocumentStore` trait — unified interface to the remote pipeline store
//! - `PipelineDocument` + `EditEvent` — the working copy and typed edits
//! - `OperationJournal` — FIFO of fine-grained ops shipped ahead of each save
//! - `SyncEventHandler` — trait for events (UI, logs)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   EngineCommand   ┌──────────────┐    ┌───────────────┐
//! │ editor / CLI │ ────────────────► │  SyncEngine  │ ─► │ DocumentStore │
//! │              │ ◄──── watch ───── │ (one worker) │    │ (HTTP client) │
//! └──────────────┘  EngineSnapshot   └──────┬───────┘    └───────────────┘
//!                                           │
//!                                    ┌──────▼───────┐
//!                                    │  debounce +  │
//!                                    │ retry timers │
//!                                    └──────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod events;
pub mod journal;
pub mod prefs;
pub mod retry;
pub mod schedule;
pub mod state;
pub mod store;
pub mod sync_engine;
pub mod test_utils;

pub use config::SyncConfig;
pub use diagnostics::{DiagnosticEntry, DiagnosticsLog};
pub use document::{EditEvent, PipelineDocument, PipelineEdge, PipelineNode};
pub use events::{LogLevel, NoopEventHandler, SyncEventHandler};
pub use journal::{OpKind, Operation, OperationJournal};
pub use prefs::{FilePrefs, LAST_DOCUMENT_KEY, MemoryPrefs, PreferencesStore};
pub use retry::{RetryPolicy, RetryState};
pub use schedule::PendingTimer;
pub use state::{ConflictRecord, DirtyTracker, Resolution, SyncStatus, derive_status};
pub use store::{DocumentStore, DocumentSummary, SaveOptions, SaveOutcome};
pub use sync_engine::{EngineCommand, EngineSnapshot, SyncEngine};
