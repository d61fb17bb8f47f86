//! Test doubles and helpers for exercising the sync engine without a real
//! server: a scriptable in-memory [`DocumentStore`] and a recording
//! [`SyncEventHandler`].

use std::{
  collections::VecDeque,
  future::Future,
  sync::{
    Mutex, PoisonError,
    atomic::{AtomicU64, AtomicUsize, Ordering}
  },
  time::Duration
};

use crate::{
  document::PipelineDocument,
  events::{LogLevel, SyncEventHandler},
  journal::Operation,
  state::{ConflictRecord, Resolution, SyncStatus},
  store::{DocumentStore, DocumentSummary, SaveOptions, SaveOutcome}
};

/// Hard cap for a single async test step.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Await `fut`, logging progress to stderr.
///
/// # Panics
///
/// Panics if `fut` does not finish within [`TEST_TIMEOUT`].
pub async fn with_timeout<T>(name: &str, fut: impl Future<Output = T>) -> T {
  eprintln!("[test] {name}...");
  match tokio::time::timeout(TEST_TIMEOUT, fut).await {
    Ok(value) => {
      eprintln!("[test] {name} done");
      value
    }
    Err(_) => panic!("{name} timed out after {TEST_TIMEOUT:?}")
  }
}

/// One recorded [`DocumentStore::save`] call.
#[derive(Debug, Clone)]
pub struct RecordedSave {
  /// Document id the save targeted.
  pub id: String,
  /// The snapshot handed to the store.
  pub snapshot: PipelineDocument,
  /// The options the engine chose for this save.
  pub options: SaveOptions
}

type ScriptedSave = Result<SaveOutcome, String>;
type ScriptedFetch = Result<PipelineDocument, String>;

/// Scriptable in-memory store.
///
/// Records every call; save and fetch results can be scripted in FIFO
/// order. An unscripted save succeeds with the next version number and a
/// fresh opaque `updated_at` token.
#[derive(Debug, Default)]
pub struct MockStore {
  saves: Mutex<Vec<RecordedSave>>,
  ops: Mutex<Vec<(String, Vec<Operation>)>>,
  fetches: Mutex<Vec<String>>,
  creates: Mutex<Vec<(String, String)>>,
  save_script: Mutex<VecDeque<ScriptedSave>>,
  fetch_script: Mutex<VecDeque<ScriptedFetch>>,
  save_delay: Mutex<Duration>,
  ops_failures: AtomicUsize,
  version: AtomicU64,
  ids: AtomicU64,
  clock: AtomicU64
}

impl MockStore {
  /// A fresh store with nothing scripted.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue an explicit outcome for the next unscripted save.
  pub fn script_save(&self, outcome: SaveOutcome) {
    lock(&self.save_script).push_back(Ok(outcome));
  }

  /// Queue a transient failure for the next save.
  pub fn script_save_error(&self, message: &str) {
    lock(&self.save_script).push_back(Err(message.to_string()));
  }

  /// Queue a document for the next fetch.
  pub fn script_fetch(&self, document: PipelineDocument) {
    lock(&self.fetch_script).push_back(Ok(document));
  }

  /// Queue a failure for the next fetch.
  pub fn script_fetch_error(&self, message: &str) {
    lock(&self.fetch_script).push_back(Err(message.to_string()));
  }

  /// Make the next `count` journal appends fail (after recording them).
  pub fn fail_next_ops(&self, count: usize) {
    self.ops_failures.store(count, Ordering::SeqCst);
  }

  /// Hold every save for `delay` before answering.
  pub fn set_save_delay(&self, delay: Duration) {
    *lock(&self.save_delay) = delay;
  }

  /// All recorded save calls, in order.
  #[must_use]
  pub fn save_calls(&self) -> Vec<RecordedSave> {
    lock(&self.saves).clone()
  }

  /// All recorded journal appends (including failed ones), in order.
  #[must_use]
  pub fn ops_calls(&self) -> Vec<(String, Vec<Operation>)> {
    lock(&self.ops).clone()
  }

  /// All recorded fetches, in order.
  #[must_use]
  pub fn fetch_calls(&self) -> Vec<String> {
    lock(&self.fetches).clone()
  }

  /// All recorded creates as `(name, description)`, in order.
  #[must_use]
  pub fn create_calls(&self) -> Vec<(String, String)> {
    lock(&self.creates).clone()
  }

  fn tick(&self) -> String {
    let n = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
    format!("t-{n}")
  }
}

impl DocumentStore for MockStore {
  async fn create(&self, name: &str, description: &str) -> anyhow::Result<PipelineDocument> {
    lock(&self.creates).push((name.to_string(), description.to_string()));

    let n = self.ids.fetch_add(1, Ordering::SeqCst) + 1;
    let mut document = PipelineDocument::blank();
    document.id = Some(format!("doc-{n}"));
    document.name = name.to_string();
    document.description = description.to_string();
    document.updated_at = self.tick();
    Ok(document)
  }

  async fn fetch(&self, id: &str) -> anyhow::Result<PipelineDocument> {
    lock(&self.fetches).push(id.to_string());

    match lock(&self.fetch_script).pop_front() {
      Some(Ok(document)) => Ok(document),
      Some(Err(message)) => Err(anyhow::anyhow!(message)),
      None => anyhow::bail!("no scripted fetch for {id}")
    }
  }

  async fn list(&self) -> anyhow::Result<Vec<DocumentSummary>> {
    Ok(Vec::new())
  }

  async fn save(
    &self,
    id: &str,
    document: &PipelineDocument,
    options: &SaveOptions
  ) -> anyhow::Result<SaveOutcome> {
    lock(&self.saves).push(RecordedSave {
      id: id.to_string(),
      snapshot: document.clone(),
      options: options.clone()
    });

    let delay = *lock(&self.save_delay);
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    match lock(&self.save_script).pop_front() {
      Some(Ok(outcome)) => Ok(outcome),
      Some(Err(message)) => Err(anyhow::anyhow!(message)),
      None => {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SaveOutcome::Saved {
          version,
          updated_at: self.tick()
        })
      }
    }
  }

  async fn append_ops(&self, id: &str, batch: &[Operation]) -> anyhow::Result<()> {
    lock(&self.ops).push((id.to_string(), batch.to_vec()));

    let failures = self.ops_failures.load(Ordering::SeqCst);
    if failures > 0 {
      self.ops_failures.store(failures - 1, Ordering::SeqCst);
      anyhow::bail!("journal endpoint unavailable");
    }
    Ok(())
  }
}

/// Event handler that records every callback it receives.
#[derive(Debug, Default)]
pub struct TestEventHandler {
  /// Status transitions, in order.
  pub statuses: Mutex<Vec<SyncStatus>>,
  /// `(id, autosave)` for each started save.
  pub save_started: Mutex<Vec<(String, bool)>>,
  /// `(id, version)` for each confirmed save.
  pub saved: Mutex<Vec<(String, u64)>>,
  /// Reasons for declined saves.
  pub skipped: Mutex<Vec<String>>,
  /// Conflicts as reported.
  pub conflicts: Mutex<Vec<ConflictRecord>>,
  /// `(message, retry delay)` for each transient failure.
  pub transient: Mutex<Vec<(String, Duration)>>,
  /// `(resolution, version)` for each resolved conflict.
  pub resolved: Mutex<Vec<(Resolution, u64)>>,
  /// Journal flush failures.
  pub journal_errors: Mutex<Vec<String>>,
  /// `(id, version)` for each loaded document.
  pub opened: Mutex<Vec<(String, u64)>>,
  /// Ids of created documents.
  pub created: Mutex<Vec<String>>,
  /// Free-form log lines.
  pub logs: Mutex<Vec<(LogLevel, String)>>
}

impl SyncEventHandler for TestEventHandler {
  fn on_status(&self, status: SyncStatus) {
    lock(&self.statuses).push(status);
  }

  fn on_save_started(&self, id: &str, autosave: bool) {
    lock(&self.save_started).push((id.to_string(), autosave));
  }

  fn on_saved(&self, id: &str, version: u64) {
    lock(&self.saved).push((id.to_string(), version));
  }

  fn on_save_skipped(&self, reason: &str) {
    lock(&self.skipped).push(reason.to_string());
  }

  fn on_conflict(&self, conflict: &ConflictRecord) {
    lock(&self.conflicts).push(conflict.clone());
  }

  fn on_transient_error(&self, message: &str, retry_in: Duration) {
    lock(&self.transient).push((message.to_string(), retry_in));
  }

  fn on_resolved(&self, resolution: Resolution, version: u64) {
    lock(&self.resolved).push((resolution, version));
  }

  fn on_journal_error(&self, message: &str) {
    lock(&self.journal_errors).push(message.to_string());
  }

  fn on_document_opened(&self, id: &str, version: u64) {
    lock(&self.opened).push((id.to_string(), version));
  }

  fn on_document_created(&self, id: &str) {
    lock(&self.created).push(id.to_string());
  }

  fn on_log(&self, level: LogLevel, message: &str) {
    lock(&self.logs).push((level, message.to_string()));
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
