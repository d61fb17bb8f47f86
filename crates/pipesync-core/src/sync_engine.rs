//! Synchronization engine.
//!
//! Orchestrates timing: coalesces edits via debounce, runs the guarded save
//! routine, schedules retries with exponential backoff, and surfaces
//! conflicts for explicit resolution.
//!
//! Does NOT talk to the network itself — that is [`DocumentStore`]'s
//! responsibility.

use std::sync::Arc;

use tokio::{
  sync::{mpsc, oneshot, watch},
  time::sleep_until
};
use tracing::{debug, error, info, warn};

use crate::{
  config::SyncConfig,
  diagnostics::{DiagnosticEntry, DiagnosticsLog},
  document::{EditEvent, PipelineDocument},
  events::{LogLevel, SyncEventHandler},
  journal::{Operation, OperationJournal},
  prefs::{LAST_DOCUMENT_KEY, PreferencesStore},
  retry::{RetryPolicy, RetryState},
  schedule::PendingTimer,
  state::{ConflictRecord, DirtyTracker, Resolution, SyncStatus, derive_status},
  store::{DocumentStore, SaveOptions, SaveOutcome}
};

/// Command accepted by the engine worker.
#[derive(Debug)]
pub enum EngineCommand {
  /// A local edit from the editing surface.
  Edit(EditEvent),
  /// Save immediately, skipping the debounce wait.
  SaveNow,
  /// Discard local state and load a document by id.
  Open(String),
  /// Reopen the document recorded in preferences, if any.
  OpenLast,
  /// Reset to an unsaved blank draft.
  New,
  /// Create a document on the server and adopt it as active.
  Create {
    /// Document name (must be non-empty).
    name: String,
    /// Free-form description.
    description: String
  },
  /// Resolve an outstanding conflict.
  Resolve(Resolution),
  /// Reply with the recent diagnostic entries.
  Diagnostics(oneshot::Sender<Vec<DiagnosticEntry>>),
  /// Stop the worker (after a final save attempt).
  Shutdown
}

/// Observable engine state, published on every transition.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
  /// Derived sync status.
  pub status: SyncStatus,
  /// Active document id, if created/loaded.
  pub document_id: Option<String>,
  /// Document name.
  pub name: String,
  /// Last confirmed version.
  pub version: u64,
  /// Last confirmed `updated_at` token.
  pub updated_at: String,
  /// Number of nodes in the working copy.
  pub node_count: usize,
  /// Number of edges in the working copy.
  pub edge_count: usize,
  /// Whether unsaved edits exist.
  pub dirty: bool,
  /// Outstanding conflict, if any.
  pub conflict: Option<ConflictRecord>,
  /// Consecutive transient failures so far.
  pub retry_attempt: u32,
  /// Most recent transient/resolution error, cleared by edits and successes.
  pub last_error: Option<String>
}

/// Synchronization engine handle.
///
/// Cheap to use from any task; the actual state lives in a single worker
/// task, so every transition is serialized without locks.
pub struct SyncEngine {
  command_tx: mpsc::Sender<EngineCommand>,
  snapshot_rx: watch::Receiver<EngineSnapshot>
}

impl SyncEngine {
  /// Create and start the engine with a blank draft as the active document.
  ///
  /// Spawns one worker task driving debounce, retry and store I/O. Store
  /// calls run as child tasks so edits keep flowing while a request is in
  /// flight; at most one store request runs at a time.
  pub fn start<S: DocumentStore>(
    config: SyncConfig,
    store: Arc<S>,
    events: Arc<dyn SyncEventHandler>,
    prefs: Arc<dyn PreferencesStore>
  ) -> (Self, tokio::task::JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(256);
    let (completion_tx, completion_rx) = mpsc::channel(8);

    let document = PipelineDocument::blank();
    let (snapshot_tx, snapshot_rx) = watch::channel(initial_snapshot(&document));

    let diagnostics = DiagnosticsLog::new(config.diagnostics_capacity);
    let policy = config.retry_policy();

    let worker = Worker {
      config,
      store,
      events,
      prefs,
      command_rx,
      completion_tx,
      completion_rx,
      snapshot_tx,
      document,
      tracker: DirtyTracker::default(),
      journal: OperationJournal::new(),
      conflict: None,
      policy,
      retry: RetryState::default(),
      debounce: PendingTimer::new(),
      retry_timer: PendingTimer::new(),
      in_flight: None,
      epoch: 0,
      last_error: None,
      last_status: SyncStatus::Clean,
      diagnostics
    };

    let handle = tokio::spawn(worker.run());

    (Self { command_tx, snapshot_rx }, handle)
  }

  /// Get a `Sender` for streaming commands (typically `Edit`s).
  #[must_use]
  pub fn sender(&self) -> mpsc::Sender<EngineCommand> {
    self.command_tx.clone()
  }

  /// Apply a local edit.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn edit(&self, event: EditEvent) -> anyhow::Result<()> {
    self.send(EngineCommand::Edit(event)).await
  }

  /// Save immediately, skipping the debounce wait.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn save_now(&self) -> anyhow::Result<()> {
    self.send(EngineCommand::SaveNow).await
  }

  /// Discard local state and load a document by id.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn open_document(&self, id: &str) -> anyhow::Result<()> {
    self.send(EngineCommand::Open(id.to_string())).await
  }

  /// Reopen the document recorded by the previous session, if any.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn open_last(&self) -> anyhow::Result<()> {
    self.send(EngineCommand::OpenLast).await
  }

  /// Reset to an unsaved blank draft.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn new_document(&self) -> anyhow::Result<()> {
    self.send(EngineCommand::New).await
  }

  /// Create a document on the server and adopt it as active.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn create_document(&self, name: &str, description: &str) -> anyhow::Result<()> {
    self
      .send(EngineCommand::Create {
        name: name.to_string(),
        description: description.to_string()
      })
      .await
  }

  /// Resolve an outstanding conflict.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn resolve(&self, resolution: Resolution) -> anyhow::Result<()> {
    self.send(EngineCommand::Resolve(resolution)).await
  }

  /// Fetch the recent diagnostic entries (oldest first).
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has stopped.
  pub async fn diagnostics(&self) -> anyhow::Result<Vec<DiagnosticEntry>> {
    let (tx, rx) = oneshot::channel();
    self.send(EngineCommand::Diagnostics(tx)).await?;
    rx.await
      .map_err(|e| anyhow::anyhow!("engine stopped before replying: {e}"))
  }

  /// Subscribe to state snapshots.
  #[must_use]
  pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
    self.snapshot_rx.clone()
  }

  /// The latest published snapshot.
  #[must_use]
  pub fn snapshot(&self) -> EngineSnapshot {
    self.snapshot_rx.borrow().clone()
  }

  /// Shut down the engine, attempting a final save of dirty state.
  ///
  /// # Errors
  ///
  /// Returns an error if the engine has already stopped.
  pub async fn shutdown(&self) -> anyhow::Result<()> {
    self.send(EngineCommand::Shutdown).await
  }

  async fn send(&self, command: EngineCommand) -> anyhow::Result<()> {
    self
      .command_tx
      .send(command)
      .await
      .map_err(|e| anyhow::anyhow!("sync engine is not running: {e}"))
  }
}

/// What kind of store request is currently in flight.
///
/// Doubles as the guard flag: while `Some`, no second request starts and
/// deadline branches in the worker loop stay disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
  Save,
  Load,
  Create
}

/// Why a save is being attempted; decides the `autosave`/`force` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveTrigger {
  Debounce,
  Retry,
  Manual,
  Force,
  Shutdown
}

/// Everything a save task needs, captured before it is spawned.
struct SaveRequest {
  epoch: u64,
  token: u64,
  forced: bool,
  autosave: bool,
  document_id: String,
  snapshot: PipelineDocument,
  batch: Vec<Operation>
}

/// Result of a spawned store request, routed back to the worker.
enum Completion {
  Save {
    epoch: u64,
    token: u64,
    forced: bool,
    outcome: anyhow::Result<SaveOutcome>,
    failed_batch: Option<Vec<Operation>>,
    journal_error: Option<String>
  },
  Load {
    epoch: u64,
    result: anyhow::Result<PipelineDocument>
  },
  Create {
    epoch: u64,
    result: anyhow::Result<PipelineDocument>
  }
}

/// The engine worker: single owner of all mutable sync state.
struct Worker<S: DocumentStore> {
  config: SyncConfig,
  store: Arc<S>,
  events: Arc<dyn SyncEventHandler>,
  prefs: Arc<dyn PreferencesStore>,
  command_rx: mpsc::Receiver<EngineCommand>,
  completion_tx: mpsc::Sender<Completion>,
  completion_rx: mpsc::Receiver<Completion>,
  snapshot_tx: watch::Sender<EngineSnapshot>,
  document: PipelineDocument,
  tracker: DirtyTracker,
  journal: OperationJournal,
  conflict: Option<ConflictRecord>,
  policy: RetryPolicy,
  retry: RetryState,
  debounce: PendingTimer,
  retry_timer: PendingTimer,
  in_flight: Option<InFlight>,
  epoch: u64,
  last_error: Option<String>,
  last_status: SyncStatus,
  diagnostics: DiagnosticsLog
}

impl<S: DocumentStore> Worker<S> {
  /// Main loop.
  ///
  /// - command -> mutate state, maybe arm a timer or spawn a store request
  /// - completion -> fold the request result back in (unless stale)
  /// - debounce deadline -> run the save routine
  /// - retry deadline -> run the save routine again
  ///
  /// The deadline branches are disabled while a request is in flight, so a
  /// deadline that passes mid-request fires right after it settles.
  async fn run(mut self) {
    debug!("sync worker started");

    loop {
      tokio::select! {
        command = self.command_rx.recv() => {
          match command {
            Some(EngineCommand::Shutdown) | None => break,
            Some(command) => self.handle_command(command)
          }
        }
        Some(completion) = self.completion_rx.recv() => {
          self.handle_completion(completion);
        }
        () = sleep_until(self.debounce.deadline()),
          if self.debounce.is_armed() && self.in_flight.is_none() =>
        {
          self.debounce.cancel();
          debug!("debounce elapsed");
          self.begin_save(SaveTrigger::Debounce);
        }
        () = sleep_until(self.retry_timer.deadline()),
          if self.retry_timer.is_armed() && self.in_flight.is_none() =>
        {
          self.retry_timer.cancel();
          debug!(attempt = self.retry.attempt(), "retry timer elapsed");
          self.begin_save(SaveTrigger::Retry);
        }
      }
    }

    self.finish().await;
    debug!("sync worker finished");
  }

  fn handle_command(&mut self, command: EngineCommand) {
    match command {
      EngineCommand::Edit(event) => self.handle_edit(&event),
      EngineCommand::SaveNow => {
        self.debounce.cancel();
        self.retry_timer.cancel();
        self.begin_save(SaveTrigger::Manual);
      }
      EngineCommand::Open(id) => {
        info!(id = %id, "opening document");
        self.switch_epoch();
        self.begin_load(id);
      }
      EngineCommand::OpenLast => match self.prefs.get(LAST_DOCUMENT_KEY) {
        Some(id) => {
          info!(id = %id, "reopening last document");
          self.switch_epoch();
          self.begin_load(id);
        }
        None => debug!("no last document recorded")
      },
      EngineCommand::New => self.new_document(),
      EngineCommand::Create { name, description } => self.create_document(name, description),
      EngineCommand::Resolve(resolution) => self.resolve(resolution),
      EngineCommand::Diagnostics(reply) => {
        let entries: Vec<DiagnosticEntry> = self.diagnostics.entries().cloned().collect();
        let _ = reply.send(entries);
      }
      // Shutdown is intercepted in the loop.
      EngineCommand::Shutdown => {}
    }
  }

  fn handle_edit(&mut self, event: &EditEvent) {
    if !self.document.apply(event) {
      debug!(?event, "edit had no effect");
      return;
    }

    self
      .journal
      .record(self.document.id.as_deref(), event.op_kind(), event.op_data());
    self.tracker.mark_dirty();
    self.last_error = None;
    self.debounce.arm(self.config.debounce());
    self.publish();
  }

  fn new_document(&mut self) {
    info!("starting blank document");
    self.switch_epoch();
    self.document = PipelineDocument::blank();
    self.tracker.reset();
    self.journal.clear();
    self.conflict = None;
    self.retry.reset();
    self.last_error = None;
    self.prefs.remove(LAST_DOCUMENT_KEY);
    self.diagnostics.push("blank document started");
    self.publish();
  }

  fn create_document(&mut self, name: String, description: String) {
    if self.in_flight.is_some() {
      self.note_skip("create skipped: another request is in flight");
      return;
    }
    if self.document.id.is_some() {
      self.note_skip("create skipped: document already exists");
      return;
    }
    if name.trim().is_empty() {
      self.note_skip("create skipped: document name is empty");
      self.events.on_save_skipped("document name is empty");
      return;
    }

    debug!(name = %name, "creating document");
    self.in_flight = Some(InFlight::Create);

    let store = Arc::clone(&self.store);
    let tx = self.completion_tx.clone();
    let epoch = self.epoch;
    tokio::spawn(async move {
      let result = store.create(&name, &description).await;
      let _ = tx.send(Completion::Create { epoch, result }).await;
    });

    self.publish();
  }

  fn resolve(&mut self, resolution: Resolution) {
    if self.conflict.is_none() {
      self.note_skip("resolution skipped: no outstanding conflict");
      return;
    }
    if self.in_flight.is_some() {
      self.note_skip("resolution skipped: another request is in flight");
      return;
    }

    match resolution {
      Resolution::Reload => {
        let Some(id) = self.document.id.clone() else {
          self.note_skip("resolution skipped: document has no id");
          return;
        };
        info!(id = %id, "resolving conflict: reload from server");
        self.begin_load(id);
      }
      Resolution::ForceOverwrite => {
        info!("resolving conflict: force overwrite");
        self.begin_save(SaveTrigger::Force);
      }
    }
  }

  /// The save routine: guard, snapshot, spawn.
  fn begin_save(&mut self, trigger: SaveTrigger) {
    let Some(request) = self.prepare_save(trigger) else {
      return;
    };

    self.in_flight = Some(InFlight::Save);
    self.events.on_save_started(&request.document_id, request.autosave);
    self.diagnostics.push(if request.forced {
      "save started (forced)"
    } else if request.autosave {
      "save started (autosave)"
    } else {
      "save started (manual)"
    });
    debug!(
      id = %request.document_id,
      autosave = request.autosave,
      force = request.forced,
      ops = request.batch.len(),
      "save started"
    );

    let store = Arc::clone(&self.store);
    let tx = self.completion_tx.clone();
    tokio::spawn(async move {
      let completion = Self::run_save(store, request).await;
      let _ = tx.send(completion).await;
    });

    self.publish();
  }

  /// The save guard. Declines (without any network call) unless:
  /// the document has an id, there are unsaved edits, no request is in
  /// flight, no conflict is outstanding, and the name is non-empty.
  /// A forced save skips the dirty and conflict checks.
  fn prepare_save(&mut self, trigger: SaveTrigger) -> Option<SaveRequest> {
    let forced = matches!(trigger, SaveTrigger::Force);

    let Some(document_id) = self.document.id.clone() else {
      self.note_skip("save skipped: document not created yet");
      return None;
    };
    if !forced && !self.tracker.is_dirty() {
      debug!("save skipped: no unsaved edits");
      return None;
    }
    if self.in_flight.is_some() {
      debug!("save skipped: request already in flight");
      return None;
    }
    if !forced && self.conflict.is_some() {
      self.note_skip("save skipped: unresolved conflict");
      return None;
    }
    if self.document.name.trim().is_empty() {
      self.note_skip("save skipped: document name is empty");
      self.events.on_save_skipped("document name is empty");
      return None;
    }

    Some(SaveRequest {
      epoch: self.epoch,
      token: self.tracker.capture_token(),
      forced,
      autosave: matches!(
        trigger,
        SaveTrigger::Debounce | SaveTrigger::Retry | SaveTrigger::Shutdown
      ),
      document_id,
      snapshot: self.document.clone(),
      batch: self.journal.take_batch()
    })
  }

  /// Flush the journal batch (best-effort), then save the snapshot.
  ///
  /// A journal failure never aborts the snapshot save; the batch rides
  /// back in the completion for re-queueing.
  async fn run_save(store: Arc<S>, request: SaveRequest) -> Completion {
    let SaveRequest {
      epoch,
      token,
      forced,
      autosave,
      document_id,
      snapshot,
      batch
    } = request;

    let mut failed_batch = None;
    let mut journal_error = None;
    if !batch.is_empty() {
      let count = batch.len();
      let flush = store.append_ops(&document_id, &batch).await;
      match flush {
        Ok(()) => debug!(id = %document_id, count, "journal batch flushed"),
        Err(e) => {
          journal_error = Some(e.to_string());
          failed_batch = Some(batch);
        }
      }
    }

    let options = SaveOptions {
      autosave,
      base_updated_at: snapshot.updated_at.clone(),
      force: forced
    };
    let outcome = store.save(&document_id, &snapshot, &options).await;

    Completion::Save {
      epoch,
      token,
      forced,
      outcome,
      failed_batch,
      journal_error
    }
  }

  fn begin_load(&mut self, id: String) {
    self.in_flight = Some(InFlight::Load);

    let store = Arc::clone(&self.store);
    let tx = self.completion_tx.clone();
    let epoch = self.epoch;
    tokio::spawn(async move {
      let result = store.fetch(&id).await;
      let _ = tx.send(Completion::Load { epoch, result }).await;
    });

    self.publish();
  }

  fn handle_completion(&mut self, completion: Completion) {
    let epoch = match &completion {
      Completion::Save { epoch, .. }
      | Completion::Load { epoch, .. }
      | Completion::Create { epoch, .. } => *epoch
    };
    if epoch != self.epoch {
      // The document was switched while this request was in flight.
      debug!(stale = epoch, current = self.epoch, "stale completion discarded");
      return;
    }

    self.in_flight = None;

    match completion {
      Completion::Save {
        token,
        forced,
        outcome,
        failed_batch,
        journal_error,
        ..
      } => self.complete_save(token, forced, outcome, failed_batch, journal_error),
      Completion::Load { result, .. } => self.complete_load(result),
      Completion::Create { result, .. } => self.complete_create(result)
    }

    self.publish();
  }

  fn complete_save(
    &mut self,
    token: u64,
    forced: bool,
    outcome: anyhow::Result<SaveOutcome>,
    failed_batch: Option<Vec<Operation>>,
    journal_error: Option<String>
  ) {
    if let Some(message) = &journal_error {
      warn!(error = %message, "journal flush failed");
      self.diagnostics.push(format!("journal flush failed: {message}"));
      self.events.on_journal_error(message);
    }
    if let Some(batch) = failed_batch {
      self.journal.requeue(batch);
    }

    match outcome {
      Ok(SaveOutcome::Saved { version, updated_at }) => {
        self.document.version = version;
        self.document.updated_at = updated_at;
        if !self.tracker.commit_if_unchanged(token) {
          debug!("edits arrived during the save, document stays dirty");
        }
        self.retry.reset();
        self.last_error = None;
        let had_conflict = self.conflict.take().is_some();
        self.diagnostics.push(format!("saved v{version}"));

        if let Some(id) = &self.document.id {
          if forced || had_conflict {
            info!(id = %id, version, "force overwrite applied");
            self.events.on_resolved(Resolution::ForceOverwrite, version);
          } else {
            debug!(id = %id, version, "save confirmed");
            self.events.on_saved(id, version);
          }
        }
      }
      Ok(SaveOutcome::Conflict {
        current_version,
        current_updated_at
      }) => {
        let record = ConflictRecord {
          server_version: current_version,
          server_updated_at: current_updated_at
        };
        warn!(
          server_version = record.server_version,
          server_updated_at = %record.server_updated_at,
          "save rejected: remote copy has moved"
        );
        // A conflict is not transient — stop any pending retry.
        self.retry_timer.cancel();
        self
          .diagnostics
          .push(format!("conflict: server is at v{}", record.server_version));
        self.events.on_conflict(&record);
        self.conflict = Some(record);
      }
      Err(e) => {
        let message = e.to_string();
        self.last_error = Some(message.clone());
        self.diagnostics.push(format!("save failed: {message}"));

        if forced {
          // Resolution failures wait for another explicit user action.
          error!(error = %message, "force overwrite failed");
          self
            .events
            .on_log(LogLevel::Error, &format!("force overwrite failed: {message}"));
        } else {
          let delay = self.retry.advance(&self.policy);
          self.retry_timer.arm(delay);
          warn!(
            error = %message,
            attempt = self.retry.attempt(),
            delay_ms = delay.as_millis(),
            "save failed, retry scheduled"
          );
          self.events.on_transient_error(&message, delay);
        }
      }
    }
  }

  fn complete_load(&mut self, result: anyhow::Result<PipelineDocument>) {
    match result {
      Ok(document) => {
        self.document = document;
        self.tracker.reset();
        self.journal.clear();
        self.conflict = None;
        self.retry.reset();
        self.debounce.cancel();
        self.retry_timer.cancel();
        self.last_error = None;

        if let Some(id) = self.document.id.clone() {
          self.prefs.set(LAST_DOCUMENT_KEY, &id);
          info!(id = %id, version = self.document.version, "document loaded");
          self
            .diagnostics
            .push(format!("loaded {id} at v{}", self.document.version));
          self.events.on_document_opened(&id, self.document.version);
        }
      }
      Err(e) => {
        // An outstanding conflict stays; no automatic retry either way.
        warn!(error = %e, "document load failed");
        self.last_error = Some(e.to_string());
        self.diagnostics.push(format!("load failed: {e}"));
        self.events.on_log(LogLevel::Error, &format!("load failed: {e}"));
      }
    }
  }

  fn complete_create(&mut self, result: anyhow::Result<PipelineDocument>) {
    match result {
      Ok(created) => {
        self.document.id = created.id;
        self.document.name = created.name;
        self.document.description = created.description;
        self.document.version = created.version;
        self.document.updated_at = created.updated_at;

        if let Some(id) = self.document.id.clone() {
          self.prefs.set(LAST_DOCUMENT_KEY, &id);
          info!(id = %id, "document created");
          self.diagnostics.push(format!("created {id}"));
          self.events.on_document_created(&id);
        }

        // Edits drafted before creation still need a save of their own.
        if !self.document.nodes.is_empty() || !self.document.edges.is_empty() {
          self.tracker.mark_dirty();
          self.debounce.arm(self.config.debounce());
        }
      }
      Err(e) => {
        warn!(error = %e, "document creation failed");
        self.last_error = Some(e.to_string());
        self.diagnostics.push(format!("create failed: {e}"));
        self.events.on_log(LogLevel::Error, &format!("create failed: {e}"));
      }
    }
  }

  /// Final flush on shutdown: settle an in-flight request, then save
  /// whatever is still dirty (inline, not spawned).
  async fn finish(&mut self) {
    if self.in_flight.is_some()
      && let Some(completion) = self.completion_rx.recv().await
    {
      self.handle_completion(completion);
    }

    if let Some(request) = self.prepare_save(SaveTrigger::Shutdown) {
      debug!("final save before shutdown");
      self.in_flight = Some(InFlight::Save);
      let completion = Self::run_save(Arc::clone(&self.store), request).await;
      self.handle_completion(completion);
    }
  }

  /// Invalidate everything tied to the outgoing document: pending
  /// deadlines and any in-flight completion (matched by epoch).
  fn switch_epoch(&mut self) {
    self.epoch += 1;
    self.in_flight = None;
    self.debounce.cancel();
    self.retry_timer.cancel();
  }

  fn note_skip(&mut self, message: &str) {
    debug!("{message}");
    self.diagnostics.push(message);
  }

  fn status(&self) -> SyncStatus {
    derive_status(
      self.tracker.is_dirty(),
      matches!(self.in_flight, Some(InFlight::Save)),
      self.retry_timer.is_armed(),
      self.conflict.is_some()
    )
  }

  fn publish(&mut self) {
    let status = self.status();
    if status != self.last_status {
      self.last_status = status;
      self.events.on_status(status);
    }

    let _ = self.snapshot_tx.send(EngineSnapshot {
      status,
      document_id: self.document.id.clone(),
      name: self.document.name.clone(),
      version: self.document.version,
      updated_at: self.document.updated_at.clone(),
      node_count: self.document.nodes.len(),
      edge_count: self.document.edges.len(),
      dirty: self.tracker.is_dirty(),
      conflict: self.conflict.clone(),
      retry_attempt: self.retry.attempt(),
      last_error: self.last_error.clone()
    });
  }
}

fn initial_snapshot(document: &PipelineDocument) -> EngineSnapshot {
  EngineSnapshot {
    status: SyncStatus::Clean,
    document_id: document.id.clone(),
    name: document.name.clone(),
    version: document.version,
    updated_at: document.updated_at.clone(),
    node_count: document.nodes.len(),
    edge_count: document.edges.len(),
    dirty: false,
    conflict: None,
    retry_attempt: 0,
    last_error: None
  }
}
