//! CLI for `PipeSync` — pipeline store client.
//!
//! ```bash
//! pipesync --base-url https://pipelines.example.com list
//! pipesync --base-url https://pipelines.example.com create "Demo" -d "ETL demo"
//! pipesync --base-url https://pipelines.example.com apply p1 --file edits.json
//! pipesync gen-config
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pipesync_core::{
  ConflictRecord, EditEvent, EngineSnapshot, FilePrefs, LAST_DOCUMENT_KEY, MemoryPrefs,
  PreferencesStore, Resolution, SyncConfig, SyncEngine, SyncEventHandler, SyncStatus
};
use pipesync_http::{Client, StoreConfig, connect};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long `apply` waits for the engine to settle before giving up.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// `PipeSync` — client for versioned pipeline documents.
///
/// Edits are persisted through the sync engine: journaled, saved under
/// optimistic concurrency, with conflicts surfaced instead of overwritten.
#[derive(Parser)]
#[command(name = "pipesync", version, about)]
struct Cli {
  /// Base URL of the pipeline store API.
  #[arg(long, env = "PIPESYNC_URL", global = true)]
  base_url: Option<String>,

  /// Bearer token for the store.
  #[arg(long, env = "PIPESYNC_TOKEN", global = true)]
  auth: Option<String>,

  /// Verbose output (repeatable: -v, -vv).
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Command.
  #[command(subcommand)]
  command: Commands
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
  /// List pipeline documents on the store.
  List,

  /// Print one document as JSON.
  Show {
    /// Document id.
    id: String
  },

  /// Create an empty document; prints the assigned id.
  Create {
    /// Document name.
    name: String,
    /// Free-form description.
    #[arg(short, long, default_value = "")]
    description: String
  },

  /// Apply edit events through the sync engine and wait for the save.
  ///
  /// Events come from --file (JSON array or JSON Lines of edit events) or
  /// stdin. Stops at the first failure; a version conflict aborts unless
  /// --force overwrites the server copy.
  Apply {
    /// Document id.
    #[arg(required_unless_present = "last", conflicts_with = "last")]
    id: Option<String>,
    /// File with edit events; stdin if omitted.
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// Reapply to the document recorded in the preferences file.
    #[arg(long, requires = "prefs")]
    last: bool,
    /// Preferences file remembering the last opened document.
    #[arg(long)]
    prefs: Option<PathBuf>,
    /// Resolve a version conflict by overwriting the server copy.
    #[arg(long)]
    force: bool
  },

  /// Generate an example configuration.
  GenConfig
}

fn init_tracing(verbose: u8) {
  let filter = match verbose {
    0 => "info",
    1 => "debug",
    _ => "trace"
  };

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    )
    .with_writer(std::io::stderr)
    .compact()
    .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let Cli {
    base_url,
    auth,
    verbose,
    command
  } = Cli::parse();
  init_tracing(verbose);

  match command {
    Commands::List => cmd_list(&client(base_url, auth)?).await,
    Commands::Show { id } => cmd_show(&client(base_url, auth)?, &id).await,
    Commands::Create { name, description } => {
      cmd_create(&client(base_url, auth)?, &name, &description).await
    }
    Commands::Apply {
      id,
      file,
      last: _,
      prefs,
      force
    } => cmd_apply(client(base_url, auth)?, id, file.as_deref(), prefs, force).await,
    Commands::GenConfig => cmd_gen_config()
  }
}

/// Build the store client from the global connection flags.
fn client(base_url: Option<String>, auth: Option<String>) -> anyhow::Result<Client> {
  let base_url =
    base_url.context("store URL required: pass --base-url or set PIPESYNC_URL")?;
  connect(&StoreConfig {
    base_url,
    auth_token: auth
  })
}

/// `list` command.
async fn cmd_list(client: &Client) -> anyhow::Result<()> {
  let documents = client.list_pipelines().await?;

  if documents.is_empty() {
    println!("no pipeline documents");
    return Ok(());
  }

  for doc in &documents {
    println!("{}  v{}  {}", doc.id, doc.version, doc.name);
  }
  Ok(())
}

/// `show` command.
async fn cmd_show(client: &Client, id: &str) -> anyhow::Result<()> {
  let document = client.get_pipeline(id).await?;
  println!("{}", serde_json::to_string_pretty(&document)?);
  Ok(())
}

/// `create` command.
async fn cmd_create(client: &Client, name: &str, description: &str) -> anyhow::Result<()> {
  if name.trim().is_empty() {
    anyhow::bail!("document name must not be empty");
  }

  let document = client.create_pipeline(name, description).await?;
  let id = document
    .id
    .context("server did not assign an id to the created document")?;

  info!(id = %id, "document created");
  println!("{id}");
  Ok(())
}

/// `apply` command: open, stream the edits, save, resolve if asked.
async fn cmd_apply(
  client: Client,
  id: Option<String>,
  file: Option<&Path>,
  prefs_file: Option<PathBuf>,
  force: bool
) -> anyhow::Result<()> {
  let events = read_events(file)?;

  let prefs: Arc<dyn PreferencesStore> = match &prefs_file {
    Some(path) => Arc::new(FilePrefs::open(path)?),
    None => Arc::new(MemoryPrefs::new())
  };

  let target = match id {
    Some(id) => id,
    None => prefs
      .get(LAST_DOCUMENT_KEY)
      .context("preferences file records no last document")?
  };

  let (engine, worker) = SyncEngine::start(
    SyncConfig::default(),
    Arc::new(client),
    Arc::new(CliEvents),
    prefs
  );
  let mut snapshots = engine.subscribe();

  engine.open_document(&target).await?;
  let opened = wait_until(&mut snapshots, "the document to load", |s| {
    s.document_id.as_deref() == Some(target.as_str()) || s.last_error.is_some()
  })
  .await?;
  if let Some(error) = opened.last_error {
    anyhow::bail!("open failed: {error}");
  }

  for event in events {
    engine.edit(event).await?;
  }
  // The reply arrives only after every queued edit has been applied.
  let _ = engine.diagnostics().await?;

  if !engine.snapshot().dirty {
    println!("{target}: nothing to save (events had no effect)");
    engine.shutdown().await?;
    worker.await.context("sync worker panicked")?;
    return Ok(());
  }

  engine.save_now().await?;
  let mut settled = wait_until(&mut snapshots, "the save to settle", |s| {
    matches!(s.status, SyncStatus::Clean | SyncStatus::Conflicted) || s.last_error.is_some()
  })
  .await?;

  if settled.status == SyncStatus::Conflicted {
    let conflict = settled.conflict.clone().context("conflicted without a record")?;
    if !force {
      anyhow::bail!(
        "version conflict: server is at v{} (updated {}); rerun with --force to overwrite \
         or `show` to inspect",
        conflict.server_version,
        conflict.server_updated_at
      );
    }

    engine.resolve(Resolution::ForceOverwrite).await?;
    settled = wait_until(&mut snapshots, "the overwrite to settle", |s| {
      s.status == SyncStatus::Clean || s.last_error.is_some()
    })
    .await?;
  }

  if let Some(error) = settled.last_error {
    anyhow::bail!("save failed: {error}");
  }

  println!("{target}: saved at v{}", settled.version);

  engine.shutdown().await?;
  worker.await.context("sync worker panicked")?;
  Ok(())
}

/// `gen-config` command: example configuration.
#[allow(clippy::unnecessary_wraps)]
fn cmd_gen_config() -> anyhow::Result<()> {
  let example = r#"# PipeSync — example configuration
# Location: ~/.config/pipesync/config.toml

[store]
base_url = "https://pipelines.example.com"
# token = "secret"

[sync]
# Quiet period after the last edit before an autosave fires.
debounce_ms = 1000
# First retry delay after a transient save failure.
retry_base_ms = 1000
# Retry delay ceiling.
retry_cap_secs = 30
# Recent transitions kept in the diagnostic ring.
diagnostics_capacity = 100
"#;

  println!("{example}");
  Ok(())
}

/// Read edit events from a file or stdin.
///
/// Accepts a single JSON array or one JSON event per line.
fn read_events(path: Option<&Path>) -> anyhow::Result<Vec<EditEvent>> {
  let text = match path {
    Some(path) => std::fs::read_to_string(path)
      .with_context(|| format!("reading {}", path.display()))?,
    None => std::io::read_to_string(std::io::stdin()).context("reading stdin")?
  };

  let trimmed = text.trim();
  if trimmed.is_empty() {
    anyhow::bail!("no edit events supplied");
  }
  if trimmed.starts_with('[') {
    return serde_json::from_str(trimmed).context("parsing edit events");
  }

  trimmed
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(|line| serde_json::from_str(line).with_context(|| format!("parsing event: {line}")))
    .collect()
}

/// Wait for a snapshot matching `predicate`, with a hang guard.
async fn wait_until(
  snapshots: &mut watch::Receiver<EngineSnapshot>,
  what: &str,
  predicate: impl FnMut(&EngineSnapshot) -> bool
) -> anyhow::Result<EngineSnapshot> {
  let snapshot = tokio::time::timeout(SETTLE_TIMEOUT, snapshots.wait_for(predicate))
    .await
    .with_context(|| format!("timed out waiting for {what}"))?
    .context("sync engine stopped unexpectedly")?;
  Ok(snapshot.clone())
}

/// Narrates engine transitions into the log stream.
struct CliEvents;

impl SyncEventHandler for CliEvents {
  fn on_saved(&self, document_id: &str, version: u64) {
    info!(id = %document_id, version, "saved");
  }

  fn on_save_skipped(&self, reason: &str) {
    warn!(reason, "save skipped");
  }

  fn on_conflict(&self, record: &ConflictRecord) {
    warn!(
      server_version = record.server_version,
      server_updated_at = %record.server_updated_at,
      "version conflict"
    );
  }

  fn on_transient_error(&self, message: &str, retry_in: Duration) {
    warn!(error = %message, retry_ms = retry_in.as_millis(), "save failed");
  }

  fn on_journal_error(&self, message: &str) {
    warn!(error = %message, "journal flush failed");
  }
}
