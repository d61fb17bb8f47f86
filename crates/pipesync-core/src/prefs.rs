//! Client preferences: small key/value state that outlives a session.
//!
//! The engine takes the store by injection — there is no implicit global —
//! and records only [`LAST_DOCUMENT_KEY`] itself. Hosts are free to keep
//! their own keys in the same store.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{Mutex, PoisonError}
};

use tracing::{debug, warn};

/// Key under which the engine remembers the active document id.
pub const LAST_DOCUMENT_KEY: &str = "last_document_id";

/// String key/value store for client preferences.
///
/// Implementations absorb their own persistence failures: `set`/`remove`
/// are best-effort, `get` simply misses.
pub trait PreferencesStore: Send + Sync + 'static {
  /// Read a value.
  fn get(&self, key: &str) -> Option<String>;

  /// Write a value.
  fn set(&self, key: &str, value: &str);

  /// Delete a value.
  fn remove(&self, key: &str);
}

/// In-memory store (tests, one-shot CLI runs).
#[derive(Debug, Default)]
pub struct MemoryPrefs {
  values: Mutex<HashMap<String, String>>
}

impl MemoryPrefs {
  /// Create an empty store.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }
}

impl PreferencesStore for MemoryPrefs {
  fn get(&self, key: &str) -> Option<String> {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  fn set(&self, key: &str, value: &str) {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.to_string(), value.to_string());
  }

  fn remove(&self, key: &str) {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key);
  }
}

/// JSON-file-backed store.
///
/// The whole map is rewritten on every change; the file is tiny.
#[derive(Debug)]
pub struct FilePrefs {
  path: PathBuf,
  values: Mutex<HashMap<String, String>>
}

impl FilePrefs {
  /// Open (or create) a store at `path`.
  ///
  /// A missing file yields an empty store; an unreadable one is logged and
  /// treated as empty rather than blocking startup.
  ///
  /// # Errors
  ///
  /// Returns an error if the parent directory cannot be created.
  pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
    let path = path.into();

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let values = match std::fs::read_to_string(&path) {
      Ok(text) => match serde_json::from_str(&text) {
        Ok(values) => values,
        Err(e) => {
          warn!(path = %path.display(), error = %e, "preferences file unreadable, starting empty");
          HashMap::new()
        }
      },
      Err(_) => HashMap::new()
    };

    debug!(path = %path.display(), entries = values.len(), "preferences loaded");
    Ok(Self {
      path,
      values: Mutex::new(values)
    })
  }

  fn persist(&self, values: &HashMap<String, String>) {
    let json = match serde_json::to_string_pretty(values) {
      Ok(json) => json,
      Err(e) => {
        warn!(error = %e, "preferences not serialized");
        return;
      }
    };

    if let Err(e) = std::fs::write(&self.path, json) {
      warn!(path = %self.path.display(), error = %e, "preferences not persisted");
    }
  }
}

impl PreferencesStore for FilePrefs {
  fn get(&self, key: &str) -> Option<String> {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  fn set(&self, key: &str, value: &str) {
    let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    values.insert(key.to_string(), value.to_string());
    self.persist(&values);
  }

  fn remove(&self, key: &str) {
    let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    values.remove(key);
    self.persist(&values);
  }
}

/// Convenience: the path `<dir>/prefs.json`.
#[must_use]
pub fn prefs_path(dir: &Path) -> PathBuf {
  dir.join("prefs.json")
}
