//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Timing and bookkeeping knobs for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
  /// Quiet period after the last edit before an autosave fires (ms).
  #[serde(default = "SyncConfig::default_debounce_ms")]
  pub debounce_ms: u64,
  /// Initial retry delay after a transient save failure (ms).
  #[serde(default = "SyncConfig::default_retry_base_ms")]
  pub retry_base_ms: u64,
  /// Upper bound on the retry delay (seconds).
  #[serde(default = "SyncConfig::default_retry_cap_secs")]
  pub retry_cap_secs: u64,
  /// How many recent diagnostic entries to keep.
  #[serde(default = "SyncConfig::default_diagnostics_capacity")]
  pub diagnostics_capacity: usize
}

impl SyncConfig {
  const fn default_debounce_ms() -> u64 {
    1000
  }

  const fn default_retry_base_ms() -> u64 {
    1000
  }

  const fn default_retry_cap_secs() -> u64 {
    30
  }

  const fn default_diagnostics_capacity() -> usize {
    100
  }

  /// Convert to `Duration` — autosave debounce.
  #[must_use]
  pub const fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  /// Convert to `Duration` — initial retry delay.
  #[must_use]
  pub const fn retry_base(&self) -> Duration {
    Duration::from_millis(self.retry_base_ms)
  }

  /// Convert to `Duration` — maximum retry delay.
  #[must_use]
  pub const fn retry_cap(&self) -> Duration {
    Duration::from_secs(self.retry_cap_secs)
  }

  /// The backoff policy described by this config.
  #[must_use]
  pub const fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(self.retry_base(), self.retry_cap())
  }
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      debounce_ms: Self::default_debounce_ms(),
      retry_base_ms: Self::default_retry_base_ms(),
      retry_cap_secs: Self::default_retry_cap_secs(),
      diagnostics_capacity: Self::default_diagnostics_capacity()
    }
  }
}
