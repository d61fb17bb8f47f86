//! Bounded diagnostic log of engine transitions.
//!
//! Keeps the most recent N entries (saves, skips, conflicts, failures) so an
//! operator can ask "what has the engine been doing" without any UI wired
//! up. Entries also go to `tracing`; this ring is the queryable copy.

use std::collections::VecDeque;

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
  /// RFC 3339 timestamp.
  pub at: String,
  /// Human-readable description.
  pub message: String
}

/// Fixed-capacity ring of recent [`DiagnosticEntry`] values.
#[derive(Debug)]
pub struct DiagnosticsLog {
  entries: VecDeque<DiagnosticEntry>,
  capacity: usize
}

impl DiagnosticsLog {
  /// Create a log that retains at most `capacity` entries.
  #[must_use]
  pub fn new(capacity: usize) -> Self {
    Self {
      entries: VecDeque::with_capacity(capacity),
      capacity
    }
  }

  /// Append an entry, evicting the oldest once full.
  pub fn push(&mut self, message: impl Into<String>) {
    if self.capacity == 0 {
      return;
    }
    if self.entries.len() == self.capacity {
      self.entries.pop_front();
    }
    self.entries.push_back(DiagnosticEntry {
      at: chrono::Utc::now().to_rfc3339(),
      message: message.into()
    });
  }

  /// Entries from oldest to newest.
  pub fn entries(&self) -> impl Iterator<Item = &DiagnosticEntry> {
    self.entries.iter()
  }

  /// Number of retained entries.
  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether the log is empty.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keeps_most_recent_entries() {
    let mut log = DiagnosticsLog::new(3);
    for n in 1..=5 {
      log.push(format!("event {n}"));
    }

    assert_eq!(log.len(), 3);
    let messages: Vec<&str> = log.entries().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["event 3", "event 4", "event 5"]);
  }

  #[test]
  fn zero_capacity_stores_nothing() {
    let mut log = DiagnosticsLog::new(0);
    log.push("dropped");
    assert!(log.is_empty());
  }

  #[test]
  fn never_exceeds_capacity() {
    let mut log = DiagnosticsLog::new(10);
    for n in 0..100 {
      log.push(format!("e{n}"));
      assert!(log.len() <= 10);
    }
    assert_eq!(log.len(), 10);
  }
}
