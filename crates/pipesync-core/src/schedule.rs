//! Cancellable one-shot deadline for `tokio::select!` loops.
//!
//! The engine holds two independent instances: the autosave debounce and
//! the retry timer. Re-arming replaces the pending deadline, so at most one
//! firing is ever pending per timer.

use std::time::Duration;

use tokio::time::Instant;

/// A single pending deadline that can be re-armed or cancelled.
///
/// While disarmed, `deadline()` reports an instant a year away so the timer
/// can sit in a `tokio::select!` branch unconditionally; the caller still
/// guards the branch with `is_armed()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingTimer {
  deadline: Option<Instant>
}

impl PendingTimer {
  /// Create a disarmed timer.
  #[must_use]
  pub const fn new() -> Self {
    Self { deadline: None }
  }

  /// Arm (or re-arm) the timer to fire after `delay`.
  ///
  /// A previously pending deadline is replaced, which is what coalesces a
  /// burst of edits into a single autosave.
  pub fn arm(&mut self, delay: Duration) {
    self.deadline = Some(Instant::now() + delay);
  }

  /// Disarm the timer; a pending firing is dropped.
  pub fn cancel(&mut self) {
    self.deadline = None;
  }

  /// Whether a firing is pending.
  #[must_use]
  pub const fn is_armed(&self) -> bool {
    self.deadline.is_some()
  }

  /// The pending deadline, or a far-future instant while disarmed.
  #[must_use]
  pub fn deadline(&self) -> Instant {
    self
      .deadline
      .unwrap_or_else(|| Instant::now() + Duration::from_secs(365 * 24 * 3600))
  }
}
