//! Exponential backoff for transient save failures.
//!
//! Conflicts are NOT retried — only network/server errors are.
//! The policy is pure arithmetic; the engine owns the timer.

use std::time::Duration;

/// Exponent clamp — keeps the shift below from overflowing.
const MAX_EXPONENT: u32 = 20;

/// Backoff policy: `delay(attempt) = min(cap, base * 2^attempt)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  base: Duration,
  cap: Duration
}

impl RetryPolicy {
  /// Create a policy from the initial delay and the upper bound.
  #[must_use]
  pub const fn new(base: Duration, cap: Duration) -> Self {
    Self { base, cap }
  }

  /// Delay before a given retry attempt (0-based).
  #[must_use]
  pub fn delay(&self, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.min(MAX_EXPONENT);
    self.base.saturating_mul(factor).min(self.cap)
  }
}

/// Mutable retry bookkeeping for the active document.
///
/// The attempt counter advances on every transient failure and resets to
/// zero on any successful save.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryState {
  attempt: u32
}

impl RetryState {
  /// Number of consecutive failed attempts so far.
  #[must_use]
  pub const fn attempt(&self) -> u32 {
    self.attempt
  }

  /// Register a failure: return the delay for this attempt and advance.
  pub fn advance(&mut self, policy: &RetryPolicy) -> Duration {
    let delay = policy.delay(self.attempt);
    self.attempt = self.attempt.saturating_add(1);
    delay
  }

  /// Register a success: the next failure starts from the base delay again.
  pub fn reset(&mut self) {
    self.attempt = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn delay_doubles_until_cap() {
    let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_secs(30));

    assert_eq!(policy.delay(0), Duration::from_millis(100));
    assert_eq!(policy.delay(1), Duration::from_millis(200));
    assert_eq!(policy.delay(2), Duration::from_millis(400));
    assert_eq!(policy.delay(8), Duration::from_millis(25_600));
    // 100ms * 2^9 = 51.2s > cap
    assert_eq!(policy.delay(9), Duration::from_secs(30));
    assert_eq!(policy.delay(30), Duration::from_secs(30));
  }

  #[test]
  fn delay_is_monotonic() {
    let policy = RetryPolicy::new(Duration::from_millis(250), Duration::from_secs(10));

    let mut previous = Duration::ZERO;
    for attempt in 0..16 {
      let delay = policy.delay(attempt);
      assert!(delay >= previous, "delay shrank at attempt {attempt}");
      previous = delay;
    }
  }

  #[test]
  fn huge_attempt_does_not_overflow() {
    let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(30));
    assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
  }

  #[test]
  fn state_advances_and_resets() {
    let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_secs(30));
    let mut state = RetryState::default();

    assert_eq!(state.advance(&policy), Duration::from_millis(100));
    assert_eq!(state.advance(&policy), Duration::from_millis(200));
    assert_eq!(state.attempt(), 2);

    state.reset();
    assert_eq!(state.attempt(), 0);
    assert_eq!(state.advance(&policy), Duration::from_millis(100));
  }
}
