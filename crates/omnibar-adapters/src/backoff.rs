//! Reconnect backoff policy shared by every push-style adapter.

use std::time::Duration;

/// Base delay before the first reconnect attempt.
pub const BASE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on the computed delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);
/// Attempts allowed before falling back to [`LONG_PAUSE`].
pub const MAX_ATTEMPTS_BEFORE_PAUSE: u32 = 10;
/// Delay once [`MAX_ATTEMPTS_BEFORE_PAUSE`] consecutive attempts have failed.
pub const LONG_PAUSE: Duration = Duration::from_secs(300);

/// Tracks consecutive reconnect failures for one adapter connection and
/// computes the delay before the next attempt.
#[derive(Debug, Default)]
pub struct ReconnectBackoff {
    attempts: u32,
}

impl ReconnectBackoff {
    /// Construct a backoff tracker with no recorded attempts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before the next attempt, given the attempts already made.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.attempts >= MAX_ATTEMPTS_BEFORE_PAUSE {
            return LONG_PAUSE;
        }
        let factor = 1u64 << self.attempts.min(31);
        BASE_DELAY.saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX)).min(MAX_DELAY)
    }

    /// Record a failed attempt, advancing the backoff schedule.
    pub fn record_failure(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Reset the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Number of consecutive failures recorded so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let mut backoff = ReconnectBackoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        backoff.record_failure();
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        backoff.record_failure();
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        for _ in 0..10 {
            backoff.record_failure();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn falls_back_to_a_long_pause_after_ten_attempts() {
        let mut backoff = ReconnectBackoff::new();
        for _ in 0..MAX_ATTEMPTS_BEFORE_PAUSE {
            backoff.record_failure();
        }
        assert_eq!(backoff.next_delay(), LONG_PAUSE);
    }

    #[test]
    fn reset_returns_to_the_base_delay() {
        let mut backoff = ReconnectBackoff::new();
        backoff.record_failure();
        backoff.record_failure();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
