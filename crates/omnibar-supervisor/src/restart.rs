//! Restart-storm protection: a sliding window of restart timestamps and
//! the exponential backoff schedule derived from it.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Upper bound on the computed backoff delay.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Sliding window of restart timestamps for one process.
#[derive(Debug, Default)]
pub struct RestartWindow {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl RestartWindow {
    /// Construct an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps older than `window_s` seconds before `now`, then
    /// return the number remaining.
    pub fn prune_and_count(&mut self, now: DateTime<Utc>, window_s: u64) -> usize {
        let cutoff = now - chrono::Duration::seconds(i64::try_from(window_s).unwrap_or(i64::MAX));
        while matches!(self.timestamps.front(), Some(ts) if *ts <= cutoff) {
            self.timestamps.pop_front();
        }
        self.timestamps.len()
    }

    /// Record a restart at `now`.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.timestamps.push_back(now);
    }
}

/// Backoff delay for the `|window|`-th restart: `min(30_000, 1_000 * 2^n)`
/// milliseconds.
#[must_use]
pub fn backoff_delay(restarts_in_window: usize) -> Duration {
    let exponent = u32::try_from(restarts_in_window).unwrap_or(u32::MAX).min(31);
    let computed = 1_000u64.saturating_mul(1u64 << exponent);
    Duration::from_millis(computed.min(MAX_BACKOFF_MS))
}

/// Outcome of applying the restart policy to an unexpected exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Schedule a restart after this delay.
    Backoff(Duration),
    /// Give up: the window already holds `max_restarts` entries.
    GiveUp,
}

/// Decide whether to restart given the current window occupancy.
#[must_use]
pub fn decide(restarts_in_window: usize, max_restarts: u32) -> RestartDecision {
    if restarts_in_window >= max_restarts as usize {
        RestartDecision::GiveUp
    } else {
        RestartDecision::Backoff(backoff_delay(restarts_in_window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn backoff_delay_doubles_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(2), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(10), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn decide_gives_up_once_window_is_full() {
        assert_eq!(decide(2, 3), RestartDecision::Backoff(backoff_delay(2)));
        assert_eq!(decide(3, 3), RestartDecision::GiveUp);
    }

    #[test]
    fn window_prunes_entries_outside_the_interval() {
        let mut window = RestartWindow::new();
        let now = Utc::now();
        window.record(now - ChronoDuration::seconds(120));
        window.record(now - ChronoDuration::seconds(10));

        assert_eq!(window.prune_and_count(now, 60), 1);
    }

    #[test]
    fn restart_storm_sequence_gives_up_after_max_restarts() {
        // Each unexpected exit records itself before deciding, so the decision
        // that finally gives up is the one that pushed the window to capacity.
        let mut window = RestartWindow::new();
        let now = Utc::now();
        let max_restarts = 3;

        for expected_count in 1..max_restarts {
            window.record(now);
            let count = window.prune_and_count(now, 60);
            assert_eq!(count, expected_count as usize);
            assert_eq!(decide(count, max_restarts), RestartDecision::Backoff(backoff_delay(count)));
        }

        window.record(now);
        let count = window.prune_and_count(now, 60);
        assert_eq!(count, max_restarts as usize);
        assert_eq!(decide(count, max_restarts), RestartDecision::GiveUp);
    }
}
