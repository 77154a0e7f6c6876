//! The interrupt stack: ordered collection of non-ticker alerts, with
//! expiry, sub-train coalescing, and overflow protection.

use chrono::{DateTime, Duration, Utc};

use crate::alert::{Alert, AlertKind, PriorityLevel, ALERT_PRIORITY_FLOOR, SUB_TRAIN_PRIORITY_FLOOR, SUB_TRAIN_TTL_MS};

/// Stack size above which overflow trimming kicks in.
pub const OVERFLOW_THRESHOLD: usize = 50;
/// Target size overflow trimming reduces the stack to.
pub const OVERFLOW_TARGET: usize = 25;

/// Ordered collection of interrupt-stack entries.
#[derive(Debug, Default)]
pub struct InterruptStack {
    entries: Vec<Alert>,
    overflow_drops: u64,
}

impl InterruptStack {
    /// Construct an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries dropped by overflow trimming since construction.
    #[must_use]
    pub const fn overflow_drops(&self) -> u64 {
        self.overflow_drops
    }

    /// Remove and return every entry whose `ttl_deadline <= now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Alert> {
        let (alive, expired): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|alert| alert.is_alive(now));
        self.entries = alive;
        expired
    }

    /// Stable head of the stack: highest priority, ties broken by earliest
    /// `started_at`. Assumes [`Self::expire`] has already run for `now`.
    #[must_use]
    pub fn head(&self) -> Option<&Alert> {
        self.entries.iter().min_by_key(|alert| alert.ordering_key())
    }

    /// Priority band derived from surviving stack entries alone.
    #[must_use]
    pub fn priority_level(&self) -> PriorityLevel {
        let max_priority = self.entries.iter().map(|alert| alert.priority).max();
        match max_priority {
            Some(p) if p >= ALERT_PRIORITY_FLOOR => PriorityLevel::Alert,
            Some(p) if p >= SUB_TRAIN_PRIORITY_FLOOR => PriorityLevel::SubTrain,
            _ => PriorityLevel::Ticker,
        }
    }

    /// Push a regular (non-sub-train) alert, then enforce the overflow
    /// policy. Returns the number of entries dropped by overflow trimming.
    pub fn push(&mut self, alert: Alert, now: DateTime<Utc>) -> u64 {
        self.entries.push(alert);
        self.enforce_overflow(now)
    }

    /// Apply a new subscription to the stack: coalesce into the existing
    /// live `sub_train` entry if one is present, otherwise create one.
    /// Returns the number of entries dropped by overflow trimming.
    pub fn push_subscription(
        &mut self,
        alert_id: impl Into<String>,
        now: DateTime<Utc>,
        priority: i32,
        latest: serde_json::Value,
    ) -> u64 {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|alert| alert.kind == AlertKind::SubTrain && alert.is_alive(now))
        {
            let count = existing
                .data
                .get("count")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(1);
            existing.data = serde_json::json!({ "count": count + 1, "latest": latest });
            existing.ttl_deadline = now + Duration::milliseconds(SUB_TRAIN_TTL_MS);
            return 0;
        }

        let alert = Alert {
            alert_id: alert_id.into(),
            kind: AlertKind::SubTrain,
            priority,
            started_at: now,
            ttl_deadline: now + Duration::milliseconds(SUB_TRAIN_TTL_MS),
            data: serde_json::json!({ "count": 1, "latest": latest }),
        };
        self.push(alert, now)
    }

    fn enforce_overflow(&mut self, now: DateTime<Utc>) -> u64 {
        if self.entries.len() <= OVERFLOW_THRESHOLD {
            return 0;
        }
        let mut dropped = self.expire(now).len();

        if self.entries.len() > OVERFLOW_TARGET {
            self.entries
                .sort_by_key(|alert| (std::cmp::Reverse(alert.priority), alert.started_at));
            let excess = self.entries.len() - OVERFLOW_TARGET;
            self.entries.truncate(self.entries.len() - excess);
            dropped += excess;
        }

        let dropped = dropped as u64;
        self.overflow_drops += dropped;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn alert(id: &str, kind: AlertKind, priority: i32, started_at: DateTime<Utc>, ttl: DateTime<Utc>) -> Alert {
        Alert {
            alert_id: id.to_string(),
            kind,
            priority,
            started_at,
            ttl_deadline: ttl,
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn fifo_at_equal_priority() {
        let now = Utc::now();
        let mut stack = InterruptStack::new();
        stack.push(
            alert("a", AlertKind::Alert, 100, now, now + ChronoDuration::seconds(10)),
            now,
        );
        stack.push(
            alert(
                "b",
                AlertKind::Alert,
                100,
                now + ChronoDuration::seconds(1),
                now + ChronoDuration::seconds(20),
            ),
            now,
        );
        assert_eq!(stack.head().unwrap().alert_id, "a");

        let expired = stack.expire(now + ChronoDuration::seconds(15));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].alert_id, "a");
        assert_eq!(stack.head().unwrap().alert_id, "b");
    }

    #[test]
    fn priority_level_ignores_expired_entries() {
        let now = Utc::now();
        let mut stack = InterruptStack::new();
        stack.push(
            alert("a", AlertKind::Alert, 100, now, now + ChronoDuration::seconds(1)),
            now,
        );
        stack.expire(now + ChronoDuration::seconds(2));
        assert_eq!(stack.priority_level(), PriorityLevel::Ticker);
    }

    #[test]
    fn subscription_coalesces_into_singleton() {
        let now = Utc::now();
        let mut stack = InterruptStack::new();
        stack.push_subscription("sub-train", now, 50, serde_json::json!({"user": "a"}));
        assert_eq!(stack.len(), 1);

        let later = now + ChronoDuration::milliseconds(30_000);
        stack.push_subscription("sub-train", later, 50, serde_json::json!({"user": "b"}));
        assert_eq!(stack.len(), 1);

        let head = stack.head().unwrap();
        assert_eq!(head.data["count"], 2);
        assert_eq!(head.ttl_deadline, later + ChronoDuration::milliseconds(SUB_TRAIN_TTL_MS));
    }

    #[test]
    fn overflow_trims_to_target_after_threshold() {
        let now = Utc::now();
        let mut stack = InterruptStack::new();
        for i in 0..60 {
            stack.push(
                alert(
                    &format!("a{i}"),
                    AlertKind::Alert,
                    i,
                    now + ChronoDuration::milliseconds(i64::from(i)),
                    now + ChronoDuration::seconds(3600),
                ),
                now,
            );
        }
        assert!(stack.len() <= OVERFLOW_THRESHOLD);
        assert!(stack.overflow_drops() > 0);
    }
}
