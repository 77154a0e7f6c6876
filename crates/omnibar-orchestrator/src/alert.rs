//! Alert and priority-level types shared by the stack, rotator, and the
//! active-alert algorithm.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a non-ticker interrupt stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A one-off alert (follow, redemption, manual trigger).
    Alert,
    /// The singleton coalesced subscription-train entry.
    SubTrain,
    /// An operator-issued override, always above ticker priority.
    ManualOverride,
}

/// Priority band of the stream, derived from the stack alone (never the
/// synthetic ticker). See [`crate::stack::InterruptStack::priority_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    /// At least one surviving entry has `priority >= 100`.
    Alert,
    /// No `alert`-band entry, but at least one has `priority >= 50`.
    SubTrain,
    /// No surviving entry at or above the `sub_train` band.
    Ticker,
}

impl PriorityLevel {
    /// Wire representation, matching the `snake_case` serde tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::SubTrain => "sub_train",
            Self::Ticker => "ticker",
        }
    }
}

/// Priority assigned to the synthetic ticker alert.
pub const TICKER_PRIORITY: i32 = 10;
/// Minimum priority for the `sub_train` band.
pub const SUB_TRAIN_PRIORITY_FLOOR: i32 = 50;
/// Minimum priority for the `alert` band.
pub const ALERT_PRIORITY_FLOOR: i32 = 100;

/// Default sub-train refresh window, in milliseconds, applied on coalescing.
pub const SUB_TRAIN_TTL_MS: i64 = 300_000;

/// One entry in the interrupt stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Stable identifier for this alert.
    pub alert_id: String,
    /// What kind of entry this is.
    pub kind: AlertKind,
    /// Priority used for ordering and band computation.
    pub priority: i32,
    /// When this entry was created (or, for `sub_train`, first created).
    pub started_at: DateTime<Utc>,
    /// Instant after which this entry is no longer a candidate.
    pub ttl_deadline: DateTime<Utc>,
    /// Arbitrary payload rendered by overlay clients.
    pub data: serde_json::Value,
}

impl Alert {
    /// Whether this entry still survives at instant `now`.
    #[must_use]
    pub fn is_alive(&self, now: DateTime<Utc>) -> bool {
        self.ttl_deadline > now
    }

    /// Sort key used to pick the head of the stack: higher priority first,
    /// ties broken by earlier `started_at` (FIFO).
    #[must_use]
    pub fn ordering_key(&self) -> (std::cmp::Reverse<i32>, DateTime<Utc>) {
        (std::cmp::Reverse(self.priority), self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ordering_key_prefers_higher_priority_then_earlier_start() {
        let now = Utc::now();
        let a = Alert {
            alert_id: "a".into(),
            kind: AlertKind::Alert,
            priority: 100,
            started_at: now,
            ttl_deadline: now + Duration::seconds(30),
            data: serde_json::Value::Null,
        };
        let b = Alert {
            alert_id: "b".into(),
            kind: AlertKind::Alert,
            priority: 100,
            started_at: now + Duration::seconds(1),
            ttl_deadline: now + Duration::seconds(30),
            data: serde_json::Value::Null,
        };
        assert!(a.ordering_key() < b.ordering_key());
    }

    #[test]
    fn is_alive_respects_ttl_deadline() {
        let now = Utc::now();
        let alert = Alert {
            alert_id: "a".into(),
            kind: AlertKind::Alert,
            priority: 100,
            started_at: now,
            ttl_deadline: now + Duration::seconds(1),
            data: serde_json::Value::Null,
        };
        assert!(alert.is_alive(now));
        assert!(!alert.is_alive(now + Duration::seconds(2)));
    }
}
