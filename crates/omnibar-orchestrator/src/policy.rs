//! Mapping from source events to interrupt-stack alerts. Follow and
//! redemption alert priority/TTL are an operator tuning knob (only
//! `sub_train`'s priority 50 and 300s refresh window are fixed); this
//! module gives that knob a typed home with conservative defaults instead
//! of hard-coding magic numbers inline.

/// Tunable priorities and TTLs applied when translating source events into
/// interrupt-stack alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Priority assigned to a follow alert.
    pub follow_priority: i32,
    /// How long a follow alert stays alive, in milliseconds.
    pub follow_ttl_ms: i64,
    /// Priority assigned to a channel-point redemption alert.
    pub redemption_priority: i32,
    /// How long a redemption alert stays alive, in milliseconds.
    pub redemption_ttl_ms: i64,
    /// Priority assigned to the coalesced subscription-train entry.
    pub subscription_priority: i32,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            follow_priority: 100,
            follow_ttl_ms: 10_000,
            redemption_priority: 100,
            redemption_ttl_ms: 15_000,
            subscription_priority: crate::alert::SUB_TRAIN_PRIORITY_FLOOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_subscription_priority_matches_sub_train_floor() {
        assert_eq!(
            AlertPolicy::default().subscription_priority,
            crate::alert::SUB_TRAIN_PRIORITY_FLOOR
        );
    }
}
