//! The pure active-alert algorithm: given a stack and a rotation, decide
//! what is active right now. Deterministic and side-effect free so it can
//! be called identically from the event-driven path and the rotation
//! ticker.

use crate::alert::{Alert, PriorityLevel, TICKER_PRIORITY};
use crate::stack::InterruptStack;
use crate::state::StreamState;
use crate::ticker::TickerRotator;

/// What the layer orchestrator has decided is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveAlert<'a> {
    /// A real interrupt-stack entry is dominant.
    Stack(&'a Alert),
    /// No interrupt dominates; the synthetic ticker tag is showing.
    Ticker(&'a str),
    /// Neither the stack nor the rotation has anything to show.
    None,
}

impl ActiveAlert<'_> {
    /// Whether the active alert is the synthetic ticker (used to gate
    /// rotation advancement: a real interrupt must never "eat" a tick).
    #[must_use]
    pub const fn is_ticker(&self) -> bool {
        matches!(self, Self::Ticker(_))
    }
}

/// Compute the active alert from a stack already expired for `now` and a
/// rotation. Call [`InterruptStack::expire`] before this.
#[must_use]
pub fn active_alert<'a>(stack: &'a InterruptStack, ticker: &'a TickerRotator) -> ActiveAlert<'a> {
    if let Some(alert) = stack.head() {
        return ActiveAlert::Stack(alert);
    }
    match ticker.current() {
        Some(tag) => ActiveAlert::Ticker(tag),
        None => ActiveAlert::None,
    }
}

/// Build the stream-state snapshot from the decided active alert and the
/// stack-derived priority band.
#[must_use]
pub fn build_stream_state(
    active: &ActiveAlert<'_>,
    priority_level: PriorityLevel,
    current_show: &str,
) -> StreamState {
    let active_content = match active {
        ActiveAlert::Stack(alert) => Some(serde_json::json!({
            "kind": "alert",
            "alert_id": alert.alert_id,
            "alert_type": alert.kind,
            "priority": alert.priority,
            "data": alert.data,
        })),
        ActiveAlert::Ticker(tag) => Some(serde_json::json!({
            "kind": "ticker",
            "tag": tag,
            "priority": TICKER_PRIORITY,
        })),
        ActiveAlert::None => None,
    };
    StreamState {
        current_show: current_show.to_string(),
        priority_level,
        active_content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use chrono::{Duration, Utc};

    #[test]
    fn stack_head_wins_over_ticker() {
        let now = Utc::now();
        let mut stack = InterruptStack::new();
        stack.push(
            Alert {
                alert_id: "a".into(),
                kind: AlertKind::Alert,
                priority: 100,
                started_at: now,
                ttl_deadline: now + Duration::seconds(10),
                data: serde_json::Value::Null,
            },
            now,
        );
        let ticker = TickerRotator::new(vec!["emote_stats".into()]);

        let active = active_alert(&stack, &ticker);
        assert!(matches!(active, ActiveAlert::Stack(a) if a.alert_id == "a"));
        assert!(!active.is_ticker());
    }

    #[test]
    fn ticker_wins_when_stack_empty() {
        let stack = InterruptStack::new();
        let ticker = TickerRotator::new(vec!["emote_stats".into()]);

        let active = active_alert(&stack, &ticker);
        assert!(matches!(active, ActiveAlert::Ticker("emote_stats")));
        assert!(active.is_ticker());
    }

    #[test]
    fn none_when_both_empty() {
        let stack = InterruptStack::new();
        let ticker = TickerRotator::new(vec![]);
        assert_eq!(active_alert(&stack, &ticker), ActiveAlert::None);
    }

    #[test]
    fn high_priority_preempts_and_expiry_restores_ticker() {
        let now = Utc::now();
        let mut stack = InterruptStack::new();
        let mut ticker = TickerRotator::new(vec!["emote_stats".into(), "recent_follows".into()]);

        assert!(active_alert(&stack, &ticker).is_ticker());

        stack.push_subscription("sub-train", now, 50, serde_json::json!({"user": "a"}));
        assert_eq!(stack.priority_level(), PriorityLevel::SubTrain);

        stack.push(
            Alert {
                alert_id: "d".into(),
                kind: AlertKind::Alert,
                priority: 100,
                started_at: now,
                ttl_deadline: now + Duration::seconds(10),
                data: serde_json::Value::Null,
            },
            now,
        );
        assert_eq!(stack.priority_level(), PriorityLevel::Alert);
        assert!(matches!(active_alert(&stack, &ticker), ActiveAlert::Stack(a) if a.alert_id == "d"));

        stack.expire(now + Duration::seconds(11));
        assert!(matches!(active_alert(&stack, &ticker), ActiveAlert::Stack(a) if a.alert_id == "sub-train"));

        stack.expire(now + Duration::milliseconds(300_001));
        assert!(active_alert(&stack, &ticker).is_ticker());
        ticker.advance();
        assert!(matches!(active_alert(&stack, &ticker), ActiveAlert::Ticker("recent_follows")));
    }
}
