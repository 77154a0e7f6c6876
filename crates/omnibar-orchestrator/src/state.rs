//! The stream state snapshot: the sole payload carried by `stream.state`
//! envelopes and overlay `snapshot` messages.

use serde::{Deserialize, Serialize};

use crate::alert::PriorityLevel;

/// Current rendering state of the stream, as seen by overlay clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Show derived from the current game id via the show mapping.
    pub current_show: String,
    /// Priority band derived from the interrupt stack alone.
    pub priority_level: PriorityLevel,
    /// Rendered content of the active alert, or `None` when nothing is active.
    pub active_content: Option<serde_json::Value>,
}

impl StreamState {
    /// Construct a state with no active content, e.g. before the first
    /// alert or ticker tag has ever been computed.
    #[must_use]
    pub fn idle(current_show: impl Into<String>) -> Self {
        Self {
            current_show: current_show.into(),
            priority_level: PriorityLevel::Ticker,
            active_content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_state_has_no_active_content() {
        let state = StreamState::idle("variety");
        assert_eq!(state.current_show, "variety");
        assert!(state.active_content.is_none());
        assert_eq!(state.priority_level, PriorityLevel::Ticker);
    }
}
