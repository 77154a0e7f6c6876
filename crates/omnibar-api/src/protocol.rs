//! Wire protocol shared by the `/socket` and `/control` WebSocket endpoints.
//!
//! Every message is a single JSON object framed one-per-WebSocket-message,
//! tagged by its `t` field.

use omnibar_orchestrator::StreamState;
use serde::{Deserialize, Serialize};

/// [`StreamState`] flattened to the plain fields the wire protocol carries,
/// so a delta received off the event bus (whose `priority_level` arrives as
/// a bare string) and a snapshot taken directly from the orchestrator serialize
/// identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStateWire {
    /// Name of the show currently considered live.
    pub current_show: String,
    /// Lowercase priority tier: `alert`, `sub_train`, or `ticker`.
    pub priority_level: String,
    /// Arbitrary content payload associated with the active item, if any.
    pub active_content: Option<serde_json::Value>,
}

impl From<StreamState> for StreamStateWire {
    fn from(state: StreamState) -> Self {
        Self {
            current_show: state.current_show,
            priority_level: state.priority_level.as_str().to_string(),
            active_content: state.active_content,
        }
    }
}

/// Messages sent from the server to a connected overlay or dashboard client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "t")]
pub enum ServerMessage {
    /// First message on every connection: the full current stream state.
    #[serde(rename = "snapshot")]
    Snapshot {
        /// Current stream state.
        state: StreamStateWire,
    },
    /// A stream state delta, same shape as a snapshot's `state`.
    #[serde(rename = "stream.state")]
    StreamState {
        /// Fields of the new state, flattened alongside `t`.
        #[serde(flatten)]
        state: StreamStateWire,
    },
    /// A supervised process transitioned to a new lifecycle state.
    #[serde(rename = "process.state_changed")]
    ProcessStateChanged {
        /// Node the process runs on.
        node: String,
        /// Process identifier.
        id: String,
        /// New lifecycle state.
        state: String,
    },
    /// Heartbeat sent every [`crate::constants::PING_INTERVAL_SECS`] seconds.
    #[serde(rename = "ping")]
    Ping,
    /// Reply to a dashboard command.
    #[serde(rename = "reply")]
    Reply {
        /// Correlation id echoed back from the originating command, if any.
        correlation_id: Option<String>,
        /// Whether the command succeeded.
        ok: bool,
        /// Machine-readable error code, present only when `ok` is false.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Messages accepted from a connected client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "t")]
pub enum ClientMessage {
    /// Reply to a heartbeat ping.
    #[serde(rename = "pong")]
    Pong,
    /// A dashboard command, e.g. `process.start`.
    #[serde(rename = "command")]
    Command {
        /// Command name, e.g. `process.start`, `process.stop`, `process.status`.
        name: String,
        /// Target node id.
        node: String,
        /// Target process id.
        id: String,
        /// Correlation id echoed back in the reply.
        #[serde(default)]
        correlation_id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnibar_orchestrator::PriorityLevel;

    #[test]
    fn snapshot_serializes_with_a_flattened_tag() {
        let message = ServerMessage::Snapshot {
            state: StreamStateWire { current_show: "main".into(), priority_level: "ticker".into(), active_content: None },
        };
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["t"], "snapshot");
        assert_eq!(json["state"]["current_show"], "main");
    }

    #[test]
    fn stream_state_delta_flattens_fields_alongside_the_tag() {
        let message = ServerMessage::StreamState {
            state: StreamStateWire { current_show: "main".into(), priority_level: "alert".into(), active_content: None },
        };
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["t"], "stream.state");
        assert_eq!(json["current_show"], "main");
        assert_eq!(json["priority_level"], "alert");
    }

    #[test]
    fn reply_omits_error_field_when_ok() {
        let message = ServerMessage::Reply { correlation_id: Some("abc".into()), ok: true, error: None };
        let json = serde_json::to_value(&message).expect("serialize");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn command_parses_from_the_documented_wire_shape() {
        let raw = r#"{"t":"command","name":"process.start","node":"n1","id":"p1","correlation_id":"c1"}"#;
        let message: ClientMessage = serde_json::from_str(raw).expect("parse");
        match message {
            ClientMessage::Command { name, node, id, correlation_id } => {
                assert_eq!(name, "process.start");
                assert_eq!(node, "n1");
                assert_eq!(id, "p1");
                assert_eq!(correlation_id, Some("c1".into()));
            }
            ClientMessage::Pong => panic!("expected a command"),
        }
    }

    #[test]
    fn stream_state_wire_converts_priority_level_to_its_wire_string() {
        let state = StreamState { current_show: "main".into(), priority_level: PriorityLevel::SubTrain, active_content: None };
        let wire = StreamStateWire::from(state);
        assert_eq!(wire.priority_level, "sub_train");
    }
}
