//! Event payload types carried across the platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier assigned to each event emitted by the platform.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced across the system.
///
/// Serialization is internally tagged on `type` for every recognized tag.
/// A tag with no matching variant deserializes into [`Event::Unknown`]
/// instead of failing, so adapters emitting forward-compatible tags are
/// logged rather than dropped at the bus boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A chat message arrived from a connected chat source.
    ChatMessage {
        /// Platform-assigned identifier for the chat author.
        user_id: String,
        /// Display name shown alongside the message.
        display_name: String,
        /// Raw message body.
        body: String,
    },
    /// A viewer followed the channel.
    Follow {
        /// Platform-assigned identifier for the follower.
        user_id: String,
        /// Display name of the follower.
        display_name: String,
    },
    /// A viewer subscribed or resubscribed.
    Subscription {
        /// Platform-assigned identifier for the subscriber.
        user_id: String,
        /// Display name of the subscriber.
        display_name: String,
        /// Subscription tier (e.g. "1000", "2000", "3000").
        tier: String,
        /// Number of consecutive months, when known.
        months: Option<u32>,
    },
    /// A channel point reward was redeemed.
    Redemption {
        /// Platform-assigned identifier for the redeemer.
        user_id: String,
        /// Display name of the redeemer.
        display_name: String,
        /// Name of the redeemed reward.
        reward_title: String,
    },
    /// Game telemetry reported a checkpoint (e.g. an IronMON death or milestone).
    GameCheckpoint {
        /// Checkpoint kind as reported by the telemetry source.
        kind: String,
        /// Opaque payload describing the checkpoint.
        data: Value,
    },
    /// The active game id changed.
    GameChanged {
        /// Platform game identifier driving the show mapping.
        game_id: u64,
    },
    /// A new track started playing.
    MusicNowPlaying {
        /// Stable identifier for the track, used for de-duplication.
        track_id: String,
        /// Track title.
        title: String,
        /// Track artist.
        artist: String,
        /// Timestamp the track started, used with `track_id` for de-duplication.
        start_time: DateTime<Utc>,
    },
    /// A fixed-cadence transcription frame arrived from the audio pipeline.
    TranscriptionFrame {
        /// Transcribed text for this frame.
        text: String,
        /// Whether the transcription engine considers this frame final.
        is_final: bool,
    },
    /// A source adapter's connection state changed.
    SourceStateChanged {
        /// Name of the adapter reporting the change.
        source: String,
        /// New connection state (e.g. "connected", "disconnected", "backoff").
        state: String,
        /// Optional human-readable detail.
        detail: Option<String>,
    },
    /// An alert was created and pushed onto the interrupt stack.
    AlertCreated {
        /// Identifier for the created alert.
        alert_id: String,
        /// Alert type tag.
        alert_type: String,
        /// Resolved priority band.
        priority: i32,
    },
    /// An alert expired and was removed from the interrupt stack.
    AlertExpired {
        /// Identifier for the expired alert.
        alert_id: String,
    },
    /// The externally observed stream state changed.
    StreamState {
        /// Current show derived from the game-id mapping.
        current_show: String,
        /// Priority level of the top stack entry, or ticker baseline.
        priority_level: String,
        /// Opaque payload describing the active content, if any.
        active_content: Option<Value>,
    },
    /// A supervised process transitioned to a new lifecycle state.
    ProcessStateChanged {
        /// Stable identifier for the process.
        process_id: String,
        /// Node that owns the process.
        node_id: String,
        /// New lifecycle state.
        state: String,
    },
    /// A supervised process's health check result changed.
    ProcessHealthChanged {
        /// Stable identifier for the process.
        process_id: String,
        /// Node that owns the process.
        node_id: String,
        /// New health state (`unknown`, `healthy`, `unhealthy`).
        health_state: String,
    },
    /// A supervised process exhausted its restart policy and stopped retrying.
    ProcessGivingUp {
        /// Stable identifier for the process.
        process_id: String,
        /// Node that owns the process.
        node_id: String,
        /// Number of restarts attempted within the restart window.
        restart_count: u32,
    },
    /// Configuration update was applied.
    SettingsChanged {
        /// Description of the applied configuration change.
        description: String,
    },
    /// System health status changed (degraded or restored components).
    HealthChanged {
        /// Components currently considered degraded.
        degraded: Vec<String>,
    },
    /// Fallback for an envelope whose type tag has no typed variant.
    Unknown {
        /// Type tag as received on the wire.
        type_tag: String,
        /// Raw JSON payload, preserved for logging.
        raw: Value,
    },
}

/// Internally tagged mirror of [`Event`] covering every recognized tag.
///
/// Kept private: [`Event`] is serialized/deserialized through this type so
/// that an unrecognized `type` falls back to [`Event::Unknown`] instead of
/// failing deserialization outright.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
enum TaggedEvent {
    #[serde(rename = "twitch.chat_message")]
    ChatMessage {
        user_id: String,
        display_name: String,
        body: String,
    },
    #[serde(rename = "twitch.follow")]
    Follow {
        user_id: String,
        display_name: String,
    },
    #[serde(rename = "twitch.subscription")]
    Subscription {
        user_id: String,
        display_name: String,
        tier: String,
        months: Option<u32>,
    },
    #[serde(rename = "twitch.redemption")]
    Redemption {
        user_id: String,
        display_name: String,
        reward_title: String,
    },
    #[serde(rename = "ironmon.checkpoint")]
    GameCheckpoint { kind: String, data: Value },
    #[serde(rename = "meta.game_changed")]
    GameChanged { game_id: u64 },
    #[serde(rename = "music.now_playing")]
    MusicNowPlaying {
        track_id: String,
        title: String,
        artist: String,
        start_time: DateTime<Utc>,
    },
    #[serde(rename = "transcription.frame")]
    TranscriptionFrame { text: String, is_final: bool },
    #[serde(rename = "source.state_changed")]
    SourceStateChanged {
        source: String,
        state: String,
        detail: Option<String>,
    },
    #[serde(rename = "alert.created")]
    AlertCreated {
        alert_id: String,
        alert_type: String,
        priority: i32,
    },
    #[serde(rename = "alert.expired")]
    AlertExpired { alert_id: String },
    #[serde(rename = "stream.state")]
    StreamState {
        current_show: String,
        priority_level: String,
        active_content: Option<Value>,
    },
    #[serde(rename = "process.state_changed")]
    ProcessStateChanged {
        process_id: String,
        node_id: String,
        state: String,
    },
    #[serde(rename = "process.health_changed")]
    ProcessHealthChanged {
        process_id: String,
        node_id: String,
        health_state: String,
    },
    #[serde(rename = "process.giving_up")]
    ProcessGivingUp {
        process_id: String,
        node_id: String,
        restart_count: u32,
    },
    #[serde(rename = "settings_changed")]
    SettingsChanged { description: String },
    #[serde(rename = "health_changed")]
    HealthChanged { degraded: Vec<String> },
}

impl From<TaggedEvent> for Event {
    fn from(tagged: TaggedEvent) -> Self {
        match tagged {
            TaggedEvent::ChatMessage {
                user_id,
                display_name,
                body,
            } => Self::ChatMessage {
                user_id,
                display_name,
                body,
            },
            TaggedEvent::Follow {
                user_id,
                display_name,
            } => Self::Follow {
                user_id,
                display_name,
            },
            TaggedEvent::Subscription {
                user_id,
                display_name,
                tier,
                months,
            } => Self::Subscription {
                user_id,
                display_name,
                tier,
                months,
            },
            TaggedEvent::Redemption {
                user_id,
                display_name,
                reward_title,
            } => Self::Redemption {
                user_id,
                display_name,
                reward_title,
            },
            TaggedEvent::GameCheckpoint { kind, data } => Self::GameCheckpoint { kind, data },
            TaggedEvent::GameChanged { game_id } => Self::GameChanged { game_id },
            TaggedEvent::MusicNowPlaying {
                track_id,
                title,
                artist,
                start_time,
            } => Self::MusicNowPlaying {
                track_id,
                title,
                artist,
                start_time,
            },
            TaggedEvent::TranscriptionFrame { text, is_final } => {
                Self::TranscriptionFrame { text, is_final }
            }
            TaggedEvent::SourceStateChanged {
                source,
                state,
                detail,
            } => Self::SourceStateChanged {
                source,
                state,
                detail,
            },
            TaggedEvent::AlertCreated {
                alert_id,
                alert_type,
                priority,
            } => Self::AlertCreated {
                alert_id,
                alert_type,
                priority,
            },
            TaggedEvent::AlertExpired { alert_id } => Self::AlertExpired { alert_id },
            TaggedEvent::StreamState {
                current_show,
                priority_level,
                active_content,
            } => Self::StreamState {
                current_show,
                priority_level,
                active_content,
            },
            TaggedEvent::ProcessStateChanged {
                process_id,
                node_id,
                state,
            } => Self::ProcessStateChanged {
                process_id,
                node_id,
                state,
            },
            TaggedEvent::ProcessHealthChanged {
                process_id,
                node_id,
                health_state,
            } => Self::ProcessHealthChanged {
                process_id,
                node_id,
                health_state,
            },
            TaggedEvent::ProcessGivingUp {
                process_id,
                node_id,
                restart_count,
            } => Self::ProcessGivingUp {
                process_id,
                node_id,
                restart_count,
            },
            TaggedEvent::SettingsChanged { description } => Self::SettingsChanged { description },
            TaggedEvent::HealthChanged { degraded } => Self::HealthChanged { degraded },
        }
    }
}

impl Event {
    /// Machine-friendly discriminator used for topic routing and filtering.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        match self {
            Self::ChatMessage { .. } => "twitch.chat_message",
            Self::Follow { .. } => "twitch.follow",
            Self::Subscription { .. } => "twitch.subscription",
            Self::Redemption { .. } => "twitch.redemption",
            Self::GameCheckpoint { .. } => "ironmon.checkpoint",
            Self::GameChanged { .. } => "meta.game_changed",
            Self::MusicNowPlaying { .. } => "music.now_playing",
            Self::TranscriptionFrame { .. } => "transcription.frame",
            Self::SourceStateChanged { .. } => "source.state_changed",
            Self::AlertCreated { .. } => "alert.created",
            Self::AlertExpired { .. } => "alert.expired",
            Self::StreamState { .. } => "stream.state",
            Self::ProcessStateChanged { .. } => "process.state_changed",
            Self::ProcessHealthChanged { .. } => "process.health_changed",
            Self::ProcessGivingUp { .. } => "process.giving_up",
            Self::SettingsChanged { .. } => "settings_changed",
            Self::HealthChanged { .. } => "health_changed",
            Self::Unknown { type_tag, .. } => type_tag,
        }
    }

    fn as_tagged(&self) -> Option<TaggedEvent> {
        Some(match self.clone() {
            Self::ChatMessage {
                user_id,
                display_name,
                body,
            } => TaggedEvent::ChatMessage {
                user_id,
                display_name,
                body,
            },
            Self::Follow {
                user_id,
                display_name,
            } => TaggedEvent::Follow {
                user_id,
                display_name,
            },
            Self::Subscription {
                user_id,
                display_name,
                tier,
                months,
            } => TaggedEvent::Subscription {
                user_id,
                display_name,
                tier,
                months,
            },
            Self::Redemption {
                user_id,
                display_name,
                reward_title,
            } => TaggedEvent::Redemption {
                user_id,
                display_name,
                reward_title,
            },
            Self::GameCheckpoint { kind, data } => TaggedEvent::GameCheckpoint { kind, data },
            Self::GameChanged { game_id } => TaggedEvent::GameChanged { game_id },
            Self::MusicNowPlaying {
                track_id,
                title,
                artist,
                start_time,
            } => TaggedEvent::MusicNowPlaying {
                track_id,
                title,
                artist,
                start_time,
            },
            Self::TranscriptionFrame { text, is_final } => {
                TaggedEvent::TranscriptionFrame { text, is_final }
            }
            Self::SourceStateChanged {
                source,
                state,
                detail,
            } => TaggedEvent::SourceStateChanged {
                source,
                state,
                detail,
            },
            Self::AlertCreated {
                alert_id,
                alert_type,
                priority,
            } => TaggedEvent::AlertCreated {
                alert_id,
                alert_type,
                priority,
            },
            Self::AlertExpired { alert_id } => TaggedEvent::AlertExpired { alert_id },
            Self::StreamState {
                current_show,
                priority_level,
                active_content,
            } => TaggedEvent::StreamState {
                current_show,
                priority_level,
                active_content,
            },
            Self::ProcessStateChanged {
                process_id,
                node_id,
                state,
            } => TaggedEvent::ProcessStateChanged {
                process_id,
                node_id,
                state,
            },
            Self::ProcessHealthChanged {
                process_id,
                node_id,
                health_state,
            } => TaggedEvent::ProcessHealthChanged {
                process_id,
                node_id,
                health_state,
            },
            Self::ProcessGivingUp {
                process_id,
                node_id,
                restart_count,
            } => TaggedEvent::ProcessGivingUp {
                process_id,
                node_id,
                restart_count,
            },
            Self::SettingsChanged { description } => TaggedEvent::SettingsChanged { description },
            Self::HealthChanged { degraded } => TaggedEvent::HealthChanged { degraded },
            Self::Unknown { .. } => return None,
        })
    }
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Unknown { raw, .. } => raw.serialize(serializer),
            _ => self
                .as_tagged()
                .expect("non-Unknown variants always convert")
                .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        match serde_json::from_value::<TaggedEvent>(raw.clone()) {
            Ok(tagged) => Ok(tagged.into()),
            Err(_) => {
                let type_tag = raw
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                Ok(Event::Unknown { type_tag, raw })
            }
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id, emission
/// timestamp, and an optional correlation id propagated across causally
/// related events (e.g. a checkpoint and the alert it produced).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Identifier propagated across causally related events.
    pub correlation_id: Option<String>,
    /// Wrapped event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tag_maps_source_variants() {
        assert_type_tag(
            &Event::ChatMessage {
                user_id: "1".into(),
                display_name: "demo".into(),
                body: "hi".into(),
            },
            "twitch.chat_message",
        );
        assert_type_tag(
            &Event::Follow {
                user_id: "1".into(),
                display_name: "demo".into(),
            },
            "twitch.follow",
        );
        assert_type_tag(
            &Event::Subscription {
                user_id: "1".into(),
                display_name: "demo".into(),
                tier: "1000".into(),
                months: Some(3),
            },
            "twitch.subscription",
        );
        assert_type_tag(
            &Event::GameCheckpoint {
                kind: "death".into(),
                data: Value::Null,
            },
            "ironmon.checkpoint",
        );
        assert_type_tag(&Event::GameChanged { game_id: 13332 }, "meta.game_changed");
    }

    #[test]
    fn type_tag_maps_orchestrator_and_supervisor_variants() {
        assert_type_tag(
            &Event::AlertCreated {
                alert_id: "a1".into(),
                alert_type: "emote_stats".into(),
                priority: 50,
            },
            "alert.created",
        );
        assert_type_tag(&Event::AlertExpired { alert_id: "a1".into() }, "alert.expired");
        assert_type_tag(
            &Event::StreamState {
                current_show: "variety".into(),
                priority_level: "ticker".into(),
                active_content: None,
            },
            "stream.state",
        );
        assert_type_tag(
            &Event::ProcessStateChanged {
                process_id: "obs".into(),
                node_id: "node-1".into(),
                state: "running".into(),
            },
            "process.state_changed",
        );
        assert_type_tag(
            &Event::ProcessGivingUp {
                process_id: "obs".into(),
                node_id: "node-1".into(),
                restart_count: 5,
            },
            "process.giving_up",
        );
        assert_type_tag(
            &Event::HealthChanged {
                degraded: vec!["event_bus".into()],
            },
            "health_changed",
        );
    }

    #[test]
    fn round_trips_a_known_variant_through_json() {
        let event = Event::Follow {
            user_id: "42".into(),
            display_name: "ash".into(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "twitch.follow");

        let parsed: Event = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, event);
    }

    #[test]
    fn unrecognized_type_tag_falls_back_to_unknown() {
        let raw = serde_json::json!({ "type": "obs.scene_changed", "scene": "brb" });
        let event: Event = serde_json::from_value(raw.clone()).expect("deserialize");
        match &event {
            Event::Unknown { type_tag, raw: stored } => {
                assert_eq!(type_tag, "obs.scene_changed");
                assert_eq!(stored, &raw);
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
        assert_eq!(event.type_tag(), "obs.scene_changed");

        let round_tripped = serde_json::to_value(&event).expect("serialize");
        assert_eq!(round_tripped, raw);
    }

    #[test]
    fn envelope_carries_fields() {
        let event = Event::SettingsChanged {
            description: "desc".into(),
        };
        let envelope = EventEnvelope {
            id: 42,
            timestamp: Utc::now(),
            correlation_id: Some("corr-1".into()),
            event: event.clone(),
        };
        assert_eq!(envelope.id, 42);
        assert_eq!(envelope.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(envelope.event, event);
    }

    fn assert_type_tag(event: &Event, expected: &str) {
        assert_eq!(event.type_tag(), expected);
    }
}
