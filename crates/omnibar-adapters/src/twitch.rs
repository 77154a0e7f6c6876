//! Translation for the push-style chat/subs/follows/redemptions sources.
//!
//! The actual third-party client (IRC, EventSub, or whatever a given
//! provider speaks) is outside this crate's concern; it only needs to
//! parse provider payloads into [`TwitchMessage`] and feed them into a
//! [`crate::channel_transport::ChannelTransport`].

use omnibar_events::Event;
use serde::Deserialize;

use crate::push::Translator;

/// One canonical push message from a chat/subs/follows/redemptions source.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum TwitchMessage {
    /// A chat message.
    #[serde(rename = "chat")]
    Chat {
        /// Provider-assigned message id, used for duplicate suppression.
        message_id: String,
        /// Platform-assigned identifier for the chat author.
        user_id: String,
        /// Display name shown alongside the message.
        display_name: String,
        /// Raw message body.
        body: String,
    },
    /// A new follow.
    #[serde(rename = "follow")]
    Follow {
        /// Provider-assigned message id, used for duplicate suppression.
        message_id: String,
        /// Platform-assigned identifier for the follower.
        user_id: String,
        /// Display name of the follower.
        display_name: String,
    },
    /// A new or renewed subscription.
    #[serde(rename = "subscription")]
    Subscription {
        /// Provider-assigned message id, used for duplicate suppression.
        message_id: String,
        /// Platform-assigned identifier for the subscriber.
        user_id: String,
        /// Display name of the subscriber.
        display_name: String,
        /// Subscription tier.
        tier: String,
        /// Number of consecutive months, when known.
        months: Option<u32>,
    },
    /// A channel point redemption.
    #[serde(rename = "redemption")]
    Redemption {
        /// Provider-assigned message id, used for duplicate suppression.
        message_id: String,
        /// Platform-assigned identifier for the redeemer.
        user_id: String,
        /// Display name of the redeemer.
        display_name: String,
        /// Name of the redeemed reward.
        reward_title: String,
    },
}

impl TwitchMessage {
    fn message_id(&self) -> &str {
        match self {
            Self::Chat { message_id, .. }
            | Self::Follow { message_id, .. }
            | Self::Subscription { message_id, .. }
            | Self::Redemption { message_id, .. } => message_id,
        }
    }
}

/// Translates [`TwitchMessage`] into the corresponding canonical [`Event`].
pub struct ChatTranslator;

impl Translator<TwitchMessage> for ChatTranslator {
    fn message_id(message: &TwitchMessage) -> Option<String> {
        Some(message.message_id().to_string())
    }

    fn translate(message: TwitchMessage) -> Option<Event> {
        Some(match message {
            TwitchMessage::Chat { user_id, display_name, body, .. } => {
                Event::ChatMessage { user_id, display_name, body }
            }
            TwitchMessage::Follow { user_id, display_name, .. } => Event::Follow { user_id, display_name },
            TwitchMessage::Subscription { user_id, display_name, tier, months, .. } => {
                Event::Subscription { user_id, display_name, tier, months }
            }
            TwitchMessage::Redemption { user_id, display_name, reward_title, .. } => {
                Event::Redemption { user_id, display_name, reward_title }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_translates_to_chat_event() {
        let message = TwitchMessage::Chat {
            message_id: "m1".into(),
            user_id: "u1".into(),
            display_name: "viewer".into(),
            body: "hi".into(),
        };
        let event = ChatTranslator::translate(message).expect("translated");
        assert!(matches!(event, Event::ChatMessage { .. }));
    }

    #[test]
    fn redemption_carries_reward_title_through() {
        let message = TwitchMessage::Redemption {
            message_id: "m2".into(),
            user_id: "u2".into(),
            display_name: "viewer2".into(),
            reward_title: "Hydrate".into(),
        };
        let Event::Redemption { reward_title, .. } = ChatTranslator::translate(message).expect("translated") else {
            panic!("expected redemption event");
        };
        assert_eq!(reward_title, "Hydrate");
    }
}
