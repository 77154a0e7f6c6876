//! Topic patterns used to filter bus subscriptions.

use crate::payloads::Event;

/// A subscription pattern: either an exact type tag or a `namespace.*`
/// wildcard matching every tag sharing that namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic(String);

impl Topic {
    /// Wrap a raw pattern string. No validation is performed up front; an
    /// invalid pattern simply never matches anything.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Pattern matching every event regardless of type tag.
    #[must_use]
    pub fn wildcard() -> Self {
        Self("*".into())
    }

    /// Whether the given type tag satisfies this pattern.
    #[must_use]
    pub fn matches(&self, type_tag: &str) -> bool {
        if self.0 == "*" {
            return true;
        }
        match self.0.strip_suffix(".*") {
            Some(namespace) => {
                type_tag == namespace || type_tag.starts_with(&format!("{namespace}."))
            }
            None => self.0 == type_tag,
        }
    }

    /// Whether the given event satisfies this pattern.
    #[must_use]
    pub fn matches_event(&self, event: &Event) -> bool {
        self.matches(event.type_tag())
    }

    /// The raw pattern string, for logging.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Topic {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for Topic {
    fn from(pattern: String) -> Self {
        Self::new(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        let topic = Topic::new("twitch.follow");
        assert!(topic.matches("twitch.follow"));
        assert!(!topic.matches("twitch.subscription"));
    }

    #[test]
    fn namespace_wildcard_matches_prefix() {
        let topic = Topic::new("twitch.*");
        assert!(topic.matches("twitch.follow"));
        assert!(topic.matches("twitch.subscription"));
        assert!(!topic.matches("music.now_playing"));
    }

    #[test]
    fn global_wildcard_matches_everything() {
        let topic = Topic::wildcard();
        assert!(topic.matches("twitch.follow"));
        assert!(topic.matches("process.giving_up"));
    }

    #[test]
    fn matches_event_delegates_to_type_tag() {
        let topic = Topic::new("alert.*");
        let event = Event::AlertExpired {
            alert_id: "a1".into(),
        };
        assert!(topic.matches_event(&event));
    }
}
