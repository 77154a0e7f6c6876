//! Event bus routing: publish/subscribe on top of `tokio::broadcast`.

use crate::error::{EventBusError, EventBusResult};
use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
use crate::topics::Topic;
use chrono::Utc;
use futures_util::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Raw stream wrapper used by subscribers before topic filtering.
pub type EventStream = BroadcastStream<EventEnvelope>;

/// Stream of envelopes matching a subscriber's [`Topic`] pattern. Lagging
/// subscribers silently drop the envelopes they missed; the number dropped
/// is recorded on the bus and visible via [`EventBus::dropped_count`].
pub struct TopicStream {
    inner: Pin<Box<dyn Stream<Item = EventEnvelope> + Send>>,
}

impl Stream for TopicStream {
    type Item = EventEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Shared event bus built on top of `tokio::broadcast`.
///
/// Producers never block: [`EventBus::publish`] enqueues into the broadcast
/// channel and returns immediately. A subscriber that falls behind the
/// channel's bounded capacity loses the oldest envelopes it hasn't yet
/// consumed; those are counted, never replayed.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    replay: Arc<Mutex<VecDeque<EventEnvelope>>>,
    replay_capacity: usize,
    next_id: Arc<Mutex<EventId>>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Construct a bus with a custom replay/lag-queue capacity.
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(replay_capacity);
        Self {
            sender,
            replay: Arc::new(Mutex::new(VecDeque::with_capacity(replay_capacity))),
            replay_capacity,
            next_id: Arc::new(Mutex::new(1)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Construct a bus with the default replay capacity (1024).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Subscribe to every envelope regardless of topic, optionally seeded
    /// with a replay of everything after `last_event_id`.
    #[must_use]
    pub fn subscribe(&self, last_event_id: Option<EventId>) -> EventStream {
        let mut rx = self.sender.subscribe();
        if let Some(last) = last_event_id {
            self.replay(last, &mut rx);
        }
        BroadcastStream::new(rx)
    }

    /// Subscribe to envelopes whose event matches `pattern` (see [`Topic`]).
    /// Subscriptions are always restartable from "now": no replay is
    /// performed, matching the bus's no-replay-on-fresh-subscribe contract.
    #[must_use]
    pub fn subscribe_topic(&self, pattern: impl Into<Topic>) -> TopicStream {
        let topic = pattern.into();
        let topic_label = topic.as_str().to_string();
        let dropped = Arc::clone(&self.dropped);
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            match item {
                Ok(envelope) if topic.matches_event(&envelope.event) => Some(envelope),
                Ok(_) => None,
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                    dropped.fetch_add(n, Ordering::Relaxed);
                    warn!(lagged = n, pattern = %topic_label, "subscriber lagged, dropping envelopes");
                    None
                }
            }
        });
        TopicStream {
            inner: Box::pin(stream),
        }
    }

    /// Publish a new event to all subscribers, tagging it with an optional
    /// correlation id propagated from the event that caused it.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be delivered to the broadcast channel.
    pub fn publish(
        &self,
        event: Event,
        correlation_id: Option<String>,
    ) -> EventBusResult<EventId> {
        let type_tag = event.type_tag().to_string();
        let mut next = self
            .next_id
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let id = *next;
        *next = next.saturating_add(1);
        drop(next);

        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            correlation_id,
            event,
        };
        {
            let mut replay = self.lock_replay();
            if replay.len() == self.replay_capacity {
                replay.pop_front();
            }
            replay.push_back(envelope.clone());
        }
        if self.sender.receiver_count() == 0 {
            return Ok(id);
        }
        if self.sender.send(envelope).is_err() {
            return Err(EventBusError::SendFailed {
                event_id: id,
                type_tag,
            });
        }
        Ok(id)
    }

    /// Publish an event with no correlation id.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be delivered to the broadcast channel.
    pub fn emit(&self, event: Event) -> EventBusResult<EventId> {
        self.publish(event, None)
    }

    /// Total number of envelopes dropped across all topic subscriptions due
    /// to lag. Exposed for the bus overflow metric.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Last event id observed in the replay buffer.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_replay().back().map(|env| env.id)
    }

    /// Collect a backlog of events emitted after the specified id.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        let replay = self.lock_replay();
        replay.iter().filter(|env| env.id > id).cloned().collect()
    }

    fn replay(&self, last_event_id: EventId, rx: &mut Receiver<EventEnvelope>) {
        let replay = self.lock_replay();
        let past = replay
            .iter()
            .filter(|env| env.id > last_event_id)
            .cloned()
            .collect::<Vec<_>>();
        drop(replay);
        for env in past {
            match rx.try_recv() {
                Ok(_) | Err(TryRecvError::Empty | TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Closed) => break,
            }
            if self.sender.send(env).is_err() {
                break;
            }
        }
    }

    fn lock_replay(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.replay
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::Event;
    use std::error::Error;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn publish_and_replay_from_id() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::with_capacity(4);
        let first = bus.emit(Event::SettingsChanged {
            description: "init".into(),
        })?;
        let second = bus.emit(Event::HealthChanged {
            degraded: vec!["x".into()],
        })?;

        assert_eq!(bus.last_event_id(), Some(second));
        let backlog = bus.backlog_since(first);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, second);
        Ok(())
    }

    #[tokio::test]
    async fn subscribe_streams_events_and_filters_errors() -> Result<(), Box<dyn Error>> {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        let id = bus.emit(Event::AlertExpired {
            alert_id: "a1".into(),
        })?;
        let envelope = stream
            .next()
            .await
            .ok_or_else(|| std::io::Error::other("stream item missing"))??;
        assert_eq!(envelope.id, id);
        assert!(matches!(envelope.event, Event::AlertExpired { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn subscribe_topic_filters_by_pattern() -> Result<(), Box<dyn Error>> {
        let bus = EventBus::new();
        let mut stream = bus.subscribe_topic("twitch.*");

        bus.emit(Event::MusicNowPlaying {
            track_id: "t1".into(),
            title: "song".into(),
            artist: "artist".into(),
            start_time: Utc::now(),
        })?;
        let follow_id = bus.emit(Event::Follow {
            user_id: "1".into(),
            display_name: "ash".into(),
        })?;

        let envelope = stream
            .next()
            .await
            .ok_or_else(|| std::io::Error::other("stream item missing"))?;
        assert_eq!(envelope.id, follow_id);
        assert!(matches!(envelope.event, Event::Follow { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn correlation_id_is_propagated() -> Result<(), Box<dyn Error>> {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        bus.publish(
            Event::AlertExpired {
                alert_id: "a1".into(),
            },
            Some("corr-7".into()),
        )?;
        let envelope = stream
            .next()
            .await
            .ok_or_else(|| std::io::Error::other("stream item missing"))??;
        assert_eq!(envelope.correlation_id.as_deref(), Some("corr-7"));
        Ok(())
    }
}
