//! Generic push-adapter skeleton: reconnect-with-backoff over a transport
//! that yields raw provider messages, translated into canonical events.
//!
//! Grounded on the same command-channel-wrapping-a-background-worker shape
//! used for the fleet's process worker loop: one task owns the transport
//! and all I/O, callers only ever see [`AdapterHandle`].

use async_trait::async_trait;
use omnibar_events::{Event, EventBus};
use omnibar_telemetry::Metrics;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backoff::ReconnectBackoff;
use crate::dedupe::DuplicateFilter;
use crate::error::AdapterResult;

/// Default number of recent provider message ids remembered for
/// duplicate suppression.
pub const DEFAULT_DEDUPE_CAPACITY: usize = 4_096;

/// A push-style upstream connection: connect once, then yield messages
/// one at a time until the connection drops.
#[async_trait]
pub trait PushTransport: Send {
    /// Raw message type yielded by [`Self::recv`].
    type Message: Send;

    /// Establish (or re-establish) the upstream connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&mut self) -> AdapterResult<()>;

    /// Wait for the next message. Returns `Ok(None)` when the connection
    /// closed cleanly; an `Err` signals it was lost unexpectedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection was lost while waiting.
    async fn recv(&mut self) -> AdapterResult<Option<Self::Message>>;

    /// Release any resources held by the current connection.
    async fn disconnect(&mut self);
}

/// Translates one raw provider message into a canonical event, or `None`
/// if the message carries no domain-relevant content.
pub trait Translator<M>: Send {
    /// Provider message id used for duplicate suppression, when the
    /// provider assigns one.
    fn message_id(message: &M) -> Option<String>;
    /// Translate the message into a canonical event.
    fn translate(message: M) -> Option<Event>;
}

/// Connection state reported by a push adapter, mirrored onto the event
/// bus as `source.state_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet connected, or reconnecting after a loss.
    Connecting,
    /// Connected and receiving messages.
    Connected,
    /// Waiting out a backoff delay after a failed connection attempt.
    Backoff,
    /// Reconnect attempts exhausted; the adapter has stopped trying.
    Stopped,
}

impl ConnectionState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
            Self::Stopped => "stopped",
        }
    }
}

/// Handle to a running push adapter task.
pub struct AdapterHandle {
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl AdapterHandle {
    /// Most recently observed connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stop the adapter's task. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Drive `transport` to completion, reconnecting with backoff and
/// translating every message through `T` onto `bus`.
///
/// `name` identifies the adapter in `source.state_changed` envelopes and
/// log lines.
pub fn spawn_push_adapter<P, T>(name: &'static str, mut transport: P, bus: EventBus, metrics: Metrics) -> AdapterHandle
where
    P: PushTransport + 'static,
    T: Translator<P::Message> + 'static,
{
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        let mut backoff = ReconnectBackoff::new();
        let mut dedupe = DuplicateFilter::with_capacity(DEFAULT_DEDUPE_CAPACITY);

        loop {
            if task_cancel.is_cancelled() {
                transport.disconnect().await;
                return;
            }

            report_state(name, ConnectionState::Connecting, &state_tx, &bus);
            if let Err(err) = transport.connect().await {
                warn!(adapter = name, error = %err, "push adapter failed to connect");
                if !wait_out_backoff(name, &mut backoff, &task_cancel, &state_tx, &bus).await {
                    return;
                }
                continue;
            }

            backoff.reset();
            report_state(name, ConnectionState::Connected, &state_tx, &bus);
            info!(adapter = name, "push adapter connected");

            loop {
                if task_cancel.is_cancelled() {
                    transport.disconnect().await;
                    return;
                }
                match transport.recv().await {
                    Ok(Some(message)) => {
                        if let Some(message_id) = T::message_id(&message) {
                            if !dedupe.insert(&message_id) {
                                continue;
                            }
                        }
                        if let Some(event) = T::translate(message) {
                            metrics.inc_event(event.type_tag());
                            if let Err(err) = bus.emit(event) {
                                warn!(adapter = name, error = %err, "failed to publish translated event");
                            }
                        }
                    }
                    Ok(None) => {
                        info!(adapter = name, "push adapter connection closed");
                        break;
                    }
                    Err(err) => {
                        warn!(adapter = name, error = %err, "push adapter lost its connection");
                        break;
                    }
                }
            }

            transport.disconnect().await;
            if !wait_out_backoff(name, &mut backoff, &task_cancel, &state_tx, &bus).await {
                return;
            }
        }
    });

    AdapterHandle { state: state_rx, cancel }
}

async fn wait_out_backoff(
    name: &'static str,
    backoff: &mut ReconnectBackoff,
    cancel: &CancellationToken,
    state_tx: &watch::Sender<ConnectionState>,
    bus: &EventBus,
) -> bool {
    backoff.record_failure();
    let delay = backoff.next_delay();
    report_state(name, ConnectionState::Backoff, state_tx, bus);
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

fn report_state(name: &'static str, state: ConnectionState, state_tx: &watch::Sender<ConnectionState>, bus: &EventBus) {
    state_tx.send_replace(state);
    let _ = bus.emit(Event::SourceStateChanged {
        source: name.to_string(),
        state: state.as_str().to_string(),
        detail: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_stream::StreamExt;

    struct FlakyTransport {
        attempts: Arc<AtomicUsize>,
        messages: Vec<&'static str>,
    }

    #[async_trait]
    impl PushTransport for FlakyTransport {
        type Message = &'static str;

        async fn connect(&mut self) -> AdapterResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn recv(&mut self) -> AdapterResult<Option<Self::Message>> {
            Ok(self.messages.pop())
        }

        async fn disconnect(&mut self) {}
    }

    struct EchoTranslator;

    impl Translator<&'static str> for EchoTranslator {
        fn message_id(message: &&'static str) -> Option<String> {
            Some((*message).to_string())
        }

        fn translate(message: &'static str) -> Option<Event> {
            Some(Event::ChatMessage { user_id: "u1".into(), display_name: "tester".into(), body: message.into() })
        }
    }

    #[tokio::test]
    async fn delivers_one_message_then_reports_closed() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe(None);
        let metrics = Metrics::new().expect("metrics");

        let transport = FlakyTransport { attempts: Arc::new(AtomicUsize::new(0)), messages: vec!["hello"] };
        let handle = spawn_push_adapter::<_, EchoTranslator>("test_source", transport, bus, metrics);

        let connecting = subscriber.next().await.expect("envelope").expect("ok");
        assert!(matches!(connecting.event, Event::SourceStateChanged { .. }));
        let connected = subscriber.next().await.expect("envelope").expect("ok");
        assert!(matches!(connected.event, Event::SourceStateChanged { .. }));
        let chat = subscriber.next().await.expect("envelope").expect("ok");
        assert!(matches!(chat.event, Event::ChatMessage { .. }));

        handle.cancel();
    }
}
