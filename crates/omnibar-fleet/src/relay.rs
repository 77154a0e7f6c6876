//! Cross-node event relay: consumes a peer's `process.state_changed` stream
//! and re-publishes it on the local event bus so the orchestrator and
//! dashboard see one unified view of the cluster.
//!
//! The peer side serves this over the same text/event-stream framing the
//! overlay channel uses; here it is consumed from the client end instead,
//! reusing the shared HTTP client rather than a dedicated websocket stack.

use futures_util::StreamExt;
use omnibar_events::{Event, EventBus, EventEnvelope};
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};

use crate::client::PeerClient;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Per-request timeout override for the event-stream connection. The shared
/// HTTP client's default timeout ([`crate::client::RPC_DEADLINE`]) is meant
/// for short request/response RPCs and would cut a long-lived stream off
/// after 5 seconds, so this call uses its own effectively-unbounded one;
/// a dropped or stalled connection is instead caught by the outer
/// reconnect loop.
const STREAM_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Spawn a task that continuously relays `peer`'s event stream onto `bus`,
/// reconnecting with a fixed delay on disconnect. Runs until the process
/// exits; there is no cancellation handle because the relay is only ever
/// torn down by process shutdown.
pub fn spawn_relay(peer: PeerClient, bus: EventBus) {
    tokio::spawn(async move {
        loop {
            if let Err(err) = run_once(&peer, &bus).await {
                warn!(node_id = peer.node_id(), error = %err, "fleet event relay disconnected");
            }
            sleep(RECONNECT_DELAY).await;
        }
    });
}

async fn run_once(peer: &PeerClient, bus: &EventBus) -> Result<(), reqwest::Error> {
    let response = peer
        .http()
        .get(peer.events_url())
        .timeout(STREAM_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;

    let mut stream = response.bytes_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);
        drain_events(&mut buffer, peer.node_id(), bus);
    }
    Ok(())
}

/// Split `buffer` on newlines, parse each `data: {...}` line as an
/// [`EventEnvelope`], and re-publish [`Event::ProcessStateChanged`] payloads
/// on `bus`. Any other event type on the stream is ignored; non-JSON or
/// partial lines are left in the buffer for the next chunk.
fn drain_events(buffer: &mut Vec<u8>, node_id: &str, bus: &EventBus) {
    while let Some(newline_at) = buffer.iter().position(|byte| *byte == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline_at).collect();
        let line = String::from_utf8_lossy(&line);
        let Some(payload) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let Ok(envelope) = serde_json::from_str::<EventEnvelope>(payload.trim()) else {
            debug!(node_id, "skipping malformed fleet event line");
            continue;
        };
        if let Event::ProcessStateChanged { .. } = &envelope.event {
            if let Err(err) = bus.emit(envelope.event) {
                warn!(node_id, error = %err, "failed to re-publish remote process state");
            }
        }
    }
}

/// Render one `EventEnvelope` as an SSE `data:` line, for use by the peer
/// side serving `/fleet/events`.
#[must_use]
pub fn format_sse_line(envelope: &EventEnvelope) -> String {
    format!("data: {}\n\n", serde_json::to_string(envelope).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio_stream::StreamExt;

    fn envelope(event: Event) -> EventEnvelope {
        EventEnvelope { id: 1, timestamp: Utc::now(), correlation_id: None, event }
    }

    #[tokio::test]
    async fn drains_a_process_state_changed_line_and_emits_it() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe(None);

        let env = envelope(Event::ProcessStateChanged {
            process_id: "obs".into(),
            node_id: "node@peer".into(),
            state: "running".into(),
        });
        let mut buffer = format_sse_line(&env).into_bytes();

        drain_events(&mut buffer, "node@peer", &bus);

        let received = subscriber.next().await.expect("stream open").expect("no lag");
        assert_eq!(received.event, env.event);
    }

    #[tokio::test]
    async fn non_process_state_events_are_not_republished() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe(None);

        let env = envelope(Event::SettingsChanged { description: "reload".into() });
        let mut buffer = format_sse_line(&env).into_bytes();

        drain_events(&mut buffer, "node@peer", &bus);
        drop(bus);

        assert!(subscriber.next().await.is_none());
    }

    #[test]
    fn partial_lines_remain_buffered_until_a_newline_arrives() {
        let bus = EventBus::new();
        let env = envelope(Event::ProcessStateChanged {
            process_id: "obs".into(),
            node_id: "node@peer".into(),
            state: "running".into(),
        });
        let full_line = format_sse_line(&env);
        let split_at = full_line.len() / 2;
        let mut buffer = full_line.as_bytes()[..split_at].to_vec();

        drain_events(&mut buffer, "node@peer", &bus);
        assert_eq!(buffer.len(), split_at);
    }
}
