//! IronMON-style game telemetry: a length-prefixed ASCII TCP stream,
//! `"<decimal length> <JSON>"` per message, buffered per connection until
//! a full frame is available.

use omnibar_events::{Event, EventBus};
use omnibar_telemetry::Metrics;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const READ_BUFFER: usize = 4_096;

/// One decoded telemetry frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GameFrame {
    /// The frame's `type` field (`init`, `seed`, `checkpoint`, or `location`).
    pub frame_type: String,
    /// Full decoded JSON payload.
    pub payload: Value,
}

impl GameFrame {
    fn from_value(value: Value) -> Option<Self> {
        let frame_type = value.get("type")?.as_str()?.to_string();
        Some(Self { frame_type, payload: value })
    }

    /// `game_id`, when this frame's payload declares one.
    fn game_id(&self) -> Option<u64> {
        self.payload.get("game_id").and_then(Value::as_u64)
    }
}

/// Decodes a byte stream framed as `"<decimal length> <JSON>"` per message.
///
/// A non-numeric (or missing) length prefix resets the buffer, discarding
/// whatever was accumulated so far, matching the stream's own recovery
/// contract: there is no resync token, so the only sane response to a
/// corrupted prefix is to start over at the next byte received.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Construct an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly received bytes, returning every complete frame they
    /// produced. Partial frames remain buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<GameFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(space_at) = self.buffer.iter().position(|byte| *byte == b' ') else {
                break;
            };
            let Ok(prefix) = std::str::from_utf8(&self.buffer[..space_at]) else {
                self.buffer.clear();
                break;
            };
            let Ok(length) = prefix.parse::<usize>() else {
                self.buffer.clear();
                break;
            };

            let body_start = space_at + 1;
            let Some(body_end) = body_start.checked_add(length) else {
                self.buffer.clear();
                break;
            };
            if self.buffer.len() < body_end {
                break;
            }

            let body = &self.buffer[body_start..body_end];
            if let Ok(value) = serde_json::from_slice::<Value>(body) {
                if let Some(frame) = GameFrame::from_value(value) {
                    frames.push(frame);
                }
            }
            self.buffer.drain(..body_end);
        }

        frames
    }
}

/// Handle to a running game telemetry listener.
pub struct GameTelemetryHandle {
    state: watch::Receiver<usize>,
    cancel: CancellationToken,
}

impl GameTelemetryHandle {
    /// Number of currently connected telemetry sources.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        *self.state.borrow()
    }

    /// Stop accepting connections and close the listener. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Bind a TCP listener at `addr` and translate every accepted connection's
/// frames onto `bus`.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn spawn_game_telemetry(addr: std::net::SocketAddr, bus: EventBus, metrics: Metrics) -> std::io::Result<GameTelemetryHandle> {
    let listener = TcpListener::bind(addr).await?;
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(0usize);
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = task_cancel.cancelled() => return,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            info!(%peer, "game telemetry connection accepted");
                            state_tx.send_modify(|count| *count += 1);
                            let bus = bus.clone();
                            let metrics = metrics.clone();
                            let state_tx = state_tx.clone();
                            let conn_cancel = task_cancel.clone();
                            tokio::spawn(async move {
                                handle_connection(socket, &bus, &metrics, &conn_cancel).await;
                                state_tx.send_modify(|count| *count = count.saturating_sub(1));
                            });
                        }
                        Err(err) => warn!(error = %err, "game telemetry accept failed"),
                    }
                }
            }
        }
    });

    Ok(GameTelemetryHandle { state: state_rx, cancel })
}

async fn handle_connection(mut socket: TcpStream, bus: &EventBus, metrics: &Metrics, cancel: &CancellationToken) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_BUFFER];

    loop {
        let read = tokio::select! {
            () = cancel.cancelled() => return,
            read = socket.read(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                debug!("game telemetry connection closed");
                return;
            }
            Ok(n) => {
                for frame in decoder.feed(&buf[..n]) {
                    publish_frame(frame, bus, metrics);
                }
            }
            Err(err) => {
                warn!(error = %err, "game telemetry read failed");
                return;
            }
        }
    }
}

fn publish_frame(frame: GameFrame, bus: &EventBus, metrics: &Metrics) {
    if frame.frame_type == "init" {
        if let Some(game_id) = frame.game_id() {
            let event = Event::GameChanged { game_id };
            metrics.inc_event(event.type_tag());
            let _ = bus.emit(event);
        }
    }
    let event = Event::GameCheckpoint { kind: frame.frame_type, data: frame.payload };
    metrics.inc_event(event.type_tag());
    let _ = bus.emit(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_single_complete_frame() {
        let mut decoder = FrameDecoder::new();
        let json = r#"{"type":"checkpoint","id":7}"#;
        let wire = format!("{} {json}", json.len());

        let frames = decoder.feed(wire.as_bytes());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, "checkpoint");
    }

    #[test]
    fn retains_a_partial_frame_across_feeds() {
        let mut decoder = FrameDecoder::new();
        let json = r#"{"type":"seed","value":42}"#;
        let wire = format!("{} {json}", json.len());
        let split_at = wire.len() - 5;

        assert!(decoder.feed(wire.as_bytes()[..split_at].as_ref()).is_empty());
        let frames = decoder.feed(wire.as_bytes()[split_at..].as_ref());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, "seed");
    }

    #[test]
    fn non_numeric_length_resets_the_buffer() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"abc {\"type\":\"seed\"}").is_empty());

        let json = r#"{"type":"location","zone":"vermilion"}"#;
        let wire = format!("{} {json}", json.len());
        let frames = decoder.feed(wire.as_bytes());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, "location");
    }

    #[test]
    fn two_frames_in_one_read_both_decode() {
        let mut decoder = FrameDecoder::new();
        let a = r#"{"type":"checkpoint","id":1}"#;
        let b = r#"{"type":"checkpoint","id":2}"#;
        let wire = format!("{} {a}{} {b}", a.len(), b.len());

        let frames = decoder.feed(wire.as_bytes());
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn init_frame_with_game_id_is_detected() {
        let frame = GameFrame::from_value(serde_json::json!({"type": "init", "game_id": 13332})).expect("frame");
        assert_eq!(frame.game_id(), Some(13332));
    }
}
