//! The `/socket` (overlay) and `/control` (dashboard) WebSocket endpoints.
//!
//! Grounded on `http/sse.rs`'s `event_replay_stream`/`matches_sse_filter`
//! pipeline: since [`omnibar_events::Topic`] can only match an exact tag or
//! a `namespace.*` wildcard, filtering for two distinct tags
//! (`stream.state` and `process.state_changed`) means subscribing to
//! everything and matching on the `Event` variant by hand, the same way
//! `matches_sse_filter` does for its torrent-domain events. Unlike that
//! pipeline, a reconnect here is never replayed past the initial snapshot,
//! so there is no `Last-Event-Id` dedup stage to carry over.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use omnibar_events::{Event, EventEnvelope};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::constants::{
    CLIENT_CHANNEL_CAPACITY, CLOSE_REASON_HEARTBEAT_TIMEOUT, CLOSE_REASON_SLOW_CONSUMER,
    PING_INTERVAL_SECS, PONG_TIMEOUT_SECS,
};
use crate::protocol::{ClientMessage, ServerMessage, StreamStateWire};
use crate::state::ApiState;

/// Whether a connection accepts dashboard commands or is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientRole {
    /// Overlay: receives snapshots and deltas, never issues commands.
    Overlay,
    /// Dashboard: receives snapshots and deltas, and may issue commands.
    Dashboard,
}

/// `GET /socket`: the read-only overlay connection.
pub(crate) async fn overlay_socket(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state, ClientRole::Overlay))
}

/// `GET /control`: the dashboard connection, which may also send commands.
pub(crate) async fn control_socket(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state, ClientRole::Dashboard))
}

async fn run_connection(mut socket: WebSocket, state: Arc<ApiState>, role: ClientRole) {
    state.note_client_connected();

    let (tx, mut queue) = mpsc::channel::<ServerMessage>(CLIENT_CHANNEL_CAPACITY);
    let snapshot = ServerMessage::Snapshot { state: StreamStateWire::from(state.orchestrator.snapshot()) };
    if tx.try_send(snapshot).is_err() {
        state.note_client_disconnected();
        return;
    }

    let mut events = state.events.subscribe(None);
    let mut ping_ticker = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping_ticker.tick().await;
    let mut last_pong = Instant::now();
    let mut close_reason: Option<&'static str> = None;

    'connection: loop {
        tokio::select! {
            _ = ping_ticker.tick() => {
                if last_pong.elapsed() > Duration::from_secs(PONG_TIMEOUT_SECS) {
                    close_reason = Some(CLOSE_REASON_HEARTBEAT_TIMEOUT);
                    break 'connection;
                }
                if tx.try_send(ServerMessage::Ping).is_err() {
                    close_reason = Some(CLOSE_REASON_SLOW_CONSUMER);
                    break 'connection;
                }
            }
            envelope = events.next() => {
                match envelope {
                    Some(Ok(envelope)) => {
                        if let Some(message) = translate_event(envelope) {
                            if tx.try_send(message).is_err() {
                                state.metrics.inc_overlay_slow_consumer();
                                close_reason = Some(CLOSE_REASON_SLOW_CONSUMER);
                                break 'connection;
                            }
                        }
                    }
                    Some(Err(_)) => {
                        // Broadcast lag: this client missed events. Reconnect semantics
                        // never replay deltas, so the snapshot-on-reconnect contract
                        // still holds; nothing to do but keep draining.
                    }
                    None => break 'connection,
                }
            }
            outgoing = queue.recv() => {
                let Some(message) = outgoing else { break 'connection };
                let Ok(text) = serde_json::to_string(&message) else { continue 'connection };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break 'connection;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming(&text, role, &state, &tx, &mut last_pong).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break 'connection,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break 'connection,
                }
            }
        }
    }

    if let Some(reason) = close_reason {
        let frame = CloseFrame { code: 1008, reason: reason.into() };
        let _ = socket.send(Message::Close(Some(frame))).await;
    }
    state.note_client_disconnected();
}

async fn handle_incoming(
    text: &str,
    role: ClientRole,
    state: &Arc<ApiState>,
    tx: &mpsc::Sender<ServerMessage>,
    last_pong: &mut Instant,
) {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(ClientMessage::Pong) => *last_pong = Instant::now(),
        Ok(ClientMessage::Command { name, node, id, correlation_id }) if role == ClientRole::Dashboard => {
            let result = dispatch_command(state, &name, &node, &id).await;
            let reply = match result {
                Ok(()) => ServerMessage::Reply { correlation_id, ok: true, error: None },
                Err(code) => ServerMessage::Reply { correlation_id, ok: false, error: Some(code.to_string()) },
            };
            let _ = tx.try_send(reply);
        }
        Ok(ClientMessage::Command { correlation_id, .. }) => {
            let _ = tx.try_send(ServerMessage::Reply {
                correlation_id,
                ok: false,
                error: Some("read_only_connection".to_string()),
            });
        }
        Err(err) => {
            debug!(error = %err, "dropping malformed client message");
        }
    }
}

async fn dispatch_command(state: &ApiState, name: &str, node: &str, id: &str) -> Result<(), &'static str> {
    match name {
        "process.start" => state.fleet.start(node, id).await.map(|_| ()).map_err(|err| err.code()),
        "process.stop" => state.fleet.stop(node, id).await.map(|_| ()).map_err(|err| err.code()),
        "process.status" => state.fleet.status(node, id).await.map(|_| ()).map_err(|err| err.code()),
        other => {
            warn!(command = other, "rejecting unknown dashboard command");
            Err("unknown_command")
        }
    }
}

fn translate_event(envelope: EventEnvelope) -> Option<ServerMessage> {
    match envelope.event {
        Event::StreamState { current_show, priority_level, active_content } => {
            Some(ServerMessage::StreamState { state: StreamStateWire { current_show, priority_level, active_content } })
        }
        Event::ProcessStateChanged { process_id, node_id, state } => {
            Some(ServerMessage::ProcessStateChanged { node: node_id, id: process_id, state })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnibar_events::EventBus;
    use omnibar_fleet::FleetRouter;
    use omnibar_orchestrator::{AlertPolicy, StreamOrchestrator};
    use omnibar_supervisor::ProcessSupervisor;
    use omnibar_telemetry::Metrics;

    fn sample_envelope(event: Event) -> EventEnvelope {
        EventEnvelope { id: 1, timestamp: chrono::Utc::now(), correlation_id: None, event }
    }

    #[test]
    fn translate_event_maps_stream_state_to_a_server_delta() {
        let event = Event::StreamState { current_show: "main".into(), priority_level: "ticker".into(), active_content: None };
        let message = translate_event(sample_envelope(event)).expect("mapped");
        assert!(matches!(message, ServerMessage::StreamState { .. }));
    }

    #[test]
    fn translate_event_maps_process_state_changed() {
        let event = Event::ProcessStateChanged { process_id: "p1".into(), node_id: "n1".into(), state: "running".into() };
        let message = translate_event(sample_envelope(event)).expect("mapped");
        match message {
            ServerMessage::ProcessStateChanged { node, id, state } => {
                assert_eq!(node, "n1");
                assert_eq!(id, "p1");
                assert_eq!(state, "running");
            }
            _ => panic!("expected process.state_changed"),
        }
    }

    #[test]
    fn translate_event_ignores_events_with_no_dashboard_counterpart() {
        let event = Event::Follow { user_id: "u1".into(), display_name: "tester".into() };
        assert!(translate_event(sample_envelope(event)).is_none());
    }

    async fn build_state() -> Arc<ApiState> {
        let events = EventBus::new();
        let metrics = Metrics::new().expect("metrics");
        let (orchestrator, _rx) = StreamOrchestrator::new(
            events.clone(),
            metrics.clone(),
            vec![],
            Default::default(),
            AlertPolicy::default(),
            Duration::from_secs(30),
        );
        let supervisor = ProcessSupervisor::new("node-a", events.clone(), metrics.clone());
        let fleet = Arc::new(FleetRouter::new(supervisor.clone(), &[], metrics.clone()));
        Arc::new(ApiState::new(orchestrator, supervisor, fleet, events, metrics, "node-a"))
    }

    #[tokio::test]
    async fn dispatch_command_rejects_an_unknown_command_name() {
        let state = build_state().await;
        let err = dispatch_command(&state, "process.teleport", "node-a", "p1").await.expect_err("rejected");
        assert_eq!(err, "unknown_command");
    }

    #[tokio::test]
    async fn dispatch_command_reports_not_found_for_a_missing_local_process() {
        let state = build_state().await;
        let err = dispatch_command(&state, "process.start", "node-a", "missing").await.expect_err("not found");
        assert_eq!(err, "not_found");
    }
}
