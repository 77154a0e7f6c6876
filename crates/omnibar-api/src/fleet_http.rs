//! `/fleet/*` HTTP surface: what a peer node's [`omnibar_fleet::PeerClient`]
//! talks to when routing a command to this node, and what it drains for
//! cross-node event relay.
//!
//! Grounded on `omnibar_fleet::client::PeerClient` for the exact routes and
//! verbs it expects, and on `omnibar_fleet::relay::format_sse_line` for the
//! `data: {json}\n\n` wire format `/fleet/events` must emit.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::Json;
use futures_util::StreamExt;
use omnibar_events::Event;
use omnibar_fleet::format_sse_line;
use omnibar_supervisor::ProcessRecord;

use crate::error::ApiError;
use crate::state::ApiState;

/// `GET /fleet/processes`: every process this node supervises.
pub(crate) async fn list_processes(State(state): State<Arc<ApiState>>) -> Json<Vec<ProcessRecord>> {
    Json(state.supervisor.list().await)
}

/// `GET /fleet/processes/{id}`.
pub(crate) async fn process_status(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ProcessRecord>, ApiError> {
    state.supervisor.status(&id).await.map(Json).map_err(ApiError::from_supervisor)
}

/// `POST /fleet/processes/{id}/start`.
pub(crate) async fn process_start(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ProcessRecord>, ApiError> {
    state.supervisor.start(&id).await.map_err(ApiError::from_supervisor)?;
    state.supervisor.status(&id).await.map(Json).map_err(ApiError::from_supervisor)
}

/// `POST /fleet/processes/{id}/stop`.
pub(crate) async fn process_stop(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ProcessRecord>, ApiError> {
    state.supervisor.stop(&id).await.map_err(ApiError::from_supervisor)?;
    state.supervisor.status(&id).await.map(Json).map_err(ApiError::from_supervisor)
}

/// `GET /fleet/events`: a long-lived `data: {json}\n\n` stream of
/// `process.state_changed` envelopes, consumed by
/// [`omnibar_fleet::spawn_relay`] on peer nodes. Filtered server-side so
/// peers never receive irrelevant chat, alert, or telemetry traffic.
pub(crate) async fn fleet_events(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let stream = state.events.subscribe(None).filter_map(|result| async move {
        let envelope = result.ok()?;
        if !matches!(envelope.event, Event::ProcessStateChanged { .. }) {
            return None;
        }
        Some(Ok::<_, Infallible>(format_sse_line(&envelope)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(stream))
        .map_err(|err| ApiError::internal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnibar_events::EventBus;
    use omnibar_fleet::FleetRouter;
    use omnibar_orchestrator::{AlertPolicy, StreamOrchestrator};
    use omnibar_supervisor::ProcessSupervisor;
    use omnibar_telemetry::Metrics;

    fn build_state() -> Arc<ApiState> {
        let events = EventBus::new();
        let metrics = Metrics::new().expect("metrics");
        let (orchestrator, _rx) = StreamOrchestrator::new(
            events.clone(),
            metrics.clone(),
            vec![],
            Default::default(),
            AlertPolicy::default(),
            std::time::Duration::from_secs(30),
        );
        let supervisor = ProcessSupervisor::new("node-a", events.clone(), metrics.clone());
        let fleet = Arc::new(FleetRouter::new(supervisor.clone(), &[], metrics.clone()));
        Arc::new(ApiState::new(orchestrator, supervisor, fleet, events, metrics, "node-a"))
    }

    #[tokio::test]
    async fn list_processes_starts_empty() {
        let state = build_state();
        let response = list_processes(State(state)).await;
        assert!(response.0.is_empty());
    }

    #[tokio::test]
    async fn process_status_reports_not_found_for_an_unknown_id() {
        use axum::response::IntoResponse;

        let state = build_state();
        let err = process_status(State(state), Path("missing".into())).await.expect_err("not found");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
