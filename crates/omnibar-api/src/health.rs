//! `GET /healthz` and `GET /metrics`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::{Json, body::Body};
use serde::Serialize;
use tracing::error;

use crate::error::ApiError;
use crate::state::ApiState;

/// Response body for `GET /healthz`.
#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) node_id: String,
    pub(crate) connected_clients: i64,
}

/// Liveness probe. Always reports `ok` once the process has started serving
/// requests; readiness of peer nodes is a `/fleet/*` concern, not this one's.
pub(crate) async fn healthz(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        node_id: state.node_id.clone(),
        connected_clients: state.connected_clients(),
    })
}

/// Prometheus exposition of this node's metrics.
pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let body = state.metrics.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        ApiError::internal("failed to render metrics")
    })?;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .map_err(|err| {
            error!(error = %err, "failed to build metrics response");
            ApiError::internal("failed to build metrics response")
        })
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
    async fn healthz_reports_the_node_id() {
        let state = build_state();
        let response = healthz(State(state)).await;
        assert_eq!(response.0.status, "ok");
        assert_eq!(response.0.node_id, "node-a");
    }

    #[tokio::test]
    async fn metrics_renders_a_prometheus_body() {
        let state = build_state();
        let response = metrics(State(state)).await.expect("render ok");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
