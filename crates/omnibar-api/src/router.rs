//! Router construction and server host for the Stream Channel API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, header::CONTENT_TYPE};
use axum::routing::{get, post};
use axum::Router;
use omnibar_events::EventBus;
use omnibar_fleet::FleetRouter;
use omnibar_orchestrator::StreamOrchestrator;
use omnibar_supervisor::ProcessSupervisor;
use omnibar_telemetry::{build_sha, propagate_request_id_layer, set_request_id_layer, Metrics};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::constants::{CONTROL_SOCKET_PATH, HEADER_REQUEST_ID, OVERLAY_SOCKET_PATH};
use crate::error::{ApiServerError, ApiServerResult};
use crate::fleet_http::{fleet_events, list_processes, process_start, process_status, process_stop};
use crate::health::{healthz, metrics};
use crate::state::ApiState;
use crate::telemetry::HttpMetricsLayer;
use crate::ws::{control_socket, overlay_socket};

/// Axum router wrapper hosting the Stream Channel WebSocket surface, the
/// fleet RPC surface, and the ambient health/metrics endpoints.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct a new API server from its already-built dependencies.
    #[must_use]
    pub fn new(
        orchestrator: Arc<StreamOrchestrator>,
        supervisor: Arc<ProcessSupervisor>,
        fleet: Arc<FleetRouter>,
        events: EventBus,
        metrics: Metrics,
        node_id: impl Into<String>,
    ) -> Self {
        let state = Arc::new(ApiState::new(orchestrator, supervisor, fleet, events, metrics.clone(), node_id));
        Self::with_state(state, metrics)
    }

    fn with_state(state: Arc<ApiState>, telemetry: Metrics) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE]);

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(|response: &axum::response::Response, latency: Duration, span: &Span| {
                span.record("status_code", response.status().as_u16());
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                span.record("latency_ms", latency_ms);
            });

        let layered = ServiceBuilder::new()
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::build_router()
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/metrics", get(metrics))
            .route(OVERLAY_SOCKET_PATH, get(overlay_socket))
            .route(CONTROL_SOCKET_PATH, get(control_socket))
            .route("/fleet/processes", get(list_processes))
            .route("/fleet/processes/{id}", get(process_status))
            .route("/fleet/processes/{id}/start", post(process_start))
            .route("/fleet/processes/{id}/stop", post(process_stop))
            .route("/fleet/events", get(fleet_events))
    }

    /// Serve the API on the given address until the process is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server
    /// terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        tracing::info!(%addr, "starting stream channel api");
        let listener = TcpListener::bind(addr).await.map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use omnibar_orchestrator::AlertPolicy;
    use tower::ServiceExt;

    fn build_server() -> ApiServer {
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
        ApiServer::new(orchestrator, supervisor, fleet, events, metrics, "node-a")
    }

    #[tokio::test]
    async fn healthz_route_is_reachable() {
        let server = build_server();
        let request = Request::builder().uri("/healthz").body(Body::empty()).expect("request");
        let response = server.router().clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_route_is_reachable() {
        let server = build_server();
        let request = Request::builder().uri("/metrics").body(Body::empty()).expect("request");
        let response = server.router().clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn fleet_processes_route_lists_no_processes_initially() {
        let server = build_server();
        let request = Request::builder().uri("/fleet/processes").body(Body::empty()).expect("request");
        let response = server.router().clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
