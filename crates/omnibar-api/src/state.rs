//! Shared state reachable from every handler and WebSocket connection.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use omnibar_events::EventBus;
use omnibar_fleet::FleetRouter;
use omnibar_orchestrator::StreamOrchestrator;
use omnibar_supervisor::ProcessSupervisor;
use omnibar_telemetry::Metrics;

/// Shared application state, cloned as an `Arc` into every axum handler.
pub struct ApiState {
    /// Stream orchestrator owning the published stream state.
    pub orchestrator: Arc<StreamOrchestrator>,
    /// This node's process supervisor, used to serve its own `/fleet/*` surface.
    pub supervisor: Arc<ProcessSupervisor>,
    /// Router directing process commands to whichever node owns them.
    pub fleet: Arc<FleetRouter>,
    /// Shared event bus.
    pub events: EventBus,
    /// Shared metrics registry.
    pub metrics: Metrics,
    /// This node's advertised identifier.
    pub node_id: String,
    connected_clients: AtomicI64,
}

impl ApiState {
    /// Construct shared state from its already-built components.
    #[must_use]
    pub fn new(
        orchestrator: Arc<StreamOrchestrator>,
        supervisor: Arc<ProcessSupervisor>,
        fleet: Arc<FleetRouter>,
        events: EventBus,
        metrics: Metrics,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            supervisor,
            fleet,
            events,
            metrics,
            node_id: node_id.into(),
            connected_clients: AtomicI64::new(0),
        }
    }

    /// Record a newly connected overlay or dashboard client and update the
    /// connected-clients gauge.
    pub(crate) fn note_client_connected(&self) {
        let count = self.connected_clients.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.set_overlay_clients_connected(count);
    }

    /// Record a disconnected client and update the connected-clients gauge.
    pub(crate) fn note_client_disconnected(&self) {
        let count = (self.connected_clients.fetch_sub(1, Ordering::SeqCst) - 1).max(0);
        self.metrics.set_overlay_clients_connected(count);
    }

    /// Current number of connected overlay and dashboard clients.
    #[must_use]
    pub fn connected_clients(&self) -> i64 {
        self.connected_clients.load(Ordering::SeqCst)
    }
}
