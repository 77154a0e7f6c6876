//! Fleet Router: directs process commands to the owning node and
//! aggregates cluster-wide status by concurrent fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use omnibar_supervisor::{ProcessRecord, ProcessSupervisor};
use omnibar_telemetry::Metrics;

use crate::client::PeerClient;
use crate::error::{FleetError, FleetResult};
use crate::peer::PeerNode;

/// Cluster-wide process status, gathered by fanning a `GET /fleet/processes`
/// request out to every peer concurrently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterStatus {
    /// Process records keyed by the node that reported them.
    pub nodes: HashMap<String, Vec<ProcessRecord>>,
    /// Node ids that did not respond before the deadline or were unreachable.
    pub unreachable_nodes: Vec<String>,
}

/// Routes process commands to the node that owns the target process and
/// aggregates `status` across the whole cluster.
pub struct FleetRouter {
    local: Arc<ProcessSupervisor>,
    peers: HashMap<String, PeerClient>,
    metrics: Metrics,
}

impl FleetRouter {
    /// Build a router over the local supervisor and a set of peer nodes.
    #[must_use]
    pub fn new(local: Arc<ProcessSupervisor>, peers: &[PeerNode], metrics: Metrics) -> Self {
        let peers = peers
            .iter()
            .map(|peer| (peer.node_id.clone(), PeerClient::new(peer)))
            .collect();
        Self { local, peers, metrics }
    }

    /// Node id this router treats as "local".
    #[must_use]
    pub fn local_node_id(&self) -> &str {
        self.local.node_id()
    }

    /// Start process `process_id` on node `node_id`.
    pub async fn start(&self, node_id: &str, process_id: &str) -> FleetResult<ProcessRecord> {
        if node_id == self.local.node_id() {
            self.local.start(process_id).await.map_err(|source| FleetError::Local { source })?;
            return self.local.status(process_id).await.map_err(|source| FleetError::Local { source });
        }
        let peer = self.peer(node_id)?;
        self.record_outcome(node_id, peer.start(process_id).await)
    }

    /// Stop process `process_id` on node `node_id`.
    pub async fn stop(&self, node_id: &str, process_id: &str) -> FleetResult<ProcessRecord> {
        if node_id == self.local.node_id() {
            self.local.stop(process_id).await.map_err(|source| FleetError::Local { source })?;
            return self.local.status(process_id).await.map_err(|source| FleetError::Local { source });
        }
        let peer = self.peer(node_id)?;
        self.record_outcome(node_id, peer.stop(process_id).await)
    }

    /// Read the current status of process `process_id` on node `node_id`.
    pub async fn status(&self, node_id: &str, process_id: &str) -> FleetResult<ProcessRecord> {
        if node_id == self.local.node_id() {
            return self.local.status(process_id).await.map_err(|source| FleetError::Local { source });
        }
        let peer = self.peer(node_id)?;
        self.record_outcome(node_id, peer.status(process_id).await)
    }

    fn peer(&self, node_id: &str) -> FleetResult<&PeerClient> {
        self.peers.get(node_id).ok_or_else(|| FleetError::UnknownNode { node_id: node_id.to_string() })
    }

    fn record_outcome<T>(&self, node_id: &str, outcome: FleetResult<T>) -> FleetResult<T> {
        if outcome.is_err() {
            self.metrics.inc_fleet_rpc_failure(node_id);
        }
        outcome
    }

    /// Aggregate process status across every peer plus the local node,
    /// fanning requests out concurrently so one slow or unreachable node
    /// never delays the rest.
    pub async fn cluster_status(&self) -> ClusterStatus {
        let mut nodes = HashMap::new();
        nodes.insert(self.local.node_id().to_string(), self.local.list().await);

        let fetches = self.peers.values().map(|peer| async move {
            let outcome = peer.list().await;
            (peer.node_id().to_string(), outcome)
        });
        let results = futures_util::future::join_all(fetches).await;

        let mut unreachable_nodes = Vec::new();
        for (node_id, outcome) in results {
            match outcome {
                Ok(records) => {
                    nodes.insert(node_id, records);
                }
                Err(_) => {
                    self.metrics.inc_fleet_rpc_failure(&node_id);
                    unreachable_nodes.push(node_id);
                }
            }
        }

        ClusterStatus { nodes, unreachable_nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnibar_events::EventBus;

    #[tokio::test]
    async fn unknown_node_is_rejected_without_a_network_call() {
        let supervisor = ProcessSupervisor::new("node@test", EventBus::new(), Metrics::new().expect("metrics"));
        let router = FleetRouter::new(supervisor, &[], Metrics::new().expect("metrics"));

        let err = router.status("node@other", "p1").await.expect_err("should reject");
        assert_eq!(err.code(), "unknown_node");
    }

    #[tokio::test]
    async fn local_status_routes_to_the_in_process_supervisor() {
        let supervisor = ProcessSupervisor::new("node@test", EventBus::new(), Metrics::new().expect("metrics"));
        let router = FleetRouter::new(Arc::clone(&supervisor), &[], Metrics::new().expect("metrics"));

        let err = router.status("node@test", "missing").await.expect_err("not found");
        assert_eq!(err.code(), "local_error");
    }

    #[tokio::test]
    async fn cluster_status_reports_the_local_node_even_with_no_peers() {
        let supervisor = ProcessSupervisor::new("node@test", EventBus::new(), Metrics::new().expect("metrics"));
        let router = FleetRouter::new(supervisor, &[], Metrics::new().expect("metrics"));

        let status = router.cluster_status().await;
        assert!(status.nodes.contains_key("node@test"));
        assert!(status.unreachable_nodes.is_empty());
    }
}
