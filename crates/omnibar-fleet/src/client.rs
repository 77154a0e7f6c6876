//! RPC client for one cluster peer.
//!
//! A thin reqwest wrapper over a bounded deadline, the same shape as the
//! operator CLI's HTTP client: one shared `Client` built once, a fixed
//! request timeout, JSON bodies in and out.

use std::time::Duration;

use omnibar_supervisor::ProcessRecord;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{FleetError, FleetResult};
use crate::peer::PeerNode;

/// Deadline applied to every cross-node RPC.
pub const RPC_DEADLINE: Duration = Duration::from_secs(5);

/// Client bound to one peer node's fleet surface.
#[derive(Clone)]
pub struct PeerClient {
    node_id: String,
    base_url: String,
    http: Client,
}

impl PeerClient {
    /// Build a client for `peer` using a dedicated HTTP client carrying the
    /// RPC deadline as its request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` fails to build, which only
    /// happens on a malformed TLS configuration.
    #[must_use]
    pub fn new(peer: &PeerNode) -> Self {
        let http = Client::builder()
            .timeout(RPC_DEADLINE)
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        Self {
            node_id: peer.node_id.clone(),
            base_url: peer.base_url.clone(),
            http,
        }
    }

    /// Node id this client is bound to.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// `POST {base}/fleet/processes/{id}/start`.
    pub async fn start(&self, process_id: &str) -> FleetResult<ProcessRecord> {
        let url = format!("{}/fleet/processes/{process_id}/start", self.base_url);
        self.send(self.http.post(url)).await
    }

    /// `POST {base}/fleet/processes/{id}/stop`.
    pub async fn stop(&self, process_id: &str) -> FleetResult<ProcessRecord> {
        let url = format!("{}/fleet/processes/{process_id}/stop", self.base_url);
        self.send(self.http.post(url)).await
    }

    /// `GET {base}/fleet/processes/{id}`.
    pub async fn status(&self, process_id: &str) -> FleetResult<ProcessRecord> {
        let url = format!("{}/fleet/processes/{process_id}", self.base_url);
        self.send(self.http.get(url)).await
    }

    /// `GET {base}/fleet/processes` — every process record known to that node.
    pub async fn list(&self) -> FleetResult<Vec<ProcessRecord>> {
        let url = format!("{}/fleet/processes", self.base_url);
        self.send(self.http.get(url)).await
    }

    /// Base URL this client talks to, used to derive the event-stream URL.
    #[must_use]
    pub fn events_url(&self) -> String {
        format!("{}/fleet/events", self.base_url)
    }

    /// Shared HTTP client, exposed so the event-stream relay can issue its
    /// own long-lived streaming request without building a second client.
    ///
    /// The relay overrides [`RPC_DEADLINE`] with its own per-request
    /// timeout for that one call, since a 5-second deadline would cut off a
    /// live stream almost immediately.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: reqwest::RequestBuilder) -> FleetResult<T> {
        let response = request.send().await.map_err(|source| {
            if source.is_timeout() {
                FleetError::Timeout { node_id: self.node_id.clone() }
            } else {
                FleetError::NodeUnreachable { node_id: self.node_id.clone(), source }
            }
        })?;

        if response.status() != StatusCode::OK {
            return Err(FleetError::RemoteError {
                node_id: self.node_id.clone(),
                status: response.status().as_u16(),
            });
        }

        response.json::<T>().await.map_err(|source| FleetError::Decode {
            node_id: self.node_id.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_url_is_derived_from_base_url() {
        let peer = PeerNode { node_id: "n1".into(), base_url: "http://10.0.0.2:7175".into() };
        let client = PeerClient::new(&peer);
        assert_eq!(client.events_url(), "http://10.0.0.2:7175/fleet/events");
    }
}
