//! Error types for fleet RPC and routing.

use thiserror::Error;

/// Failure modes for a single cross-node RPC.
#[derive(Debug, Error)]
pub enum FleetError {
    /// The target node id is not a known peer and is not this node.
    #[error("unknown node")]
    UnknownNode {
        /// Node id that was not found among the configured peers.
        node_id: String,
    },
    /// The peer did not respond before the RPC deadline.
    #[error("request to node timed out")]
    Timeout {
        /// Node id the request was addressed to.
        node_id: String,
    },
    /// The peer could not be reached at all (connection refused, DNS, TLS).
    #[error("node unreachable")]
    NodeUnreachable {
        /// Node id the request was addressed to.
        node_id: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The peer responded with a non-success status.
    #[error("node returned an error response")]
    RemoteError {
        /// Node id that returned the error.
        node_id: String,
        /// HTTP status code returned.
        status: u16,
    },
    /// The peer's response body could not be decoded.
    #[error("failed to decode node response")]
    Decode {
        /// Node id whose response failed to decode.
        node_id: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
    /// The local supervisor rejected a same-node command.
    #[error("local supervisor rejected the command")]
    Local {
        /// Underlying supervisor error.
        #[source]
        source: omnibar_supervisor::SupervisorError,
    },
}

impl FleetError {
    /// Machine-readable error code surfaced to dashboard clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownNode { .. } => "unknown_node",
            Self::Timeout { .. } => "timeout",
            Self::NodeUnreachable { .. } => "node_unreachable",
            Self::RemoteError { .. } => "remote_error",
            Self::Decode { .. } => "decode_error",
            Self::Local { .. } => "local_error",
        }
    }
}

/// Convenience alias for fleet results.
pub type FleetResult<T> = Result<T, FleetError>;
