//! Error types shared across source adapters.

use thiserror::Error;

/// Failure modes an adapter can hit, none of which ever propagate past the
/// adapter's own task: every one is logged and surfaced as a
/// `source.state_changed` envelope instead.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The upstream connection could not be established or was lost.
    #[error("connection lost: {detail}")]
    ConnectionLost {
        /// Human-readable detail for logs and the state-change envelope.
        detail: String,
    },
    /// A push message arrived but could not be parsed into a known shape.
    #[error("invalid message: {detail}")]
    InvalidMessage {
        /// Human-readable detail for logs.
        detail: String,
    },
    /// A binary frame failed header validation and was dropped.
    #[error("invalid frame: {detail}")]
    InvalidFrame {
        /// Human-readable detail for logs.
        detail: String,
    },
    /// Reconnection was abandoned after exhausting the retry budget.
    #[error("reconnect attempts exhausted")]
    ReconnectExhausted,
}

/// Result type returned by adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
