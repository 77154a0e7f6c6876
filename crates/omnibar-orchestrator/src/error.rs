//! Error types for the interrupt-stack/ticker/layer orchestrator.

use thiserror::Error;

/// Primary error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Publishing a derived event (`stream.state`, `alert.expired`, ...) failed.
    #[error("failed to publish orchestrator event")]
    Publish {
        /// Underlying event bus error.
        #[source]
        source: omnibar_events::EventBusError,
    },
}

/// Convenience alias for orchestrator results.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
