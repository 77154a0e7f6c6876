//! Error types for Process Supervisor operations.

use std::io;

use thiserror::Error;

use crate::record::ProcessState;

/// Primary error type for supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `add` was called with an id already present in the process map.
    #[error("process already exists")]
    AlreadyExists {
        /// Duplicate process id.
        process_id: String,
    },
    /// An operation referenced a process id not present in the map.
    #[error("process not found")]
    NotFound {
        /// Missing process id.
        process_id: String,
    },
    /// `remove` was called while the process was not `stopped`/`failed`.
    #[error("process is busy")]
    Busy {
        /// Process id that cannot be removed yet.
        process_id: String,
        /// Lifecycle state blocking the removal.
        state: ProcessState,
    },
    /// `start` was called from a state other than `stopped`/`failed`.
    #[error("invalid state transition")]
    InvalidTransition {
        /// Process id the transition was attempted on.
        process_id: String,
        /// Operation attempted.
        operation: &'static str,
        /// Lifecycle state the process was actually in.
        state: ProcessState,
    },
    /// The pre-flight port-conflict check found the declared port already bound.
    #[error("port already in use")]
    PortInUse {
        /// Process id that declared the conflicting port.
        process_id: String,
        /// Port already bound by another process.
        port: u16,
    },
    /// `tokio::process::Command::spawn` failed.
    #[error("failed to spawn process")]
    SpawnFailed {
        /// Process id that failed to spawn.
        process_id: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Publishing a derived event (`process.state_changed`, ...) failed.
    #[error("failed to publish supervisor event")]
    Publish {
        /// Underlying event bus error.
        #[source]
        source: omnibar_events::EventBusError,
    },
}

impl SupervisorError {
    /// Machine-readable error code surfaced to the Fleet Router and dashboard.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotFound { .. } => "not_found",
            Self::Busy { .. } => "busy",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PortInUse { .. } => "port_in_use",
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::Publish { .. } => "publish_failed",
        }
    }
}

/// Convenience alias for supervisor results.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
