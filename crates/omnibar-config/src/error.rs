//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set or could not be parsed.
    #[error("invalid environment variable")]
    InvalidEnv {
        /// Name of the offending environment variable.
        name: &'static str,
        /// Raw value that failed to parse, when available.
        value: Option<String>,
    },
    /// The process-config file could not be read.
    #[error("failed to read process config file")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The process-config file was not valid JSON.
    #[error("failed to parse process config file")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// A process-config entry failed validation.
    #[error("invalid process config entry")]
    InvalidEntry {
        /// Process id the entry belongs to.
        process_id: String,
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Installing the SIGHUP reload handler failed.
    #[error("failed to install reload signal handler")]
    SignalInstall {
        /// Underlying IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
