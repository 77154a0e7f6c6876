//! # Design
//!
//! - Centralize application-level errors for bootstrap and shutdown.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration was missing or unparseable.
    #[error("invalid environment configuration")]
    Env {
        /// Source configuration error.
        #[source]
        source: omnibar_config::ConfigError,
    },
    /// Loading or reloading the process-config file failed.
    #[error("process config operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        #[source]
        source: omnibar_config::ConfigError,
    },
    /// Registering a configured process with the supervisor failed.
    #[error("failed to register supervised process {process_id}")]
    Supervisor {
        /// Process id that failed to register.
        process_id: String,
        /// Source supervisor error.
        #[source]
        source: omnibar_supervisor::SupervisorError,
    },
    /// Telemetry initialization failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        #[source]
        source: omnibar_telemetry::TelemetryError,
    },
    /// The IronMON telemetry TCP listener could not bind.
    #[error("failed to bind game telemetry listener")]
    GameTelemetryBind {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The API server failed to bind or serve.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        #[source]
        source: omnibar_api::ApiServerError,
    },
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_carries_its_field_and_reason() {
        let err = AppError::InvalidConfig {
            field: "server_port",
            reason: "zero",
            value: Some("0".to_string()),
        };
        assert!(matches!(err, AppError::InvalidConfig { field: "server_port", reason: "zero", .. }));
    }

    #[test]
    fn supervisor_error_wraps_the_failing_process_id() {
        let err = AppError::Supervisor {
            process_id: "obs".to_string(),
            source: omnibar_supervisor::SupervisorError::AlreadyExists { process_id: "obs".to_string() },
        };
        assert!(err.to_string().contains("obs"));
    }
}
