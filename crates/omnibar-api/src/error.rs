//! Error types for binding/serving the HTTP surface and for its handlers.

use std::net::SocketAddr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use omnibar_fleet::FleetError;
use omnibar_supervisor::SupervisorError;
use serde::Serialize;
use thiserror::Error;

/// Result alias for API server bootstrap/serve operations.
pub type ApiServerResult<T> = Result<T, ApiServerError>;

/// Errors raised while binding or serving the HTTP listener.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// Binding the listener failed.
    #[error("failed to bind api listener on {addr}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Serving connections failed.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Structured error body returned by the plain HTTP surface.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

/// Error type for `/healthz`, `/metrics`, and the `/fleet/*` HTTP surface.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Self {
        Self { status, code, detail: detail.into() }
    }

    /// An unexpected internal failure.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", detail)
    }

    /// The requested process or node does not exist.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", detail)
    }

    /// Translate a supervisor failure into the matching HTTP status.
    #[must_use]
    pub fn from_supervisor(err: SupervisorError) -> Self {
        let status = match &err {
            SupervisorError::NotFound { .. } => StatusCode::NOT_FOUND,
            SupervisorError::AlreadyExists { .. }
            | SupervisorError::Busy { .. }
            | SupervisorError::InvalidTransition { .. }
            | SupervisorError::PortInUse { .. } => StatusCode::CONFLICT,
            SupervisorError::SpawnFailed { .. } | SupervisorError::Publish { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.code(), err.to_string())
    }

    /// Translate a fleet routing failure into the matching HTTP status.
    #[must_use]
    pub fn from_fleet(err: FleetError) -> Self {
        if let FleetError::Local { source } = err {
            return Self::from_supervisor(source);
        }
        let status = match &err {
            FleetError::UnknownNode { .. } => StatusCode::NOT_FOUND,
            FleetError::Timeout { .. } | FleetError::NodeUnreachable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            FleetError::RemoteError { .. } | FleetError::Decode { .. } => StatusCode::BAD_GATEWAY,
            FleetError::Local { .. } => unreachable!(),
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { code: self.code, detail: self.detail })).into_response()
    }
}
