#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Stream Channel WebSocket surface, fleet RPC surface, and the ambient
//! health/metrics endpoints that together make up one node's HTTP server.
//!
//! Layout: `protocol.rs` (wire types), `state.rs` (shared application
//! state), `ws.rs` (`/socket` and `/control`), `fleet_http.rs` (`/fleet/*`),
//! `health.rs` (`/healthz`, `/metrics`), `telemetry.rs` (request metrics
//! middleware), `error.rs` (bootstrap and handler error types), `router.rs`
//! (ties it all together into an [`ApiServer`]).

mod constants;
mod error;
mod fleet_http;
mod health;
mod protocol;
mod router;
mod state;
mod telemetry;
mod ws;

pub use constants::{CONTROL_SOCKET_PATH, OVERLAY_SOCKET_PATH};
pub use error::{ApiError, ApiServerError, ApiServerResult, ErrorBody};
pub use protocol::{ClientMessage, ServerMessage, StreamStateWire};
pub use router::ApiServer;
pub use state::ApiState;
