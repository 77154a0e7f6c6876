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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Interrupt stack, ticker rotator, and the active-alert algorithm that
//! decides what is on screen at any instant.
//!
//! Layout: `alert.rs` (types), `stack.rs` (interrupt stack), `ticker.rs`
//! (rotation), `algorithm.rs` (pure active-alert decision), `policy.rs`
//! (event-to-alert tuning), `state.rs` (the published snapshot),
//! `service.rs` (the owning task and its event-bus wiring).

mod algorithm;
mod alert;
mod error;
mod policy;
mod service;
mod stack;
mod state;
mod ticker;

pub use algorithm::{active_alert, build_stream_state, ActiveAlert};
pub use alert::{
    Alert, AlertKind, PriorityLevel, ALERT_PRIORITY_FLOOR, SUB_TRAIN_PRIORITY_FLOOR,
    SUB_TRAIN_TTL_MS, TICKER_PRIORITY,
};
pub use error::{OrchestratorError, OrchestratorResult};
pub use policy::AlertPolicy;
pub use service::StreamOrchestrator;
pub use stack::{InterruptStack, OVERFLOW_TARGET, OVERFLOW_THRESHOLD};
pub use state::StreamState;
pub use ticker::TickerRotator;
