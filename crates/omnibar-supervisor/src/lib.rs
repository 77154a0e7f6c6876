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

//! Process Supervisor: a per-node state machine over supervised OS
//! processes, with restart-storm protection, pre-flight port-conflict
//! checks, and per-process HTTP/TCP health-check tickers.

mod error;
mod health;
mod monitor;
mod port_check;
mod record;
mod restart;
mod service;

pub use error::{SupervisorError, SupervisorResult};
pub use health::HealthHandle;
pub use monitor::{MonitorEvent, MonitorHandle, MonitorReport};
pub use port_check::{declared_port, port_in_use};
pub use record::{HealthState, ProcessRecord, ProcessState};
pub use restart::{MAX_BACKOFF_MS, RestartDecision, RestartWindow, backoff_delay, decide};
pub use service::ProcessSupervisor;
