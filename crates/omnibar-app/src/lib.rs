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

//! Binary entrypoint wiring the stream orchestrator, process supervisor,
//! fleet router, source adapters, and Stream Channel API together.
//!
//! Layout: `bootstrap.rs` (dependency construction, boot sequence,
//! graceful shutdown), `error.rs` (application-level error type).

mod bootstrap;
mod error;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
