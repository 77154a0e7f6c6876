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

//! Process-config file and environment configuration for the stream
//! orchestrator.
//!
//! Layout: `defaults.rs` (constants), `env.rs` (environment variables),
//! `model.rs` (process-config and show-mapping types), `validate.rs`
//! (entry validation), `loader.rs` (file loading and `SIGHUP` reload).

mod defaults;
mod env;
mod error;
mod loader;
mod model;
mod validate;

pub use defaults::{
    DEFAULT_CONFIG_FILE, DEFAULT_GRACEFUL_TIMEOUT_MS, DEFAULT_MAX_RESTARTS,
    DEFAULT_RESTART_WINDOW_S, DEFAULT_SERVER_PORT, DEFAULT_SHOW, DEFAULT_TCP_PORT,
};
pub use env::EnvConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::ProcessConfigService;
pub use model::{HealthCheckSpec, ProcessConfigEntry, ProcessConfigMap, ShowMapping};
pub use validate::validate_process_config;
