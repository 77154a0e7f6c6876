//! Default ports, paths, and timing constants.
//!
//! # Design
//! - Centralize defaults so environment parsing and the CLI agree on them.

/// Default overlay/dashboard WebSocket port.
pub const DEFAULT_SERVER_PORT: u16 = 7175;
/// Default IronMON telemetry TCP port.
pub const DEFAULT_TCP_PORT: u16 = 8080;
/// Default path to the process-config file.
pub const DEFAULT_CONFIG_FILE: &str = "omnibar.config.json";
/// Default show when no game-id mapping matches.
pub const DEFAULT_SHOW: &str = "variety";
/// Default graceful-termination timeout before a supervised process is killed.
pub const DEFAULT_GRACEFUL_TIMEOUT_MS: u64 = 5_000;
/// Default restart-storm sliding window, in seconds.
pub const DEFAULT_RESTART_WINDOW_S: u64 = 60;
/// Default restart cap within the sliding window.
pub const DEFAULT_MAX_RESTARTS: u32 = 5;
