//! Typed configuration models loaded from the process-config file and the
//! environment.
//!
//! # Design
//! - Pure data carriers used by the loader and the supervisor/orchestrator.
//! - Keeps domain types separate from IO/wiring code in `loader.rs`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_GRACEFUL_TIMEOUT_MS, DEFAULT_MAX_RESTARTS, DEFAULT_RESTART_WINDOW_S};

/// One entry in the process-config file: the launch inputs and restart
/// policy for a single supervised process, keyed by its `id` in the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfigEntry {
    /// Executable to launch.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Environment variables set for the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether the supervisor restarts the process on unexpected exit.
    #[serde(default)]
    pub auto_restart: bool,
    /// Restart cap within `restart_window_s`.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Sliding window, in seconds, over which `max_restarts` is enforced.
    #[serde(default = "default_restart_window_s")]
    pub restart_window_s: u64,
    /// Optional health check polled once the process is running.
    #[serde(default)]
    pub health_check: Option<HealthCheckSpec>,
    /// Explicit ports this process binds, used for the pre-flight
    /// port-conflict check when `env.PORT` and `health_check` don't name one.
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Grace period, in milliseconds, between a graceful termination signal
    /// and the forced kill signal.
    #[serde(default = "default_graceful_timeout_ms")]
    pub graceful_timeout_ms: u64,
}

const fn default_max_restarts() -> u32 {
    DEFAULT_MAX_RESTARTS
}

const fn default_restart_window_s() -> u64 {
    DEFAULT_RESTART_WINDOW_S
}

const fn default_graceful_timeout_ms() -> u64 {
    DEFAULT_GRACEFUL_TIMEOUT_MS
}

/// Health check configuration for a supervised process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthCheckSpec {
    /// No health check; `health_state` stays `unknown`.
    None,
    /// Poll `url` with GET; 2xx is success.
    Http {
        /// URL polled on each tick.
        url: String,
        /// Tick interval, in seconds.
        interval_s: u64,
        /// Per-request timeout, in seconds.
        timeout_s: u64,
    },
    /// Attempt a TCP connect to `host:port`; a completed handshake is success.
    Tcp {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Tick interval, in seconds.
        interval_s: u64,
        /// Per-attempt timeout, in seconds.
        timeout_s: u64,
    },
}

/// The full process-config file: a map from process id to its entry.
pub type ProcessConfigMap = HashMap<String, ProcessConfigEntry>;

/// Game-id → show-name mapping, loaded once at startup and updated by
/// `meta.game_changed` envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowMapping {
    /// Mapping from platform game id to show name.
    #[serde(default)]
    pub games: HashMap<u64, String>,
    /// Show name used when the current game id has no entry.
    #[serde(default = "default_show")]
    pub default_show: String,
}

fn default_show() -> String {
    crate::defaults::DEFAULT_SHOW.to_string()
}

impl Default for ShowMapping {
    fn default() -> Self {
        Self {
            games: HashMap::new(),
            default_show: default_show(),
        }
    }
}

impl ShowMapping {
    /// Resolve the current show for a game id, falling back to the default.
    #[must_use]
    pub fn show_for(&self, game_id: u64) -> &str {
        self.games
            .get(&game_id)
            .map_or(self.default_show.as_str(), String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_mapping_falls_back_to_default() {
        let mut mapping = ShowMapping::default();
        mapping.games.insert(13332, "ironmon".to_string());

        assert_eq!(mapping.show_for(13332), "ironmon");
        assert_eq!(mapping.show_for(999), "variety");
    }

    #[test]
    fn process_config_entry_applies_defaults() {
        let json = serde_json::json!({ "command": "obs" });
        let entry: ProcessConfigEntry = serde_json::from_value(json).expect("parse");
        assert!(entry.args.is_empty());
        assert!(!entry.auto_restart);
        assert_eq!(entry.max_restarts, DEFAULT_MAX_RESTARTS);
        assert_eq!(entry.restart_window_s, DEFAULT_RESTART_WINDOW_S);
        assert!(entry.health_check.is_none());
    }

    #[test]
    fn health_check_spec_tags_by_kind() {
        let http = serde_json::json!({
            "kind": "http",
            "url": "http://localhost:4455",
            "interval_s": 10,
            "timeout_s": 2
        });
        let parsed: HealthCheckSpec = serde_json::from_value(http).expect("parse");
        assert!(matches!(parsed, HealthCheckSpec::Http { .. }));
    }
}
