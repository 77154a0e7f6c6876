//! Environment-derived runtime configuration.
//!
//! # Design
//! - Every recognized variable has a default; unset and unrecognized
//!   variables never fail startup.

use crate::defaults::{DEFAULT_CONFIG_FILE, DEFAULT_SERVER_PORT, DEFAULT_TCP_PORT};
use crate::error::ConfigError;

/// Runtime configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    /// Port the overlay/dashboard WebSocket server binds.
    pub server_port: u16,
    /// Port the IronMON-style telemetry TCP listener binds.
    pub tcp_port: u16,
    /// Identifier for this node, used in fleet routing and logs.
    pub node_id: String,
    /// Addresses of peer nodes to aggregate over in the fleet router.
    pub cluster_peers: Vec<String>,
    /// `tracing`/`EnvFilter` directive string.
    pub log_level: Option<String>,
    /// Path to the process-config file.
    pub config_file: String,
}

impl EnvConfig {
    /// Read runtime configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized variable is set but cannot be
    /// parsed into its expected type.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|name| std::env::var(name).ok())
    }

    /// Read runtime configuration from an arbitrary lookup function.
    /// Exposed separately from [`Self::from_env`] so tests can supply a
    /// fixed environment without mutating the process's real one.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized variable is set but cannot be
    /// parsed into its expected type.
    pub fn from_reader(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let server_port = parse_port(&lookup, "SERVER_PORT", DEFAULT_SERVER_PORT)?;
        let tcp_port = parse_port(&lookup, "TCP_PORT", DEFAULT_TCP_PORT)?;
        let node_id = lookup("NODE_ID").unwrap_or_else(|| "local".to_string());
        let cluster_peers = lookup("CLUSTER_PEERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let log_level = lookup("LOG_LEVEL");
        let config_file = lookup("CONFIG_FILE").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        Ok(Self {
            server_port,
            tcp_port,
            node_id,
            cluster_peers,
            log_level,
            config_file,
        })
    }
}

fn parse_port(
    lookup: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidEnv {
            name,
            value: Some(value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = EnvConfig::from_reader(env_of(&[])).expect("parse env");
        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
        assert_eq!(config.tcp_port, DEFAULT_TCP_PORT);
        assert_eq!(config.node_id, "local");
        assert!(config.cluster_peers.is_empty());
        assert_eq!(config.config_file, DEFAULT_CONFIG_FILE);
    }

    #[test]
    fn parses_cluster_peers_as_comma_list() {
        let config = EnvConfig::from_reader(env_of(&[(
            "CLUSTER_PEERS",
            "10.0.0.1:7175, 10.0.0.2:7175,",
        )]))
        .expect("parse env");
        assert_eq!(
            config.cluster_peers,
            vec!["10.0.0.1:7175".to_string(), "10.0.0.2:7175".to_string()]
        );
    }

    #[test]
    fn rejects_unparseable_port() {
        let err = EnvConfig::from_reader(env_of(&[("SERVER_PORT", "not-a-port")]))
            .expect_err("should reject bad port");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "SERVER_PORT",
                ..
            }
        ));
    }

    #[test]
    fn unknown_variables_are_ignored() {
        let config = EnvConfig::from_reader(env_of(&[("SOME_OTHER_VAR", "whatever")]))
            .expect("parse env");
        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
    }
}
