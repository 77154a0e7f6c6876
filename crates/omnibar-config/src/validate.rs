//! Validation for process-config entries loaded from disk.

use crate::error::ConfigError;
use crate::model::{HealthCheckSpec, ProcessConfigEntry, ProcessConfigMap};

/// Validate every entry in a loaded process-config map.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidEntry`] encountered.
pub fn validate_process_config(map: &ProcessConfigMap) -> Result<(), ConfigError> {
    for (process_id, entry) in map {
        validate_entry(process_id, entry)?;
    }
    Ok(())
}

fn validate_entry(process_id: &str, entry: &ProcessConfigEntry) -> Result<(), ConfigError> {
    if entry.command.trim().is_empty() {
        return Err(ConfigError::InvalidEntry {
            process_id: process_id.to_string(),
            field: "command",
            reason: "must not be empty",
        });
    }
    if entry.restart_window_s == 0 {
        return Err(ConfigError::InvalidEntry {
            process_id: process_id.to_string(),
            field: "restart_window_s",
            reason: "must be greater than zero",
        });
    }
    if let Some(health_check) = &entry.health_check {
        validate_health_check(process_id, health_check)?;
    }
    Ok(())
}

fn validate_health_check(process_id: &str, spec: &HealthCheckSpec) -> Result<(), ConfigError> {
    let (interval_s, timeout_s) = match spec {
        HealthCheckSpec::None => return Ok(()),
        HealthCheckSpec::Http {
            interval_s,
            timeout_s,
            ..
        }
        | HealthCheckSpec::Tcp {
            interval_s,
            timeout_s,
            ..
        } => (*interval_s, *timeout_s),
    };
    if interval_s == 0 {
        return Err(ConfigError::InvalidEntry {
            process_id: process_id.to_string(),
            field: "health_check.interval_s",
            reason: "must be greater than zero",
        });
    }
    if timeout_s == 0 || timeout_s > interval_s {
        return Err(ConfigError::InvalidEntry {
            process_id: process_id.to_string(),
            field: "health_check.timeout_s",
            reason: "must be greater than zero and not exceed interval_s",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(command: &str) -> ProcessConfigEntry {
        ProcessConfigEntry {
            command: command.to_string(),
            args: vec![],
            cwd: None,
            env: HashMap::new(),
            auto_restart: false,
            max_restarts: 5,
            restart_window_s: 60,
            health_check: None,
            ports: vec![],
            graceful_timeout_ms: 5_000,
        }
    }

    #[test]
    fn rejects_empty_command() {
        let mut map = HashMap::new();
        map.insert("obs".to_string(), entry(""));
        let err = validate_process_config(&map).expect_err("should reject empty command");
        assert!(matches!(
            err,
            ConfigError::InvalidEntry { field: "command", .. }
        ));
    }

    #[test]
    fn rejects_zero_restart_window() {
        let mut map = HashMap::new();
        let mut process = entry("obs");
        process.restart_window_s = 0;
        map.insert("obs".to_string(), process);
        let err = validate_process_config(&map).expect_err("should reject zero window");
        assert!(matches!(
            err,
            ConfigError::InvalidEntry {
                field: "restart_window_s",
                ..
            }
        ));
    }

    #[test]
    fn rejects_timeout_exceeding_interval() {
        let mut map = HashMap::new();
        let mut process = entry("obs");
        process.health_check = Some(HealthCheckSpec::Http {
            url: "http://localhost".to_string(),
            interval_s: 5,
            timeout_s: 10,
        });
        map.insert("obs".to_string(), process);
        let err = validate_process_config(&map).expect_err("should reject bad timeout");
        assert!(matches!(
            err,
            ConfigError::InvalidEntry {
                field: "health_check.timeout_s",
                ..
            }
        ));
    }

    #[test]
    fn accepts_well_formed_entry() {
        let mut map = HashMap::new();
        map.insert("obs".to_string(), entry("obs"));
        assert!(validate_process_config(&map).is_ok());
    }
}
