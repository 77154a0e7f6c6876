//! Process-config file loading, validation, and SIGHUP-triggered reload.
//!
//! # Design
//! - One `ProcessConfigService` per node, holding the current snapshot behind
//!   a `RwLock` so readers never block on a reload in progress.
//! - Reload is triggered either explicitly (`reload`) or by a background
//!   task that listens for `SIGHUP` (`watch_for_reload`): load at startup,
//!   reload without a restart on signal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::model::ProcessConfigMap;
use crate::validate::validate_process_config;

/// Loads and holds the current process-config snapshot for one node.
#[derive(Debug)]
pub struct ProcessConfigService {
    path: PathBuf,
    current: RwLock<ProcessConfigMap>,
}

impl ProcessConfigService {
    /// Load the process-config file at `path`, validating every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// contains an entry that fails validation.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let map = read_and_validate(&path).await?;
        Ok(Self {
            path,
            current: RwLock::new(map),
        })
    }

    /// Current process-config snapshot.
    pub async fn snapshot(&self) -> ProcessConfigMap {
        self.current.read().await.clone()
    }

    /// Re-read and re-validate the file, replacing the snapshot on success.
    /// The previous snapshot is left untouched if the reload fails, so a
    /// malformed edit never takes down already-running supervision.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// contains an entry that fails validation.
    pub async fn reload(&self) -> Result<(), ConfigError> {
        let map = read_and_validate(&self.path).await?;
        let mut current = self.current.write().await;
        *current = map;
        Ok(())
    }

    /// Spawn a background task that reloads the config on every `SIGHUP`.
    /// Runs until the process exits; reload failures are logged and do not
    /// affect the currently loaded snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the `SIGHUP` signal handler cannot be installed.
    pub fn watch_for_reload(self: Arc<Self>) -> Result<tokio::task::JoinHandle<()>, ConfigError> {
        let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            .map_err(|source| ConfigError::SignalInstall { source })?;
        let handle = tokio::spawn(async move {
            while stream.recv().await.is_some() {
                match self.reload().await {
                    Ok(()) => info!(path = %self.path.display(), "reloaded process config"),
                    Err(err) => warn!(path = %self.path.display(), error = %err, "process config reload failed, keeping previous snapshot"),
                }
            }
        });
        Ok(handle)
    }
}

async fn read_and_validate(path: &Path) -> Result<ProcessConfigMap, ConfigError> {
    let contents =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
    let map: HashMap<String, _> =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    validate_process_config(&map)?;
    Ok(map)
}
