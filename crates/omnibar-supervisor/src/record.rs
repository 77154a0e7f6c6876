//! Process Record types: lifecycle state, health state, and the read-only
//! view returned by `status`/`list`.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised process.
///
/// ```text
///      ┌──────────┐  start  ┌──────────┐  healthy  ┌──────────┐
///      │ stopped  ├────────▶│ starting ├──────────▶│ running  │
///      └──────────┘         └──────────┘           └────┬─────┘
///          ▲                      │ spawn fail          │ exit
///          │                      ▼                     ▼
///          │                 ┌──────────┐          ┌──────────┐
///          │remove           │  failed  │◀─────────┤ stopping │
///          │                 └────┬─────┘  SIGKILL └──────────┘
///          │                      │ policy: auto_restart?
///          │                      ▼
///          │                 ┌──────────┐ timer ┌──────────┐
///          └─────────────────┤ backoff  ├──────▶│ starting │
///                            └──────────┘       └──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Not running; no monitor task exists.
    Stopped,
    /// Spawn requested; in the settle window, pid not yet confirmed stable.
    Starting,
    /// Spawned and past its settle window.
    Running,
    /// Graceful termination requested; awaiting observed exit.
    Stopping,
    /// Exited unexpectedly and the restart policy gave up (or is not set).
    Failed,
    /// Exited unexpectedly with restarts remaining; waiting out a backoff timer.
    Backoff,
}

/// Health-check result for a process with `health_check` configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// No health check configured, or no result observed yet.
    Unknown,
    /// Most recent checks (after hysteresis) succeeded.
    Healthy,
    /// Two or more consecutive checks failed.
    Unhealthy,
}

/// Read-only snapshot of one supervised process, returned by
/// `status`/`list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Stable identifier for the process, as keyed in the process-config map.
    pub process_id: String,
    /// Current lifecycle state.
    pub state: ProcessState,
    /// Current health-check state.
    pub health_state: HealthState,
    /// OS process id, when running or starting.
    pub pid: Option<u32>,
    /// Restarts recorded within the current sliding window.
    pub restarts_in_window: u32,
}
