//! `ProcessSupervisor`: the per-node state machine owning every supervised
//! process's record, restart policy, and health ticker.
//!
//! A single `Mutex`-guarded map owns every process record; all state
//! transitions funnel through a reaper task reading a report channel rather
//! than being applied directly by callers, keeping the lock's critical
//! sections short.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use omnibar_config::{HealthCheckSpec, ProcessConfigEntry};
use omnibar_events::{Event, EventBus};
use omnibar_telemetry::Metrics;
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::error::{SupervisorError, SupervisorResult};
use crate::health::{self, HealthHandle};
use crate::monitor::{self, MonitorEvent, MonitorHandle, MonitorReport};
use crate::port_check;
use crate::record::{HealthState, ProcessRecord, ProcessState};
use crate::restart::{self, RestartDecision, RestartWindow};

/// Settle window between a successful spawn and the `starting -> running`
/// transition. An unexpected exit inside this window is reported the same
/// as any other unexpected exit, just without having observed `running`.
const SETTLE_WINDOW: Duration = Duration::from_millis(500);

struct ManagedProcess {
    entry: ProcessConfigEntry,
    state: ProcessState,
    pid: Option<u32>,
    restart_window: RestartWindow,
    control: Option<MonitorHandle>,
    health: Option<HealthHandle>,
}

impl ManagedProcess {
    fn new(entry: ProcessConfigEntry) -> Self {
        Self {
            entry,
            state: ProcessState::Stopped,
            pid: None,
            restart_window: RestartWindow::new(),
            control: None,
            health: None,
        }
    }

    fn health_state(&self) -> HealthState {
        self.health.as_ref().map_or(HealthState::Unknown, HealthHandle::current)
    }

    fn record(&mut self, process_id: &str) -> ProcessRecord {
        let restarts_in_window = self.restart_window.prune_and_count(Utc::now(), self.entry.restart_window_s);
        ProcessRecord {
            process_id: process_id.to_string(),
            state: self.state,
            health_state: self.health_state(),
            pid: self.pid,
            restarts_in_window: u32::try_from(restarts_in_window).unwrap_or(u32::MAX),
        }
    }
}

/// Per-node process supervisor.
pub struct ProcessSupervisor {
    node_id: String,
    processes: Mutex<HashMap<String, ManagedProcess>>,
    events: EventBus,
    metrics: Metrics,
    reports_tx: mpsc::UnboundedSender<MonitorReport>,
}

impl ProcessSupervisor {
    /// Construct a supervisor and start its reaper task.
    #[must_use]
    pub fn new(node_id: impl Into<String>, events: EventBus, metrics: Metrics) -> Arc<Self> {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(Self {
            node_id: node_id.into(),
            processes: Mutex::new(HashMap::new()),
            events,
            metrics,
            reports_tx,
        });
        tokio::spawn(Arc::clone(&supervisor).run_reaper(reports_rx));
        supervisor
    }

    /// Node identifier this supervisor advertises (e.g. `server@zelan`).
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Register a process definition. Fails `already_exists` on duplicate id.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyExists`] if `process_id` is already registered.
    pub async fn add(&self, process_id: impl Into<String>, entry: ProcessConfigEntry) -> SupervisorResult<()> {
        let process_id = process_id.into();
        let mut processes = self.processes.lock().await;
        if processes.contains_key(&process_id) {
            return Err(SupervisorError::AlreadyExists { process_id });
        }
        processes.insert(process_id, ManagedProcess::new(entry));
        Ok(())
    }

    /// Start a stopped or failed process.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFound`], [`SupervisorError::InvalidTransition`],
    /// [`SupervisorError::PortInUse`], or [`SupervisorError::SpawnFailed`].
    pub async fn start(self: &Arc<Self>, process_id: &str) -> SupervisorResult<()> {
        self.begin_spawn(process_id, &[ProcessState::Stopped, ProcessState::Failed], "start")
            .await
    }

    /// Stop a running, starting, or backing-off process. Idempotent: stopping
    /// an already-stopped process is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFound`] if `process_id` is unregistered.
    pub async fn stop(&self, process_id: &str) -> SupervisorResult<()> {
        let (control, already_stopped) = {
            let mut processes = self.processes.lock().await;
            let managed = processes
                .get_mut(process_id)
                .ok_or_else(|| SupervisorError::NotFound { process_id: process_id.to_string() })?;
            match managed.state {
                ProcessState::Stopped | ProcessState::Failed => (None, true),
                _ => {
                    managed.state = ProcessState::Stopping;
                    (managed.control.clone(), false)
                }
            }
        };
        if already_stopped {
            return Ok(());
        }
        self.emit_state_changed(process_id, ProcessState::Stopping);
        if let Some(control) = control {
            control.stop().await;
        }
        Ok(())
    }

    /// Remove a stopped or failed process definition.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFound`] if unregistered, or
    /// [`SupervisorError::Busy`] if the process has not reached a terminal state.
    pub async fn remove(&self, process_id: &str) -> SupervisorResult<()> {
        let mut processes = self.processes.lock().await;
        let managed = processes
            .get(process_id)
            .ok_or_else(|| SupervisorError::NotFound { process_id: process_id.to_string() })?;
        match managed.state {
            ProcessState::Stopped | ProcessState::Failed => {
                processes.remove(process_id);
                Ok(())
            }
            state => Err(SupervisorError::Busy { process_id: process_id.to_string(), state }),
        }
    }

    /// Read the current record for one process.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFound`] if unregistered.
    pub async fn status(&self, process_id: &str) -> SupervisorResult<ProcessRecord> {
        let mut processes = self.processes.lock().await;
        processes
            .get_mut(process_id)
            .map(|managed| managed.record(process_id))
            .ok_or_else(|| SupervisorError::NotFound { process_id: process_id.to_string() })
    }

    /// Read every registered process's current record.
    pub async fn list(&self) -> Vec<ProcessRecord> {
        let mut processes = self.processes.lock().await;
        processes.iter_mut().map(|(id, managed)| managed.record(id)).collect()
    }

    /// Read the config entries for processes currently `running`.
    pub async fn list_running_with_config(&self) -> Vec<(String, ProcessConfigEntry)> {
        let processes = self.processes.lock().await;
        processes
            .iter()
            .filter(|(_, managed)| managed.state == ProcessState::Running)
            .map(|(id, managed)| (id.clone(), managed.entry.clone()))
            .collect()
    }

    async fn begin_spawn(
        self: &Arc<Self>,
        process_id: &str,
        allowed_states: &[ProcessState],
        operation: &'static str,
    ) -> SupervisorResult<()> {
        let entry = {
            let mut processes = self.processes.lock().await;
            let managed = processes
                .get_mut(process_id)
                .ok_or_else(|| SupervisorError::NotFound { process_id: process_id.to_string() })?;
            if !allowed_states.contains(&managed.state) {
                return Err(SupervisorError::InvalidTransition {
                    process_id: process_id.to_string(),
                    operation,
                    state: managed.state,
                });
            }
            managed.state = ProcessState::Starting;
            managed.entry.clone()
        };
        self.emit_state_changed(process_id, ProcessState::Starting);

        if let Some(port) = port_check::declared_port(&entry) {
            if port_check::port_in_use(port).await {
                self.mark_failed(process_id).await;
                return Err(SupervisorError::PortInUse { process_id: process_id.to_string(), port });
            }
        }

        let mut command = Command::new(&entry.command);
        command.args(&entry.args);
        if let Some(cwd) = &entry.cwd {
            command.current_dir(cwd);
        }
        command.envs(&entry.env);
        command.kill_on_drop(true);

        match command.spawn() {
            Err(source) => {
                self.mark_failed(process_id).await;
                Err(SupervisorError::SpawnFailed { process_id: process_id.to_string(), source })
            }
            Ok(child) => {
                let pid = child.id();
                let control = monitor::spawn_monitor(
                    process_id.to_string(),
                    child,
                    SETTLE_WINDOW,
                    Duration::from_millis(entry.graceful_timeout_ms),
                    self.reports_tx.clone(),
                );
                let health_handle = match &entry.health_check {
                    Some(spec @ (HealthCheckSpec::Http { .. } | HealthCheckSpec::Tcp { .. })) => Some(
                        health::spawn_health_ticker(
                            process_id.to_string(),
                            self.node_id.clone(),
                            spec.clone(),
                            self.events.clone(),
                            self.metrics.clone(),
                        ),
                    ),
                    _ => None,
                };

                let mut processes = self.processes.lock().await;
                if let Some(managed) = processes.get_mut(process_id) {
                    managed.pid = pid;
                    managed.control = Some(control);
                    managed.health = health_handle;
                } else {
                    // Removed mid-flight: tear the freshly spawned process back down.
                    if let Some(handle) = health_handle {
                        handle.cancel();
                    }
                }
                Ok(())
            }
        }
    }

    async fn mark_failed(&self, process_id: &str) {
        let mut processes = self.processes.lock().await;
        if let Some(managed) = processes.get_mut(process_id) {
            managed.state = ProcessState::Failed;
        }
        drop(processes);
        self.emit_state_changed(process_id, ProcessState::Failed);
    }

    async fn run_reaper(self: Arc<Self>, mut reports: mpsc::UnboundedReceiver<MonitorReport>) {
        while let Some(report) = reports.recv().await {
            match report.event {
                MonitorEvent::Settled => self.handle_settled(&report.process_id).await,
                MonitorEvent::ExitedUnexpectedly { code, .. } => {
                    self.handle_unexpected_exit(&report.process_id, code).await;
                }
                MonitorEvent::StoppedByRequest => self.handle_stopped(&report.process_id).await,
            }
        }
    }

    async fn handle_settled(&self, process_id: &str) {
        let transitioned = {
            let mut processes = self.processes.lock().await;
            match processes.get_mut(process_id) {
                Some(managed) if managed.state == ProcessState::Starting => {
                    managed.state = ProcessState::Running;
                    true
                }
                _ => false,
            }
        };
        if transitioned {
            self.emit_state_changed(process_id, ProcessState::Running);
        }
    }

    async fn handle_stopped(&self, process_id: &str) {
        {
            let mut processes = self.processes.lock().await;
            if let Some(managed) = processes.get_mut(process_id) {
                managed.state = ProcessState::Stopped;
                managed.pid = None;
                managed.control = None;
                if let Some(health) = managed.health.take() {
                    health.cancel();
                }
            }
        }
        self.emit_state_changed(process_id, ProcessState::Stopped);
    }

    async fn handle_unexpected_exit(self: &Arc<Self>, process_id: &str, code: Option<i32>) {
        let outcome = {
            let mut processes = self.processes.lock().await;
            let Some(managed) = processes.get_mut(process_id) else {
                return;
            };
            managed.pid = None;
            managed.control = None;
            if let Some(health) = managed.health.take() {
                health.cancel();
            }

            if code == Some(0) {
                managed.state = ProcessState::Stopped;
                ExitOutcome::Clean
            } else if !managed.entry.auto_restart {
                managed.state = ProcessState::Failed;
                ExitOutcome::FailedNoRestart
            } else {
                let now = Utc::now();
                managed.restart_window.record(now);
                let count = managed.restart_window.prune_and_count(now, managed.entry.restart_window_s);
                match restart::decide(count, managed.entry.max_restarts) {
                    RestartDecision::GiveUp => {
                        managed.state = ProcessState::Failed;
                        ExitOutcome::GaveUp { restart_count: u32::try_from(count).unwrap_or(u32::MAX) }
                    }
                    RestartDecision::Backoff(delay) => {
                        managed.state = ProcessState::Backoff;
                        ExitOutcome::Backoff(delay)
                    }
                }
            }
        };

        match outcome {
            ExitOutcome::Clean => self.emit_state_changed(process_id, ProcessState::Stopped),
            ExitOutcome::FailedNoRestart => self.emit_state_changed(process_id, ProcessState::Failed),
            ExitOutcome::GaveUp { restart_count } => {
                self.emit_state_changed(process_id, ProcessState::Failed);
                self.metrics.inc_process_giving_up();
                let published = self.events.emit(Event::ProcessGivingUp {
                    process_id: process_id.to_string(),
                    node_id: self.node_id.clone(),
                    restart_count,
                });
                if let Err(err) = published {
                    warn!(process_id = %process_id, error = %err, "failed to publish process.giving_up");
                }
            }
            ExitOutcome::Backoff(delay) => {
                self.emit_state_changed(process_id, ProcessState::Backoff);
                self.metrics.inc_process_restart(process_id);
                let supervisor = Arc::clone(self);
                let process_id = process_id.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = supervisor
                        .begin_spawn(&process_id, &[ProcessState::Backoff], "restart")
                        .await
                    {
                        info!(process_id = %process_id, error = %err, "backoff restart did not proceed");
                    }
                });
            }
        }
    }

    fn emit_state_changed(&self, process_id: &str, state: ProcessState) {
        let wire_state = match state {
            ProcessState::Stopped => "stopped",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Failed => "failed",
            ProcessState::Backoff => "backoff",
        };
        let published = self.events.emit(Event::ProcessStateChanged {
            process_id: process_id.to_string(),
            node_id: self.node_id.clone(),
            state: wire_state.to_string(),
        });
        if let Err(err) = published {
            warn!(process_id = %process_id, error = %err, "failed to publish process.state_changed");
        }
    }
}

enum ExitOutcome {
    Clean,
    FailedNoRestart,
    GaveUp { restart_count: u32 },
    Backoff(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use tokio::time::Duration as TokioDuration;

    fn entry(command: &str, args: Vec<&str>) -> ProcessConfigEntry {
        ProcessConfigEntry {
            command: command.to_string(),
            args: args.into_iter().map(str::to_string).collect(),
            cwd: None,
            env: StdHashMap::new(),
            auto_restart: false,
            max_restarts: 3,
            restart_window_s: 60,
            health_check: None,
            ports: vec![],
            graceful_timeout_ms: 1_000,
        }
    }

    async fn wait_until_failed(supervisor: &Arc<ProcessSupervisor>, process_id: &str) -> ProcessRecord {
        // Restart-storm backoff delays (1s, 2s, 4s, ...) can add up to several
        // real seconds before the process gives up, so this polls for a while.
        for _ in 0..1_500 {
            if let Ok(record) = supervisor.status(process_id).await {
                if record.state == ProcessState::Failed {
                    return record;
                }
            }
            tokio::time::sleep(TokioDuration::from_millis(10)).await;
        }
        panic!("process did not reach failed in time");
    }

    #[tokio::test]
    async fn port_conflict_fails_the_second_start_without_spawning() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let supervisor = ProcessSupervisor::new("node@test", EventBus::new(), Metrics::new().expect("metrics"));
        let mut env = StdHashMap::new();
        env.insert("PORT".to_string(), port.to_string());

        let mut first = entry("sh", vec!["-c", "sleep 1"]);
        first.env = env.clone();
        supervisor.add("p1", first).await.expect("add p1");
        supervisor.start("p1").await.expect("start p1 should bind first");

        let listener = std::net::TcpListener::bind(("127.0.0.1", port)).expect("occupy port");

        let mut second = entry("sh", vec!["-c", "sleep 1"]);
        second.env = env;
        supervisor.add("p2", second).await.expect("add p2");
        let err = supervisor.start("p2").await.expect_err("expected port_in_use");
        assert_eq!(err.code(), "port_in_use");

        let record = supervisor.status("p2").await.expect("status p2");
        assert_eq!(record.state, ProcessState::Failed);
        drop(listener);
    }

    #[tokio::test]
    async fn restart_storm_gives_up_after_max_restarts_and_stays_failed() {
        let supervisor = ProcessSupervisor::new("node@test", EventBus::new(), Metrics::new().expect("metrics"));
        let mut entry = entry("sh", vec!["-c", "exit 1"]);
        entry.auto_restart = true;
        entry.max_restarts = 3;
        entry.restart_window_s = 60;
        supervisor.add("q", entry).await.expect("add q");
        supervisor.start("q").await.expect("start q");

        let record = wait_until_failed(&supervisor, "q").await;
        assert_eq!(record.restarts_in_window, 3);
    }
}
