//! Per-process monitor task: owns a spawned `Child`, races the settle
//! window against an early exit, and performs graceful-then-forceful
//! termination on request.
//!
//! One task per process, selecting between a stop-request channel, the
//! settle timer, and the child's exit future. Degraded conditions are
//! logged with `tracing::warn!` rather than propagated past the task
//! boundary.

use std::time::Duration;

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::warn;

/// Outcome reported by a monitor task back to the owning supervisor.
#[derive(Debug)]
pub enum MonitorEvent {
    /// The process survived the settle window; eligible for `running`.
    Settled,
    /// The process exited without a `stop()` request.
    ExitedUnexpectedly {
        /// Exit code, when the OS reports one.
        code: Option<i32>,
        /// Whether the exit happened before the settle window elapsed.
        during_settle: bool,
    },
    /// The process exited in response to a `stop()` request.
    StoppedByRequest,
}

/// A monitor's report, tagged with the process id it concerns.
#[derive(Debug)]
pub struct MonitorReport {
    /// Process id the report concerns.
    pub process_id: String,
    /// What happened.
    pub event: MonitorEvent,
}

/// Control handle held by the supervisor to request graceful termination.
#[derive(Clone)]
pub struct MonitorHandle {
    stop_tx: mpsc::Sender<()>,
}

impl MonitorHandle {
    /// Request graceful termination. Idempotent: a second call after the
    /// channel has closed (monitor already torn down) is a no-op.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(()).await;
    }
}

/// Spawn the monitor task for an already-spawned child process.
pub(crate) fn spawn_monitor(
    process_id: String,
    mut child: Child,
    settle_window: Duration,
    graceful_timeout: Duration,
    reports: mpsc::UnboundedSender<MonitorReport>,
) -> MonitorHandle {
    let (stop_tx, mut stop_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let settle = tokio::time::sleep(settle_window);
        tokio::pin!(settle);
        let mut settled = false;

        loop {
            tokio::select! {
                () = &mut settle, if !settled => {
                    settled = true;
                    if reports.send(MonitorReport {
                        process_id: process_id.clone(),
                        event: MonitorEvent::Settled,
                    }).is_err() {
                        warn!(process_id = %process_id, "supervisor report channel closed while settling");
                    }
                }
                status = child.wait() => {
                    let code = status.map(|s| s.code()).unwrap_or_default();
                    let _ = reports.send(MonitorReport {
                        process_id: process_id.clone(),
                        event: MonitorEvent::ExitedUnexpectedly { code, during_settle: !settled },
                    });
                    return;
                }
                Some(()) = stop_rx.recv() => {
                    graceful_stop(&mut child, graceful_timeout, &process_id).await;
                    let _ = reports.send(MonitorReport {
                        process_id: process_id.clone(),
                        event: MonitorEvent::StoppedByRequest,
                    });
                    return;
                }
            }
        }
    });

    MonitorHandle { stop_tx }
}

async fn graceful_stop(child: &mut Child, graceful_timeout: Duration, process_id: &str) {
    send_sigterm(child, process_id);
    if timeout(graceful_timeout, child.wait()).await.is_err() {
        warn!(process_id = %process_id, "graceful timeout elapsed, sending SIGKILL");
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child, process_id: &str) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX)), Signal::SIGTERM) {
        warn!(process_id = %process_id, error = %err, "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child, _process_id: &str) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    async fn settles_and_then_reports_clean_exit() {
        let child = Command::new("sh")
            .arg("-c")
            .arg("sleep 0.2")
            .spawn()
            .expect("spawn sh");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = spawn_monitor(
            "proc-1".into(),
            child,
            Duration::from_millis(20),
            Duration::from_millis(500),
            tx,
        );

        let settled = rx.recv().await.expect("settled report");
        assert!(matches!(settled.event, MonitorEvent::Settled));

        let exited = rx.recv().await.expect("exit report");
        assert!(matches!(
            exited.event,
            MonitorEvent::ExitedUnexpectedly { during_settle: false, .. }
        ));
    }

    #[tokio::test]
    async fn exit_before_settle_is_flagged() {
        let child = Command::new("sh")
            .arg("-c")
            .arg("exit 1")
            .spawn()
            .expect("spawn sh");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = spawn_monitor(
            "proc-2".into(),
            child,
            Duration::from_millis(500),
            Duration::from_millis(500),
            tx,
        );

        let report = rx.recv().await.expect("exit report");
        match report.event {
            MonitorEvent::ExitedUnexpectedly { during_settle, code } => {
                assert!(during_settle);
                assert_eq!(code, Some(1));
            }
            other => panic!("expected ExitedUnexpectedly, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_terminates_and_reports_stopped_by_request() {
        let child = Command::new("sh")
            .arg("-c")
            .arg("sleep 5")
            .spawn()
            .expect("spawn sh");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_monitor(
            "proc-3".into(),
            child,
            Duration::from_millis(10),
            Duration::from_millis(200),
            tx,
        );

        let _ = rx.recv().await.expect("settled report");
        handle.stop().await;
        let report = rx.recv().await.expect("stop report");
        assert!(matches!(report.event, MonitorEvent::StoppedByRequest));
    }
}
