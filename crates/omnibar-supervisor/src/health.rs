//! Health Monitor: per-process HTTP/TCP check tickers with hysteresis.
//!
//! Each ticker owns its own check cadence and publishes the resolved
//! [`HealthState`] on a `watch` channel, the same pulse/monitor split used
//! for task liveness elsewhere in the stack: the ticker is the "pulse" side
//! that also computes the check, readers borrow the "monitor" side.

use std::time::Duration;

use omnibar_config::HealthCheckSpec;
use omnibar_events::{Event, EventBus};
use omnibar_telemetry::Metrics;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::record::HealthState;

/// Consecutive failures required before a healthy/unknown process is
/// considered `unhealthy`.
const FAILURE_THRESHOLD: u32 = 2;

/// Reading half of a health ticker, held by the owning supervisor.
pub struct HealthHandle {
    rx: watch::Receiver<HealthState>,
    cancel: CancellationToken,
}

impl HealthHandle {
    /// Most recently observed health state.
    #[must_use]
    pub fn current(&self) -> HealthState {
        *self.rx.borrow()
    }

    /// Stop the ticker. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Spawn a health-check ticker for one process. Returns a handle to read the
/// current state and the task, which runs until cancelled.
pub(crate) fn spawn_health_ticker(
    process_id: String,
    node_id: String,
    spec: HealthCheckSpec,
    events: EventBus,
    metrics: Metrics,
) -> HealthHandle {
    let (tx, rx) = watch::channel(HealthState::Unknown);
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        let interval_s = match &spec {
            HealthCheckSpec::Http { interval_s, .. } | HealthCheckSpec::Tcp { interval_s, .. } => {
                *interval_s
            }
            HealthCheckSpec::None => return,
        };
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_s.max(1)));
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                () = task_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let healthy = run_check(&spec).await;
                    let previous = *tx.borrow();
                    let next = if healthy {
                        consecutive_failures = 0;
                        HealthState::Healthy
                    } else {
                        consecutive_failures += 1;
                        if consecutive_failures >= FAILURE_THRESHOLD {
                            HealthState::Unhealthy
                        } else {
                            previous
                        }
                    };
                    if next != previous {
                        let _ = tx.send(next);
                        if next == HealthState::Unhealthy {
                            metrics.inc_health_check_failure(&process_id);
                        }
                        let published = events.emit(Event::ProcessHealthChanged {
                            process_id: process_id.clone(),
                            node_id: node_id.clone(),
                            health_state: wire_state(next).to_string(),
                        });
                        if let Err(err) = published {
                            debug!(process_id = %process_id, error = %err, "failed to publish health transition");
                        }
                    }
                }
            }
        }
    });

    HealthHandle { rx, cancel }
}

async fn run_check(spec: &HealthCheckSpec) -> bool {
    match spec {
        HealthCheckSpec::None => true,
        HealthCheckSpec::Http { url, timeout_s, .. } => check_http(url, *timeout_s).await,
        HealthCheckSpec::Tcp {
            host,
            port,
            timeout_s,
            ..
        } => check_tcp(host, *port, *timeout_s).await,
    }
}

async fn check_http(url: &str, timeout_s: u64) -> bool {
    let client = reqwest::Client::new();
    match timeout(Duration::from_secs(timeout_s.max(1)), client.get(url).send()).await {
        Ok(Ok(response)) => response.status().is_success(),
        Ok(Err(_)) | Err(_) => false,
    }
}

async fn check_tcp(host: &str, port: u16, timeout_s: u64) -> bool {
    matches!(
        timeout(
            Duration::from_secs(timeout_s.max(1)),
            TcpStream::connect((host, port))
        )
        .await,
        Ok(Ok(_))
    )
}

fn wire_state(state: HealthState) -> &'static str {
    match state {
        HealthState::Unknown => "unknown",
        HealthState::Healthy => "healthy",
        HealthState::Unhealthy => "unhealthy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_check_succeeds_against_a_bound_listener() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind ephemeral port");
        let port = listener.local_addr().expect("local addr").port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        assert!(check_tcp("127.0.0.1", port, 2).await);
    }

    #[tokio::test]
    async fn tcp_check_fails_against_a_closed_port() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind ephemeral port");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        assert!(!check_tcp("127.0.0.1", port, 1).await);
    }

    #[test]
    fn wire_state_matches_snake_case_tags() {
        assert_eq!(wire_state(HealthState::Unknown), "unknown");
        assert_eq!(wire_state(HealthState::Healthy), "healthy");
        assert_eq!(wire_state(HealthState::Unhealthy), "unhealthy");
    }
}
