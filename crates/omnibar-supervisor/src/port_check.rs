//! Pre-flight port-conflict detection: a process that declares a port
//! (via `env.PORT`, its health-check target, or an explicit `ports` list)
//! must not be started while another process already holds that port.

use omnibar_config::{HealthCheckSpec, ProcessConfigEntry};
use tokio::net::TcpListener;

/// Resolve the port a process declares, checking `env.PORT` first, then
/// its health-check target, then an explicit `ports` list.
#[must_use]
pub fn declared_port(entry: &ProcessConfigEntry) -> Option<u16> {
    if let Some(value) = entry.env.get("PORT") {
        if let Ok(port) = value.parse() {
            return Some(port);
        }
    }
    match &entry.health_check {
        Some(HealthCheckSpec::Tcp { port, .. }) => return Some(*port),
        Some(HealthCheckSpec::Http { url, .. }) => {
            if let Some(port) = port_from_url(url) {
                return Some(port);
            }
        }
        Some(HealthCheckSpec::None) | None => {}
    }
    entry.ports.first().copied()
}

fn port_from_url(url: &str) -> Option<u16> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = without_scheme.split(['/', '?']).next().unwrap_or(without_scheme);
    let (_, port) = authority.rsplit_once(':')?;
    port.parse().ok()
}

/// Probe whether `port` is already bound on the loopback interface.
/// Returns `true` if a bind attempt fails, meaning the port is in use.
pub async fn port_in_use(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).await.is_err()
}
