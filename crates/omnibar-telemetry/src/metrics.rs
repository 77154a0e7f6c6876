//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges each component cares about; components
//!   that don't observe anything still share one registry.

use std::convert::TryFrom;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    bus_overflow_total: IntCounter,
    active_alerts: IntGauge,
    interrupt_stack_depth: IntGauge,
    ticker_cursor: IntGauge,
    alert_drops_total: IntCounter,
    overlay_clients_connected: IntGauge,
    overlay_slow_consumer_total: IntCounter,
    process_restarts_total: IntCounterVec,
    process_giving_up_total: IntCounter,
    health_check_failures_total: IntCounterVec,
    fleet_rpc_failures_total: IntCounterVec,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Whether an alert is currently active on the omnibar overlay.
    pub active_alerts: i64,
    /// Current depth of the interrupt stack.
    pub interrupt_stack_depth: i64,
    /// Current ticker rotation cursor position.
    pub ticker_cursor: i64,
    /// Total envelopes dropped by lagging bus subscribers.
    pub bus_overflow_total: u64,
    /// Number of overlay/dashboard clients currently connected.
    pub overlay_clients_connected: i64,
    /// Total overlay clients disconnected for being a slow consumer.
    pub overlay_slow_consumer_total: u64,
    /// Total processes that exhausted their restart policy.
    pub process_giving_up_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(|source| TelemetryError::MetricsCollector { name: "http_requests_total", source })?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type tag"),
            &["type"],
        )
        .map_err(|source| TelemetryError::MetricsCollector { name: "events_emitted_total", source })?;
        let bus_overflow_total = IntCounter::with_opts(Opts::new(
            "bus_overflow_total",
            "Envelopes dropped because a subscriber lagged behind the event bus",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "bus_overflow_total", source })?;
        let active_alerts = IntGauge::with_opts(Opts::new(
            "active_alerts",
            "1 if an alert is currently active on the overlay, else 0",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "active_alerts", source })?;
        let interrupt_stack_depth = IntGauge::with_opts(Opts::new(
            "interrupt_stack_depth",
            "Current number of entries on the interrupt stack",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "interrupt_stack_depth", source })?;
        let ticker_cursor = IntGauge::with_opts(Opts::new(
            "ticker_cursor",
            "Current ticker rotation cursor",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "ticker_cursor", source })?;
        let alert_drops_total = IntCounter::with_opts(Opts::new(
            "alert_drops_total",
            "Alerts evicted from the interrupt stack due to overflow",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "alert_drops_total", source })?;
        let overlay_clients_connected = IntGauge::with_opts(Opts::new(
            "overlay_clients_connected",
            "Overlay and dashboard clients currently connected to the stream channel",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "overlay_clients_connected", source })?;
        let overlay_slow_consumer_total = IntCounter::with_opts(Opts::new(
            "overlay_slow_consumer_total",
            "Overlay clients disconnected for falling behind their delivery queue",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "overlay_slow_consumer_total", source })?;
        let process_restarts_total = IntCounterVec::new(
            Opts::new(
                "process_restarts_total",
                "Supervised process restarts by process id",
            ),
            &["process_id"],
        )
        .map_err(|source| TelemetryError::MetricsCollector { name: "process_restarts_total", source })?;
        let process_giving_up_total = IntCounter::with_opts(Opts::new(
            "process_giving_up_total",
            "Supervised processes that exhausted their restart policy",
        ))
        .map_err(|source| TelemetryError::MetricsCollector { name: "process_giving_up_total", source })?;
        let health_check_failures_total = IntCounterVec::new(
            Opts::new(
                "health_check_failures_total",
                "Health check failures by process id",
            ),
            &["process_id"],
        )
        .map_err(|source| TelemetryError::MetricsCollector { name: "health_check_failures_total", source })?;
        let fleet_rpc_failures_total = IntCounterVec::new(
            Opts::new("fleet_rpc_failures_total", "Fleet RPC failures by node id"),
            &["node_id"],
        )
        .map_err(|source| TelemetryError::MetricsCollector { name: "fleet_rpc_failures_total", source })?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "http_requests_total", source })?;
        registry
            .register(Box::new(events_emitted_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "events_emitted_total", source })?;
        registry
            .register(Box::new(bus_overflow_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "bus_overflow_total", source })?;
        registry
            .register(Box::new(active_alerts.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "active_alerts", source })?;
        registry
            .register(Box::new(interrupt_stack_depth.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "interrupt_stack_depth", source })?;
        registry
            .register(Box::new(ticker_cursor.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "ticker_cursor", source })?;
        registry
            .register(Box::new(alert_drops_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "alert_drops_total", source })?;
        registry
            .register(Box::new(overlay_clients_connected.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "overlay_clients_connected", source })?;
        registry
            .register(Box::new(overlay_slow_consumer_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "overlay_slow_consumer_total", source })?;
        registry
            .register(Box::new(process_restarts_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "process_restarts_total", source })?;
        registry
            .register(Box::new(process_giving_up_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "process_giving_up_total", source })?;
        registry
            .register(Box::new(health_check_failures_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "health_check_failures_total", source })?;
        registry
            .register(Box::new(fleet_rpc_failures_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name: "fleet_rpc_failures_total", source })?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                bus_overflow_total,
                active_alerts,
                interrupt_stack_depth,
                ticker_cursor,
                alert_drops_total,
                overlay_clients_connected,
                overlay_slow_consumer_total,
                process_restarts_total,
                process_giving_up_total,
                health_check_failures_total,
                fleet_rpc_failures_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type tag.
    pub fn inc_event(&self, type_tag: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[type_tag])
            .inc();
    }

    /// Record envelopes dropped because a bus subscriber lagged.
    pub fn inc_bus_overflow(&self, dropped: u64) {
        self.inner.bus_overflow_total.inc_by(dropped);
    }

    /// Set whether an alert is currently active (1) or not (0).
    pub fn set_active_alert(&self, active: bool) {
        self.inner.active_alerts.set(i64::from(active));
    }

    /// Set the current interrupt stack depth.
    pub fn set_interrupt_stack_depth(&self, depth: i64) {
        self.inner.interrupt_stack_depth.set(depth);
    }

    /// Set the current ticker rotation cursor.
    pub fn set_ticker_cursor(&self, cursor: i64) {
        self.inner.ticker_cursor.set(cursor);
    }

    /// Increment the counter tracking interrupt stack overflow evictions.
    pub fn inc_alert_drop(&self) {
        self.inner.alert_drops_total.inc();
    }

    /// Set the number of connected overlay/dashboard clients.
    pub fn set_overlay_clients_connected(&self, count: i64) {
        self.inner.overlay_clients_connected.set(count);
    }

    /// Increment the slow-consumer disconnect counter.
    pub fn inc_overlay_slow_consumer(&self) {
        self.inner.overlay_slow_consumer_total.inc();
    }

    /// Increment the restart counter for a supervised process.
    pub fn inc_process_restart(&self, process_id: &str) {
        self.inner
            .process_restarts_total
            .with_label_values(&[process_id])
            .inc();
    }

    /// Increment the counter tracking processes that exhausted their restart policy.
    pub fn inc_process_giving_up(&self) {
        self.inner.process_giving_up_total.inc();
    }

    /// Increment the health check failure counter for a supervised process.
    pub fn inc_health_check_failure(&self, process_id: &str) {
        self.inner
            .health_check_failures_total
            .with_label_values(&[process_id])
            .inc();
    }

    /// Increment the fleet RPC failure counter for a peer node.
    pub fn inc_fleet_rpc_failure(&self, node_id: &str) {
        self.inner
            .fleet_rpc_failures_total
            .with_label_values(&[node_id])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_alerts: self.inner.active_alerts.get(),
            interrupt_stack_depth: self.inner.interrupt_stack_depth.get(),
            ticker_cursor: self.inner.ticker_cursor.get(),
            bus_overflow_total: u64::try_from(self.inner.bus_overflow_total.get())
                .unwrap_or_default(),
            overlay_clients_connected: self.inner.overlay_clients_connected.get(),
            overlay_slow_consumer_total: u64::try_from(
                self.inner.overlay_slow_consumer_total.get(),
            )
            .unwrap_or_default(),
            process_giving_up_total: u64::try_from(self.inner.process_giving_up_total.get())
                .unwrap_or_default(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/healthz", 200);
        metrics.inc_event("twitch.follow");
        metrics.inc_bus_overflow(3);
        metrics.set_active_alert(true);
        metrics.set_interrupt_stack_depth(2);
        metrics.set_ticker_cursor(1);
        metrics.inc_alert_drop();
        metrics.set_overlay_clients_connected(5);
        metrics.inc_overlay_slow_consumer();
        metrics.inc_process_restart("obs");
        metrics.inc_process_giving_up();
        metrics.inc_health_check_failure("obs");
        metrics.inc_fleet_rpc_failure("node-2");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_alerts, 1);
        assert_eq!(snapshot.interrupt_stack_depth, 2);
        assert_eq!(snapshot.ticker_cursor, 1);
        assert_eq!(snapshot.bus_overflow_total, 3);
        assert_eq!(snapshot.overlay_clients_connected, 5);
        assert_eq!(snapshot.overlay_slow_consumer_total, 1);
        assert_eq!(snapshot.process_giving_up_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("process_restarts_total"));
        assert!(rendered.contains("fleet_rpc_failures_total"));
        Ok(())
    }
}
