//! Shared HTTP constants for the Stream Channel and fleet surface.

/// Header carrying a correlation id across a request, propagated into spans.
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// Path serving the read-only overlay WebSocket.
pub const OVERLAY_SOCKET_PATH: &str = "/socket";
/// Path serving the dashboard WebSocket, which additionally accepts commands.
pub const CONTROL_SOCKET_PATH: &str = "/control";

/// Interval between heartbeat pings sent to every connected client.
pub(crate) const PING_INTERVAL_SECS: u64 = 15;
/// Maximum time allowed between pings without a matching pong before a
/// connection is considered dead.
pub(crate) const PONG_TIMEOUT_SECS: u64 = 90;
/// Per-client outbound queue capacity. A client that falls this far behind
/// is disconnected rather than buffered without bound.
pub(crate) const CLIENT_CHANNEL_CAPACITY: usize = 1024;

/// Close reason sent when a client's outbound queue overflows.
pub(crate) const CLOSE_REASON_SLOW_CONSUMER: &str = "slow_consumer";
/// Close reason sent when a client misses too many heartbeats.
pub(crate) const CLOSE_REASON_HEARTBEAT_TIMEOUT: &str = "heartbeat_timeout";
