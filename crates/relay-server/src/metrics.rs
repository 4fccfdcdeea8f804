//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup, before any metrics are recorded. Without a
/// recorder every `counter!`/`gauge!` call is a no-op.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket connections, registered or not (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Frames that could not be queued for a client (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Registered nickname sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Registration attempts that created no session (counter, labels: reason).
pub const REGISTRATIONS_REJECTED_TOTAL: &str = "registrations_rejected_total";
/// Frames routed by the hub (counter, labels: kind).
pub const MESSAGES_ROUTED_TOTAL: &str = "messages_routed_total";
/// Inbound frames that failed to decode (counter).
pub const FRAMES_MALFORMED_TOTAL: &str = "frames_malformed_total";
