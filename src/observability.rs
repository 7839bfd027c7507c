use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

use crate::api::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: endpoint, status.
pub const HTTP_REQUESTS_TOTAL: &str = "parkd_http_requests_total";

/// Histogram: HTTP handler latency in seconds. Labels: endpoint.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "parkd_http_request_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: allocation attempts. Labels: zone, outcome.
pub const ALLOCATIONS_TOTAL: &str = "parkd_allocations_total";

/// Counter: undone operations. Labels: kind.
pub const ROLLBACKS_TOTAL: &str = "parkd_rollbacks_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: occupied slots. Labels: zone.
pub const SLOTS_OCCUPIED: &str = "parkd_slots_occupied";

/// Gauge: entries on the undo log.
pub const UNDO_LOG_DEPTH: &str = "parkd_undo_log_depth";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::Snapshot => "data",
        Command::Analytics => "analytics",
        Command::Allocate { .. } => "request",
        Command::Cancel { .. } => "cancel",
        Command::Leave { .. } => "leave",
        Command::Rollback { .. } => "rollback",
    }
}
