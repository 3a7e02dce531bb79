use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "courtside_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "courtside_http_request_duration_seconds";

/// Counter: bookings committed. Labels: type (single, recurring).
pub const BOOKINGS_CREATED_TOTAL: &str = "courtside_bookings_created_total";

/// Counter: booking attempts rejected because the slot was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "courtside_booking_conflicts_total";

/// Counter: notification deliveries. Labels: status (ok, error).
pub const NOTIFICATIONS_TOTAL: &str = "courtside_notifications_total";

/// Counter: start reminders claimed by the sweep.
pub const REMINDERS_SENT_TOTAL: &str = "courtside_reminders_sent_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "courtside_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (records per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "courtside_journal_flush_batch_size";

/// Counter: journal compactions completed.
pub const JOURNAL_COMPACTIONS_TOTAL: &str = "courtside_journal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None; a
/// failed install is logged and the server runs without metrics.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus exporter on {addr}: {e}"),
    }
}
