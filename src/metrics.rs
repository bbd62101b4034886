//! Prometheus metrics for decision observability.
//!
//! Exposed on a dedicated listener when `METRICS_PORT` is non-zero. Recording
//! functions are safe to call when no exporter is installed; they become no-ops.
//!
//! # Available Metrics
//!
//! - `ip_allowlist_decisions_total` - counter, labels `decision`, `reason`, `source`
//! - `ip_allowlist_decision_duration_seconds` - histogram
//! - `ip_allowlist_ranges` - gauge, number of compiled allowlist ranges

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

use crate::client_ip::AddrSource;
use crate::decision::Decision;

/// Metric names as constants for consistency.
pub mod names {
    pub const DECISIONS_TOTAL: &str = "ip_allowlist_decisions_total";
    pub const DECISION_DURATION_SECONDS: &str = "ip_allowlist_decision_duration_seconds";
    pub const ALLOWLIST_RANGES: &str = "ip_allowlist_ranges";
}

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. port in use).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::DECISIONS_TOTAL,
        "Forward-auth decisions by outcome, reason and address source"
    );
    describe_histogram!(
        names::DECISION_DURATION_SECONDS,
        "Time spent extracting and judging the client address"
    );
    describe_gauge!(
        names::ALLOWLIST_RANGES,
        "Number of network ranges in the compiled allowlist"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one decision.
pub fn record_decision(decision: &Decision, source: Option<AddrSource>, duration_secs: f64) {
    let source = source.map_or("none", |s| s.as_str());

    counter!(
        names::DECISIONS_TOTAL,
        "decision" => decision.as_str(),
        "reason" => decision.reason(),
        "source" => source
    )
    .increment(1);

    histogram!(names::DECISION_DURATION_SECONDS).record(duration_secs);
}

/// Publish the allowlist size.
pub fn set_allowlist_ranges(count: usize) {
    gauge!(names::ALLOWLIST_RANGES).set(count as f64);
}
