//! Metrics collection and exposition.
//!
//! # Metrics
//! - `portal_requests_total` (counter): requests by method, status
//! - `portal_request_duration_seconds` (histogram): latency distribution
//! - `portal_gate_decisions_total` (counter): gate outcomes
//! - `portal_rate_limited_total` (counter): rejections by limiter
//! - `portal_upstream_errors_total` (counter): failed forwards by upstream
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Low-overhead metric updates (atomic operations)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "portal_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("portal_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a gate outcome.
pub fn record_gate_decision(outcome: &'static str) {
    metrics::counter!("portal_gate_decisions_total", "outcome" => outcome).increment(1);
}

/// Record a rate limit rejection.
pub fn record_rate_limited(limiter: &'static str) {
    metrics::counter!("portal_rate_limited_total", "limiter" => limiter).increment(1);
}

/// Record a failed forward.
pub fn record_upstream_error(upstream: &str) {
    metrics::counter!("portal_upstream_errors_total", "upstream" => upstream.to_string())
        .increment(1);
}
