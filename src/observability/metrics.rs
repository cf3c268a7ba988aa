//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_verdicts_total` (counter): verdicts by label
//! - `gateway_decision_duration_seconds` (histogram): decision call latency
//! - `gateway_excluded_requests_total` (counter): static assets skipped
//! - `gateway_upstream_requests_total` (counter): upstream responses by status

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_verdict(verdict: &'static str, elapsed: Duration) {
    metrics::counter!("gateway_verdicts_total", "verdict" => verdict).increment(1);
    metrics::histogram!("gateway_decision_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_excluded() {
    metrics::counter!("gateway_excluded_requests_total").increment(1);
}

pub fn record_upstream(status: u16) {
    metrics::counter!("gateway_upstream_requests_total", "status" => status.to_string())
        .increment(1);
}
