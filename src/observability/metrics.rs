//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status, outcome
//! - `http_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so tests need no setup
//! - Labels kept low-cardinality: no paths

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
    }
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, latency: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("outcome", outcome.to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels).record(latency.as_secs_f64());
}
