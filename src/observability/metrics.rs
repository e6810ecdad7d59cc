//! Metrics collection and exposition.
//!
//! # Metrics
//! - `media_requests_total` (counter): requests by method, status, result kind
//! - `media_request_duration_seconds` (histogram): dispatch latency
//! - `media_rate_limited_total` (counter): fast rejections
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, result: &'static str, start: Instant) {
    metrics::counter!(
        "media_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "result" => result
    )
    .increment(1);
    metrics::histogram!("media_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("media_rate_limited_total").increment(1);
}
