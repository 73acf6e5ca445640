//! Metrics collection and exposition.
//!
//! # Metrics
//! - `latest_rewrites_total` (counter): rewritten pages by badge class
//! - `latest_passthrough_total` (counter): responses without version metadata
//! - `latest_capture_errors_total` (counter): bodies that failed mid-read
//! - `latest_delivery_failures_total` (counter): client bodies cut off before the end
//! - `latest_resolve_duration_seconds` (histogram): resolver latency
//! - `latest_resolve_timeouts_total` (counter): lookups cut off by the deadline

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::http::rewrite::LatestClass;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_rewrite(class: LatestClass) {
    counter!("latest_rewrites_total", "class" => class.as_str()).increment(1);
}

pub fn record_passthrough() {
    counter!("latest_passthrough_total").increment(1);
}

pub fn record_capture_error() {
    counter!("latest_capture_errors_total").increment(1);
}

pub fn record_delivery_failure() {
    counter!("latest_delivery_failures_total").increment(1);
}

pub fn record_resolve(start: Instant, timed_out: bool) {
    histogram!("latest_resolve_duration_seconds").record(start.elapsed().as_secs_f64());
    if timed_out {
        counter!("latest_resolve_timeouts_total").increment(1);
    }
}
