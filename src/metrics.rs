//! Prometheus metrics for the HTTP surface.
//!
//! Exposes:
//! - `hookgen_request_duration_seconds` (histogram)
//! - `hookgen_request_total` (counter with status)
//! - `hookgen_request_inflight` (gauge)
//! - process metrics via `process` collector

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tracing::warn;

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 5ms up to ~40s; grounding and model calls
    // dominate the tail.
    let buckets =
        prometheus::exponential_buckets(0.005, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "hookgen_request_duration_seconds",
        "HTTP request duration in seconds",
        &["endpoint"],
        buckets
    )
    .expect("failed to register request duration histogram")
});

static REQUEST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hookgen_request_total",
        "Total HTTP requests by status",
        &["endpoint", "status"]
    )
    .expect("failed to register request counter")
});

static REQUEST_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "hookgen_request_inflight",
        "Number of in-flight requests",
        &["endpoint"]
    )
    .expect("failed to register inflight gauge")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&REQUEST_DURATION);
    Lazy::force(&REQUEST_TOTAL);
    Lazy::force(&REQUEST_INFLIGHT);
}

/// Increment the inflight gauge for an endpoint.
pub fn record_request_start(endpoint: &str) {
    init_collectors();
    REQUEST_INFLIGHT.with_label_values(&[endpoint]).inc();
}

/// Record request completion with duration and outcome.
pub fn record_request_result(endpoint: &str, duration: Duration, success: bool) {
    init_collectors();
    REQUEST_INFLIGHT.with_label_values(&[endpoint]).dec();
    REQUEST_DURATION
        .with_label_values(&[endpoint])
        .observe(duration.as_secs_f64());
    REQUEST_TOTAL
        .with_label_values(&[endpoint, if success { "ok" } else { "error" }])
        .inc();
}

/// Encode the current registry in Prometheus text exposition format.
pub fn render() -> anyhow::Result<(String, Vec<u8>)> {
    init_collectors();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}
