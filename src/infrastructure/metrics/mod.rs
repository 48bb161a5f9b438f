//! Prometheus Metrics Module
//!
//! Application-wide metrics collection.
//!
//! # Metrics Collected
//! - Active gateway session gauge
//! - Appended message counter
//! - Slow-consumer disconnect counter
//! - HTTP request counts by method, path, and status

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active gateway sessions
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("gateway_sessions_active", "Number of live gateway sessions")
            .namespace("dinetalk"),
    )
    .expect("Failed to create SESSIONS_ACTIVE metric")
});

/// Messages committed to the store
pub static MESSAGES_APPENDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("messages_appended_total", "Total messages appended").namespace("dinetalk"),
    )
    .expect("Failed to create MESSAGES_APPENDED metric")
});

/// Sessions closed for overflowing their outbound queue
pub static SLOW_CONSUMER_CLOSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "gateway_slow_consumer_closes_total",
            "Sessions disconnected by backpressure",
        )
        .namespace("dinetalk"),
    )
    .expect("Failed to create SLOW_CONSUMER_CLOSES metric")
});

/// HTTP request counter - tracks total requests by method, path, and status
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace("dinetalk"),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(SESSIONS_ACTIVE.clone()))
        .expect("Failed to register SESSIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_APPENDED.clone()))
        .expect("Failed to register MESSAGES_APPENDED");
    registry
        .register(Box::new(SLOW_CONSUMER_CLOSES.clone()))
        .expect("Failed to register SLOW_CONSUMER_CLOSES");
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}
