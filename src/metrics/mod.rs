//! Prometheus metrics for the hub
//!
//! This module provides metrics tracking for:
//! - Fan-out: queries received, satellite list calls and their duration
//! - Proxy: proxied requests per satellite and response status
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all hub metrics
struct HubMetrics {
    fanout_requests: Counter,
    leaf_requests: CounterVec,
    leaf_duration: HistogramVec,
    proxy_requests: CounterVec,
}

/// Global storage, `None` when registration failed
static HUB_METRICS: OnceLock<Option<HubMetrics>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

fn register() -> Result<HubMetrics, prometheus::Error> {
    Ok(HubMetrics {
        fanout_requests: register_counter!(
            "satellite_hub_fanout_requests_total",
            "Total resource queries fanned out to satellites"
        )?,
        leaf_requests: register_counter_vec!(
            "satellite_hub_leaf_requests_total",
            "Total satellite list calls by result",
            &["result"]
        )?,
        leaf_duration: register_histogram_vec!(
            "satellite_hub_leaf_duration_seconds",
            "Duration of satellite list calls in seconds",
            &["result"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        proxy_requests: register_counter_vec!(
            "satellite_hub_proxy_requests_total",
            "Total proxied requests by satellite and status",
            &["satellite", "status"]
        )?,
    })
}

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers metrics. If
/// registration fails the error is logged and recording stays a no-op.
pub fn init_metrics() {
    HUB_METRICS.get_or_init(|| match register() {
        Ok(metrics) => {
            tracing::info!("Prometheus metrics initialized successfully");
            Some(metrics)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
            None
        }
    });
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    matches!(HUB_METRICS.get(), Some(Some(_)))
}

fn metrics() -> Option<&'static HubMetrics> {
    HUB_METRICS.get().and_then(Option::as_ref)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a fan-out query
pub fn record_fanout_request() {
    if let Some(m) = metrics() {
        m.fanout_requests.inc();
    }
}

/// Record one satellite list call
pub fn record_leaf(result: &str, duration: Duration) {
    let Some(m) = metrics() else {
        return;
    };

    m.leaf_requests.with_label_values(&[result]).inc();
    m.leaf_duration
        .with_label_values(&[result])
        .observe(duration.as_secs_f64());
}

/// Record a proxied request
pub fn record_proxy_request(satellite: &str, status: u16) {
    if let Some(m) = metrics() {
        let status_str = status.to_string();
        m.proxy_requests
            .with_label_values(&[satellite, &status_str])
            .inc();
    }
}

// ============================================================================
// Tests
// ============================================================================
