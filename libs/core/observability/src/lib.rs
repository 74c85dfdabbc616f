//! Observability utilities for the messaging platform.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Custom metrics for broadcast processing and billing
//! - Axum middleware for automatic request metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, BroadcastMetrics};
//!
//! // Initialize metrics recorder
//! init_metrics();
//!
//! // Record broadcast operations
//! BroadcastMetrics::record_run_completed(2, 150, 3, 1, 12.5);
//!
//! // Add metrics endpoint to router
//! let app = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

pub mod broadcasts;
pub mod middleware;

pub use broadcasts::BroadcastMetrics;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup.
/// Returns the PrometheusHandle for rendering metrics.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        info!("Prometheus metrics recorder initialized");

        // Register metric descriptions
        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_histogram;

    // HTTP metrics
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    // Broadcast run metrics
    describe_counter!(
        "broadcast_runs_total",
        "Total broadcast processing runs by status"
    );
    describe_histogram!(
        "broadcast_run_duration_seconds",
        "Broadcast run duration in seconds"
    );
    describe_counter!(
        "broadcast_messages_total",
        "Total recipient messages processed by final status"
    );
    describe_counter!(
        "broadcast_campaigns_completed_total",
        "Total campaigns that reached the completed state"
    );
    describe_counter!(
        "broadcast_campaign_errors_total",
        "Campaigns whose batch routine returned an error"
    );

    // Billing and maintenance metrics
    describe_counter!(
        "broadcast_billing_failures_total",
        "Usage events that could not be recorded"
    );
    describe_counter!(
        "broadcast_reaped_total",
        "Stuck recipients recovered by the reaper, by outcome"
    );
}
