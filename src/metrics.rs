//! Prometheus metrics for application observability.
//!
//! Metrics are exposed via a dedicated HTTP listener (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_requests_total` - Completed submission requests (labels: route, status)
//! - `gateway_auth_failures_total` - Rejected authentication attempts (label: reason)
//! - `gateway_staged_files_total` - Uploaded files written to scratch workspaces
//! - `gateway_staged_bytes_total` - Bytes written to scratch workspaces
//! - `gateway_workspaces_swept_total` - Orphaned workspaces removed by the janitor
//!
//! ## Histograms
//! - `gateway_request_duration_seconds` - End-to-end submission latency (label: route)
//!
//! ## Gauges
//! - `gateway_workspaces_active` - Scratch workspaces currently held by requests
//!
//! # Usage
//!
//! ```rust,ignore
//! use submission_gateway::metrics::{init_metrics, record_request};
//!
//! init_metrics(addr)?;
//! record_request("sounds", 200, 0.045);
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
    pub const AUTH_FAILURES_TOTAL: &str = "gateway_auth_failures_total";
    pub const STAGED_FILES_TOTAL: &str = "gateway_staged_files_total";
    pub const STAGED_BYTES_TOTAL: &str = "gateway_staged_bytes_total";
    pub const WORKSPACES_SWEPT_TOTAL: &str = "gateway_workspaces_swept_total";
    pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
    pub const WORKSPACES_ACTIVE: &str = "gateway_workspaces_active";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns an error message if the exporter cannot be installed (e.g., the
/// port is taken or a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of submission requests by route and status"
    );
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Total number of requests rejected during authentication"
    );
    describe_counter!(
        names::STAGED_FILES_TOTAL,
        "Total number of uploaded files staged to disk"
    );
    describe_counter!(
        names::STAGED_BYTES_TOTAL,
        "Total number of uploaded bytes staged to disk"
    );
    describe_counter!(
        names::WORKSPACES_SWEPT_TOTAL,
        "Total number of orphaned scratch workspaces removed"
    );

    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "Submission request duration in seconds"
    );

    describe_gauge!(
        names::WORKSPACES_ACTIVE,
        "Scratch workspaces currently owned by in-flight requests"
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

// =============================================================================
// Counter Recording Functions
// =============================================================================

/// Record a completed submission request.
pub fn record_request(route: &'static str, status: u16, duration_secs: f64) {
    counter!(names::REQUESTS_TOTAL, "route" => route, "status" => status.to_string())
        .increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "route" => route).record(duration_secs);
}

/// Record an authentication rejection.
pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Record one uploaded file written to a workspace.
pub fn record_staged_file(bytes: u64) {
    counter!(names::STAGED_FILES_TOTAL).increment(1);
    counter!(names::STAGED_BYTES_TOTAL).increment(bytes);
}

/// Record workspaces removed by the janitor.
pub fn record_workspaces_swept(count: u64) {
    counter!(names::WORKSPACES_SWEPT_TOTAL).increment(count);
}

// =============================================================================
// Gauge Recording Functions
// =============================================================================

pub fn workspace_opened() {
    gauge!(names::WORKSPACES_ACTIVE).increment(1.0);
}

pub fn workspace_closed() {
    gauge!(names::WORKSPACES_ACTIVE).decrement(1.0);
}
