/// Metrics and telemetry for the microblog service
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Post submissions and rejections
/// - Identity lookups and feed assembly failures
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    /// Requests refused by the process-wide request budget
    pub static ref HTTP_REQUESTS_THROTTLED_TOTAL: IntCounter = register_int_counter!(
        "http_requests_throttled_total",
        "Total number of HTTP requests refused by the global rate limit"
    )
    .unwrap();

    // ========== Post Metrics ==========

    /// Posts persisted
    pub static ref POSTS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "posts_created_total",
        "Total number of posts created"
    )
    .unwrap();

    /// Rejected submissions by reason
    pub static ref POST_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "post_rejections_total",
        "Total number of rejected post submissions",
        &["reason"]
    )
    .unwrap();

    // ========== Feed Metrics ==========

    /// Identity provider lookups by outcome
    pub static ref IDENTITY_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "identity_lookups_total",
        "Total number of batched identity lookups",
        &["outcome"]
    )
    .unwrap();

    /// Feeds that could not be assembled
    pub static ref FEED_ASSEMBLY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_assembly_failures_total",
        "Total number of feed assembly failures",
        &["reason"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, success: bool) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, if success { "success" } else { "failure" }])
        .inc();
}
