use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all microblog metrics
const PREFIX: &str = "microblog";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Search Index Metrics
    pub static ref SEARCH_INDEX_OPERATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_search_index_operations_total"),
            "Search index operations by backend, operation and status"
        ),
        &["backend", "operation", "status"]
    ).expect("Failed to create search_index_operations_total metric");

    // Background Task Metrics
    pub static ref BACKGROUND_TASK_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_background_task_executions_total"),
            "Background task executions by task name and status"
        ),
        &["task", "status"]
    ).expect("Failed to create background_task_executions_total metric");

    pub static ref BACKGROUND_TASK_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_task_duration_seconds"),
            "Background task duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["task"]
    ).expect("Failed to create background_task_duration_seconds metric");

    pub static ref BACKGROUND_TASKS_RUNNING: Gauge = Gauge::new(
        format!("{PREFIX}_background_tasks_running"),
        "Number of background tasks currently executing"
    ).expect("Failed to create background_tasks_running metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total API errors by type and status code"),
        &["error_type", "status"]
    ).expect("Failed to create errors_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SEARCH_INDEX_OPERATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_TASK_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_TASK_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_TASKS_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a search index operation (index, remove, query)
pub fn record_search_operation(backend: &str, operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    SEARCH_INDEX_OPERATIONS_TOTAL
        .with_label_values(&[backend, operation, status])
        .inc();
}

/// Record a finished background task execution
pub fn record_task_execution(task: &str, status: &str, duration: Duration) {
    BACKGROUND_TASK_EXECUTIONS_TOTAL
        .with_label_values(&[task, status])
        .inc();

    BACKGROUND_TASK_DURATION_SECONDS
        .with_label_values(&[task])
        .observe(duration.as_secs_f64());
}

pub fn task_started() {
    BACKGROUND_TASKS_RUNNING.inc();
}

pub fn task_finished() {
    BACKGROUND_TASKS_RUNNING.dec();
}

/// Record an API error answered with `status`
pub fn record_error(error_type: &str, status: u16) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, &status.to_string()])
        .inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
