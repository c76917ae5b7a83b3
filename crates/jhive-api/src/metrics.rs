//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "jhive_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "jhive_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "jhive_http_requests_in_flight";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "jhive_rate_limit_hits_total";
    pub const AUTH_FAILURES_TOTAL: &str = "jhive_auth_failures_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Record an authentication failure (bad credentials or token).
pub fn record_auth_failure(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::AUTH_FAILURES_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (collapse IDs and slugs).
fn sanitize_path(path: &str) -> String {
    let path = regex_lite::Regex::new(
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}(--[0-9a-f-]+)?",
    )
    .unwrap()
    .replace_all(path, ":id");
    let path = regex_lite::Regex::new(r"/(jobs|companies|users|applications)/[A-Za-z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/$1/:id");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/jobs/550e8400-e29b-41d4-a716-446655440000"),
            "/api/jobs/:id"
        );
        assert_eq!(sanitize_path("/api/jobs/backend-engineer-2"), "/api/jobs/:id");
        assert_eq!(sanitize_path("/api/health"), "/api/health");
    }
}
