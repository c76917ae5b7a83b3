//! Prometheus instrumentation for the Firestore client.

use std::time::Duration;

use metrics::{counter, histogram};

const REQUESTS: &str = "jhive_firestore_requests_total";
const RETRIES: &str = "jhive_firestore_retries_total";
const LATENCY: &str = "jhive_firestore_request_duration_seconds";

/// Count a completed request and record its latency, labeled by operation
/// and HTTP status.
pub fn record_request(operation: &str, status: u16, elapsed: Duration) {
    counter!(
        REQUESTS,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(LATENCY, "operation" => operation.to_string()).record(elapsed.as_secs_f64());
}

/// Count a retry attempt for an operation.
pub fn record_retry(operation: &str) {
    counter!(RETRIES, "operation" => operation.to_string()).increment(1);
}
