//! Platform request metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total platform requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "platform_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "platform_latency_seconds";

    /// Slot pushes by slot kind and action.
    pub const SLOT_PUSHES_TOTAL: &str = "platform_slot_pushes_total";
}

/// Record metrics for a completed platform request.
///
/// `status` is 0 when no response was received.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a successful slot push.
pub fn record_slot_push(kind: &str, action: &str) {
    counter!(
        names::SLOT_PUSHES_TOTAL,
        "kind" => kind.to_string(),
        "action" => action.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::SLOT_PUSHES_TOTAL.starts_with("platform_"));
    }
}
