//! Cache metrics.
//!
//! Recorded through the `metrics` facade; the host process decides whether a
//! recorder (e.g. a Prometheus exporter) is installed.

use metrics::{counter, histogram};
use std::time::Duration;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ERRORS_TOTAL: &str = "cache_errors_total";
    pub const CACHE_LOADER_CALLS_TOTAL: &str = "cache_loader_calls_total";
    pub const CACHE_WARMUP_ITEMS_TOTAL: &str = "cache_warmup_items_total";
    pub const CACHE_WARMUP_DURATION_SECONDS: &str = "cache_warmup_duration_seconds";
}

/// Record a cache hit.
pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a failed store operation.
pub fn record_cache_error(op: &'static str) {
    counter!(names::CACHE_ERRORS_TOTAL, "op" => op).increment(1);
}

/// Record a loader invocation on the read-through path.
pub fn record_loader_call() {
    counter!(names::CACHE_LOADER_CALLS_TOTAL).increment(1);
}

/// Record the outcome of warming a single identifier.
pub fn record_warmup_item(kind: &str, outcome: &'static str) {
    counter!(
        names::CACHE_WARMUP_ITEMS_TOTAL,
        "kind" => kind.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record the duration of a full warmup pass.
pub fn record_warmup_duration(duration: Duration) {
    histogram!(names::CACHE_WARMUP_DURATION_SECONDS).record(duration.as_secs_f64());
}
