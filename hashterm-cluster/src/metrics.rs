//! Federation metrics
//!
//! Follow the engine's switch in `hashterm::metrics::enabled`.

use std::time::Duration;

/// Record a finished federated facet
pub fn record_federated_facet(field: &str, duration: Duration, shards: usize, failed: usize) {
    if !hashterm::metrics::enabled() {
        return;
    }

    metrics::histogram!(
        "hashterm_federation_duration_seconds",
        "field" => field.to_string(),
    )
    .record(duration.as_secs_f64());

    metrics::counter!(
        "hashterm_federation_requests_total",
        "field" => field.to_string(),
        "status" => if failed == 0 { "ok" } else { "partial" },
    )
    .increment(1);

    metrics::gauge!("hashterm_federation_shards", "field" => field.to_string())
        .set(shards as f64);
}

/// Record a federated facet that failed outright
pub fn record_federation_error(field: &str, error_type: &str) {
    if !hashterm::metrics::enabled() {
        return;
    }

    metrics::counter!(
        "hashterm_federation_requests_total",
        "field" => field.to_string(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "hashterm_federation_errors_total",
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record a shard that contributed nothing
pub fn record_shard_failure(shard_id: &str, error_type: &str) {
    if !hashterm::metrics::enabled() {
        return;
    }

    metrics::counter!(
        "hashterm_shard_failures_total",
        "shard" => shard_id.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record a repeated shard attempt
pub fn record_shard_retry(shard_id: &str) {
    if !hashterm::metrics::enabled() {
        return;
    }

    metrics::counter!("hashterm_shard_retries_total", "shard" => shard_id.to_string())
        .increment(1);
}

/// Record one shard's collection latency as seen by the coordinator
pub fn record_shard_duration(shard_id: &str, duration: Duration) {
    if !hashterm::metrics::enabled() {
        return;
    }

    metrics::histogram!(
        "hashterm_shard_collect_duration_seconds",
        "shard" => shard_id.to_string(),
    )
    .record(duration.as_secs_f64());
}
