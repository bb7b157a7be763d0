//! Facet engine metrics
//!
//! Thin wrappers over the `metrics` facade; without an installed recorder
//! they are no-ops. `observability.metrics_enabled = false` turns them off
//! even when a recorder is installed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Switch recording on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Record a finished store build
pub fn record_store_build(field: &str, multi_valued: bool, duration: Duration) {
    if !enabled() {
        return;
    }

    let kind = if multi_valued { "multi" } else { "single" };
    metrics::counter!(
        "hashterm_store_builds_total",
        "field" => field.to_string(),
        "kind" => kind,
    )
    .increment(1);

    metrics::histogram!(
        "hashterm_store_build_duration_seconds",
        "field" => field.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record collisions found while building a store
pub fn record_collisions(field: &str, collisions: u64) {
    if !enabled() {
        return;
    }

    metrics::counter!(
        "hashterm_store_collisions_total",
        "field" => field.to_string(),
    )
    .increment(collisions);
}

/// Record a store cache lookup
pub fn record_cache_lookup(hit: bool) {
    if !enabled() {
        return;
    }

    let outcome = if hit { "hit" } else { "miss" };
    metrics::counter!("hashterm_store_cache_lookups_total", "outcome" => outcome).increment(1);
}

/// Record one shard-local facet collection
pub fn record_collect(field: &str, matched: u64, duration: Duration) {
    if !enabled() {
        return;
    }

    metrics::histogram!(
        "hashterm_facet_collect_duration_seconds",
        "field" => field.to_string(),
    )
    .record(duration.as_secs_f64());

    metrics::counter!(
        "hashterm_facet_docs_collected_total",
        "field" => field.to_string(),
    )
    .increment(matched);
}

/// Record a finished reduction
pub fn record_reduce(field: &str, shards: usize, duration: Duration) {
    if !enabled() {
        return;
    }

    metrics::histogram!(
        "hashterm_facet_reduce_duration_seconds",
        "field" => field.to_string(),
    )
    .record(duration.as_secs_f64());

    metrics::gauge!("hashterm_facet_reduce_shards", "field" => field.to_string())
        .set(shards as f64);
}
