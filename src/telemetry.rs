//! Metric names and descriptions.
//!
//! The host is expected to install its own `metrics` recorder; this module
//! only registers descriptions, once, so recorders that surface metadata show
//! something useful.

use std::sync::Once;

use metrics::{Unit, describe_counter};

pub const METRIC_CACHE_HIT_TOTAL: &str = "ebbtide_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "ebbtide_cache_miss_total";
pub const METRIC_CACHE_FALLBACK_TOTAL: &str = "ebbtide_cache_fallback_total";
pub const METRIC_LOADER_RETRY_TOTAL: &str = "ebbtide_loader_retry_total";
pub const METRIC_MUTATION_ROLLBACK_TOTAL: &str = "ebbtide_mutation_rollback_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT_TOTAL,
            Unit::Count,
            "Total number of requests served from a cache store."
        );
        describe_counter!(
            METRIC_CACHE_MISS_TOTAL,
            Unit::Count,
            "Total number of requests that missed every applicable store."
        );
        describe_counter!(
            METRIC_CACHE_FALLBACK_TOTAL,
            Unit::Count,
            "Total number of synthesized offline responses."
        );
        describe_counter!(
            METRIC_LOADER_RETRY_TOTAL,
            Unit::Count,
            "Total number of automatic page-fetch retries."
        );
        describe_counter!(
            METRIC_MUTATION_ROLLBACK_TOTAL,
            Unit::Count,
            "Total number of optimistic mutations rolled back."
        );
    });
}
