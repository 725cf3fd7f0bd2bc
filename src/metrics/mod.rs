// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    IMAGE_CACHE_OPERATIONS,
    IMAGE_FETCHES,
    IMAGE_FETCH_DURATION,
    IMAGE_TRANSCODES,
    PROMPT_BUILDS,
    PROMPT_BUILD_DURATION,
};

/// Helper to record registry lookups (hit, join, miss)
pub fn record_image_cache(operation: &str) {
    IMAGE_CACHE_OPERATIONS.with_label_values(&[operation]).inc();
}

/// Helper to record an image fetch
pub fn record_fetch(kind: &str, status: &str, duration_secs: f64) {
    IMAGE_FETCHES.with_label_values(&[kind, status]).inc();
    IMAGE_FETCH_DURATION
        .with_label_values(&[kind])
        .observe(duration_secs);
}

/// Helper to record how an encoding was produced
pub fn record_transcode(outcome: &str) {
    IMAGE_TRANSCODES.with_label_values(&[outcome]).inc();
}

/// Helper to record a prompt build
pub fn record_build(provider: &str, status: &str, duration_secs: f64) {
    PROMPT_BUILDS.with_label_values(&[provider, status]).inc();
    PROMPT_BUILD_DURATION
        .with_label_values(&[provider])
        .observe(duration_secs);
}
