// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // IMAGE CACHE METRICS
    // ============================================================================

    /// Registry lookups
    pub static ref IMAGE_CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("image_cache_operations_total", "Total image registry lookups"),
        &["operation"], // operation: hit, join, miss
        REGISTRY
    ).unwrap();

    // ============================================================================
    // FETCH METRICS
    // ============================================================================

    /// Image fetches
    pub static ref IMAGE_FETCHES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("image_fetches_total", "Total image fetches"),
        &["kind", "status"], // kind: remote, local, inline; status: success, failure
        REGISTRY
    ).unwrap();

    /// Image fetch duration
    pub static ref IMAGE_FETCH_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        HistogramOpts::new("image_fetch_duration_seconds", "Image fetch duration in seconds")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["kind"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // TRANSCODE METRICS
    // ============================================================================

    /// Image encodings produced
    pub static ref IMAGE_TRANSCODES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("image_transcodes_total", "Total image encodings"),
        &["outcome"], // outcome: cached, passthrough, transcoded
        REGISTRY
    ).unwrap();

    // ============================================================================
    // BUILD METRICS
    // ============================================================================

    /// Prompt builds
    pub static ref PROMPT_BUILDS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("prompt_builds_total", "Total prompt builds"),
        &["provider", "status"], // status: success or error kind
        REGISTRY
    ).unwrap();

    /// Prompt build duration
    pub static ref PROMPT_BUILD_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        HistogramOpts::new("prompt_build_duration_seconds", "Prompt build duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["provider"],
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
