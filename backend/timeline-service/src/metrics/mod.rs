//! Timeline Metrics
//!
//! Prometheus metrics for fanout and pagination. Cache hit/miss counters
//! live in `timeline_cache::CacheMetrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static FANOUT_ENTRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "timeline_fanout_entries_total",
        "Timeline entries created by fanout"
    )
    .expect("Failed to register fanout entries metric")
});

static FANOUT_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "timeline_fanout_duration_seconds",
        "Duration of a fanout, durable insert and cache appends included",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register fanout duration metric")
});

static PAGINATOR_FALLBACKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "timeline_paginator_fallbacks_total",
        "Timeline pages served from the durable store after the cached window ran out"
    )
    .expect("Failed to register paginator fallback metric")
});

static PAGES_SERVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "timeline_pages_served_total",
        "Timeline pages served, by cursor mode",
        &["mode"]
    )
    .expect("Failed to register pages served metric")
});

pub fn record_fanout(inserted: usize, duration: Duration) {
    FANOUT_ENTRIES_TOTAL.inc_by(inserted as u64);
    FANOUT_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_paginator_fallback() {
    PAGINATOR_FALLBACKS_TOTAL.inc();
}

/// `mode` is one of "first", "before", "after"
pub fn record_page_served(mode: &str) {
    PAGES_SERVED_TOTAL.with_label_values(&[mode]).inc();
}

/// Render the default registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
