//! Cache metrics for observability

use crate::CacheKey;
use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<CacheMetricsInner> = OnceLock::new();

struct CacheMetricsInner {
    hits: CounterVec,
    misses: CounterVec,
    writes: CounterVec,
    invalidations: CounterVec,
    errors: CounterVec,
}

impl CacheMetricsInner {
    fn new() -> Self {
        Self {
            hits: counter("timeline_cache_hits_total", "Total cache hits", &["entity"]),
            misses: counter("timeline_cache_misses_total", "Total cache misses", &["entity"]),
            writes: counter("timeline_cache_writes_total", "Total cache writes", &["entity"]),
            invalidations: counter(
                "timeline_cache_invalidations_total",
                "Total cache invalidations",
                &["entity"],
            ),
            errors: counter(
                "timeline_cache_errors_total",
                "Total cache errors swallowed on the degraded path",
                &["entity", "operation"],
            ),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.writes.clone()))?;
        registry.register(Box::new(self.invalidations.clone()))?;
        registry.register(Box::new(self.errors.clone()))?;
        Ok(())
    }
}

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    CounterVec::new(Opts::new(name, help), labels).expect("valid metric definition")
}

fn get_metrics() -> &'static CacheMetricsInner {
    METRICS.get_or_init(CacheMetricsInner::new)
}

fn entity(key: &str) -> &str {
    CacheKey::entity_type(key).unwrap_or("unknown")
}

/// Cache metrics wrapper
#[derive(Clone, Copy, Default)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_hit(&self, key: &str) {
        get_metrics().hits.with_label_values(&[entity(key)]).inc();
    }

    pub fn record_miss(&self, key: &str) {
        get_metrics().misses.with_label_values(&[entity(key)]).inc();
    }

    pub fn record_write(&self, key: &str) {
        get_metrics().writes.with_label_values(&[entity(key)]).inc();
    }

    pub fn record_invalidation(&self, key: &str) {
        get_metrics()
            .invalidations
            .with_label_values(&[entity(key)])
            .inc();
    }

    pub fn record_error(&self, key: &str, operation: &str) {
        get_metrics()
            .errors
            .with_label_values(&[entity(key), operation])
            .inc();
    }
}
