//! Preload Metrics
//!
//! Prometheus collectors for preload cycles, kept in a registry owned by the
//! orchestrator so several orchestrators (and tests) never collide on the
//! process-global default registry.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::error::Result;

/// Prometheus collectors for preload cycles
#[derive(Clone)]
pub struct PreloadMetrics {
    registry: Registry,
    cycles: IntCounterVec,
    collection_failures: IntCounterVec,
    cycle_duration: Histogram,
    cached_records: IntGaugeVec,
}

impl PreloadMetrics {
    /// Create the collectors and register them in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cycles = IntCounterVec::new(
            Opts::new("preload_cycles_total", "Preload requests by outcome"),
            &["outcome"],
        )?;
        let collection_failures = IntCounterVec::new(
            Opts::new(
                "preload_collection_failures_total",
                "Collections that failed to load and were cached empty",
            ),
            &["collection"],
        )?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "preload_cycle_duration_seconds",
                "Wall time of completed preload cycles",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        let cached_records = IntGaugeVec::new(
            Opts::new(
                "preload_cached_records",
                "Records cached per collection by the latest cycle",
            ),
            &["collection"],
        )?;

        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(collection_failures.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(cached_records.clone()))?;

        Ok(Self {
            registry,
            cycles,
            collection_failures,
            cycle_duration,
            cached_records,
        })
    }

    /// Count a preload request. `outcome` is one of `skipped`, `fresh`,
    /// `completed`, `completed_with_failures`.
    pub fn record_cycle(&self, outcome: &str) {
        self.cycles.with_label_values(&[outcome]).inc();
    }

    pub fn record_collection_failure(&self, collection: &str) {
        self.collection_failures.with_label_values(&[collection]).inc();
    }

    pub fn observe_cycle_duration(&self, seconds: f64) {
        self.cycle_duration.observe(seconds);
    }

    pub fn set_cached_records(&self, collection: &str, count: usize) {
        self.cached_records
            .with_label_values(&[collection])
            .set(count as i64);
    }

    pub fn cycles(&self, outcome: &str) -> u64 {
        self.cycles.with_label_values(&[outcome]).get()
    }

    pub fn collection_failures(&self, collection: &str) -> u64 {
        self.collection_failures.with_label_values(&[collection]).get()
    }

    pub fn cached_records(&self, collection: &str) -> i64 {
        self.cached_records.with_label_values(&[collection]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::Error::Internal(format!("metrics text is not UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for PreloadMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadMetrics").finish_non_exhaustive()
    }
}
