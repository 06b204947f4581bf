//! Cache Metrics Collection
//!
//! Hit/miss and failure counters for the two cache tiers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Memory tier
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,

    // Durable tier
    durable_hits: AtomicU64,
    durable_misses: AtomicU64,
    durable_read_failures: AtomicU64,
    durable_write_failures: AtomicU64,
    durable_remove_failures: AtomicU64,
    decode_failures: AtomicU64,

    // Operations
    writes: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_hit(&self) {
        self.durable_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_miss(&self) {
        self.durable_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_read_failure(&self) {
        self.durable_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_write_failure(&self) {
        self.durable_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_remove_failure(&self) {
        self.durable_remove_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn memory_hits(&self) -> u64 {
        self.memory_hits.load(Ordering::Relaxed)
    }

    pub fn memory_misses(&self) -> u64 {
        self.memory_misses.load(Ordering::Relaxed)
    }

    pub fn durable_hits(&self) -> u64 {
        self.durable_hits.load(Ordering::Relaxed)
    }

    pub fn durable_misses(&self) -> u64 {
        self.durable_misses.load(Ordering::Relaxed)
    }

    pub fn memory_hit_ratio(&self) -> f64 {
        let hits = self.memory_hits() as f64;
        let total = hits + self.memory_misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Fraction of reads answered by either tier
    pub fn overall_hit_ratio(&self) -> f64 {
        let hits = self.memory_hits() + self.durable_hits();
        // Every durable lookup follows a memory miss, so final misses are
        // the durable misses plus failed or undecodable durable reads.
        let misses = self.durable_misses()
            + self.durable_read_failures.load(Ordering::Relaxed)
            + self.decode_failures.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self, memory_entries: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            memory_hits: self.memory_hits(),
            memory_misses: self.memory_misses(),
            memory_entries: memory_entries as u64,
            memory_hit_ratio: self.memory_hit_ratio(),

            durable_hits: self.durable_hits(),
            durable_misses: self.durable_misses(),
            durable_read_failures: self.durable_read_failures.load(Ordering::Relaxed),
            durable_write_failures: self.durable_write_failures.load(Ordering::Relaxed),
            durable_remove_failures: self.durable_remove_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),

            writes: self.writes.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            overall_hit_ratio: self.overall_hit_ratio(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.memory_hits.store(0, Ordering::Relaxed);
        self.memory_misses.store(0, Ordering::Relaxed);
        self.durable_hits.store(0, Ordering::Relaxed);
        self.durable_misses.store(0, Ordering::Relaxed);
        self.durable_read_failures.store(0, Ordering::Relaxed);
        self.durable_write_failures.store(0, Ordering::Relaxed);
        self.durable_remove_failures.store(0, Ordering::Relaxed);
        self.decode_failures.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of all cache metrics
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    // Memory
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_entries: u64,
    pub memory_hit_ratio: f64,

    // Durable
    pub durable_hits: u64,
    pub durable_misses: u64,
    pub durable_read_failures: u64,
    pub durable_write_failures: u64,
    pub durable_remove_failures: u64,
    pub decode_failures: u64,

    // Overall
    pub writes: u64,
    pub invalidations: u64,
    pub overall_hit_ratio: f64,
}

// =============================================================================
// Tests
// =============================================================================
