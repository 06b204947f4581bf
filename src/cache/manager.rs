//! Cache Manager - Two-Tier JSON Cache
//!
//! Serves reads from the memory tier while the cached batch is fresh and
//! falls through to the durable tier otherwise. Writes land in memory
//! synchronously and are mirrored to the durable tier by an ordered
//! background writer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::durable::DurableTier;
use super::entry::{CacheEntry, EntryOrigin};
use super::memory::MemoryTier;
use super::metrics::{CacheMetrics, MetricsSnapshot};
use crate::adapters::{InMemoryKeyValueStore, LoggingEventPublisher, SystemClock};
use crate::config::{PreloadConfig, DEFAULT_FRESHNESS_WINDOW};
use crate::domain::{Clock, EventPublisher, KeyValueStore};

/// Durable key holding the RFC 3339 time of the latest write
pub const LAST_UPDATE_KEY: &str = "cacheLastUpdate";

/// Cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Age after which the cached batch counts as stale
    pub freshness_window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }
}

impl From<&PreloadConfig> for CacheConfig {
    fn from(config: &PreloadConfig) -> Self {
        Self {
            freshness_window: config.freshness_window,
        }
    }
}

/// Two-tier cache manager
pub struct CacheManager {
    memory: MemoryTier,
    durable: DurableTier,
    /// Time of the most recent `set`, shared by every key
    last_write: RwLock<Option<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl CacheManager {
    /// Create a cache manager with default configuration, the wall clock
    /// and a logging event sink
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_parts(
            CacheConfig::default(),
            store,
            Arc::new(LoggingEventPublisher::new()),
            Arc::new(SystemClock),
        )
    }

    /// Create a cache manager from explicit collaborators.
    ///
    /// Spawns the durable writer, so this must run inside a tokio runtime.
    pub fn with_parts(
        config: CacheConfig,
        store: Arc<dyn KeyValueStore>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let metrics = Arc::new(CacheMetrics::new());
        Self {
            memory: MemoryTier::new(),
            durable: DurableTier::spawn(store, events, metrics.clone()),
            last_write: RwLock::new(None),
            clock,
            config,
            metrics,
        }
    }

    /// Create with an in-memory durable store (for testing)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKeyValueStore::new()))
    }

    /// Read a value.
    ///
    /// Never fails: durable read and decode errors are logged and treated as
    /// a miss. Values written by this process are always served from memory,
    /// even past the freshness window, since their durable copy may be older
    /// after a failed write. A stale loaded entry is returned when the durable
    /// tier has nothing better.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let memory = self.memory.get(key);

        match &memory {
            Some(entry) if entry.origin() == EntryOrigin::Write || self.is_fresh() => {
                self.metrics.record_memory_hit();
                debug!(key, origin = ?entry.origin(), "Memory tier hit");
                return Some(entry.value().clone());
            }
            None if self.memory.is_tombstoned(key) => {
                self.metrics.record_memory_miss();
                self.metrics.record_durable_miss();
                return None;
            }
            _ => self.metrics.record_memory_miss(),
        }

        let stale = || memory.clone().map(CacheEntry::into_value);

        let json = match self.durable.get(key).await {
            Ok(Some(json)) => json,
            Ok(None) => {
                self.metrics.record_durable_miss();
                return stale();
            }
            Err(e) => {
                warn!(key, error = %e, "Durable read failed, treating as miss");
                self.metrics.record_durable_read_failure();
                return stale();
            }
        };

        match serde_json::from_str::<Value>(&json) {
            Ok(value) => {
                self.metrics.record_durable_hit();
                debug!(key, "Durable tier hit");
                let entry = CacheEntry::from_durable(key, value.clone(), self.clock.now());
                self.memory.put_loaded(entry);
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Malformed durable value, treating as miss");
                self.metrics.record_decode_failure();
                stale()
            }
        }
    }

    /// Read and deserialize a value; decode failures read as `None`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape");
                self.metrics.record_decode_failure();
                None
            }
        }
    }

    /// Write a value.
    ///
    /// The memory tier and the freshness clock update before this returns;
    /// the durable write is queued.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let now = self.clock.now();
        let json = value.to_string();

        self.memory.put(CacheEntry::new(key.clone(), value, now));
        *self.last_write.write() = Some(now);
        self.metrics.record_write();

        self.durable.schedule_put(key, json);
        self.durable
            .schedule_put(LAST_UPDATE_KEY.to_string(), Value::from(now.to_rfc3339()).to_string());
    }

    /// Serialize and write a value. Returns `false` if serialization failed,
    /// in which case nothing is written.
    pub fn set_serialized<T: Serialize>(&self, key: impl Into<String>, value: &T) -> bool {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.set(key, value);
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache value");
                false
            }
        }
    }

    /// Remove keys from memory now and from the durable tier after any
    /// writes already queued for them.
    pub fn invalidate<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            self.memory.invalidate(key);
        }
        self.metrics.record_invalidations(keys.len() as u64);
        debug!(keys = ?keys, "Invalidated cache keys");
        self.durable.schedule_remove(keys);
    }

    /// Drop every memory entry, remove them and `extra_keys` from the
    /// durable tier, and reset the freshness clock.
    pub fn clear(&self, extra_keys: &[&str]) {
        let mut keys = self.memory.keys();
        for key in extra_keys.iter().copied().chain([LAST_UPDATE_KEY]) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        *self.last_write.write() = None;
        self.invalidate(keys);
    }

    /// Whether a write happened within the freshness window
    pub fn is_fresh(&self) -> bool {
        match *self.last_write.read() {
            Some(last) => self.within_window(last),
            None => false,
        }
    }

    fn within_window(&self, last: DateTime<Utc>) -> bool {
        match (self.clock.now() - last).to_std() {
            Ok(elapsed) => elapsed < self.config.freshness_window,
            // Clock moved backwards
            Err(_) => true,
        }
    }

    /// Time of the most recent write seen by this process
    pub fn last_write(&self) -> Option<DateTime<Utc>> {
        *self.last_write.read()
    }

    /// Adopt the persisted last-update time when this process has not
    /// written yet, then report freshness.
    pub async fn restore_freshness(&self) -> bool {
        if self.last_write().is_some() {
            return self.is_fresh();
        }

        let raw = match self.durable.get(LAST_UPDATE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted last update");
                return false;
            }
        };

        let parsed = serde_json::from_str::<String>(&raw)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));

        match parsed {
            Some(restored) => {
                let mut last_write = self.last_write.write();
                if last_write.is_none() {
                    *last_write = Some(restored);
                }
                drop(last_write);
                debug!(restored = %restored, "Restored cache freshness");
                self.is_fresh()
            }
            None => {
                warn!(raw = %raw, "Malformed persisted last update");
                self.metrics.record_decode_failure();
                false
            }
        }
    }

    /// Wait until every durable operation queued so far has been applied
    pub async fn flush(&self) {
        self.durable.flush().await;
    }

    /// Whether the memory tier holds `key`
    pub fn contains_in_memory(&self, key: &str) -> bool {
        self.memory.contains(key)
    }

    /// Number of memory tier entries
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Get metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.memory.len())
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
