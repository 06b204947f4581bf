//! Two-Tier Cache
//!
//! - **Memory tier**: process-local map, authoritative while the process lives
//! - **Durable tier**: a [`KeyValueStore`](crate::domain::KeyValueStore)
//!   mirrored by an ordered background writer
//!
//! A single last-write timestamp decides whether the cached batch is fresh.
//! Freshness gates whether a preload should refetch, not whether reads return
//! data: a durable hit is returned even when the batch is stale.

mod durable;
mod entry;
mod manager;
mod memory;
mod metrics;

pub use entry::{CacheEntry, EntryOrigin};
pub use manager::{CacheConfig, CacheManager, LAST_UPDATE_KEY};
pub use metrics::{CacheMetrics, MetricsSnapshot};
