//! Domain Events
//!
//! Immutable records of things that happened during preload cycles and
//! durable cache maintenance. Published through the
//! [`EventPublisher`](super::ports::EventPublisher) port so that failures on
//! background paths (durable writes in particular) can be observed without
//! scraping logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain event representing a significant occurrence in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    // =========================================================================
    // Preload Events
    // =========================================================================
    /// A preload cycle started.
    PreloadStarted {
        cycle_id: Uuid,
        subject_id: String,
        role: String,
        collections: Vec<String>,
        forced: bool,
        timestamp: DateTime<Utc>,
    },

    /// A preload request was not run.
    PreloadSkipped {
        subject_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A collection was fetched, filtered and cached.
    CollectionCached {
        cycle_id: Uuid,
        key: String,
        source_records: usize,
        cached_records: usize,
        timestamp: DateTime<Utc>,
    },

    /// A collection could not be loaded and was cached empty.
    CollectionFailed {
        cycle_id: Uuid,
        key: String,
        path: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A preload cycle finished.
    PreloadCompleted {
        cycle_id: Uuid,
        failed_collections: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Cache Events
    // =========================================================================
    /// A queued durable write failed; the memory tier still holds the value.
    DurableWriteFailed {
        key: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A queued durable removal failed.
    DurableRemoveFailed {
        keys: Vec<String>,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Keys were invalidated in both tiers.
    CacheInvalidated {
        keys: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Get the event type as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::PreloadStarted { .. } => "PreloadStarted",
            DomainEvent::PreloadSkipped { .. } => "PreloadSkipped",
            DomainEvent::CollectionCached { .. } => "CollectionCached",
            DomainEvent::CollectionFailed { .. } => "CollectionFailed",
            DomainEvent::PreloadCompleted { .. } => "PreloadCompleted",
            DomainEvent::DurableWriteFailed { .. } => "DurableWriteFailed",
            DomainEvent::DurableRemoveFailed { .. } => "DurableRemoveFailed",
            DomainEvent::CacheInvalidated { .. } => "CacheInvalidated",
        }
    }

    /// Get the event timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::PreloadStarted { timestamp, .. }
            | DomainEvent::PreloadSkipped { timestamp, .. }
            | DomainEvent::CollectionCached { timestamp, .. }
            | DomainEvent::CollectionFailed { timestamp, .. }
            | DomainEvent::PreloadCompleted { timestamp, .. }
            | DomainEvent::DurableWriteFailed { timestamp, .. }
            | DomainEvent::DurableRemoveFailed { timestamp, .. }
            | DomainEvent::CacheInvalidated { timestamp, .. } => *timestamp,
        }
    }

    /// Whether the event reports something that was recovered from.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DomainEvent::CollectionFailed { .. }
                | DomainEvent::DurableWriteFailed { .. }
                | DomainEvent::DurableRemoveFailed { .. }
        )
    }

    // =========================================================================
    // Factory Methods
    // =========================================================================

    pub fn preload_skipped(subject_id: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainEvent::PreloadSkipped {
            subject_id: subject_id.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn collection_cached(
        cycle_id: Uuid,
        key: impl Into<String>,
        source_records: usize,
        cached_records: usize,
    ) -> Self {
        DomainEvent::CollectionCached {
            cycle_id,
            key: key.into(),
            source_records,
            cached_records,
            timestamp: Utc::now(),
        }
    }

    pub fn collection_failed(
        cycle_id: Uuid,
        key: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DomainEvent::CollectionFailed {
            cycle_id,
            key: key.into(),
            path: path.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn durable_write_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainEvent::DurableWriteFailed {
            key: key.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn durable_remove_failed(keys: Vec<String>, reason: impl Into<String>) -> Self {
        DomainEvent::DurableRemoveFailed {
            keys,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn cache_invalidated(keys: Vec<String>) -> Self {
        DomainEvent::CacheInvalidated {
            keys,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = DomainEvent::durable_write_failed("teacherData", "disk full");
        assert_eq!(event.event_type(), "DurableWriteFailed");

        let event = DomainEvent::collection_failed(Uuid::new_v4(), "notices", "Notices", "timeout");
        assert_eq!(event.event_type(), "CollectionFailed");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = DomainEvent::cache_invalidated(vec!["a".to_string()]);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "CacheInvalidated");
        assert_eq!(json["keys"][0], "a");
    }

    #[test]
    fn test_failure_classification() {
        assert!(DomainEvent::durable_remove_failed(vec!["a".into()], "eio").is_failure());
        assert!(!DomainEvent::cache_invalidated(vec!["a".into()]).is_failure());
    }

    #[test]
    fn test_event_timestamp() {
        let before = Utc::now();
        let event = DomainEvent::preload_skipped("s-1", "already loading");
        assert!(event.timestamp() >= before);
    }
}
