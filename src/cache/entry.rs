//! Cache Entry Types

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// How an entry reached the memory tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryOrigin {
    /// Written by `set` during this process
    Write,
    /// Loaded from the durable tier on a read
    Durable,
}

/// A cached JSON value.
///
/// Entries are never mutated; a `set` on the same key replaces the whole
/// entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    key: String,
    value: Value,
    written_at: DateTime<Utc>,
    origin: EntryOrigin,
}

impl CacheEntry {
    /// Create an entry for a fresh write
    pub fn new(key: impl Into<String>, value: Value, written_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value,
            written_at,
            origin: EntryOrigin::Write,
        }
    }

    /// Create an entry loaded from the durable tier
    pub fn from_durable(key: impl Into<String>, value: Value, loaded_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value,
            written_at: loaded_at,
            origin: EntryOrigin::Durable,
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// When the entry entered the memory tier
    #[inline]
    pub fn written_at(&self) -> DateTime<Utc> {
        self.written_at
    }

    #[inline]
    pub fn origin(&self) -> EntryOrigin {
        self.origin
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_origins() {
        let now = Utc::now();
        let written = CacheEntry::new("notices", json!([]), now);
        let loaded = CacheEntry::from_durable("notices", json!([]), now);

        assert_eq!(written.origin(), EntryOrigin::Write);
        assert_eq!(loaded.origin(), EntryOrigin::Durable);
        assert_eq!(written.key(), "notices");
        assert_eq!(written.written_at(), now);
    }

    #[test]
    fn test_entry_into_value() {
        let entry = CacheEntry::new("k", json!({ "a": 1 }), Utc::now());
        assert_eq!(entry.value()["a"], 1);
        assert_eq!(entry.into_value(), json!({ "a": 1 }));
    }
}
