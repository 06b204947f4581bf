//! Memory Tier
//!
//! Process-local map of the latest entry per key. Reads are served here
//! with no I/O while the cached batch is fresh.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use super::entry::{CacheEntry, EntryOrigin};

/// In-memory tier
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: DashMap<String, CacheEntry>,
    /// Keys invalidated in this process whose durable removal may still be
    /// queued. Reads of these keys must not fall through to the durable tier.
    tombstones: DashSet<String>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Insert or replace the entry for its key, lifting any tombstone.
    pub fn put(&self, entry: CacheEntry) {
        self.tombstones.remove(entry.key());
        self.entries.insert(entry.key().to_string(), entry);
    }

    /// Insert an entry loaded from the durable tier unless the key was
    /// invalidated or written by this process. Only empty slots and other
    /// loaded entries are replaced.
    pub fn put_loaded(&self, entry: CacheEntry) -> bool {
        if self.tombstones.contains(entry.key()) {
            return false;
        }
        match self.entries.entry(entry.key().to_string()) {
            Entry::Occupied(existing) if existing.get().origin() == EntryOrigin::Write => false,
            Entry::Occupied(mut existing) => {
                existing.insert(entry);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Remove a key and remember that it was invalidated.
    pub fn invalidate(&self, key: &str) -> bool {
        self.tombstones.insert(key.to_string());
        self.entries.remove(key).is_some()
    }

    pub fn is_tombstoned(&self, key: &str) -> bool {
        self.tombstones.contains(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_put_replaces_entry() {
        let tier = MemoryTier::new();
        tier.put(CacheEntry::new("k", json!(1), Utc::now()));
        tier.put(CacheEntry::new("k", json!(2), Utc::now()));

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.get("k").unwrap().value(), &json!(2));
    }

    #[test]
    fn test_loaded_entry_never_replaces_write() {
        let tier = MemoryTier::new();
        tier.put(CacheEntry::new("k", json!("new"), Utc::now()));

        assert!(!tier.put_loaded(CacheEntry::from_durable("k", json!("old"), Utc::now())));
        assert_eq!(tier.get("k").unwrap().value(), &json!("new"));

        assert!(tier.put_loaded(CacheEntry::from_durable("other", json!(1), Utc::now())));
        assert!(tier.put_loaded(CacheEntry::from_durable("other", json!(2), Utc::now())));
        assert_eq!(tier.get("other").unwrap().value(), &json!(2));
    }

    #[test]
    fn test_invalidate_leaves_tombstone() {
        let tier = MemoryTier::new();
        tier.put(CacheEntry::new("k", json!(1), Utc::now()));

        assert!(tier.invalidate("k"));
        assert!(!tier.contains("k"));
        assert!(tier.is_tombstoned("k"));

        assert!(!tier.put_loaded(CacheEntry::from_durable("k", json!(1), Utc::now())));
        assert!(tier.get("k").is_none());

        tier.put(CacheEntry::new("k", json!(3), Utc::now()));
        assert!(!tier.is_tombstoned("k"));
        assert_eq!(tier.get("k").unwrap().value(), &json!(3));
    }
}
