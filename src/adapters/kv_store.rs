//! Key-Value Store Adapters
//!
//! Durable tier backends implementing the `KeyValueStore` port.
//!
//! - [`InMemoryKeyValueStore`] - DashMap-backed store for tests and demos,
//!   with switchable write failures
//! - [`FileKeyValueStore`] - one file per key under a cache directory

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::ports::KeyValueStore;
use crate::error::{Error, Result};

/// Key-value store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueStats {
    /// Keys currently stored
    pub key_count: u64,
    /// Read operations
    pub reads: u64,
    /// Write operations
    pub writes: u64,
    /// Removed keys
    pub removes: u64,
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// In-memory durable tier stand-in.
///
/// Survives only as long as the value itself, which is enough to model a
/// process restart in tests: build a second cache manager over the same
/// store.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    storage: DashMap<String, String>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
}

impl InMemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `get` fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Write a raw value directly, bypassing failure injection.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.storage.insert(key.into(), value.into());
    }

    /// Read a raw value directly.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.storage.get(key).map(|v| v.value().clone())
    }

    /// Check if a key is stored
    pub fn contains(&self, key: &str) -> bool {
        self.storage.contains_key(key)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Get store statistics
    pub fn stats(&self) -> KeyValueStats {
        KeyValueStats {
            key_count: self.storage.len() as u64,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::key_value("get", key, "injected read failure"));
        }
        Ok(self.storage.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::key_value("set", key, "injected write failure"));
        }
        self.storage.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            if self.storage.remove(key).is_some() {
                self.removes.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.reads.fetch_add(keys.len() as u64, Ordering::Relaxed);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::key_value("multi_get", keys.join(","), "injected read failure"));
        }
        Ok(keys
            .iter()
            .map(|key| self.storage.get(key).map(|v| v.value().clone()))
            .collect())
    }
}

// =============================================================================
// File Store
// =============================================================================

/// File-backed durable tier.
///
/// Each key lives in its own `<percent-encoded key>.json` file. Writes go to
/// a temporary sibling first and are renamed into place, so a reader never
/// observes a half-written value.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened file key-value store");
        Ok(Self { root })
    }

    /// Directory holding the value files
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", urlencoding::encode(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::key_value("get", key, e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));

        tokio::fs::write(&tmp, value.as_bytes())
            .await
            .map_err(|e| Error::key_value("set", key, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::key_value("set", key, e));
        }
        Ok(())
    }

    /// Removes every key it can and reports the first failure.
    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            match tokio::fs::remove_file(self.path_for(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to remove cache file");
                    if first_error.is_none() {
                        first_error = Some(Error::key_value("remove", key.as_str(), e));
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        join_all(keys.iter().map(|key| self.get(key)))
            .await
            .into_iter()
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
