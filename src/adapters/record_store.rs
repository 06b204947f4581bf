//! Record Store Adapters
//!
//! Implementations of the `RecordStore` port.
//!
//! - [`RestRecordStore`] reads a realtime database through its REST surface
//!   (`GET {base}/{path}.json`)
//! - [`InMemoryRecordStore`] holds a JSON tree in memory and supports
//!   failure injection, artificial latency and per-path read counting

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::RecordStoreConfig;
use crate::domain::ports::RecordStore;
use crate::error::{Error, Result};

/// Characters the realtime database rejects inside a key.
const FORBIDDEN_KEY_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// Split a slash-separated record path into its segments.
///
/// Leading, trailing and repeated slashes are ignored, so `""` and `"/"`
/// both address the root.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(bad) = segments
        .iter()
        .find(|s| s.contains(FORBIDDEN_KEY_CHARS.as_slice()))
    {
        return Err(Error::InvalidPath(format!(
            "segment '{}' of '{}' contains a reserved character",
            bad, path
        )));
    }
    Ok(segments)
}

// =============================================================================
// REST Record Store
// =============================================================================

/// Record store backed by the realtime database REST endpoint.
pub struct RestRecordStore {
    config: RecordStoreConfig,
    client: Client,
}

impl RestRecordStore {
    /// Create a new REST record store
    pub fn new(config: RecordStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(Error::RecordStoreConnection)?;

        Ok(Self { config, client })
    }

    /// Build the request URL for a record path.
    pub fn url_for(&self, path: &str) -> Result<String> {
        let segments = split_path(path)?;
        let encoded: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();

        Ok(format!(
            "{}/{}.json",
            self.config.database_url.trim_end_matches('/'),
            encoded.join("/")
        ))
    }
}

impl std::fmt::Debug for RestRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestRecordStore")
            .field("database_url", &self.config.database_url)
            .field("authenticated", &self.config.auth_token.is_some())
            .finish()
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    #[instrument(skip(self))]
    async fn read_once(&self, path: &str) -> Result<Option<Value>> {
        let url = self.url_for(path)?;

        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.auth_token {
            request = request.query(&[("auth", token.as_str())]);
        }

        let response = request.send().await.map_err(Error::RecordStoreConnection)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::record_store(path, format!("HTTP {}", status)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| Error::record_store(path, format!("invalid JSON body: {}", e)))?;

        debug!(path, "Read remote records");
        Ok(if value.is_null() { None } else { Some(value) })
    }
}

// =============================================================================
// In-Memory Record Store
// =============================================================================

/// In-memory record store holding a single JSON tree.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    root: RwLock<Value>,
    failures: DashMap<String, String>,
    reads: DashMap<String, u64>,
    latency: Duration,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self {
            root: RwLock::new(Value::Object(serde_json::Map::new())),
            failures: DashMap::new(),
            reads: DashMap::new(),
            latency: Duration::ZERO,
        }
    }
}

impl InMemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose root is the given tree
    pub fn from_tree(tree: Value) -> Self {
        Self {
            root: RwLock::new(tree),
            ..Self::default()
        }
    }

    /// Delay every read by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Store `value` at `path`, creating intermediate objects.
    pub fn insert(&self, path: &str, value: Value) -> Result<()> {
        let segments = split_path(path)?;
        let mut root = self.root.write();

        let mut node = &mut *root;
        for segment in segments {
            if !node.is_object() {
                *node = Value::Object(serde_json::Map::new());
            }
            node = node
                .as_object_mut()
                .ok_or_else(|| Error::Internal("record tree node is not an object".to_string()))?
                .entry(segment.to_string())
                .or_insert(Value::Null);
        }
        *node = value;
        Ok(())
    }

    /// Make reads of `path` fail with `reason`.
    pub fn fail_path(&self, path: &str, reason: impl Into<String>) {
        self.failures.insert(normalize_key(path), reason.into());
    }

    /// Stop failing reads of `path`.
    pub fn heal_path(&self, path: &str) {
        self.failures.remove(&normalize_key(path));
    }

    /// Number of reads issued against `path`.
    pub fn reads(&self, path: &str) -> u64 {
        self.reads.get(&normalize_key(path)).map(|r| *r).unwrap_or(0)
    }

    /// Number of reads issued against any path.
    pub fn total_reads(&self) -> u64 {
        self.reads.iter().map(|r| *r.value()).sum()
    }

    fn lookup(&self, segments: &[&str]) -> Option<Value> {
        let root = self.root.read();
        let mut node = &*root;
        for segment in segments {
            node = match node {
                Value::Object(map) => map.get(*segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if node.is_null() {
            None
        } else {
            Some(node.clone())
        }
    }
}

fn normalize_key(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn read_once(&self, path: &str) -> Result<Option<Value>> {
        let key = normalize_key(path);
        *self.reads.entry(key.clone()).or_insert(0) += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(reason) = self.failures.get(&key) {
            return Err(Error::record_store(path, reason.value().clone()));
        }

        let segments = split_path(path)?;
        Ok(self.lookup(&segments))
    }
}

// =============================================================================
// Tests
// =============================================================================
