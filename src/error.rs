//! Error types for Campus Cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the cache adapters and configuration layer.
///
/// The preload orchestrator and cache manager never surface these to their
/// callers; they are logged and degraded to misses or empty collections.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // =========================================================================
    // Key-Value Store Errors
    // =========================================================================
    /// Durable key-value store operation failed
    #[error("Key-value store {operation} failed for key '{key}': {reason}")]
    KeyValueStore {
        operation: &'static str,
        key: String,
        reason: String,
    },

    // =========================================================================
    // Record Store Errors
    // =========================================================================
    /// Record store connection error
    #[error("Record store connection error: {0}")]
    RecordStoreConnection(#[source] reqwest::Error),

    /// Record store read failed
    #[error("Record store read failed for path '{path}': {reason}")]
    RecordStore { path: String, reason: String },

    /// Invalid record path
    #[error("Invalid record path: {0}")]
    InvalidPath(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown role name
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Subject record missing or malformed
    #[error("Subject {id} could not be loaded: {reason}")]
    SubjectUnavailable { id: String, reason: String },

    /// Metrics registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a record store error for a path.
    pub fn record_store(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::RecordStore {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a key-value store error for a key.
    pub fn key_value(operation: &'static str, key: impl Into<String>, reason: impl ToString) -> Self {
        Self::KeyValueStore {
            operation,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
