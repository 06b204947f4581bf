//! Configuration
//!
//! Configuration structs for the cache, the preload orchestrator and the
//! remote record store. Every struct has a usable `Default`; the binary
//! layers an optional YAML file and CLI flags on top.
//!
//! ```yaml
//! cache_dir: /var/lib/campus-cache
//! preload:
//!   freshness_window_minutes: 15
//!   chunk_size: 500
//! record_store:
//!   database_url: https://campus-db.example.com
//!   request_timeout_seconds: 20
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default freshness window (15 minutes)
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default number of records filtered between yields
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default buffered progress events per subscriber
pub const DEFAULT_PROGRESS_CAPACITY: usize = 64;

// =============================================================================
// Preload Configuration
// =============================================================================

/// Configuration for the cache manager and preload orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Age after which a cached batch is stale and a full refetch is due
    #[serde(rename = "freshness_window_minutes", with = "minutes")]
    pub freshness_window: Duration,

    /// Records filtered per chunk before yielding to the runtime
    pub chunk_size: usize,

    /// Progress events buffered per subscriber before it starts lagging
    pub progress_capacity: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_capacity: DEFAULT_PROGRESS_CAPACITY,
        }
    }
}

// =============================================================================
// Record Store Configuration
// =============================================================================

/// Configuration for the REST record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordStoreConfig {
    /// Realtime database base URL
    pub database_url: String,

    /// Database auth token appended as `?auth=`
    pub auth_token: Option<String>,

    /// Per-request timeout
    #[serde(rename = "request_timeout_seconds", with = "seconds")]
    pub request_timeout: Duration,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            database_url: "http://localhost:9000".to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level configuration used by the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for the durable cache tier
    pub cache_dir: PathBuf,

    pub preload: PreloadConfig,

    pub record_store: RecordStoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".campus-cache"),
            preload: PreloadConfig::default(),
            record_store: RecordStoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Reject values the cache cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.preload.freshness_window.is_zero() {
            return Err(Error::Config("freshness window must be positive".to_string()));
        }
        if self.preload.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }
        if self.preload.progress_capacity == 0 {
            return Err(Error::Config(
                "progress_capacity must be at least 1".to_string(),
            ));
        }
        if self.record_store.database_url.trim().is_empty() {
            return Err(Error::Config("database_url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Freshness window of `minutes` minutes, rejecting values whose seconds
/// overflow `u64`.
pub fn window_from_minutes(minutes: u64) -> Result<Duration> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("freshness window of {} minutes is too large", minutes)))
}

mod minutes {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs() / 60)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        super::window_from_minutes(u64::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

// =============================================================================
// Tests
// =============================================================================
