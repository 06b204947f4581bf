//! Domain Ports (Port/Adapter Pattern)
//!
//! This module defines the abstractions the cache and preload layers depend
//! on. Infrastructure adapters implement these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  KeyValueStore │ RecordStore │ EventPublisher │ Clock│    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  FileKeyValueStore │ RestRecordStore │ SystemClock  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// =============================================================================
// Value Objects
// =============================================================================

/// Role of the signed-in person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
}

impl Role {
    /// Lowercase role name as stored in the cache and in notice audiences.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Admin => "admin",
        }
    }

    /// Remote collection holding records for people of this role.
    pub fn directory_path(&self) -> &'static str {
        match self {
            Role::Student => "Students",
            Role::Teacher => "Faculty",
            Role::Parent => "Parents",
            Role::Admin => "Admins",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" | "faculty" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            "admin" => Ok(Role::Admin),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

/// The signed-in person a preload cycle is run for.
///
/// `record` is the person's own record as read from the remote store. It is
/// never mutated, only consulted for assignment fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub record: Value,
}

impl Subject {
    pub fn new(id: impl Into<String>, role: Role, record: Value) -> Self {
        Self {
            id: id.into(),
            role,
            record,
        }
    }

    /// Identity object persisted under the plan's identity key.
    pub fn identity(&self) -> Value {
        let mut identity = match &self.record {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        identity.insert("id".to_string(), Value::String(self.id.clone()));
        identity.insert("role".to_string(), Value::String(self.role.to_string()));
        Value::Object(identity)
    }
}

// =============================================================================
// Key-Value Store Port
// =============================================================================

/// Port for the durable string key → string value store.
///
/// Values are pre-serialized JSON text. Implementations must be safe to call
/// from multiple tasks; concurrent writes to the same key resolve
/// last-write-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove the given keys. Missing keys are not an error.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    /// Read several values, one slot per requested key in request order.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }
}

// =============================================================================
// Record Store Port
// =============================================================================

/// Port for the remote tree-structured realtime database.
///
/// Only one-shot reads are needed for preloading; live subscriptions belong
/// to the screens that render the data.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the value at `path` once. `Ok(None)` means nothing is stored there.
    async fn read_once(&self, path: &str) -> Result<Option<Value>>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

use super::events::DomainEvent;

/// Port for publishing domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a domain event.
    async fn publish(&self, event: DomainEvent) -> Result<()>;

    /// Publish multiple events.
    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()>;
}

// =============================================================================
// Clock Port
// =============================================================================

/// Source of wall-clock time for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// =============================================================================
// Tests
// =============================================================================
