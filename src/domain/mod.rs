//! Domain Layer
//!
//! # Architecture
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for the durable key-value
//!   store, the remote record store, event publishing and time
//! - **Events** (`events.rs`) - Domain events for observing preload cycles
//!   and background cache failures
//!
//! # Usage
//!
//! ```ignore
//! use campus_cache::domain::ports::{KeyValueStore, RecordStore};
//!
//! async fn warm<K, R>(kv: &K, records: &R) -> Result<()>
//! where
//!     K: KeyValueStore,
//!     R: RecordStore,
//! {
//!     let students = records.read_once("Students").await?;
//!     // ...
//! }
//! ```

pub mod events;
pub mod ports;

pub use events::DomainEvent;
pub use ports::{Clock, EventPublisher, KeyValueStore, RecordStore, Role, Subject};
