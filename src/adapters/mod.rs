//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  KeyValueStore │ RecordStore │ EventPublisher │ Clock      │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ FileKeyValueStore │ InMemoryKeyValueStore                  │ │
//! │  │ RestRecordStore │ InMemoryRecordStore                      │ │
//! │  │ LoggingEventPublisher │ SystemClock │ ManualClock          │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod clock;
mod event_publisher;
mod kv_store;
mod record_store;

pub use clock::{ManualClock, SystemClock};
pub use event_publisher::{InMemoryEventCollector, LoggingEventPublisher};
pub use kv_store::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStats};
pub use record_store::{split_path, InMemoryRecordStore, RestRecordStore};
