//! Campus Cache - Client-Side Preload Cache for School Records
//!
//! Warms a two-tier cache with everything a signed-in student or teacher
//! needs, so screens render from local data instead of waiting on the
//! network.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  read_once   ┌──────────────────┐  set   ┌──────────────────┐
//! │ Record Store  │─────────────▶│     Preload      │───────▶│  Cache Manager   │
//! │ (remote tree) │  concurrent  │   Orchestrator   │        │ memory + durable │
//! └───────────────┘              └────────┬─────────┘        └────────┬─────────┘
//!                                         │ matching filters           │ ordered writer
//!                                         ▼                            ▼
//!                                  progress channel           Key-Value Store
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Key-value, record store, clock and event adapters
//! - [`cache`] - Two-tier cache manager
//! - [`config`] - Configuration
//! - [`domain`] - Ports, value objects and domain events
//! - [`error`] - Error types
//! - [`matching`] - Year/division normalization and matching
//! - [`metrics`] - Prometheus preload metrics
//! - [`preload`] - Preload orchestrator, role plans and progress

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod preload;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheManager};
pub use config::{AppConfig, PreloadConfig, RecordStoreConfig};
pub use domain::{Role, Subject};
pub use error::{Error, Result};
pub use preload::{PreloadOrchestrator, PreloadOutcome, PreloadPlan, PreloadReport};
