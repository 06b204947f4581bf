//! Event Publisher Adapters
//!
//! Sinks for [`DomainEvent`]s raised by the cache and the preload
//! orchestrator.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::domain::events::DomainEvent;
use crate::domain::ports::EventPublisher;
use crate::error::Result;

/// Writes domain events to `tracing`.
///
/// Recovered failures log at `warn`, cycle lifecycle events at `info`, and
/// per-collection and invalidation chatter at `debug` unless the publisher
/// is [verbose](Self::verbose).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher {
    verbose: bool,
}

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every non-failure event at `info`.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let event_type = event.event_type();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));

        if event.is_failure() {
            warn!(event_type = %event_type, event = %json, "Recovered failure");
            return Ok(());
        }

        match event {
            DomainEvent::PreloadStarted { .. }
            | DomainEvent::PreloadSkipped { .. }
            | DomainEvent::PreloadCompleted { .. } => {
                info!(event_type = %event_type, event = %json, "Preload event")
            }
            _ if self.verbose => info!(event_type = %event_type, event = %json, "Cache event"),
            _ => debug!(event_type = %event_type, event = %json, "Cache event"),
        }
        Ok(())
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// Keeps every published event so tests can assert on background failures.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: RwLock<Vec<DomainEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot in publication order.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Events whose [`DomainEvent::event_type`] equals `event_type`.
    pub fn events_of_type(&self, event_type: &str) -> Vec<DomainEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Recovered failures only.
    pub fn failures(&self) -> Vec<DomainEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.is_failure())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()> {
        self.events.write().extend(events);
        Ok(())
    }
}
