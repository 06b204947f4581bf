//! Durable Tier
//!
//! Writes to the durable store are queued and applied by a single background
//! task in submission order. Callers never wait on a write; failures are
//! logged, counted, and published as events. [`DurableTier::flush`] waits
//! until everything queued before it has been applied.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::metrics::CacheMetrics;
use crate::domain::{DomainEvent, EventPublisher, KeyValueStore};
use crate::error::Result;

enum DurableOp {
    Put { key: String, json: String },
    Remove { keys: Vec<String> },
    Flush(oneshot::Sender<()>),
}

/// Durable tier backed by a [`KeyValueStore`]
pub struct DurableTier {
    store: Arc<dyn KeyValueStore>,
    queue: mpsc::UnboundedSender<DurableOp>,
}

impl DurableTier {
    /// Create the tier and spawn its writer task.
    ///
    /// Must be called from within a tokio runtime. The writer exits once the
    /// tier is dropped and the queue drains.
    pub fn spawn(
        store: Arc<dyn KeyValueStore>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store.clone(), rx, events, metrics));
        Self { store, queue }
    }

    /// Read a raw value straight from the store
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key).await
    }

    /// Queue a write
    pub fn schedule_put(&self, key: String, json: String) {
        if self.queue.send(DurableOp::Put { key, json }).is_err() {
            warn!("Durable writer stopped, dropping write");
        }
    }

    /// Queue a removal
    pub fn schedule_remove(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        if self.queue.send(DurableOp::Remove { keys }).is_err() {
            warn!("Durable writer stopped, dropping removal");
        }
    }

    /// Wait for every operation queued before this call to be applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.queue.send(DurableOp::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

async fn run_writer(
    store: Arc<dyn KeyValueStore>,
    mut rx: mpsc::UnboundedReceiver<DurableOp>,
    events: Arc<dyn EventPublisher>,
    metrics: Arc<CacheMetrics>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            DurableOp::Put { key, json } => {
                if let Err(e) = store.set(&key, json).await {
                    warn!(key = %key, error = %e, "Durable write failed");
                    metrics.record_durable_write_failure();
                    let event = DomainEvent::durable_write_failed(key, e.to_string());
                    if let Err(e) = events.publish(event).await {
                        debug!(error = %e, "Failed to publish durable write failure");
                    }
                }
            }
            DurableOp::Remove { keys } => {
                if let Err(e) = store.remove(&keys).await {
                    warn!(keys = ?keys, error = %e, "Durable removal failed");
                    metrics.record_durable_remove_failure();
                    let event = DomainEvent::durable_remove_failed(keys, e.to_string());
                    if let Err(e) = events.publish(event).await {
                        debug!(error = %e, "Failed to publish durable removal failure");
                    }
                }
            }
            DurableOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Durable writer stopped");
}
