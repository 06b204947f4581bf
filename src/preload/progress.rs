//! Preload Progress Channel
//!
//! Progress events fan out over a tokio broadcast channel. Each
//! [`ProgressSubscription`] is an independent handle; dropping it (or calling
//! [`ProgressSubscription::unsubscribe`]) detaches only that handle.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

/// Progress of a preload cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub step: usize,
    pub total: usize,
    pub message: String,
    pub is_complete: bool,
}

impl ProgressEvent {
    pub fn new(step: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            step,
            total,
            message: message.into(),
            is_complete: false,
        }
    }

    /// Final event of a cycle
    pub fn complete(total: usize, message: impl Into<String>) -> Self {
        Self {
            step: total,
            total,
            message: message.into(),
            is_complete: true,
        }
    }
}

/// Sender side of the progress channel
#[derive(Clone)]
pub struct ProgressBroadcaster {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send an event to every current subscriber.
    ///
    /// Returns the number of subscribers reached; 0 when nobody listens.
    pub fn emit(&self, event: ProgressEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for ProgressBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A single progress listener
#[derive(Debug)]
pub struct ProgressSubscription {
    receiver: broadcast::Receiver<ProgressEvent>,
}

impl ProgressSubscription {
    /// Wait for the next event. Returns `None` once the broadcaster is gone.
    ///
    /// A listener that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Progress listener lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-buffered event, if any.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Progress listener lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every buffered event.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Detach this listener. Other subscriptions are unaffected.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let progress = ProgressBroadcaster::new(8);
        assert_eq!(progress.emit(ProgressEvent::new(1, 3, "Loading")), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let progress = ProgressBroadcaster::new(8);
        let mut first = progress.subscribe();
        let mut second = progress.subscribe();

        assert_eq!(progress.emit(ProgressEvent::new(1, 2, "Loading")), 2);

        assert_eq!(first.recv().await.unwrap().step, 1);
        assert_eq!(second.recv().await.unwrap().step, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_detaches_only_that_handle() {
        let progress = ProgressBroadcaster::new(8);
        let first = progress.subscribe();
        let mut second = progress.subscribe();

        first.unsubscribe();
        assert_eq!(progress.subscriber_count(), 1);

        progress.emit(ProgressEvent::complete(2, "Done"));
        let event = second.recv().await.unwrap();
        assert!(event.is_complete);
        assert_eq!(event.step, 2);
    }

    #[test]
    fn test_lagging_subscriber_keeps_latest() {
        let progress = ProgressBroadcaster::new(2);
        let mut sub = progress.subscribe();

        for step in 1..=5 {
            progress.emit(ProgressEvent::new(step, 5, "step"));
        }

        let steps: Vec<usize> = sub.drain().into_iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![4, 5]);
    }

    #[test]
    fn test_recv_ends_when_broadcaster_dropped() {
        let progress = ProgressBroadcaster::new(4);
        let mut sub = progress.subscribe();
        progress.emit(ProgressEvent::new(1, 1, "Loading"));
        drop(progress);

        tokio_test::block_on(async {
            assert_eq!(sub.recv().await.map(|e| e.step), Some(1));
            assert_eq!(sub.recv().await, None);
        });
    }
}
