//! Cart lifecycle events.
//!
//! Events are published on a [`tokio::sync::broadcast`] channel. Receivers
//! that fall behind lose the oldest events (`RecvError::Lagged`); publishing
//! never blocks and never fails when nobody is listening.

use serde::Serialize;
use tokio::sync::broadcast;

use iwishbag_core::QuoteId;

/// Something that happened to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { quote_id: QuoteId },
    ItemRemoved { quote_id: QuoteId },
    ItemUpdated { quote_id: QuoteId },
    CartCleared { removed: usize },
    /// An undo step was applied.
    HistoryRestored { total_items: usize },
    SyncStarted,
    SyncCompleted { version: u64 },
    SyncFailed { reason: String },
    /// A save was rejected because the stored version moved on.
    ConflictDetected {
        local_version: Option<u64>,
        remote_version: u64,
    },
}

impl CartEvent {
    /// Stable snake-case event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "item_added",
            Self::ItemRemoved { .. } => "item_removed",
            Self::ItemUpdated { .. } => "item_updated",
            Self::CartCleared { .. } => "cart_cleared",
            Self::HistoryRestored { .. } => "history_restored",
            Self::SyncStarted => "sync_started",
            Self::SyncCompleted { .. } => "sync_completed",
            Self::SyncFailed { .. } => "sync_failed",
            Self::ConflictDetected { .. } => "conflict_detected",
        }
    }
}

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Broadcast bus for [`CartEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CartEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning the number of receivers that got it.
    pub fn publish(&self, event: CartEvent) -> usize {
        tracing::trace!(event = event.name(), "publishing cart event");
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::time::{Duration, timeout};

    #[test]
    fn test_publish_without_receivers_is_ok() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(CartEvent::SyncStarted), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(CartEvent::SyncStarted);
        bus.publish(CartEvent::SyncCompleted { version: 3 });

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(first.unwrap(), CartEvent::SyncStarted);
        assert_eq!(second.unwrap(), CartEvent::SyncCompleted { version: 3 });
    }

    #[test]
    fn test_serialized_shape() {
        let id = QuoteId::generate();
        let json = serde_json::to_value(CartEvent::ItemAdded { quote_id: id }).unwrap();
        assert_eq!(json["type"], "item_added");
        assert_eq!(json["quote_id"], id.to_string());
        assert_eq!(CartEvent::ItemAdded { quote_id: id }.name(), "item_added");
    }
}
