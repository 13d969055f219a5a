//! # Store Events
//!
//! Fire-and-forget notifications for the layers around the engine (game
//! server bridges, caches).
//!
//! ```text
//! EntitlementGranter ──commit──► EventBus::publish ──► broadcast ──┬─► subscriber A
//!                                                                  └─► subscriber B
//! ```
//!
//! Publishing happens after the transaction commits, so subscribers never
//! see a grant that was rolled back. A missing or lagging subscriber never
//! fails the request that produced the event.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use storefront_core::DonorGrant;

/// Something that happened in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A donor group grant was created or extended.
    DonorGroupGranted { grant: DonorGrant },
}

/// Broadcast channel for [`StoreEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Sends to every current subscriber.
    pub fn publish(&self, event: StoreEvent) {
        // Err only means nobody is listening
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!(receivers, "Published store event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn grant() -> DonorGrant {
        DonorGrant {
            id: 1,
            user_uuid: "u".to_string(),
            server_id: "alpha".to_string(),
            group_id: 2,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(StoreEvent::DonorGroupGranted { grant: grant() });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        let event = StoreEvent::DonorGroupGranted { grant: grant() };
        bus.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(StoreEvent::DonorGroupGranted { grant: grant() }).unwrap();
        assert_eq!(json["type"], "donor_group_granted");
        assert_eq!(json["payload"]["grant"]["group_id"], 2);
    }
}
