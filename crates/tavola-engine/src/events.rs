//! # Event Sink
//!
//! Where committed state changes are announced.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OrderManager ──┐                           ┌──► kitchen display        │
//! │                 │  uow.commit() then        │                           │
//! │                 ├── publish(tenant, event) ─┼──► table display          │
//! │  TableManager ──┘   (fire-and-forget)       │                           │
//! │                                             └──► (nobody listening: ok) │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-most-once. A lagging or absent subscriber never fails the
//! operation that produced the event.

use tokio::sync::broadcast;
use tracing::{debug, trace};

use tavola_core::DomainEvent;

/// Receives domain events after commit.
pub trait EventSink: Send + Sync {
    fn publish(&self, tenant_id: &str, event: DomainEvent);
}

/// An event tagged with the tenant it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantEvent {
    pub tenant_id: String,
    pub event: DomainEvent,
}

/// In-process fan-out over a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TenantEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastSink { tx }
    }

    /// New receiver; sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TenantEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, tenant_id: &str, event: DomainEvent) {
        let name = event.name();
        let delivered = self
            .tx
            .send(TenantEvent {
                tenant_id: tenant_id.to_string(),
                event,
            })
            .unwrap_or(0);
        debug!(tenant_id = %tenant_id, event = name, delivered, "Event published");
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, tenant_id: &str, event: DomainEvent) {
        trace!(tenant_id = %tenant_id, event = event.name(), "Event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tavola_core::Money;

    fn completed(order_id: &str) -> DomainEvent {
        DomainEvent::OrderPaymentCompleted {
            order_id: order_id.to_string(),
            total: Money::from_cents(100),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.publish("t1", completed("o1"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.tenant_id, "t1");
        assert_eq!(received.event, completed("o1"));
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let sink = BroadcastSink::new(8);
        assert_eq!(sink.subscriber_count(), 0);
        sink.publish("t1", completed("o1"));
        NullSink.publish("t1", completed("o2"));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_block() {
        let sink = BroadcastSink::new(1);
        let mut rx = sink.subscribe();

        sink.publish("t1", completed("o1"));
        sink.publish("t1", completed("o2"));

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().event, completed("o2"));
    }
}
