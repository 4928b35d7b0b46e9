//! # Domain Events
//!
//! Notifications emitted after a state change commits.
//!
//! Delivery is fire-and-forget and at-most-once. Displays must still be able
//! to refetch authoritative state; an event is a hint, never the record.
//!
//! ## Wire Shape
//! ```json
//! { "type": "order_payment_recorded", "payload": { "order_id": "...", ... } }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{GuestStatus, OrderStatus, OrderType, PaymentMethod, PaymentStatus, TableStatus};

/// Everything the engine announces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DomainEvent {
    NewOrder {
        order_id: String,
        order_type: OrderType,
        table_id: Option<String>,
        total: Money,
    },
    OrderStatusUpdated {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderPaymentRecorded {
        order_id: String,
        amount: Money,
        method: PaymentMethod,
        paid: Money,
        payment_status: PaymentStatus,
    },
    OrderPaymentCompleted {
        order_id: String,
        total: Money,
    },
    OrderCancelled {
        order_id: String,
        reason: Option<String>,
    },
    /// Items or modifiers changed.
    OrderUpdated {
        order_id: String,
        total: Money,
    },
    GuestJoined {
        session_id: String,
        guest_id: String,
        table_number: i64,
        name: Option<String>,
    },
    BillRequested {
        table_id: String,
        session_id: String,
        guest_id: Option<String>,
    },
    GuestStatusChanged {
        guest_id: String,
        status: GuestStatus,
    },
    TableSessionStarted {
        table_id: String,
        session_id: String,
    },
    TableSessionEnded {
        table_id: String,
        session_id: String,
        total: Money,
        paid: Money,
        forced: bool,
    },
    TableStatusChanged {
        table_id: String,
        from: TableStatus,
        to: TableStatus,
    },
    SessionPaymentRecorded {
        session_id: String,
        amount: Money,
        paid: Money,
    },
    BillSplitUpdated {
        session_id: String,
        split_id: String,
        finalized: bool,
    },
    ItemReassigned {
        item_id: String,
        from_guest_id: Option<String>,
        to_guest_id: String,
    },
}

impl DomainEvent {
    /// Event name as published to displays.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::NewOrder { .. } => "new_order",
            DomainEvent::OrderStatusUpdated { .. } => "order_status_updated",
            DomainEvent::OrderPaymentRecorded { .. } => "order_payment_recorded",
            DomainEvent::OrderPaymentCompleted { .. } => "order_payment_completed",
            DomainEvent::OrderCancelled { .. } => "order_cancelled",
            DomainEvent::OrderUpdated { .. } => "order_updated",
            DomainEvent::GuestJoined { .. } => "guest_joined",
            DomainEvent::BillRequested { .. } => "bill_requested",
            DomainEvent::GuestStatusChanged { .. } => "guest_status_changed",
            DomainEvent::TableSessionStarted { .. } => "table_session_started",
            DomainEvent::TableSessionEnded { .. } => "table_session_ended",
            DomainEvent::TableStatusChanged { .. } => "table_status_changed",
            DomainEvent::SessionPaymentRecorded { .. } => "session_payment_recorded",
            DomainEvent::BillSplitUpdated { .. } => "bill_split_updated",
            DomainEvent::ItemReassigned { .. } => "item_reassigned",
        }
    }
}
