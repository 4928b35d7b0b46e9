//! # Order Lifecycle Rules
//!
//! Status transitions and the mutation guards every order operation checks.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Status      │ items/modifiers │ payment │ cancel │ status change    │
//! │──────────────┼─────────────────┼─────────┼────────┼──────────────────│
//! │  pending     │       ✓         │    ✓    │   ✓    │ forward          │
//! │  preparing   │       ✓         │    ✓    │   ✓    │ forward          │
//! │  ready       │       ✓         │    ✓    │   ✓    │ forward          │
//! │  served      │       ✗         │    ✗    │   ✗    │ ✗                │
//! │  cancelled   │       ✗         │    ✗    │   ✗    │ ✗                │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//! Refunds are the one money operation allowed in every status.

use crate::error::{CoreError, CoreResult};
use crate::types::{Order, OrderStatus, PaymentStatus};

impl OrderStatus {
    /// Position along the forward path. Cancelled sits off the path.
    const fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Preparing => 1,
            OrderStatus::Ready => 2,
            OrderStatus::Served => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Served | OrderStatus::Cancelled)
    }

    /// Forward-only; skips allowed. Cancelled reachable from any open state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl Order {
    /// Guard for item and modifier mutations.
    pub fn ensure_mutable(&self) -> CoreResult<()> {
        match self.status {
            OrderStatus::Served => Err(CoreError::OrderAlreadyServed {
                order_id: self.id.clone(),
            }),
            OrderStatus::Cancelled => Err(CoreError::OrderCancelled {
                order_id: self.id.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Guard for recording a payment: mutable and not yet paid in full.
    pub fn ensure_payable(&self) -> CoreResult<()> {
        self.ensure_mutable()?;
        if self.payment_status == PaymentStatus::Paid {
            return Err(CoreError::OrderAlreadyPaid {
                order_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Validates and applies a status change.
    pub fn transition_to(&mut self, next: OrderStatus) -> CoreResult<OrderStatus> {
        self.ensure_mutable()?;
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tests::order;

    #[test]
    fn test_forward_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Preparing));
        assert!(Pending.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Served));
        assert!(!Ready.can_transition_to(Pending));
        assert!(!Preparing.can_transition_to(Preparing));
    }

    #[test]
    fn test_cancel_reachable_from_open_states_only() {
        use OrderStatus::*;
        for status in [Pending, Preparing, Ready] {
            assert!(status.can_transition_to(Cancelled));
        }
        assert!(!Served.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn test_served_order_is_frozen() {
        let mut o = order();
        o.status = OrderStatus::Served;
        assert!(matches!(o.ensure_mutable(), Err(CoreError::OrderAlreadyServed { .. })));
        assert!(matches!(o.ensure_payable(), Err(CoreError::OrderAlreadyServed { .. })));
        assert!(o.transition_to(OrderStatus::Cancelled).is_err());
        assert_eq!(o.status, OrderStatus::Served);
    }

    #[test]
    fn test_cancelled_order_is_frozen() {
        let mut o = order();
        o.status = OrderStatus::Cancelled;
        assert!(matches!(o.ensure_mutable(), Err(CoreError::OrderCancelled { .. })));
        assert!(o.transition_to(OrderStatus::Preparing).is_err());
    }

    #[test]
    fn test_paid_order_rejects_payment() {
        let mut o = order();
        o.payment_status = PaymentStatus::Paid;
        assert!(matches!(o.ensure_payable(), Err(CoreError::OrderAlreadyPaid { .. })));
    }

    #[test]
    fn test_transition_returns_previous() {
        let mut o = order();
        let previous = o.transition_to(OrderStatus::Ready).unwrap();
        assert_eq!(previous, OrderStatus::Pending);
        assert_eq!(o.status, OrderStatus::Ready);

        let err = o.transition_to(OrderStatus::Preparing).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidStatusTransition {
                from: OrderStatus::Ready,
                to: OrderStatus::Preparing
            }
        ));
    }
}
