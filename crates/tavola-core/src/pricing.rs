//! # Pricing Calculator
//!
//! Derives subtotal, discount and total from an order's lines and modifiers.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Total Calculation                           │
//! │                                                                         │
//! │  Lines (captured prices only, removed lines skipped)                    │
//! │  ┌───────────────────┬─────┬──────────┐                                │
//! │  │ Margherita        │  1  │ 10.00    │                                │
//! │  │ Tiramisu          │  1  │  5.00    │                                │
//! │  └───────────────────┴─────┴──────────┘                                │
//! │  subtotal                         15.00                                 │
//! │  − discount (10%)                  1.50   clamped to [0, subtotal]      │
//! │  + service charge                  0.00                                 │
//! │  + delivery fee                    0.00                                 │
//! │  + packaging fee                   0.00                                 │
//! │  − coupon                          0.00                                 │
//! │  − loyalty                         0.00                                 │
//! │  ═══════════════════════════════════════                                │
//! │  total                            13.50   floored at 0                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is pure. Mutating code paths call [`Order::reprice`]
//! as their last step so the total invariant holds identically everywhere.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{BasisPoints, DiscountKind, Order, OrderItem, PaymentStatus};

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// Every monetary adjustment applied on top of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Modifiers {
    pub discount_kind: DiscountKind,
    /// Cents for `Fixed`, bps for `Percent`.
    pub discount_value: i64,
    pub service_charge: Money,
    pub delivery_fee: Money,
    pub packaging_fee: Money,
    pub coupon_discount: Money,
    pub loyalty_discount: Money,
}

/// Result of [`compute_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: Money,
    /// Resolved discount amount.
    pub discount: Money,
    pub total: Money,
}

/// Result of [`apply_payment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentOutcome {
    /// Portion of the tendered amount that counts against the balance.
    pub applied: Money,
    /// Surplus handed back.
    pub change: Money,
    pub new_paid: Money,
    pub status: PaymentStatus,
}

// =============================================================================
// Totals
// =============================================================================

/// Resolves a discount input into an amount clamped to `[0, subtotal]`.
///
/// ```rust
/// use tavola_core::money::Money;
/// use tavola_core::pricing::resolve_discount;
/// use tavola_core::types::DiscountKind;
///
/// let subtotal = Money::from_cents(1500);
/// assert_eq!(resolve_discount(subtotal, DiscountKind::Percent, 1000).cents(), 150);
/// assert_eq!(resolve_discount(subtotal, DiscountKind::Fixed, 9999), subtotal);
/// ```
pub fn resolve_discount(subtotal: Money, kind: DiscountKind, value: i64) -> Money {
    let raw = match kind {
        DiscountKind::Fixed => Money::from_cents(value),
        DiscountKind::Percent => subtotal.percentage(BasisPoints::from_stored(value)),
    };
    raw.clamp_between(Money::zero(), subtotal.non_negative())
}

/// Computes totals from captured line prices and modifiers.
///
/// Removed lines are skipped. The catalog is never consulted.
pub fn compute_totals(items: &[OrderItem], modifiers: &Modifiers) -> OrderTotals {
    let subtotal: Money = items
        .iter()
        .filter(|item| item.is_active())
        .map(|item| item.line_total())
        .sum();

    let discount = resolve_discount(subtotal, modifiers.discount_kind, modifiers.discount_value);

    let total = (subtotal - discount
        + modifiers.service_charge
        + modifiers.delivery_fee
        + modifiers.packaging_fee
        - modifiers.coupon_discount
        - modifiers.loyalty_discount)
        .non_negative();

    OrderTotals {
        subtotal,
        discount,
        total,
    }
}

/// Total before the loyalty discount: the value points may absorb.
pub fn value_before_loyalty(items: &[OrderItem], modifiers: &Modifiers) -> Money {
    let without_loyalty = Modifiers {
        loyalty_discount: Money::zero(),
        ..*modifiers
    };
    compute_totals(items, &without_loyalty).total
}

// =============================================================================
// Payments
// =============================================================================

/// `unpaid` if nothing paid, `paid` once `paid ≥ total > 0`, else `partial`.
pub fn payment_status(paid: Money, total: Money) -> PaymentStatus {
    if !paid.is_positive() {
        PaymentStatus::Unpaid
    } else if total.is_positive() && paid >= total {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

#[inline]
pub fn remaining_balance(total: Money, paid: Money) -> Money {
    (total - paid).non_negative()
}

/// Applies a tendered amount to a balance.
///
/// Paid never exceeds total; any surplus becomes change.
///
/// ```rust
/// use tavola_core::money::Money;
/// use tavola_core::pricing::apply_payment;
/// use tavola_core::types::PaymentStatus;
///
/// let outcome = apply_payment(Money::from_cents(1150), Money::zero(), Money::from_cents(2000));
/// assert_eq!(outcome.applied.cents(), 1150);
/// assert_eq!(outcome.change.cents(), 850);
/// assert_eq!(outcome.status, PaymentStatus::Paid);
/// ```
pub fn apply_payment(total: Money, paid: Money, amount: Money) -> PaymentOutcome {
    let remaining = remaining_balance(total, paid);
    let applied = amount.non_negative().clamp_between(Money::zero(), remaining);
    let change = (amount - applied).non_negative();
    let new_paid = paid + applied;

    PaymentOutcome {
        applied,
        change,
        new_paid,
        status: payment_status(new_paid, total),
    }
}

// =============================================================================
// Options
// =============================================================================

/// `base + Σ(adjustment × quantity)`.
pub fn unit_price_with_options<I>(base: Money, options: I) -> Money
where
    I: IntoIterator<Item = (Money, i64)>,
{
    options
        .into_iter()
        .fold(base, |acc, (adjustment, qty)| acc + adjustment.multiply_quantity(qty))
}

// =============================================================================
// Order Integration
// =============================================================================

impl Order {
    /// Current modifier fields as a [`Modifiers`] value.
    pub fn modifiers(&self) -> Modifiers {
        Modifiers {
            discount_kind: self.discount_kind,
            discount_value: self.discount_value,
            service_charge: Money::from_cents(self.service_charge_cents),
            delivery_fee: Money::from_cents(self.delivery_fee_cents),
            packaging_fee: Money::from_cents(self.packaging_fee_cents),
            coupon_discount: Money::from_cents(self.coupon_discount_cents),
            loyalty_discount: Money::from_cents(self.loyalty_discount_cents),
        }
    }

    /// Recomputes derived money fields from `items`.
    ///
    /// Fails without touching `self` when the new total would drop below the
    /// amount already paid.
    pub fn reprice(&mut self, items: &[OrderItem]) -> CoreResult<OrderTotals> {
        let totals = compute_totals(items, &self.modifiers());

        if totals.total < self.paid() {
            return Err(CoreError::TotalBelowPaid {
                total: totals.total.cents(),
                paid: self.paid_cents,
            });
        }

        self.subtotal_cents = totals.subtotal.cents();
        self.discount_cents = totals.discount.cents();
        self.total_cents = totals.total.cents();
        self.payment_status = payment_status(self.paid(), totals.total);

        Ok(totals)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{OrderStatus, OrderType};
    use chrono::Utc;

    pub(crate) fn item(id: &str, unit_cents: i64, qty: i64) -> OrderItem {
        OrderItem {
            id: id.to_string(),
            order_id: "order-1".to_string(),
            menu_item_id: format!("menu-{id}"),
            name_snapshot: id.to_string(),
            quantity: qty,
            unit_price_cents: unit_cents,
            guest_id: None,
            notes: None,
            removed_at: None,
            created_at: Utc::now(),
            options: Vec::new(),
        }
    }

    pub(crate) fn order() -> Order {
        let now = Utc::now();
        Order {
            id: "order-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            table_id: None,
            session_id: None,
            branch_id: None,
            order_type: OrderType::Takeout,
            status: OrderStatus::Pending,
            customer_id: None,
            customer_name: Some("Ada".to_string()),
            customer_phone: Some("+15550100".to_string()),
            delivery_address: None,
            subtotal_cents: 0,
            discount_value: 0,
            discount_kind: DiscountKind::Fixed,
            discount_cents: 0,
            service_charge_cents: 0,
            service_charge_label: None,
            delivery_fee_cents: 0,
            packaging_fee_cents: 0,
            coupon_id: None,
            coupon_discount_cents: 0,
            loyalty_points_redeemed: 0,
            loyalty_discount_cents: 0,
            total_cents: 0,
            paid_cents: 0,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            change_cents: 0,
            refunded_cents: 0,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_by: None,
            notes: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn check_total_formula(totals: &OrderTotals, m: &Modifiers) {
        let expected = (totals.subtotal - totals.discount + m.service_charge + m.delivery_fee
            + m.packaging_fee
            - m.coupon_discount
            - m.loyalty_discount)
            .non_negative();
        assert_eq!(totals.total, expected);
    }

    #[test]
    fn test_percent_discount_scenario() {
        let items = vec![item("pizza", 1000, 1), item("dessert", 500, 1)];
        let modifiers = Modifiers {
            discount_kind: DiscountKind::Percent,
            discount_value: 1000,
            ..Default::default()
        };

        let totals = compute_totals(&items, &modifiers);
        assert_eq!(totals.subtotal.cents(), 1500);
        assert_eq!(totals.discount.cents(), 150);
        assert_eq!(totals.total.cents(), 1350);
        check_total_formula(&totals, &modifiers);
    }

    #[test]
    fn test_coupon_then_full_payment_scenario() {
        let items = vec![item("pizza", 1000, 1), item("dessert", 500, 1)];
        let modifiers = Modifiers {
            discount_kind: DiscountKind::Percent,
            discount_value: 1000,
            coupon_discount: Money::from_cents(200),
            ..Default::default()
        };

        let totals = compute_totals(&items, &modifiers);
        assert_eq!(totals.total.cents(), 1150);

        let outcome = apply_payment(totals.total, Money::zero(), Money::from_cents(1150));
        assert_eq!(outcome.new_paid.cents(), 1150);
        assert_eq!(outcome.change, Money::zero());
        assert_eq!(outcome.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_removed_items_excluded() {
        let mut removed = item("soup", 700, 2);
        removed.removed_at = Some(Utc::now());
        let items = vec![item("bread", 300, 1), removed];

        let totals = compute_totals(&items, &Modifiers::default());
        assert_eq!(totals.subtotal.cents(), 300);
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let items = vec![item("tea", 250, 2)];
        let fixed = Modifiers {
            discount_kind: DiscountKind::Fixed,
            discount_value: 10_000,
            service_charge: Money::from_cents(100),
            ..Default::default()
        };
        let totals = compute_totals(&items, &fixed);
        assert_eq!(totals.discount.cents(), 500);
        assert_eq!(totals.total.cents(), 100);

        let negative = Modifiers {
            discount_value: -300,
            ..Default::default()
        };
        assert_eq!(compute_totals(&items, &negative).discount, Money::zero());
    }

    #[test]
    fn test_total_floors_at_zero() {
        let items = vec![item("water", 200, 1)];
        let modifiers = Modifiers {
            coupon_discount: Money::from_cents(150),
            loyalty_discount: Money::from_cents(150),
            ..Default::default()
        };
        let totals = compute_totals(&items, &modifiers);
        assert_eq!(totals.total, Money::zero());
        check_total_formula(&totals, &modifiers);
    }

    #[test]
    fn test_fees_added() {
        let items = vec![item("burger", 1200, 1)];
        let modifiers = Modifiers {
            service_charge: Money::from_cents(120),
            delivery_fee: Money::from_cents(300),
            packaging_fee: Money::from_cents(50),
            ..Default::default()
        };
        let totals = compute_totals(&items, &modifiers);
        assert_eq!(totals.total.cents(), 1670);
        check_total_formula(&totals, &modifiers);
    }

    #[test]
    fn test_compute_totals_is_deterministic() {
        let items = vec![item("a", 333, 3), item("b", 1001, 1)];
        let modifiers = Modifiers {
            discount_kind: DiscountKind::Percent,
            discount_value: 1250,
            packaging_fee: Money::from_cents(40),
            ..Default::default()
        };
        assert_eq!(compute_totals(&items, &modifiers), compute_totals(&items, &modifiers));
    }

    #[test]
    fn test_payment_status_rule() {
        let total = Money::from_cents(1000);
        assert_eq!(payment_status(Money::zero(), total), PaymentStatus::Unpaid);
        assert_eq!(payment_status(Money::from_cents(1), total), PaymentStatus::Partial);
        assert_eq!(payment_status(total, total), PaymentStatus::Paid);
        assert_eq!(payment_status(Money::zero(), Money::zero()), PaymentStatus::Unpaid);
    }

    #[test]
    fn test_apply_payment_caps_paid_at_total() {
        let total = Money::from_cents(1000);

        let first = apply_payment(total, Money::zero(), Money::from_cents(400));
        assert_eq!(first.applied.cents(), 400);
        assert_eq!(first.status, PaymentStatus::Partial);

        let second = apply_payment(total, first.new_paid, Money::from_cents(1000));
        assert_eq!(second.applied.cents(), 600);
        assert_eq!(second.change.cents(), 400);
        assert_eq!(second.new_paid, total);
        assert!(second.new_paid <= total);
    }

    #[test]
    fn test_unit_price_with_options() {
        let price = unit_price_with_options(
            Money::from_cents(900),
            vec![(Money::from_cents(150), 2), (Money::from_cents(-100), 1)],
        );
        assert_eq!(price.cents(), 1100);
    }

    #[test]
    fn test_reprice_updates_order() {
        let mut order = order();
        let items = vec![item("pizza", 1000, 1), item("dessert", 500, 1)];
        order.discount_kind = DiscountKind::Percent;
        order.discount_value = 1000;

        let totals = order.reprice(&items).unwrap();
        assert_eq!(totals.total.cents(), 1350);
        assert_eq!(order.subtotal_cents, 1500);
        assert_eq!(order.discount_cents, 150);
        assert_eq!(order.total_cents, 1350);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_reprice_rejects_total_below_paid() {
        let mut order = order();
        let items = vec![item("pizza", 1000, 1)];
        order.reprice(&items).unwrap();
        order.paid_cents = 1000;

        order.discount_value = 200;
        let before_total = order.total_cents;
        let err = order.reprice(&items).unwrap_err();
        assert!(matches!(err, CoreError::TotalBelowPaid { total: 800, paid: 1000 }));
        assert_eq!(order.total_cents, before_total);
    }

    #[test]
    fn test_value_before_loyalty() {
        let items = vec![item("pizza", 1000, 1)];
        let modifiers = Modifiers {
            loyalty_discount: Money::from_cents(300),
            ..Default::default()
        };
        assert_eq!(value_before_loyalty(&items, &modifiers).cents(), 1000);
    }
}
