//! # Domain Types
//!
//! Core domain types used throughout Tavola.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Table       │   │  TableSession   │   │     Guest       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  number         │──►│  total / paid   │──►│  token          │       │
//! │  │  status         │   │  ended_at       │   │  subtotal       │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │  ┌─────────────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │   OrderItem     │◄──│     Order       │──►│    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  unit_price     │   │  modifiers      │   │  amount         │       │
//! │  │  (frozen)       │   │  total / paid   │   │  change         │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │ weak refs                             │
//! │                     ┌───────────┴───────────┐                           │
//! │              ┌──────▼──────┐        ┌───────▼───────┐                   │
//! │              │   Coupon    │        │   Customer    │                   │
//! │              └─────────────┘        └───────────────┘                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money Fields
//! Persisted structs keep raw `*_cents: i64` columns and expose `Money`
//! accessors, so rows map straight onto the SQLite schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Basis Points
// =============================================================================

/// A rate in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% (a typical percent discount)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BasisPoints(u32);

impl BasisPoints {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        BasisPoints(bps)
    }

    /// Builds a rate from a stored signed value; negatives become zero.
    #[inline]
    pub fn from_stored(value: i64) -> Self {
        BasisPoints(value.clamp(0, u32::MAX as i64) as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        BasisPoints(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for BasisPoints {
    fn default() -> Self {
        BasisPoints::zero()
    }
}

/// Implements `as_str`, `Display` and `FromStr` for a field-less enum using
/// the same spelling as its serde/sqlx representation.
macro_rules! string_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: vec![$($name.to_string()),+],
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Order Enums
// =============================================================================

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Dine-in at a physical table.
    Table,
    Delivery,
    Takeout,
    /// Walk-up counter service.
    Counter,
    /// Rung up directly on a register.
    Pos,
}

string_enum!(OrderType, "order_type", {
    Table => "table",
    Delivery => "delivery",
    Takeout => "takeout",
    Counter => "counter",
    Pos => "pos",
});

/// Kitchen-facing order status.
///
/// ## State Machine
/// ```text
/// pending ──► preparing ──► ready ──► served
///    │            │           │
///    └────────────┴───────────┴──► cancelled
/// ```
/// Forward skips (pending → ready) are allowed. `served` and `cancelled`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

string_enum!(OrderStatus, "status", {
    Pending => "pending",
    Preparing => "preparing",
    Ready => "ready",
    Served => "served",
    Cancelled => "cancelled",
});

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// Derived from `(paid, total)`; never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

string_enum!(PaymentStatus, "payment_status", {
    Unpaid => "unpaid",
    Partial => "partial",
    Paid => "paid",
});

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Unpaid
    }
}

/// Interpretation of a discount value.
///
/// `Fixed` values are cents. `Percent` values are basis points (1000 = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Fixed,
    Percent,
}

string_enum!(DiscountKind, "discount_kind", {
    Fixed => "fixed",
    Percent => "percent",
});

impl Default for DiscountKind {
    fn default() -> Self {
        DiscountKind::Fixed
    }
}

/// Manually recorded payment methods. There is no gateway integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash; may produce change.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Wallet or bank transfer.
    Mobile,
    Other,
}

string_enum!(PaymentMethod, "method", {
    Cash => "cash",
    Card => "card",
    Mobile => "mobile",
    Other => "other",
});

// =============================================================================
// Order
// =============================================================================

/// One customer transaction.
///
/// ## Total Invariant
/// ```text
/// total = max(0, subtotal − discount + service_charge + delivery_fee
///                + packaging_fee − coupon_discount − loyalty_discount)
/// ```
/// Maintained by [`Order::reprice`](crate::pricing) after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    pub table_id: Option<String>,
    pub session_id: Option<String>,
    pub branch_id: Option<String>,
    pub order_type: OrderType,
    pub status: OrderStatus,

    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,

    /// Σ(unit price × quantity) over non-removed items.
    pub subtotal_cents: i64,
    /// Raw discount input: cents for `Fixed`, bps for `Percent`.
    pub discount_value: i64,
    pub discount_kind: DiscountKind,
    /// Resolved discount, clamped to `[0, subtotal]`.
    pub discount_cents: i64,
    pub service_charge_cents: i64,
    pub service_charge_label: Option<String>,
    pub delivery_fee_cents: i64,
    pub packaging_fee_cents: i64,
    /// Weak reference; the captured discount survives coupon deletion.
    pub coupon_id: Option<String>,
    pub coupon_discount_cents: i64,
    pub loyalty_points_redeemed: i64,
    pub loyalty_discount_cents: i64,
    pub total_cents: i64,

    pub paid_cents: i64,
    pub payment_status: PaymentStatus,
    /// Method of the most recent payment.
    pub payment_method: Option<PaymentMethod>,
    /// Change handed back across all payments.
    pub change_cents: i64,
    /// Manually tracked refunds. Payments are never reversed.
    pub refunded_cents: i64,

    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,

    pub created_by: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency stamp, bumped on every write.
    pub version: i64,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn refunded(&self) -> Money {
        Money::from_cents(self.refunded_cents)
    }

    /// Amount still owed.
    #[inline]
    pub fn balance_due(&self) -> Money {
        (self.total() - self.paid()).non_negative()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item on an order.
/// Uses snapshot pattern to freeze menu data at time of order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_item_id: String,
    /// Menu item name at time of order (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Base price plus option adjustments at time of order (frozen).
    pub unit_price_cents: i64,
    /// Guest this line is attributed to, for per-person bills.
    pub guest_id: Option<String>,
    pub notes: Option<String>,
    /// Soft removal; removed lines no longer count toward totals.
    #[ts(as = "Option<String>")]
    pub removed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub options: Vec<SelectedOption>,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// True when the line still counts toward totals.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }
}

/// A catalog option chosen for an order item, with its price frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SelectedOption {
    pub id: String,
    pub order_item_id: String,
    pub option_id: String,
    pub name_snapshot: String,
    pub price_adjustment_cents: i64,
    pub quantity: i64,
}

impl SelectedOption {
    #[inline]
    pub fn price_adjustment(&self) -> Money {
        Money::from_cents(self.price_adjustment_cents)
    }
}

/// A requested line, as submitted by a client.
///
/// Carries no price: the unit price is always resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemRequest {
    pub menu_item_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub guest_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionChoice>,
}

impl ItemRequest {
    pub fn new(menu_item_id: impl Into<String>, quantity: i64) -> Self {
        ItemRequest {
            menu_item_id: menu_item_id.into(),
            quantity,
            guest_id: None,
            notes: None,
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option_id: impl Into<String>, quantity: i64) -> Self {
        self.options.push(OptionChoice {
            option_id: option_id.into(),
            quantity,
        });
        self
    }

    pub fn for_guest(mut self, guest_id: impl Into<String>) -> Self {
        self.guest_id = Some(guest_id.into());
        self
    }
}

/// An option selection inside an [`ItemRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OptionChoice {
    pub option_id: String,
    pub quantity: i64,
}

// =============================================================================
// Tables & Sessions
// =============================================================================

/// Physical table status.
///
/// ## State Machine
/// ```text
///   ┌──────┐   ┌──────────┐   ┌─────────────┐   ┌──────────────────┐   ┌────────┐
///   │ free │──►│ occupied │──►│ in_progress │──►│ awaiting_payment │──►│ closed │
///   └──▲───┘   └──────────┘   └─────────────┘   └──────────────────┘   └───┬────┘
///      └────────────────────────────────────────────────────────────────────┘
/// ```
/// `free` and `closed` are equivalent rest states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Free,
    Occupied,
    InProgress,
    AwaitingPayment,
    Closed,
}

string_enum!(TableStatus, "table_status", {
    Free => "free",
    Occupied => "occupied",
    InProgress => "in_progress",
    AwaitingPayment => "awaiting_payment",
    Closed => "closed",
});

impl Default for TableStatus {
    fn default() -> Self {
        TableStatus::Free
    }
}

/// A physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Table {
    pub id: String,
    pub tenant_id: String,
    /// Unique per tenant; printed on the QR code.
    pub number: i64,
    pub capacity: i64,
    pub area: Option<String>,
    pub status: TableStatus,
    /// Cleared when an order on the table is served.
    pub is_occupied: bool,
    pub current_session_id: Option<String>,
    /// Mirror of the active session's total for fast reads.
    pub current_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Table {
    #[inline]
    pub fn current_total(&self) -> Money {
        Money::from_cents(self.current_total_cents)
    }
}

/// One occupancy of a table, from open to close. The billing unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TableSession {
    pub id: String,
    pub tenant_id: String,
    pub table_id: String,
    /// Mirrors the table's status while the session is active.
    pub status: TableStatus,
    /// Σ totals of non-cancelled attached orders.
    pub total_cents: i64,
    /// Σ payments recorded against the session.
    pub paid_cents: i64,
    pub customer_name: Option<String>,
    pub customer_count: Option<i64>,
    pub shift_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_by: Option<String>,
    /// Closed by operator override while unsettled.
    pub forced_close: bool,
    /// JSON-encoded `ClosingSnapshot`, written once at close.
    pub closing_snapshot: Option<String>,
    pub created_by: Option<String>,
    pub version: i64,
}

impl TableSession {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Settlement: everything owed has been paid.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.paid() >= self.total()
    }
}

/// Guest lifecycle within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GuestStatus {
    Active,
    AwaitingBill,
    Paid,
    Left,
}

string_enum!(GuestStatus, "guest_status", {
    Active => "active",
    AwaitingBill => "awaiting_bill",
    Paid => "paid",
    Left => "left",
});

impl GuestStatus {
    /// Terminal guests cannot receive items.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, GuestStatus::Paid | GuestStatus::Left)
    }
}

/// One occupant of a table session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Guest {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    pub name: Option<String>,
    pub seat_number: Option<i64>,
    /// 256-bit random hex token identifying the guest's device.
    pub token: String,
    pub status: GuestStatus,
    /// Σ attributed non-removed items on non-cancelled orders.
    pub subtotal_cents: i64,
    #[ts(as = "String")]
    pub joined_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Guest {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A recorded payment. Immutable once written.
///
/// Attached to an order, a session, or both (order payments on a table
/// order also count toward the session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub tenant_id: String,
    pub order_id: Option<String>,
    pub session_id: Option<String>,
    pub method: PaymentMethod,
    /// Amount applied against the balance.
    pub amount_cents: i64,
    /// Amount the customer handed over.
    pub tendered_cents: i64,
    /// Surplus returned to the customer.
    pub change_cents: i64,
    /// External reference (card auth code, etc.).
    pub reference: Option<String>,
    pub recorded_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Coupons
// =============================================================================

/// A discount code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Coupon {
    pub id: String,
    pub tenant_id: String,
    /// Stored uppercase; lookups are case-insensitive.
    pub code: String,
    pub description: Option<String>,
    pub discount_kind: DiscountKind,
    /// Cents for `Fixed`, bps for `Percent`.
    pub discount_value: i64,
    pub max_discount_cents: Option<i64>,
    pub min_order_cents: i64,
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub max_uses_per_customer: Option<i64>,
    pub current_uses: i64,
    /// Comma-separated order types; empty means every type.
    pub applicable_order_types: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Normalizes a code for storage and lookup.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    /// Parsed applicable order types. Unknown entries are ignored.
    pub fn applicable_types(&self) -> Vec<OrderType> {
        self.applicable_order_types
            .split(',')
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    pub fn applies_to(&self, order_type: OrderType) -> bool {
        let types = self.applicable_types();
        types.is_empty() || types.contains(&order_type)
    }

    /// Encodes a list of order types into the stored column format.
    pub fn encode_order_types(types: &[OrderType]) -> String {
        types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Immutable record of one coupon redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CouponUsage {
    pub id: String,
    pub tenant_id: String,
    pub coupon_id: String,
    pub order_id: String,
    pub customer_id: Option<String>,
    pub discount_cents: i64,
    #[ts(as = "String")]
    pub used_at: DateTime<Utc>,
}

// =============================================================================
// Loyalty
// =============================================================================

/// Per-tenant loyalty configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LoyaltyProgram {
    pub id: String,
    pub tenant_id: String,
    pub is_active: bool,
    /// Points per currency unit in bps: 10000 = 1 point per 1.00 spent.
    pub earn_rate_bps: u32,
    /// Currency value of one point when redeemed.
    pub cents_per_point: i64,
    pub min_redeem_points: i64,
    /// Optional ceiling on points redeemed against one order.
    pub max_redeem_points_per_order: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyProgram {
    #[inline]
    pub fn earn_rate(&self) -> BasisPoints {
        BasisPoints::from_bps(self.earn_rate_bps)
    }
}

/// Customer tier, derived from lifetime spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

string_enum!(LoyaltyTier, "tier", {
    Bronze => "bronze",
    Silver => "silver",
    Gold => "gold",
    Platinum => "platinum",
});

impl Default for LoyaltyTier {
    fn default() -> Self {
        LoyaltyTier::Bronze
    }
}

/// A tenant's customer. Points change only through ledger entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub loyalty_points: i64,
    pub tier: LoyaltyTier,
    pub total_spent_cents: i64,
    pub visit_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Customer {
    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }
}

/// Loyalty ledger entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTxKind {
    Earned,
    Redeemed,
    Adjusted,
    Expired,
    Bonus,
}

string_enum!(LoyaltyTxKind, "kind", {
    Earned => "earned",
    Redeemed => "redeemed",
    Adjusted => "adjusted",
    Expired => "expired",
    Bonus => "bonus",
});

/// One loyalty ledger row. `points` is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LoyaltyTransaction {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub kind: LoyaltyTxKind,
    pub points: i64,
    pub balance_after: i64,
    pub order_id: Option<String>,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Bill Splits
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    /// Total divided into equal shares.
    Equal,
    /// Each share lists its own amount and items.
    Itemized,
}

string_enum!(SplitType, "split_type", {
    Equal => "equal",
    Itemized => "itemized",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SplitStatus {
    Draft,
    Finalized,
}

string_enum!(SplitStatus, "split_status", {
    Draft => "draft",
    Finalized => "finalized",
});

/// A proposed division of a session's bill. Never moves money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BillSplit {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    pub split_type: SplitType,
    pub total_cents: i64,
    pub split_count: i64,
    pub status: SplitStatus,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub finalized_at: Option<DateTime<Utc>>,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub allocations: Vec<SplitAllocation>,
}

/// One share of a bill split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SplitAllocation {
    pub id: String,
    pub split_id: String,
    pub position: i64,
    pub label: String,
    pub guest_id: Option<String>,
    pub amount_cents: i64,
    /// Comma-separated order item ids (itemized splits only).
    pub item_ids: String,
}

impl SplitAllocation {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    pub fn item_id_list(&self) -> Vec<String> {
        self.item_ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A share as submitted when creating a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationRequest {
    pub label: String,
    #[serde(default)]
    pub guest_id: Option<String>,
    /// Required for itemized splits; ignored for equal splits.
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub item_ids: Vec<String>,
}

// =============================================================================
// Audit
// =============================================================================

/// Immutable audit row for a guest attribution change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ItemReassignment {
    pub id: String,
    pub tenant_id: String,
    pub order_item_id: String,
    pub session_id: String,
    pub from_guest_id: Option<String>,
    pub to_guest_id: String,
    pub reason: Option<String>,
    pub reassigned_by: Option<String>,
    /// JSON snapshot of the item at the time of the move.
    pub item_snapshot: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Catalog
// =============================================================================

/// Authoritative menu entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MenuItem {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub price_cents: i64,
    pub is_available: bool,
}

impl MenuItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A group of options attached to a menu item ("Size", "Extras").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OptionGroup {
    pub id: String,
    pub menu_item_id: String,
    pub name: String,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub options: Vec<MenuOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MenuOption {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub price_adjustment_cents: i64,
}

impl MenuOption {
    #[inline]
    pub fn price_adjustment(&self) -> Money {
        Money::from_cents(self.price_adjustment_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
