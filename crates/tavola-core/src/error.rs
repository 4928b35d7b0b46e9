//! # Error Types
//!
//! Domain-specific error types for tavola-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tavola-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Category every error is classified into        │
//! │                                                                         │
//! │  tavola-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  tavola-engine errors                                                  │
//! │  └── EngineError      - Wraps both, serializes to ErrorReport          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ErrorReport         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every variant names the invariant that blocked the operation
//! 3. Limit errors carry current/maximum values so the UI can explain them
//! 4. Errors are enum variants, never String

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::coupon::CouponRejection;
use crate::types::{GuestStatus, OrderStatus, TableStatus};

// =============================================================================
// Error Kind
// =============================================================================

/// Broad error category.
///
/// | Kind               | Caller action                         |
/// |--------------------|---------------------------------------|
/// | `Validation`       | Fix input and retry                   |
/// | `NotFound`         | Never retried automatically           |
/// | `StateConflict`    | Refetch state, then decide            |
/// | `LimitExceeded`    | Show current/maximum to the user      |
/// | `Integrity`        | Never retried automatically           |
/// | `PermissionDenied` | Needs a different actor               |
/// | `Internal`         | Infrastructure failure; log and retry |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    LimitExceeded,
    Integrity,
    PermissionDenied,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. Each maps to an
/// [`ErrorKind`] through [`CoreError::kind`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Order has been served; items and modifiers are frozen.
    ///
    /// ## When This Occurs
    /// - Adding/removing items after the kitchen handed the order over
    /// - Applying a discount, fee, coupon or loyalty redemption
    /// - Recording a payment against a served order
    #[error("Order {order_id} has already been served")]
    OrderAlreadyServed { order_id: String },

    /// Order has been cancelled; no mutation of any kind is allowed.
    #[error("Order {order_id} is cancelled")]
    OrderCancelled { order_id: String },

    /// Order is already fully paid.
    #[error("Order {order_id} is already paid")]
    OrderAlreadyPaid { order_id: String },

    /// Order total is zero, so there is no balance a payment could settle.
    ///
    /// ## When This Occurs
    /// A coupon or loyalty redemption absorbed the whole order value.
    #[error("Order {order_id} has nothing to pay")]
    NothingToPay { order_id: String },

    /// Requested status change goes backwards or leaves a terminal state.
    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A modifier would push the total below what has already been paid.
    ///
    /// ## When This Occurs
    /// ```text
    /// total 1000, paid 1000
    ///      │
    ///      ▼
    /// apply_discount(200) → new total 800 < paid 1000
    ///      │
    ///      ▼
    /// TotalBelowPaid { total: 800, paid: 1000 }
    /// ```
    #[error("New total {total} would be below the amount already paid ({paid})")]
    TotalBelowPaid { total: i64, paid: i64 },

    /// A coupon is already attached to the order.
    #[error("Order {order_id} already has a coupon applied")]
    CouponAlreadyApplied { order_id: String },

    /// The coupon validator rejected the code.
    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// Loyalty points were already redeemed on this order.
    #[error("Order {order_id} already has a loyalty redemption")]
    LoyaltyAlreadyRedeemed { order_id: String },

    /// Redemption needs a linked customer.
    #[error("Order {order_id} has no linked customer")]
    NoLinkedCustomer { order_id: String },

    /// Tenant has no loyalty program, or it is switched off.
    #[error("Loyalty program is not active")]
    LoyaltyProgramInactive,

    /// Customer balance does not cover the requested points.
    #[error("Insufficient loyalty points: balance {balance}, requested {requested}")]
    InsufficientPoints { balance: i64, requested: i64 },

    /// Requested points are under the program minimum.
    #[error("At least {minimum} points are required to redeem, requested {requested}")]
    BelowMinimumRedemption { minimum: i64, requested: i64 },

    /// Nothing left on the order for points to absorb.
    #[error("Order {order_id} has no remaining value to redeem against")]
    NothingToRedeem { order_id: String },

    /// Refund larger than what was paid.
    #[error("Refund exceeds paid amount: paid {paid}, already refunded {refunded}, requested {requested}")]
    RefundExceedsPaid {
        paid: i64,
        refunded: i64,
        requested: i64,
    },

    /// Menu item exists but cannot be ordered right now.
    #[error("Menu item {menu_item_id} is unavailable")]
    MenuItemUnavailable { menu_item_id: String },

    /// Option id is not one of the item's catalog options.
    #[error("Option {option_id} does not belong to menu item {menu_item_id}")]
    OptionNotFound {
        menu_item_id: String,
        option_id: String,
    },

    /// Table status change not permitted by the table state machine.
    #[error("Cannot move table from {from} to {to}")]
    InvalidTableTransition { from: TableStatus, to: TableStatus },

    /// Table already has an active session.
    #[error("Table {table_id} already has an active session")]
    TableOccupied { table_id: String },

    /// Operation needs an active session on the table.
    #[error("Table {table_id} has no active session")]
    NoActiveSession { table_id: String },

    /// Table is at rest (free/closed); there is no session to end.
    #[error("Table {table_id} is {status}; nothing to close")]
    TableNotInUse { table_id: String, status: TableStatus },

    /// Session still owes money.
    ///
    /// ## When This Occurs
    /// ```text
    /// end_session(force = false)
    ///      │
    ///      ▼
    /// paid 150 < total 300
    ///      │
    ///      ▼
    /// SessionNotSettled { total: 300, paid: 150 }
    /// ```
    #[error("Session {session_id} is not settled: total {total}, paid {paid}")]
    SessionNotSettled {
        session_id: String,
        total: i64,
        paid: i64,
    },

    /// Session has ended; it is read-only.
    #[error("Session {session_id} has ended")]
    SessionEnded { session_id: String },

    /// Guest has paid or left and cannot be assigned items.
    #[error("Guest {guest_id} is {status}")]
    GuestTerminal { guest_id: String, status: GuestStatus },

    /// Item already belongs to the requested guest.
    #[error("Item {item_id} is already assigned to guest {guest_id}")]
    SameGuest { item_id: String, guest_id: String },

    /// Item has been soft-removed.
    #[error("Item {item_id} has been removed from its order")]
    ItemRemoved { item_id: String },

    /// Two records that must share a session or tenant do not.
    ///
    /// ## When This Occurs
    /// - Attributing an item to a guest from another session
    /// - Reassigning an item across sessions
    #[error("Integrity violation: {reason}")]
    Integrity { reason: String },

    /// Bill split has been finalized and is immutable.
    #[error("Bill split {split_id} is already finalized")]
    SplitFinalized { split_id: String },

    /// Itemized allocations must add up to the split total.
    #[error("Allocations sum to {allocated}, expected {total}")]
    AllocationMismatch { total: i64, allocated: i64 },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Order has too many lines.
    #[error("Order cannot have more than {max} items")]
    TooManyItems { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_)
            | CoreError::BelowMinimumRedemption { .. }
            | CoreError::AllocationMismatch { .. }
            | CoreError::SameGuest { .. } => ErrorKind::Validation,

            CoreError::OptionNotFound { .. } => ErrorKind::NotFound,

            CoreError::Coupon(rejection) => rejection.kind(),

            CoreError::InsufficientPoints { .. }
            | CoreError::RefundExceedsPaid { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::TooManyItems { .. } => ErrorKind::LimitExceeded,

            CoreError::Integrity { .. } => ErrorKind::Integrity,

            CoreError::OrderAlreadyServed { .. }
            | CoreError::OrderCancelled { .. }
            | CoreError::OrderAlreadyPaid { .. }
            | CoreError::NothingToPay { .. }
            | CoreError::InvalidStatusTransition { .. }
            | CoreError::TotalBelowPaid { .. }
            | CoreError::CouponAlreadyApplied { .. }
            | CoreError::LoyaltyAlreadyRedeemed { .. }
            | CoreError::NoLinkedCustomer { .. }
            | CoreError::LoyaltyProgramInactive
            | CoreError::NothingToRedeem { .. }
            | CoreError::MenuItemUnavailable { .. }
            | CoreError::InvalidTableTransition { .. }
            | CoreError::TableOccupied { .. }
            | CoreError::NoActiveSession { .. }
            | CoreError::TableNotInUse { .. }
            | CoreError::SessionNotSettled { .. }
            | CoreError::SessionEnded { .. }
            | CoreError::GuestTerminal { .. }
            | CoreError::ItemRemoved { .. }
            | CoreError::SplitFinalized { .. } => ErrorKind::StateConflict,
        }
    }

    /// Stable machine-readable code (the variant name in SCREAMING_SNAKE_CASE).
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::OrderAlreadyServed { .. } => "ORDER_ALREADY_SERVED",
            CoreError::OrderCancelled { .. } => "ORDER_CANCELLED",
            CoreError::OrderAlreadyPaid { .. } => "ORDER_ALREADY_PAID",
            CoreError::NothingToPay { .. } => "NOTHING_TO_PAY",
            CoreError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            CoreError::TotalBelowPaid { .. } => "TOTAL_BELOW_PAID",
            CoreError::CouponAlreadyApplied { .. } => "COUPON_ALREADY_APPLIED",
            CoreError::Coupon(rejection) => rejection.code(),
            CoreError::LoyaltyAlreadyRedeemed { .. } => "LOYALTY_ALREADY_REDEEMED",
            CoreError::NoLinkedCustomer { .. } => "NO_LINKED_CUSTOMER",
            CoreError::LoyaltyProgramInactive => "LOYALTY_PROGRAM_INACTIVE",
            CoreError::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            CoreError::BelowMinimumRedemption { .. } => "BELOW_MINIMUM_REDEMPTION",
            CoreError::NothingToRedeem { .. } => "NOTHING_TO_REDEEM",
            CoreError::RefundExceedsPaid { .. } => "REFUND_EXCEEDS_PAID",
            CoreError::MenuItemUnavailable { .. } => "MENU_ITEM_UNAVAILABLE",
            CoreError::OptionNotFound { .. } => "OPTION_NOT_FOUND",
            CoreError::InvalidTableTransition { .. } => "INVALID_TABLE_TRANSITION",
            CoreError::TableOccupied { .. } => "TABLE_OCCUPIED",
            CoreError::NoActiveSession { .. } => "NO_ACTIVE_SESSION",
            CoreError::TableNotInUse { .. } => "TABLE_NOT_IN_USE",
            CoreError::SessionNotSettled { .. } => "SESSION_NOT_SETTLED",
            CoreError::SessionEnded { .. } => "SESSION_ENDED",
            CoreError::GuestTerminal { .. } => "GUEST_TERMINAL",
            CoreError::SameGuest { .. } => "SAME_GUEST",
            CoreError::ItemRemoved { .. } => "ITEM_REMOVED",
            CoreError::Integrity { .. } => "INTEGRITY_VIOLATION",
            CoreError::SplitFinalized { .. } => "SPLIT_FINALIZED",
            CoreError::AllocationMismatch { .. } => "ALLOCATION_MISMATCH",
            CoreError::QuantityTooLarge { .. } => "QUANTITY_TOO_LARGE",
            CoreError::TooManyItems { .. } => "TOO_MANY_ITEMS",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid phone).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
