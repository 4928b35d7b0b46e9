//! # tavola-core: Pure Business Logic for Tavola
//!
//! This crate is the **heart** of Tavola. It contains the pricing, coupon
//! and loyalty math and the order/table state machines as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tavola Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 tavola-engine (orchestration)                   │   │
//! │  │   OrderManager ── TableManager ── PriceVerifier ── EventSink    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tavola-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ pricing  │ │  coupon  │ │ loyalty  │ │lifecycle │          │   │
//! │  │   │ totals   │ │ validate │ │ redeem   │ │ table    │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tavola-db (Database Layer)                      │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, TableSession, Coupon, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Order totals, payment application
//! - [`coupon`] - Coupon eligibility and discount quotes
//! - [`loyalty`] - Point redemption and earning
//! - [`lifecycle`] - Order status machine and mutation guards
//! - [`table`] - Table status machine, settlement, bill splits
//! - [`role`] - Role capability table
//! - [`event`] - Domain events
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tavola_core::money::Money;
//! use tavola_core::pricing::{apply_payment, Modifiers};
//! use tavola_core::types::{DiscountKind, PaymentStatus};
//!
//! let modifiers = Modifiers {
//!     discount_kind: DiscountKind::Percent,
//!     discount_value: 1000, // 10%
//!     ..Default::default()
//! };
//! assert_eq!(modifiers.discount_value, 1000);
//!
//! let outcome = apply_payment(Money::from_cents(1350), Money::zero(), Money::from_cents(1350));
//! assert_eq!(outcome.status, PaymentStatus::Paid);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coupon;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod loyalty;
pub mod money;
pub mod pricing;
pub mod role;
pub mod table;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tavola_core::Money` instead of
// `use tavola_core::money::Money`

pub use coupon::{CouponQuote, CouponRejection, CouponValidation};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use event::DomainEvent;
pub use loyalty::Redemption;
pub use money::Money;
pub use pricing::{Modifiers, OrderTotals, PaymentOutcome};
pub use role::{Actor, Capability, Role};
pub use table::ClosingSnapshot;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single order.
///
/// ## Business Reason
/// Prevents runaway orders from a misbehaving QR client.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum shares of one bill split.
///
/// ## Business Reason
/// Every share becomes an allocation row; a bill is never split further
/// than the seats in the room.
pub const MAX_SPLIT_COUNT: i64 = 100;

/// Length of a guest device token in bytes (hex-encoded to twice this).
pub const GUEST_TOKEN_BYTES: usize = 32;
