//! # Validation Module
//!
//! Input validation utilities for Tavola.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Display surface (TypeScript, via ts-rs bindings)             │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: tavola-engine managers                                       │
//! │  └── THIS MODULE: field rules, order-type requirements                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (table numbers, coupon codes, active session)  │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tavola_core::validation::{infer_order_type, validate_quantity};
//! use tavola_core::OrderType;
//!
//! validate_quantity(5).unwrap();
//! assert_eq!(infer_order_type(None, Some("table-1"), None), OrderType::Table);
//! ```

use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::OrderType;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS, MAX_SPLIT_COUNT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Trims and requires a non-empty value of at most `max` characters.
pub fn validate_required(field: &str, value: Option<&str>, max: usize) -> ValidationResult<String> {
    let value = value.map(str::trim).unwrap_or_default();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value.to_string())
}

/// Trims an optional value; blank becomes `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validates a phone number.
///
/// ## Rules
/// - Required
/// - Digits with optional leading `+`, spaces, hyphens, parentheses
/// - 6 to 15 digits
///
/// ## Example
/// ```rust
/// use tavola_core::validation::validate_phone;
///
/// assert!(validate_phone(Some("+1 (555) 010-0199")).is_ok());
/// assert!(validate_phone(Some("call me")).is_err());
/// ```
pub fn validate_phone(phone: Option<&str>) -> ValidationResult<String> {
    let phone = validate_required("customer_phone", phone, 32)?;

    let allowed = phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (i == 0 && c == '+'));
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();

    if !allowed || !(6..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "customer_phone".to_string(),
            reason: "must be 6-15 digits, optionally with +, spaces or hyphens".to_string(),
        });
    }
    Ok(phone)
}

/// Validates a UUID string.
pub fn validate_uuid(field: &str, value: &str) -> ValidationResult<()> {
    Uuid::parse_str(value).map_err(|e| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: 1 to `MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates the number of lines on an order.
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if count > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }
    Ok(())
}

/// Validates the number of shares of a bill split: 1 to `MAX_SPLIT_COUNT`.
pub fn validate_split_count(count: i64) -> ValidationResult<u32> {
    if !(1..=MAX_SPLIT_COUNT).contains(&count) {
        return Err(ValidationError::OutOfRange {
            field: "split_count".to_string(),
            min: 1,
            max: MAX_SPLIT_COUNT,
        });
    }
    Ok(count as u32)
}

/// Payments and refunds must be positive.
pub fn validate_positive(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Fees and discounts may be zero but never negative.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Percent discounts are at most 100% (10000 bps).
pub fn validate_percent_bps(field: &str, bps: i64) -> ValidationResult<()> {
    if !(0..=10_000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

// =============================================================================
// Order Rules
// =============================================================================

/// Explicit type wins; otherwise table → delivery → takeout.
pub fn infer_order_type(
    explicit: Option<OrderType>,
    table_id: Option<&str>,
    delivery_address: Option<&str>,
) -> OrderType {
    if let Some(order_type) = explicit {
        return order_type;
    }
    let present = |v: Option<&str>| v.map(|s| !s.trim().is_empty()).unwrap_or(false);

    if present(table_id) {
        OrderType::Table
    } else if present(delivery_address) {
        OrderType::Delivery
    } else {
        OrderType::Takeout
    }
}

/// Contact fields an order type requires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderContact<'a> {
    pub table_id: Option<&'a str>,
    pub customer_name: Option<&'a str>,
    pub customer_phone: Option<&'a str>,
    pub delivery_address: Option<&'a str>,
}

/// Checks the fields each order type needs.
///
/// | Type       | Required                        |
/// |------------|---------------------------------|
/// | `table`    | table id                        |
/// | `delivery` | address, customer name, phone   |
/// | `takeout`  | customer name, phone            |
/// | others     | nothing                         |
pub fn validate_order_contact(order_type: OrderType, contact: &OrderContact<'_>) -> ValidationResult<()> {
    match order_type {
        OrderType::Table => {
            validate_required("table_id", contact.table_id, 64)?;
        }
        OrderType::Delivery => {
            validate_required("delivery_address", contact.delivery_address, 500)?;
            validate_required("customer_name", contact.customer_name, 200)?;
            validate_phone(contact.customer_phone)?;
        }
        OrderType::Takeout => {
            validate_required("customer_name", contact.customer_name, 200)?;
            validate_phone(contact.customer_phone)?;
        }
        OrderType::Counter | OrderType::Pos => {}
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_item_count() {
        assert!(validate_item_count(0).is_err());
        assert!(validate_item_count(3).is_ok());
        assert!(validate_item_count(MAX_ORDER_ITEMS + 1).is_err());
    }

    #[test]
    fn test_validate_split_count() {
        assert_eq!(validate_split_count(1).unwrap(), 1);
        assert_eq!(validate_split_count(MAX_SPLIT_COUNT).unwrap(), 100);
        assert!(validate_split_count(0).is_err());
        assert!(validate_split_count(-3).is_err());
        assert!(matches!(
            validate_split_count(4_000_000_000),
            Err(ValidationError::OutOfRange { max: MAX_SPLIT_COUNT, .. })
        ));
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone(Some(" +15550100 ")).unwrap(), "+15550100");
        assert!(validate_phone(Some("12")).is_err());
        assert!(validate_phone(Some("555-01a0")).is_err());
        assert!(matches!(
            validate_phone(None),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_infer_order_type() {
        assert_eq!(infer_order_type(Some(OrderType::Pos), Some("t1"), None), OrderType::Pos);
        assert_eq!(infer_order_type(None, Some("t1"), Some("street")), OrderType::Table);
        assert_eq!(infer_order_type(None, None, Some("1 Main St")), OrderType::Delivery);
        assert_eq!(infer_order_type(None, Some("  "), None), OrderType::Takeout);
    }

    #[test]
    fn test_delivery_requires_address_name_phone() {
        let contact = OrderContact {
            customer_name: Some("Ada"),
            customer_phone: Some("+15550100"),
            ..Default::default()
        };
        let err = validate_order_contact(OrderType::Delivery, &contact).unwrap_err();
        assert_eq!(err.to_string(), "delivery_address is required");

        let contact = OrderContact {
            delivery_address: Some("1 Main St"),
            ..contact
        };
        assert!(validate_order_contact(OrderType::Delivery, &contact).is_ok());
    }

    #[test]
    fn test_takeout_requires_name_and_phone() {
        let contact = OrderContact {
            customer_name: Some("Ada"),
            ..Default::default()
        };
        let err = validate_order_contact(OrderType::Takeout, &contact).unwrap_err();
        assert_eq!(err.to_string(), "customer_phone is required");
        assert!(validate_order_contact(OrderType::Counter, &OrderContact::default()).is_ok());
    }

    #[test]
    fn test_amount_rules() {
        assert!(validate_positive("amount", Money::zero()).is_err());
        assert!(validate_non_negative("delivery_fee", 0).is_ok());
        assert!(validate_non_negative("delivery_fee", -1).is_err());
        assert!(validate_percent_bps("discount", 10_001).is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  ")), None);
        assert_eq!(normalize_optional(Some(" Bob ")), Some("Bob".to_string()));
    }
}
