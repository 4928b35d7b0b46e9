//! # Coupon Validator
//!
//! Checks a coupon against its eligibility rules and quotes a discount.
//! Never mutates anything: recording the usage is the caller's job.
//!
//! ## Check Order (short-circuits on first failure)
//! ```text
//! exists & active ─► window ─► global cap ─► order type ─► minimum ─► per-customer cap
//!        │              │           │             │            │              │
//!     NotFound      NotYetValid  UsageLimit   OrderType    MinimumNot    CustomerLimit
//!     Inactive      Expired      Reached      NotApplic.   Met           Reached
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::error::ErrorKind;
use crate::money::Money;
use crate::types::{BasisPoints, Coupon, DiscountKind, OrderType};

// =============================================================================
// Rejection
// =============================================================================

/// Why a coupon cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    /// No coupon with this code for the tenant.
    #[error("Coupon {code} not found")]
    NotFound { code: String },

    #[error("Coupon {code} is not active")]
    Inactive { code: String },

    #[error("Coupon {code} is not valid until {starts_at}")]
    NotYetValid {
        code: String,
        starts_at: DateTime<Utc>,
    },

    #[error("Coupon {code} expired at {expired_at}")]
    Expired {
        code: String,
        expired_at: DateTime<Utc>,
    },

    /// Global cap reached.
    #[error("Coupon {code} usage limit reached ({current}/{max})")]
    UsageLimitReached { code: String, current: i64, max: i64 },

    #[error("Coupon {code} does not apply to {order_type} orders")]
    OrderTypeNotApplicable { code: String, order_type: OrderType },

    #[error("Coupon {code} needs a minimum order of {minimum}, order is {order_value}")]
    MinimumNotMet {
        code: String,
        minimum: i64,
        order_value: i64,
    },

    /// Per-customer cap reached.
    #[error("Coupon {code} already used {current} of {max} times by this customer")]
    CustomerLimitReached { code: String, current: i64, max: i64 },
}

impl CouponRejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CouponRejection::NotFound { .. } => ErrorKind::NotFound,
            CouponRejection::UsageLimitReached { .. }
            | CouponRejection::CustomerLimitReached { .. } => ErrorKind::LimitExceeded,
            CouponRejection::Inactive { .. }
            | CouponRejection::NotYetValid { .. }
            | CouponRejection::Expired { .. }
            | CouponRejection::OrderTypeNotApplicable { .. }
            | CouponRejection::MinimumNotMet { .. } => ErrorKind::Validation,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CouponRejection::NotFound { .. } => "COUPON_NOT_FOUND",
            CouponRejection::Inactive { .. } => "COUPON_INACTIVE",
            CouponRejection::NotYetValid { .. } => "COUPON_NOT_YET_VALID",
            CouponRejection::Expired { .. } => "COUPON_EXPIRED",
            CouponRejection::UsageLimitReached { .. } => "COUPON_USAGE_LIMIT_REACHED",
            CouponRejection::OrderTypeNotApplicable { .. } => "COUPON_ORDER_TYPE_NOT_APPLICABLE",
            CouponRejection::MinimumNotMet { .. } => "COUPON_MINIMUM_NOT_MET",
            CouponRejection::CustomerLimitReached { .. } => "COUPON_CUSTOMER_LIMIT_REACHED",
        }
    }
}

// =============================================================================
// Quote
// =============================================================================

/// A successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponQuote {
    pub coupon_id: String,
    pub discount: Money,
}

/// Serializable validation report for previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CouponValidation {
    pub valid: bool,
    pub discount: Money,
    pub coupon: Option<Coupon>,
    pub message: Option<String>,
}

impl CouponValidation {
    pub fn from_result(coupon: Option<Coupon>, result: Result<CouponQuote, CouponRejection>) -> Self {
        match result {
            Ok(quote) => CouponValidation {
                valid: true,
                discount: quote.discount,
                coupon,
                message: None,
            },
            Err(rejection) => CouponValidation {
                valid: false,
                discount: Money::zero(),
                coupon: None,
                message: Some(rejection.to_string()),
            },
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Discount a coupon grants on `order_value`.
///
/// Percent values are bps. Capped at `max_discount`, then at the order value.
pub fn coupon_discount(coupon: &Coupon, order_value: Money) -> Money {
    let raw = match coupon.discount_kind {
        DiscountKind::Fixed => Money::from_cents(coupon.discount_value),
        DiscountKind::Percent => {
            order_value.percentage(BasisPoints::from_stored(coupon.discount_value))
        }
    };

    let capped = match coupon.max_discount_cents {
        Some(max) => raw.min(Money::from_cents(max)),
        None => raw,
    };

    capped.clamp_between(Money::zero(), order_value.non_negative())
}

/// Validates a coupon.
///
/// ## Arguments
/// * `code` - Code as entered, used in rejection messages
/// * `coupon` - Lookup result for the tenant (`None` = unknown code)
/// * `customer_uses` - Prior uses by the order's customer, if one is linked
pub fn validate_coupon(
    code: &str,
    coupon: Option<&Coupon>,
    now: DateTime<Utc>,
    order_value: Money,
    order_type: OrderType,
    customer_uses: Option<i64>,
) -> Result<CouponQuote, CouponRejection> {
    let code = Coupon::normalize_code(code);

    let coupon = match coupon {
        Some(c) => c,
        None => return Err(CouponRejection::NotFound { code }),
    };
    if !coupon.is_active {
        return Err(CouponRejection::Inactive { code });
    }

    if let Some(starts_at) = coupon.valid_from {
        if now < starts_at {
            return Err(CouponRejection::NotYetValid { code, starts_at });
        }
    }
    if let Some(expired_at) = coupon.valid_until {
        if now > expired_at {
            return Err(CouponRejection::Expired { code, expired_at });
        }
    }

    if let Some(max) = coupon.max_uses {
        if coupon.current_uses >= max {
            return Err(CouponRejection::UsageLimitReached {
                code,
                current: coupon.current_uses,
                max,
            });
        }
    }

    if !coupon.applies_to(order_type) {
        return Err(CouponRejection::OrderTypeNotApplicable { code, order_type });
    }

    if order_value.cents() < coupon.min_order_cents {
        return Err(CouponRejection::MinimumNotMet {
            code,
            minimum: coupon.min_order_cents,
            order_value: order_value.cents(),
        });
    }

    if let (Some(current), Some(max)) = (customer_uses, coupon.max_uses_per_customer) {
        if current >= max {
            return Err(CouponRejection::CustomerLimitReached { code, current, max });
        }
    }

    Ok(CouponQuote {
        coupon_id: coupon.id.clone(),
        discount: coupon_discount(coupon, order_value),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
