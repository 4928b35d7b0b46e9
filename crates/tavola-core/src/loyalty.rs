//! # Loyalty Redemption Calculator
//!
//! Converts points into an order discount and order value into earned points.
//!
//! ## Redemption
//! ```text
//! requested ──► floor at 0 ──► cap at balance ──► cap at per-order limit
//!                                                        │
//!                                    below minimum? ─────┤──► zero redemption
//!                                                        ▼
//!                    absorbed = min(points × cents_per_point, remaining value)
//!                                                        │
//!                                                        ▼
//!                    points   = floor(absorbed / cents_per_point)
//!                    discount = points × cents_per_point
//! ```
//! Points are recomputed from the absorbed value and the discount is rounded
//! down to whole points, so `points × cents_per_point == discount` always
//! holds. Cents that no whole point backs stay on the bill.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{LoyaltyProgram, LoyaltyTier};

/// Outcome of [`calculate_redemption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Redemption {
    pub points: i64,
    pub discount: Money,
}

impl Redemption {
    pub const NONE: Redemption = Redemption {
        points: 0,
        discount: Money::zero(),
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points == 0
    }
}

/// Computes how many points to redeem and the resulting discount.
pub fn calculate_redemption(
    program: &LoyaltyProgram,
    balance: i64,
    requested: i64,
    remaining_value: Money,
) -> Redemption {
    let mut points = requested.max(0).min(balance.max(0));
    if let Some(cap) = program.max_redeem_points_per_order {
        points = points.min(cap.max(0));
    }

    if points == 0 || points < program.min_redeem_points || program.cents_per_point <= 0 {
        return Redemption::NONE;
    }

    let per_point = program.cents_per_point;
    let full_value = Money::from_cents(points.saturating_mul(per_point));
    let absorbed = full_value.min(remaining_value.non_negative());

    let backed_points = (absorbed.cents() / per_point).min(points);
    if backed_points == 0 || backed_points < program.min_redeem_points {
        return Redemption::NONE;
    }

    Redemption {
        points: backed_points,
        discount: Money::from_cents(backed_points * per_point),
    }
}

/// `floor(order value × earn rate)`, in whole points.
///
/// The earn rate is points per currency unit in bps, so 10000 bps earns one
/// point per 100 cents.
pub fn points_earned(program: &LoyaltyProgram, order_value: Money) -> i64 {
    if !program.is_active || !order_value.is_positive() {
        return 0;
    }
    let scaled = order_value.cents() as i128 * program.earn_rate_bps as i128;
    (scaled / 1_000_000) as i64
}

// =============================================================================
// Tiers
// =============================================================================

impl LoyaltyTier {
    /// Lifetime spend needed to reach each tier, highest first.
    const THRESHOLDS: [(LoyaltyTier, i64); 3] = [
        (LoyaltyTier::Platinum, 500_000),
        (LoyaltyTier::Gold, 200_000),
        (LoyaltyTier::Silver, 50_000),
    ];

    pub fn for_total_spent(total_spent: Money) -> LoyaltyTier {
        Self::THRESHOLDS
            .iter()
            .find(|(_, min)| total_spent.cents() >= *min)
            .map(|(tier, _)| *tier)
            .unwrap_or(LoyaltyTier::Bronze)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
