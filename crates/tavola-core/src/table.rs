//! # Table Session Rules
//!
//! Table state machine, settlement check, closing snapshot and bill-split
//! arithmetic.
//!
//! ## Table Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌────────┐ open  ┌──────────┐ order  ┌─────────────┐ bill  ┌─────────┐│
//! │   │ free / │──────►│ occupied │───────►│ in_progress │──────►│awaiting ││
//! │   │ closed │       └──────────┘        └──────▲──────┘       │ payment ││
//! │   └───▲────┘                                  └──────────────└────┬────┘│
//! │       │                 end_session (settled or forced)           │     │
//! │       └───────────────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{TableSession, TableStatus};

// =============================================================================
// State Machine
// =============================================================================

impl TableStatus {
    /// `free` and `closed` are equivalent: the table can take a new session.
    #[inline]
    pub const fn is_rest(&self) -> bool {
        matches!(self, TableStatus::Free | TableStatus::Closed)
    }

    const fn rank(&self) -> u8 {
        match self {
            TableStatus::Free => 0,
            TableStatus::Occupied => 1,
            TableStatus::InProgress => 2,
            TableStatus::AwaitingPayment => 3,
            TableStatus::Closed => 4,
        }
    }

    /// Allowed moves:
    /// - rest → `occupied` (a new session starts)
    /// - forward between active states, or on to `closed`
    /// - `awaiting_payment` → `in_progress` (guests ordered more)
    /// - `closed` → `free`
    pub fn can_transition_to(&self, next: TableStatus) -> bool {
        use TableStatus::*;
        match (self, next) {
            (from, Occupied) if from.is_rest() => true,
            (Closed, Free) => true,
            (AwaitingPayment, InProgress) => true,
            (from, to) if !from.is_rest() && to != Free => to.rank() > from.rank(),
            _ => false,
        }
    }

    pub fn ensure_transition(&self, next: TableStatus) -> CoreResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidTableTransition {
                from: *self,
                to: next,
            })
        }
    }
}

// =============================================================================
// Settlement
// =============================================================================

impl TableSession {
    /// Checks whether the session may close.
    ///
    /// `override_allowed` is true only when the caller asked to force and
    /// holds the capability to do so.
    pub fn ensure_closable(&self, override_allowed: bool) -> CoreResult<()> {
        if !self.is_active() {
            return Err(CoreError::SessionEnded {
                session_id: self.id.clone(),
            });
        }
        if !self.is_settled() && !override_allowed {
            return Err(CoreError::SessionNotSettled {
                session_id: self.id.clone(),
                total: self.total_cents,
                paid: self.paid_cents,
            });
        }
        Ok(())
    }

    pub fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::SessionEnded {
                session_id: self.id.clone(),
            })
        }
    }
}

/// Frozen totals written onto a session when it closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosingSnapshot {
    pub session_id: String,
    pub table_id: String,
    pub table_number: i64,
    pub total: Money,
    pub paid: Money,
    pub balance: Money,
    pub order_count: usize,
    pub cancelled_order_count: usize,
    pub guest_count: usize,
    pub payment_count: usize,
    pub forced: bool,
    pub closed_by: Option<String>,
    #[ts(as = "String")]
    pub closed_at: DateTime<Utc>,
}

// =============================================================================
// Bill Splits
// =============================================================================

/// Equal shares of `total`; remainder cents go to the first shares.
pub fn equal_split(total: Money, count: u32) -> CoreResult<Vec<Money>> {
    if count == 0 {
        return Err(ValidationError::MustBePositive {
            field: "split_count".to_string(),
        }
        .into());
    }
    if total.is_negative() {
        return Err(ValidationError::Negative {
            field: "total".to_string(),
        }
        .into());
    }
    Ok(total.split_evenly(count))
}

/// Itemized shares must sum exactly to `total`.
pub fn validate_itemized(total: Money, amounts: &[Money]) -> CoreResult<()> {
    if amounts.iter().any(|a| a.is_negative()) {
        return Err(ValidationError::Negative {
            field: "amount".to_string(),
        }
        .into());
    }
    let allocated: Money = amounts.iter().copied().sum();
    if allocated != total {
        return Err(CoreError::AllocationMismatch {
            total: total.cents(),
            allocated: allocated.cents(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
