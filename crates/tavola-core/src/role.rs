//! # Roles & Capabilities
//!
//! The one place that decides which actor may run which operation.
//!
//! ```text
//! ┌──────────────────────────────┬───────┬─────────┬────────┬─────────┬───────┐
//! │ Capability                   │ Admin*│ Cashier │ Waiter │ Kitchen │ Guest │
//! ├──────────────────────────────┼───────┼─────────┼────────┼─────────┼───────┤
//! │ CreateOrder                  │   ✓   │    ✓    │   ✓    │         │   ✓   │
//! │ ModifyOrder                  │   ✓   │    ✓    │   ✓    │         │       │
//! │ ApplyDiscount, ApplyFees     │   ✓   │    ✓    │        │         │       │
//! │ ApplyCoupon, RedeemLoyalty   │   ✓   │    ✓    │   ✓    │         │       │
//! │ RecordPayment, CancelOrder   │   ✓   │    ✓    │        │         │       │
//! │ RecordRefund                 │   ✓   │         │        │         │       │
//! │ UpdateOrderStatus            │   ✓   │    ✓    │   ✓    │    ✓    │       │
//! │ ManageTables, ReassignItems, │   ✓   │    ✓    │   ✓    │         │       │
//! │ ManageBillSplits             │       │         │        │         │       │
//! │ EndSession                   │   ✓   │    ✓    │        │         │       │
//! │ ForceCloseSession            │   ✓   │         │        │         │       │
//! │ JoinTable, RequestBill       │   ✓   │    ✓    │   ✓    │         │   ✓   │
//! └──────────────────────────────┴───────┴─────────┴────────┴─────────┴───────┘
//!  * Superadmin, RestaurantAdmin and Manager share the full set.
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Staff roles. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    RestaurantAdmin,
    Manager,
    Cashier,
    Waiter,
    Kitchen,
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateOrder,
    ModifyOrder,
    ApplyDiscount,
    ApplyFees,
    ApplyCoupon,
    RedeemLoyalty,
    RecordPayment,
    RecordRefund,
    CancelOrder,
    UpdateOrderStatus,
    ManageTables,
    ReassignItems,
    ManageBillSplits,
    EndSession,
    ForceCloseSession,
    JoinTable,
    RequestBill,
}

impl Role {
    pub fn allows(&self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Superadmin | Role::RestaurantAdmin | Role::Manager => true,
            Role::Cashier => !matches!(capability, RecordRefund | ForceCloseSession),
            Role::Waiter => matches!(
                capability,
                CreateOrder
                    | ModifyOrder
                    | ApplyCoupon
                    | RedeemLoyalty
                    | UpdateOrderStatus
                    | ManageTables
                    | ReassignItems
                    | ManageBillSplits
                    | JoinTable
                    | RequestBill
            ),
            Role::Kitchen => matches!(capability, UpdateOrderStatus),
        }
    }
}

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    /// Authenticated staff member.
    Staff { id: String, role: Role },
    /// Anonymous QR-ordering guest.
    Guest,
}

impl Actor {
    pub fn staff(id: impl Into<String>, role: Role) -> Self {
        Actor::Staff { id: id.into(), role }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match self {
            Actor::Staff { role, .. } => role.allows(capability),
            Actor::Guest => matches!(
                capability,
                Capability::CreateOrder | Capability::JoinTable | Capability::RequestBill
            ),
        }
    }

    /// Staff id, recorded as `created_by`/`recorded_by` on rows.
    pub fn id(&self) -> Option<&str> {
        match self {
            Actor::Staff { id, .. } => Some(id.as_str()),
            Actor::Guest => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match self {
            Actor::Staff { id, role } => format!("{role:?}:{id}"),
            Actor::Guest => "guest".to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admins_have_everything() {
        for role in [Role::Superadmin, Role::RestaurantAdmin, Role::Manager] {
            assert!(role.allows(Capability::ForceCloseSession));
            assert!(role.allows(Capability::RecordRefund));
        }
    }

    #[test]
    fn test_cashier() {
        assert!(Role::Cashier.allows(Capability::RecordPayment));
        assert!(Role::Cashier.allows(Capability::EndSession));
        assert!(!Role::Cashier.allows(Capability::ForceCloseSession));
        assert!(!Role::Cashier.allows(Capability::RecordRefund));
    }

    #[test]
    fn test_waiter_and_kitchen() {
        assert!(Role::Waiter.allows(Capability::ReassignItems));
        assert!(!Role::Waiter.allows(Capability::RecordPayment));
        assert!(!Role::Waiter.allows(Capability::ApplyDiscount));
        assert!(Role::Kitchen.allows(Capability::UpdateOrderStatus));
        assert!(!Role::Kitchen.allows(Capability::CreateOrder));
    }

    #[test]
    fn test_guest() {
        assert!(Actor::Guest.allows(Capability::CreateOrder));
        assert!(Actor::Guest.allows(Capability::JoinTable));
        assert!(!Actor::Guest.allows(Capability::ModifyOrder));
        assert!(!Actor::Guest.allows(Capability::RecordPayment));
        assert_eq!(Actor::Guest.id(), None);
    }

    #[test]
    fn test_actor_serde_shape() {
        let actor = Actor::staff("u1", Role::Cashier);
        let json = serde_json::to_value(&actor).unwrap();
        assert_eq!(json["type"], "staff");
        assert_eq!(json["role"], "cashier");
    }
}
