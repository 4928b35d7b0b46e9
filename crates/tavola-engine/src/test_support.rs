//! Seeded engine and request contexts for the manager tests.
//!
//! ## Seeded Tenant (`tenant-1`)
//! - Menu: burger 12.00 (large +2.00, cheese +1.00), fries 3.50, soup 2.00,
//!   bread 1.00, pasta 10.00, salad 5.00
//! - Tables 1 and 2, both free
//! - Coupons `SAVE200` (2.00 off), `ONCE` (10% off, one use) and `REGULAR`
//!   (1.00 off, once per customer)
//! - Loyalty: 1 point per 1.00, 1 point = 0.10, minimum 10 points
//! - Customer `cust-1` with 500 points

use std::sync::Arc;

use chrono::Utc;
use tavola_core::{
    Actor, Coupon, Customer, DiscountKind, LoyaltyProgram, LoyaltyTier, MenuItem, MenuOption,
    OptionGroup, Role, Table, TableStatus,
};

use crate::catalog::{Catalog, SqliteCatalog};
use crate::config::EngineConfig;
use crate::context::RequestContext;
use crate::Engine;
use tavola_db::{Database, UnitOfWork};

pub(crate) const TENANT: &str = "tenant-1";
pub(crate) const CUSTOMER: &str = "cust-1";

const MENU: &[(&str, &str, i64)] = &[
    ("burger", "Burger", 1200),
    ("fries", "Fries", 350),
    ("soup", "Soup", 200),
    ("bread", "Bread", 100),
    ("pasta", "Pasta", 1000),
    ("salad", "Salad", 500),
];

pub(crate) async fn engine() -> Engine {
    engine_with(EngineConfig::in_memory()).await
}

pub(crate) async fn engine_with(config: EngineConfig) -> Engine {
    config.validate().unwrap();
    let db = Database::new(config.db_config().unwrap()).await.unwrap();

    let mut uow = db.begin().await.unwrap();
    seed(&mut uow).await;
    uow.commit().await.unwrap();

    let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(db.clone()));
    Engine::with_parts(config, db, catalog)
}

async fn seed(uow: &mut UnitOfWork) {
    let now = Utc::now();

    for (id, name, price_cents) in MENU {
        uow.catalog()
            .insert_menu_item(&MenuItem {
                id: id.to_string(),
                tenant_id: TENANT.to_string(),
                name: name.to_string(),
                price_cents: *price_cents,
                is_available: true,
            })
            .await
            .unwrap();
    }

    let option = |id: &str, name: &str, cents: i64| MenuOption {
        id: id.to_string(),
        group_id: "choices".to_string(),
        name: name.to_string(),
        price_adjustment_cents: cents,
    };
    uow.catalog()
        .insert_option_group(&OptionGroup {
            id: "choices".to_string(),
            menu_item_id: "burger".to_string(),
            name: "Choices".to_string(),
            options: vec![option("large", "Large", 200), option("cheese", "Cheese", 100)],
        })
        .await
        .unwrap();

    for number in 1..=2 {
        uow.tables()
            .insert_table(&Table {
                id: format!("table-{number}"),
                tenant_id: TENANT.to_string(),
                number,
                capacity: 4,
                area: None,
                status: TableStatus::Free,
                is_occupied: false,
                current_session_id: None,
                current_total_cents: 0,
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await
            .unwrap();
    }

    let coupon = |id: &str, code: &str, kind: DiscountKind, value: i64, max_uses: Option<i64>| Coupon {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        code: code.to_string(),
        description: None,
        discount_kind: kind,
        discount_value: value,
        max_discount_cents: None,
        min_order_cents: 0,
        valid_from: None,
        valid_until: None,
        max_uses,
        max_uses_per_customer: None,
        current_uses: 0,
        applicable_order_types: String::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    uow.coupons()
        .insert(&coupon("coupon-save", "SAVE200", DiscountKind::Fixed, 200, None))
        .await
        .unwrap();
    uow.coupons()
        .insert(&coupon("coupon-once", "ONCE", DiscountKind::Percent, 1000, Some(1)))
        .await
        .unwrap();
    uow.coupons()
        .insert(&Coupon {
            max_uses_per_customer: Some(1),
            ..coupon("coupon-regular", "REGULAR", DiscountKind::Fixed, 100, None)
        })
        .await
        .unwrap();

    uow.loyalty()
        .save_program(&LoyaltyProgram {
            id: "program-1".to_string(),
            tenant_id: TENANT.to_string(),
            is_active: true,
            earn_rate_bps: 10_000,
            cents_per_point: 10,
            min_redeem_points: 10,
            max_redeem_points_per_order: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    uow.loyalty()
        .insert_customer(&Customer {
            id: CUSTOMER.to_string(),
            tenant_id: TENANT.to_string(),
            name: "Grace".to_string(),
            phone: Some("+15550199".to_string()),
            email: None,
            loyalty_points: 500,
            tier: LoyaltyTier::Bronze,
            total_spent_cents: 0,
            visit_count: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        })
        .await
        .unwrap();
}

fn staff(id: &str, role: Role) -> RequestContext {
    RequestContext::new(TENANT, Actor::staff(id, role))
}

pub(crate) fn manager() -> RequestContext {
    staff("manager-1", Role::Manager)
}

pub(crate) fn cashier() -> RequestContext {
    staff("cashier-1", Role::Cashier)
}

pub(crate) fn waiter() -> RequestContext {
    staff("waiter-1", Role::Waiter)
}

pub(crate) fn kitchen() -> RequestContext {
    staff("kitchen-1", Role::Kitchen)
}

pub(crate) fn guest() -> RequestContext {
    RequestContext::guest(TENANT)
}

/// A manager of a tenant with nothing seeded.
pub(crate) fn other_tenant() -> RequestContext {
    RequestContext::new("tenant-2", Actor::staff("manager-2", Role::Manager))
}
