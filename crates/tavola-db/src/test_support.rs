//! Fixtures shared by the repository tests.

use chrono::Utc;
use tavola_core::*;

use crate::{Database, DbConfig, UnitOfWork};

pub(crate) const TENANT: &str = "tenant-1";

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) fn sample_order(id: &str) -> Order {
    let now = Utc::now();
    Order {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
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

pub(crate) fn sample_item(order_id: &str, id: &str, unit_cents: i64, qty: i64) -> OrderItem {
    OrderItem {
        id: id.to_string(),
        order_id: order_id.to_string(),
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

pub(crate) fn sample_option(item_id: &str, option_id: &str, cents: i64) -> SelectedOption {
    SelectedOption {
        id: format!("{item_id}-{option_id}"),
        order_item_id: item_id.to_string(),
        option_id: option_id.to_string(),
        name_snapshot: option_id.to_string(),
        price_adjustment_cents: cents,
        quantity: 1,
    }
}

pub(crate) fn sample_table(id: &str, number: i64) -> Table {
    let now = Utc::now();
    Table {
        id: id.to_string(),
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
    }
}

pub(crate) fn sample_session(id: &str, table_id: &str) -> TableSession {
    TableSession {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        table_id: table_id.to_string(),
        status: TableStatus::Occupied,
        total_cents: 0,
        paid_cents: 0,
        customer_name: None,
        customer_count: Some(2),
        shift_id: None,
        notes: None,
        started_at: Utc::now(),
        ended_at: None,
        ended_by: None,
        forced_close: false,
        closing_snapshot: None,
        created_by: None,
        version: 0,
    }
}

pub(crate) fn sample_guest(id: &str, session_id: &str, token: &str) -> Guest {
    let now = Utc::now();
    Guest {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        session_id: session_id.to_string(),
        name: Some(id.to_string()),
        seat_number: None,
        token: token.to_string(),
        status: GuestStatus::Active,
        subtotal_cents: 0,
        joined_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_payment(id: &str, order_id: &str, amount_cents: i64) -> Payment {
    Payment {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        order_id: Some(order_id.to_string()),
        session_id: None,
        method: PaymentMethod::Cash,
        amount_cents,
        tendered_cents: amount_cents,
        change_cents: 0,
        reference: None,
        recorded_by: None,
        created_at: Utc::now(),
    }
}

pub(crate) fn sample_coupon(id: &str, code: &str, max_uses: Option<i64>) -> Coupon {
    let now = Utc::now();
    Coupon {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        code: code.to_string(),
        description: None,
        discount_kind: DiscountKind::Percent,
        discount_value: 1000,
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
    }
}

pub(crate) fn sample_customer(id: &str, points: i64) -> Customer {
    let now = Utc::now();
    Customer {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        name: "Grace".to_string(),
        phone: None,
        email: None,
        loyalty_points: points,
        tier: LoyaltyTier::Bronze,
        total_spent_cents: 0,
        visit_count: 0,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

pub(crate) fn sample_split(id: &str, session_id: &str, amounts: &[i64]) -> BillSplit {
    let allocations = amounts
        .iter()
        .enumerate()
        .map(|(i, cents)| SplitAllocation {
            id: format!("{id}-{i}"),
            split_id: id.to_string(),
            position: i as i64,
            label: format!("Guest {}", i + 1),
            guest_id: None,
            amount_cents: *cents,
            item_ids: String::new(),
        })
        .collect();

    BillSplit {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        session_id: session_id.to_string(),
        split_type: SplitType::Equal,
        total_cents: amounts.iter().sum(),
        split_count: amounts.len() as i64,
        status: SplitStatus::Draft,
        created_by: None,
        created_at: Utc::now(),
        finalized_at: None,
        allocations,
    }
}

/// A burger (12.00) with a "Choices" group: Large (+2.00) and Cheese (+1.00).
pub(crate) async fn sample_menu(uow: &mut UnitOfWork) {
    uow.catalog()
        .insert_menu_item(&MenuItem {
            id: "burger".to_string(),
            tenant_id: TENANT.to_string(),
            name: "Burger".to_string(),
            price_cents: 1200,
            is_available: true,
        })
        .await
        .unwrap();

    uow.catalog()
        .insert_option_group(&OptionGroup {
            id: "choices".to_string(),
            menu_item_id: "burger".to_string(),
            name: "Choices".to_string(),
            options: vec![
                MenuOption {
                    id: "large".to_string(),
                    group_id: "choices".to_string(),
                    name: "Large".to_string(),
                    price_adjustment_cents: 200,
                },
                MenuOption {
                    id: "cheese".to_string(),
                    group_id: "choices".to_string(),
                    name: "Cheese".to_string(),
                    price_adjustment_cents: 100,
                },
            ],
        })
        .await
        .unwrap();
}
