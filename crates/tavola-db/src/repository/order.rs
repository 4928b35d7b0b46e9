//! # Order Repository
//!
//! Database operations for orders, order items and selected options.
//!
//! ## Order Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Write Path                                  │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── insert(order) + insert_item(item) per line (options included)  │
//! │                                                                         │
//! │  2. MUTATE (item change, discount, coupon, payment, status)            │
//! │     └── require() → order.reprice(items) → update(order)               │
//! │         update() is version-checked:                                   │
//! │         UPDATE orders ... WHERE id = ? AND tenant_id = ? AND version = ?│
//! │                                                                         │
//! │  3. ROLL-UPS                                                           │
//! │     └── guest_subtotal() / session_total() recompute from rows         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tavola_core::{Order, OrderItem, SelectedOption};

/// Repository for order database operations.
pub struct OrderRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> OrderRepository<'c> {
    /// Creates a new OrderRepository on a transaction's connection.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        OrderRepository { conn }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Inserts a new order row (items are inserted separately).
    pub async fn insert(&mut self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_type = %order.order_type, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, tenant_id, table_id, session_id, branch_id, order_type, status,
                customer_id, customer_name, customer_phone, delivery_address,
                subtotal_cents, discount_value, discount_kind, discount_cents,
                service_charge_cents, service_charge_label, delivery_fee_cents, packaging_fee_cents,
                coupon_id, coupon_discount_cents, loyalty_points_redeemed, loyalty_discount_cents,
                total_cents, paid_cents, payment_status, payment_method, change_cents, refunded_cents,
                cancellation_reason, cancelled_by, cancelled_at,
                created_by, notes, created_at, updated_at, version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19,
                ?20, ?21, ?22, ?23,
                ?24, ?25, ?26, ?27, ?28, ?29,
                ?30, ?31, ?32,
                ?33, ?34, ?35, ?36, ?37
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.table_id)
        .bind(&order.session_id)
        .bind(&order.branch_id)
        .bind(order.order_type)
        .bind(order.status)
        .bind(&order.customer_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.delivery_address)
        .bind(order.subtotal_cents)
        .bind(order.discount_value)
        .bind(order.discount_kind)
        .bind(order.discount_cents)
        .bind(order.service_charge_cents)
        .bind(&order.service_charge_label)
        .bind(order.delivery_fee_cents)
        .bind(order.packaging_fee_cents)
        .bind(&order.coupon_id)
        .bind(order.coupon_discount_cents)
        .bind(order.loyalty_points_redeemed)
        .bind(order.loyalty_discount_cents)
        .bind(order.total_cents)
        .bind(order.paid_cents)
        .bind(order.payment_status)
        .bind(order.payment_method)
        .bind(order.change_cents)
        .bind(order.refunded_cents)
        .bind(&order.cancellation_reason)
        .bind(&order.cancelled_by)
        .bind(order.cancelled_at)
        .bind(&order.created_by)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.version)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets an order by ID within a tenant.
    ///
    /// Orders of other tenants are invisible (returns `None`).
    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(order)
    }

    /// Gets an order or fails with `NotFound`.
    pub async fn require(&mut self, tenant_id: &str, id: &str) -> DbResult<Order> {
        self.get(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Writes every mutable column back, guarded by the version stamp.
    ///
    /// On success `order.version` is bumped and `updated_at` refreshed.
    pub async fn update(&mut self, order: &mut Order) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?1,
                customer_id = ?2, customer_name = ?3, customer_phone = ?4, delivery_address = ?5,
                subtotal_cents = ?6, discount_value = ?7, discount_kind = ?8, discount_cents = ?9,
                service_charge_cents = ?10, service_charge_label = ?11,
                delivery_fee_cents = ?12, packaging_fee_cents = ?13,
                coupon_id = ?14, coupon_discount_cents = ?15,
                loyalty_points_redeemed = ?16, loyalty_discount_cents = ?17,
                total_cents = ?18, paid_cents = ?19, payment_status = ?20, payment_method = ?21,
                change_cents = ?22, refunded_cents = ?23,
                cancellation_reason = ?24, cancelled_by = ?25, cancelled_at = ?26,
                notes = ?27,
                updated_at = ?28,
                version = version + 1
            WHERE id = ?29 AND tenant_id = ?30 AND version = ?31
            "#,
        )
        .bind(order.status)
        .bind(&order.customer_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.delivery_address)
        .bind(order.subtotal_cents)
        .bind(order.discount_value)
        .bind(order.discount_kind)
        .bind(order.discount_cents)
        .bind(order.service_charge_cents)
        .bind(&order.service_charge_label)
        .bind(order.delivery_fee_cents)
        .bind(order.packaging_fee_cents)
        .bind(&order.coupon_id)
        .bind(order.coupon_discount_cents)
        .bind(order.loyalty_points_redeemed)
        .bind(order.loyalty_discount_cents)
        .bind(order.total_cents)
        .bind(order.paid_cents)
        .bind(order.payment_status)
        .bind(order.payment_method)
        .bind(order.change_cents)
        .bind(order.refunded_cents)
        .bind(&order.cancellation_reason)
        .bind(&order.cancelled_by)
        .bind(order.cancelled_at)
        .bind(&order.notes)
        .bind(now)
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(order.version)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::version_conflict("Order", &order.id));
        }

        order.version += 1;
        order.updated_at = now;
        debug!(id = %order.id, version = order.version, total = order.total_cents, "Order updated");
        Ok(())
    }

    /// Lists the orders of a table session, oldest first.
    pub async fn list_for_session(
        &mut self,
        tenant_id: &str,
        session_id: &str,
    ) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE session_id = ?1 AND tenant_id = ?2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .bind(tenant_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(orders)
    }

    /// Sum of non-cancelled order totals in a session.
    pub async fn session_total(&mut self, session_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_cents), 0) FROM orders
            WHERE session_id = ?1 AND status != 'cancelled'
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(total)
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Inserts an order item together with its selected options.
    ///
    /// ## Snapshot Pattern
    /// Name and unit price are copied from the catalog at order time, so the
    /// order keeps its price even if the menu changes later.
    pub async fn insert_item(&mut self, item: &OrderItem) -> DbResult<()> {
        debug!(order_id = %item.order_id, menu_item_id = %item.menu_item_id, "Adding order item");

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, menu_item_id, name_snapshot, quantity, unit_price_cents,
                guest_id, notes, removed_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.menu_item_id)
        .bind(&item.name_snapshot)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(&item.guest_id)
        .bind(&item.notes)
        .bind(item.removed_at)
        .bind(item.created_at)
        .execute(&mut *self.conn)
        .await?;

        for option in &item.options {
            sqlx::query(
                r#"
                INSERT INTO order_item_options (
                    id, order_item_id, option_id, name_snapshot, price_adjustment_cents, quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&option.id)
            .bind(&option.order_item_id)
            .bind(&option.option_id)
            .bind(&option.name_snapshot)
            .bind(option.price_adjustment_cents)
            .bind(option.quantity)
            .execute(&mut *self.conn)
            .await?;
        }

        Ok(())
    }

    /// All items of an order (removed ones included), options attached.
    pub async fn items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let options = sqlx::query_as::<_, SelectedOption>(
            r#"
            SELECT o.* FROM order_item_options o
            JOIN order_items i ON i.id = o.order_item_id
            WHERE i.order_id = ?1
            ORDER BY o.id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let mut by_item: HashMap<String, Vec<SelectedOption>> = HashMap::new();
        for option in options {
            by_item
                .entry(option.order_item_id.clone())
                .or_default()
                .push(option);
        }
        for item in &mut items {
            item.options = by_item.remove(&item.id).unwrap_or_default();
        }

        Ok(items)
    }

    /// Gets an item by ID, scoped to the tenant through its order.
    pub async fn get_item(&mut self, tenant_id: &str, item_id: &str) -> DbResult<Option<OrderItem>> {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT i.* FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE i.id = ?1 AND o.tenant_id = ?2
            "#,
        )
        .bind(item_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(mut item) = item else {
            return Ok(None);
        };

        item.options = sqlx::query_as::<_, SelectedOption>(
            "SELECT * FROM order_item_options WHERE order_item_id = ?1 ORDER BY id ASC",
        )
        .bind(item_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(Some(item))
    }

    /// Writes back the mutable item columns (quantity, guest, notes, removal).
    pub async fn update_item(&mut self, item: &OrderItem) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE order_items
            SET quantity = ?1, guest_id = ?2, notes = ?3, removed_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(item.quantity)
        .bind(&item.guest_id)
        .bind(&item.notes)
        .bind(item.removed_at)
        .bind(&item.id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OrderItem", &item.id));
        }
        Ok(())
    }

    /// Recomputes a guest's running subtotal from active lines of live orders.
    pub async fn guest_subtotal(&mut self, guest_id: &str) -> DbResult<i64> {
        let subtotal: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(i.unit_price_cents * i.quantity), 0)
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE i.guest_id = ?1
              AND i.removed_at IS NULL
              AND o.status != 'cancelled'
            "#,
        )
        .bind(guest_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(subtotal)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
