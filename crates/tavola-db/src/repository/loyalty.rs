//! # Loyalty Repository
//!
//! Programs, customers and the points ledger.
//!
//! Point balances only move through guarded statements, so a balance can
//! never go negative even when two redemptions race:
//! ```text
//! UPDATE customers SET loyalty_points = loyalty_points - :points
//! WHERE id = :id AND loyalty_points >= :points
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tavola_core::{Customer, LoyaltyProgram, LoyaltyTier, LoyaltyTransaction};

/// Repository for loyalty programs, customers and ledger entries.
pub struct LoyaltyRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LoyaltyRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LoyaltyRepository { conn }
    }

    // =========================================================================
    // Programs
    // =========================================================================

    /// The tenant's loyalty program, if configured.
    pub async fn program(&mut self, tenant_id: &str) -> DbResult<Option<LoyaltyProgram>> {
        let program = sqlx::query_as::<_, LoyaltyProgram>(
            "SELECT * FROM loyalty_programs WHERE tenant_id = ?1",
        )
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(program)
    }

    /// Creates or replaces the tenant's program.
    pub async fn save_program(&mut self, program: &LoyaltyProgram) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loyalty_programs (
                id, tenant_id, is_active, earn_rate_bps, cents_per_point,
                min_redeem_points, max_redeem_points_per_order, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(tenant_id) DO UPDATE SET
                is_active = excluded.is_active,
                earn_rate_bps = excluded.earn_rate_bps,
                cents_per_point = excluded.cents_per_point,
                min_redeem_points = excluded.min_redeem_points,
                max_redeem_points_per_order = excluded.max_redeem_points_per_order,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&program.id)
        .bind(&program.tenant_id)
        .bind(program.is_active)
        .bind(program.earn_rate_bps)
        .bind(program.cents_per_point)
        .bind(program.min_redeem_points)
        .bind(program.max_redeem_points_per_order)
        .bind(program.created_at)
        .bind(program.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn insert_customer(&mut self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, name, phone, email, loyalty_points, tier,
                total_spent_cents, visit_count, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.loyalty_points)
        .bind(customer.tier)
        .bind(customer.total_spent_cents)
        .bind(customer.visit_count)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .bind(customer.version)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get_customer(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(customer)
    }

    pub async fn require_customer(&mut self, tenant_id: &str, id: &str) -> DbResult<Customer> {
        self.get_customer(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Removes points if the balance covers them; returns the new balance.
    pub async fn debit_points(
        &mut self,
        tenant_id: &str,
        customer_id: &str,
        points: i64,
    ) -> DbResult<i64> {
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers SET
                loyalty_points = loyalty_points - ?1,
                updated_at = ?2,
                version = version + 1
            WHERE id = ?3 AND tenant_id = ?4 AND loyalty_points >= ?1
            RETURNING loyalty_points
            "#,
        )
        .bind(points)
        .bind(Utc::now())
        .bind(customer_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        balance.ok_or_else(|| {
            DbError::guard_failed("Customer", customer_id, "insufficient loyalty points")
        })
    }

    /// Credits points for a completed purchase and bumps spend counters.
    ///
    /// Returns the updated customer.
    pub async fn credit_purchase(
        &mut self,
        tenant_id: &str,
        customer_id: &str,
        points: i64,
        spent_cents: i64,
    ) -> DbResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET
                loyalty_points = loyalty_points + ?1,
                total_spent_cents = total_spent_cents + ?2,
                visit_count = visit_count + 1,
                updated_at = ?3,
                version = version + 1
            WHERE id = ?4 AND tenant_id = ?5
            RETURNING *
            "#,
        )
        .bind(points)
        .bind(spent_cents)
        .bind(Utc::now())
        .bind(customer_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        customer.ok_or_else(|| DbError::not_found("Customer", customer_id))
    }

    pub async fn set_tier(&mut self, customer_id: &str, tier: LoyaltyTier) -> DbResult<()> {
        sqlx::query("UPDATE customers SET tier = ?1 WHERE id = ?2")
            .bind(tier)
            .bind(customer_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    pub async fn insert_transaction(&mut self, tx: &LoyaltyTransaction) -> DbResult<()> {
        debug!(customer_id = %tx.customer_id, kind = %tx.kind, points = tx.points, "Loyalty ledger entry");

        sqlx::query(
            r#"
            INSERT INTO loyalty_transactions (
                id, tenant_id, customer_id, kind, points, balance_after,
                order_id, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.tenant_id)
        .bind(&tx.customer_id)
        .bind(tx.kind)
        .bind(tx.points)
        .bind(tx.balance_after)
        .bind(&tx.order_id)
        .bind(&tx.description)
        .bind(tx.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Ledger entries for a customer, oldest first.
    pub async fn transactions(&mut self, customer_id: &str) -> DbResult<Vec<LoyaltyTransaction>> {
        let entries = sqlx::query_as::<_, LoyaltyTransaction>(
            r#"
            SELECT * FROM loyalty_transactions
            WHERE customer_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(entries)
    }
}
