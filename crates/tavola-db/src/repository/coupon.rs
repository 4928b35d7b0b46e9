//! # Coupon Repository
//!
//! Coupon lookup plus the guarded usage claim.
//!
//! ## Usage Claim
//! ```text
//! two orders, one coupon with max_uses = 1, current_uses = 0
//!
//!   claim_use(c)                          claim_use(c)
//!       │                                     │
//!       ▼                                     ▼
//!   UPDATE coupons SET current_uses + 1   UPDATE coupons SET current_uses + 1
//!   WHERE id = c AND current_uses < 1     WHERE id = c AND current_uses < 1
//!       │                                     │
//!       ▼                                     ▼
//!   1 row ✓                               0 rows → GuardFailed
//! ```

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tavola_core::{Coupon, CouponUsage};

/// Repository for coupons and coupon usage.
pub struct CouponRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CouponRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CouponRepository { conn }
    }

    /// Inserts a coupon. The code is stored normalized (trimmed, uppercase).
    pub async fn insert(&mut self, coupon: &Coupon) -> DbResult<()> {
        let code = Coupon::normalize_code(&coupon.code);
        debug!(id = %coupon.id, code = %code, "Inserting coupon");

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, tenant_id, code, description, discount_kind, discount_value,
                max_discount_cents, min_order_cents, valid_from, valid_until,
                max_uses, max_uses_per_customer, current_uses, applicable_order_types,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.tenant_id)
        .bind(&code)
        .bind(&coupon.description)
        .bind(coupon.discount_kind)
        .bind(coupon.discount_value)
        .bind(coupon.max_discount_cents)
        .bind(coupon.min_order_cents)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.max_uses)
        .bind(coupon.max_uses_per_customer)
        .bind(coupon.current_uses)
        .bind(&coupon.applicable_order_types)
        .bind(coupon.is_active)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code.clone()),
            other => other,
        })?;

        Ok(())
    }

    /// Finds a coupon by code, case-insensitively, within a tenant.
    pub async fn find_by_code(&mut self, tenant_id: &str, code: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(
            "SELECT * FROM coupons WHERE tenant_id = ?1 AND code = ?2",
        )
        .bind(tenant_id)
        .bind(Coupon::normalize_code(code))
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(coupon)
    }

    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(
            "SELECT * FROM coupons WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(coupon)
    }

    /// How many times a customer has used a coupon.
    pub async fn customer_usage_count(
        &mut self,
        coupon_id: &str,
        customer_id: &str,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = ?1 AND customer_id = ?2",
        )
        .bind(coupon_id)
        .bind(customer_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }

    /// Increments `current_uses` only while it is below `max_uses`.
    ///
    /// Fails with `GuardFailed` when the cap was reached, possibly by a
    /// concurrent redemption after this caller validated the coupon.
    pub async fn claim_use(&mut self, coupon_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE coupons SET current_uses = current_uses + 1
            WHERE id = ?1 AND (max_uses IS NULL OR current_uses < max_uses)
            "#,
        )
        .bind(coupon_id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::guard_failed("Coupon", coupon_id, "usage limit reached"));
        }
        Ok(())
    }

    /// Records a usage row. A second coupon on the same order violates the
    /// unique `coupon_usages.order_id`.
    pub async fn insert_usage(&mut self, usage: &CouponUsage) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupon_usages (
                id, tenant_id, coupon_id, order_id, customer_id, discount_cents, used_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&usage.id)
        .bind(&usage.tenant_id)
        .bind(&usage.coupon_id)
        .bind(&usage.order_id)
        .bind(&usage.customer_id)
        .bind(usage.discount_cents)
        .bind(usage.used_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn usages(&mut self, coupon_id: &str) -> DbResult<Vec<CouponUsage>> {
        let usages = sqlx::query_as::<_, CouponUsage>(
            "SELECT * FROM coupon_usages WHERE coupon_id = ?1 ORDER BY used_at ASC",
        )
        .bind(coupon_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(usages)
    }
}
