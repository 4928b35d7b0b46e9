//! # Payment Repository
//!
//! Append-only payment rows. Order and session paid amounts are kept on the
//! parent rows; these rows are the audit trail behind them.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use tavola_core::Payment;

/// Repository for payment records.
pub struct PaymentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PaymentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PaymentRepository { conn }
    }

    /// Records a payment.
    pub async fn insert(&mut self, payment: &Payment) -> DbResult<()> {
        debug!(
            id = %payment.id,
            method = %payment.method,
            amount = payment.amount_cents,
            "Recording payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, tenant_id, order_id, session_id, method,
                amount_cents, tendered_cents, change_cents,
                reference, recorded_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.tenant_id)
        .bind(&payment.order_id)
        .bind(&payment.session_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.tendered_cents)
        .bind(payment.change_cents)
        .bind(&payment.reference)
        .bind(&payment.recorded_by)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn list_for_order(&mut self, order_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE order_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(payments)
    }

    /// Payments recorded against a session, including per-order ones.
    pub async fn list_for_session(&mut self, session_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(payments)
    }
}
