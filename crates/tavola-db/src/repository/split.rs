//! # Bill Split Repository
//!
//! Draft and finalized bill splits with their allocations. Splits are
//! proposals only; money moves through payments.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tavola_core::{BillSplit, SplitAllocation};

/// Repository for bill splits.
pub struct SplitRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SplitRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SplitRepository { conn }
    }

    /// Inserts a split and all of its allocations.
    pub async fn insert(&mut self, split: &BillSplit) -> DbResult<()> {
        debug!(
            id = %split.id,
            session_id = %split.session_id,
            split_type = %split.split_type,
            "Saving bill split"
        );

        sqlx::query(
            r#"
            INSERT INTO bill_splits (
                id, tenant_id, session_id, split_type, total_cents, split_count,
                status, created_by, created_at, finalized_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&split.id)
        .bind(&split.tenant_id)
        .bind(&split.session_id)
        .bind(split.split_type)
        .bind(split.total_cents)
        .bind(split.split_count)
        .bind(split.status)
        .bind(&split.created_by)
        .bind(split.created_at)
        .bind(split.finalized_at)
        .execute(&mut *self.conn)
        .await?;

        for allocation in &split.allocations {
            sqlx::query(
                r#"
                INSERT INTO split_allocations (
                    id, split_id, position, label, guest_id, amount_cents, item_ids
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&allocation.id)
            .bind(&allocation.split_id)
            .bind(allocation.position)
            .bind(&allocation.label)
            .bind(&allocation.guest_id)
            .bind(allocation.amount_cents)
            .bind(&allocation.item_ids)
            .execute(&mut *self.conn)
            .await?;
        }

        Ok(())
    }

    /// Gets a split with its allocations in position order.
    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<BillSplit>> {
        let split = sqlx::query_as::<_, BillSplit>(
            "SELECT * FROM bill_splits WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(mut split) = split else {
            return Ok(None);
        };

        split.allocations = sqlx::query_as::<_, SplitAllocation>(
            "SELECT * FROM split_allocations WHERE split_id = ?1 ORDER BY position ASC",
        )
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(Some(split))
    }

    pub async fn require(&mut self, tenant_id: &str, id: &str) -> DbResult<BillSplit> {
        self.get(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("BillSplit", id))
    }

    /// All splits of a session, newest first, allocations attached.
    pub async fn list_for_session(&mut self, session_id: &str) -> DbResult<Vec<BillSplit>> {
        let mut splits = sqlx::query_as::<_, BillSplit>(
            "SELECT * FROM bill_splits WHERE session_id = ?1 ORDER BY created_at DESC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let allocations = sqlx::query_as::<_, SplitAllocation>(
            r#"
            SELECT a.* FROM split_allocations a
            JOIN bill_splits s ON s.id = a.split_id
            WHERE s.session_id = ?1
            ORDER BY a.position ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let mut by_split: HashMap<String, Vec<SplitAllocation>> = HashMap::new();
        for allocation in allocations {
            by_split
                .entry(allocation.split_id.clone())
                .or_default()
                .push(allocation);
        }
        for split in &mut splits {
            split.allocations = by_split.remove(&split.id).unwrap_or_default();
        }

        Ok(splits)
    }

    /// Moves a draft split to finalized. Already-finalized splits fail the guard.
    pub async fn finalize(&mut self, split_id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bill_splits SET status = 'finalized', finalized_at = ?1
            WHERE id = ?2 AND status = 'draft'
            "#,
        )
        .bind(at)
        .bind(split_id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::guard_failed("BillSplit", split_id, "already finalized"));
        }
        Ok(())
    }
}
