//! # Audit Repository
//!
//! Append-only log of item reassignments between guests.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use tavola_core::ItemReassignment;

pub struct AuditRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AuditRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        AuditRepository { conn }
    }

    pub async fn insert_reassignment(&mut self, entry: &ItemReassignment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_reassignments (
                id, tenant_id, order_item_id, session_id, from_guest_id, to_guest_id,
                reason, reassigned_by, item_snapshot, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.order_item_id)
        .bind(&entry.session_id)
        .bind(&entry.from_guest_id)
        .bind(&entry.to_guest_id)
        .bind(&entry.reason)
        .bind(&entry.reassigned_by)
        .bind(&entry.item_snapshot)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Reassignments within a session, oldest first.
    pub async fn reassignments(&mut self, session_id: &str) -> DbResult<Vec<ItemReassignment>> {
        let entries = sqlx::query_as::<_, ItemReassignment>(
            r#"
            SELECT * FROM item_reassignments
            WHERE session_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(entries)
    }
}
