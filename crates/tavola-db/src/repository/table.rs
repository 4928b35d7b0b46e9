//! # Table Repository
//!
//! Database operations for dining tables, table sessions and guests.
//!
//! ## Session Occupancy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One Active Session Per Table                       │
//! │                                                                         │
//! │  open_table(T)                         open_table(T)  (concurrent)      │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  INSERT table_sessions (ended_at NULL)  INSERT table_sessions           │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  ✓ committed                          UNIQUE idx_sessions_one_active    │
//! │                                       → DbError::UniqueViolation        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tavola_core::{Guest, GuestStatus, Table, TableSession};

/// Repository for tables, sessions and guests.
pub struct TableRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TableRepository<'c> {
    /// Creates a new TableRepository on a transaction's connection.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        TableRepository { conn }
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Inserts a dining table.
    pub async fn insert_table(&mut self, table: &Table) -> DbResult<()> {
        debug!(id = %table.id, number = table.number, "Inserting table");

        sqlx::query(
            r#"
            INSERT INTO dining_tables (
                id, tenant_id, number, capacity, area, status, is_occupied,
                current_session_id, current_total_cents, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&table.id)
        .bind(&table.tenant_id)
        .bind(table.number)
        .bind(table.capacity)
        .bind(&table.area)
        .bind(table.status)
        .bind(table.is_occupied)
        .bind(&table.current_session_id)
        .bind(table.current_total_cents)
        .bind(table.created_at)
        .bind(table.updated_at)
        .bind(table.version)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, table.number.to_string())
            }
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_table(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<Table>> {
        let table = sqlx::query_as::<_, Table>(
            "SELECT * FROM dining_tables WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(table)
    }

    pub async fn require_table(&mut self, tenant_id: &str, id: &str) -> DbResult<Table> {
        self.get_table(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Table", id))
    }

    /// Lists a tenant's tables ordered by table number.
    pub async fn list_tables(&mut self, tenant_id: &str) -> DbResult<Vec<Table>> {
        let tables = sqlx::query_as::<_, Table>(
            "SELECT * FROM dining_tables WHERE tenant_id = ?1 ORDER BY number ASC",
        )
        .bind(tenant_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(tables)
    }

    /// Version-checked write of the table's status and session pointers.
    pub async fn update_table(&mut self, table: &mut Table) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE dining_tables SET
                capacity = ?1, area = ?2, status = ?3, is_occupied = ?4,
                current_session_id = ?5, current_total_cents = ?6,
                updated_at = ?7, version = version + 1
            WHERE id = ?8 AND tenant_id = ?9 AND version = ?10
            "#,
        )
        .bind(table.capacity)
        .bind(&table.area)
        .bind(table.status)
        .bind(table.is_occupied)
        .bind(&table.current_session_id)
        .bind(table.current_total_cents)
        .bind(now)
        .bind(&table.id)
        .bind(&table.tenant_id)
        .bind(table.version)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::version_conflict("Table", &table.id));
        }

        table.version += 1;
        table.updated_at = now;
        debug!(id = %table.id, status = %table.status, "Table updated");
        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Inserts a session.
    ///
    /// A second active session for the same table violates
    /// `idx_sessions_one_active` and surfaces as `UniqueViolation`.
    pub async fn insert_session(&mut self, session: &TableSession) -> DbResult<()> {
        debug!(id = %session.id, table_id = %session.table_id, "Opening table session");

        sqlx::query(
            r#"
            INSERT INTO table_sessions (
                id, tenant_id, table_id, status, total_cents, paid_cents,
                customer_name, customer_count, shift_id, notes,
                started_at, ended_at, ended_by, forced_close, closing_snapshot,
                created_by, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(&session.table_id)
        .bind(session.status)
        .bind(session.total_cents)
        .bind(session.paid_cents)
        .bind(&session.customer_name)
        .bind(session.customer_count)
        .bind(&session.shift_id)
        .bind(&session.notes)
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(&session.ended_by)
        .bind(session.forced_close)
        .bind(&session.closing_snapshot)
        .bind(&session.created_by)
        .bind(session.version)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, session.table_id.clone())
            }
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_session(
        &mut self,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<TableSession>> {
        let session = sqlx::query_as::<_, TableSession>(
            "SELECT * FROM table_sessions WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(session)
    }

    pub async fn require_session(&mut self, tenant_id: &str, id: &str) -> DbResult<TableSession> {
        self.get_session(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("TableSession", id))
    }

    /// The table's session with `ended_at IS NULL`, if any.
    pub async fn active_session(
        &mut self,
        tenant_id: &str,
        table_id: &str,
    ) -> DbResult<Option<TableSession>> {
        let session = sqlx::query_as::<_, TableSession>(
            r#"
            SELECT * FROM table_sessions
            WHERE table_id = ?1 AND tenant_id = ?2 AND ended_at IS NULL
            "#,
        )
        .bind(table_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(session)
    }

    /// Version-checked write of the session's mutable columns.
    pub async fn update_session(&mut self, session: &mut TableSession) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE table_sessions SET
                status = ?1, total_cents = ?2, paid_cents = ?3,
                customer_name = ?4, customer_count = ?5, notes = ?6,
                ended_at = ?7, ended_by = ?8, forced_close = ?9, closing_snapshot = ?10,
                version = version + 1
            WHERE id = ?11 AND tenant_id = ?12 AND version = ?13
            "#,
        )
        .bind(session.status)
        .bind(session.total_cents)
        .bind(session.paid_cents)
        .bind(&session.customer_name)
        .bind(session.customer_count)
        .bind(&session.notes)
        .bind(session.ended_at)
        .bind(&session.ended_by)
        .bind(session.forced_close)
        .bind(&session.closing_snapshot)
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(session.version)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::version_conflict("TableSession", &session.id));
        }

        session.version += 1;
        Ok(())
    }

    // =========================================================================
    // Guests
    // =========================================================================

    pub async fn insert_guest(&mut self, guest: &Guest) -> DbResult<()> {
        debug!(id = %guest.id, session_id = %guest.session_id, "Guest joining");

        sqlx::query(
            r#"
            INSERT INTO guests (
                id, tenant_id, session_id, name, seat_number, token, status,
                subtotal_cents, joined_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&guest.id)
        .bind(&guest.tenant_id)
        .bind(&guest.session_id)
        .bind(&guest.name)
        .bind(guest.seat_number)
        .bind(&guest.token)
        .bind(guest.status)
        .bind(guest.subtotal_cents)
        .bind(guest.joined_at)
        .bind(guest.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get_guest(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<Guest>> {
        let guest = sqlx::query_as::<_, Guest>(
            "SELECT * FROM guests WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(guest)
    }

    pub async fn require_guest(&mut self, tenant_id: &str, id: &str) -> DbResult<Guest> {
        self.get_guest(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Guest", id))
    }

    /// Resolves a guest device token within a tenant.
    pub async fn guest_by_token(&mut self, tenant_id: &str, token: &str) -> DbResult<Option<Guest>> {
        let guest = sqlx::query_as::<_, Guest>(
            "SELECT * FROM guests WHERE token = ?1 AND tenant_id = ?2",
        )
        .bind(token)
        .bind(tenant_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(guest)
    }

    /// Guests of a session in join order.
    pub async fn list_guests(&mut self, session_id: &str) -> DbResult<Vec<Guest>> {
        let guests = sqlx::query_as::<_, Guest>(
            "SELECT * FROM guests WHERE session_id = ?1 ORDER BY joined_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(guests)
    }

    pub async fn set_guest_status(
        &mut self,
        guest_id: &str,
        status: GuestStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE guests SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(at)
            .bind(guest_id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Guest", guest_id));
        }
        Ok(())
    }

    pub async fn set_guest_subtotal(&mut self, guest_id: &str, subtotal_cents: i64) -> DbResult<()> {
        sqlx::query("UPDATE guests SET subtotal_cents = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(subtotal_cents)
            .bind(Utc::now())
            .bind(guest_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    /// Marks every non-terminal guest of a session as `left`.
    ///
    /// Returns the number of guests changed.
    pub async fn release_guests(&mut self, session_id: &str, at: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE guests SET status = 'left', updated_at = ?1
            WHERE session_id = ?2 AND status IN ('active', 'awaiting_bill')
            "#,
        )
        .bind(at)
        .bind(session_id)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
