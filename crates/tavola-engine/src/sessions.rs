//! # Session Bookkeeping
//!
//! Helpers shared by the order and table managers. They run inside the
//! caller's unit of work and never commit.
//!
//! ## Mirrors
//! ```text
//! orders (non-cancelled) ──Σ total──► session.total ──► table.current_total
//! payments (session_id)  ──Σ amount─► session.paid
//! order_items (guest_id) ──Σ lines──► guest.subtotal
//! table.status ───────────────────────► session.status
//! ```

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use tavola_core::{CoreError, Guest, Order, Table, TableSession, TableStatus};
use tavola_db::UnitOfWork;

/// Recomputes a session's total and paid amounts from their source rows and
/// copies the total onto the table.
pub(crate) async fn refresh_session(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    session_id: &str,
) -> EngineResult<TableSession> {
    let total = uow.orders().session_total(session_id).await?;
    let paid: i64 = uow
        .payments()
        .list_for_session(session_id)
        .await?
        .iter()
        .map(|p| p.amount_cents)
        .sum();

    let mut session = uow.tables().require_session(tenant_id, session_id).await?;
    if session.total_cents != total || session.paid_cents != paid {
        session.total_cents = total;
        session.paid_cents = paid;
        uow.tables().update_session(&mut session).await?;
    }

    if session.is_active() {
        let mut table = uow.tables().require_table(tenant_id, &session.table_id).await?;
        if table.current_total_cents != total {
            table.current_total_cents = total;
            uow.tables().update_table(&mut table).await?;
        }
    }

    debug!(session_id = %session_id, total, paid, "Session totals refreshed");
    Ok(session)
}

/// Rejects changes to an order whose table session has ended. The session's
/// totals are frozen by its closing snapshot.
pub(crate) async fn ensure_session_open(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    order: &Order,
) -> EngineResult<()> {
    let Some(session_id) = order.session_id.as_deref() else {
        return Ok(());
    };
    let session = uow.tables().require_session(tenant_id, session_id).await?;
    if !session.is_active() {
        warn!(order_id = %order.id, session_id = %session_id, "Order belongs to an ended session");
        return Err(CoreError::SessionEnded {
            session_id: session.id,
        }
        .into());
    }
    Ok(())
}

/// Recomputes the running subtotal of each guest.
pub(crate) async fn refresh_guests<'a, I>(uow: &mut UnitOfWork, guest_ids: I) -> EngineResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: Vec<&str> = Vec::new();
    for guest_id in guest_ids {
        if seen.contains(&guest_id) {
            continue;
        }
        seen.push(guest_id);
        let subtotal = uow.orders().guest_subtotal(guest_id).await?;
        uow.tables().set_guest_subtotal(guest_id, subtotal).await?;
    }
    Ok(())
}

/// Starts a session on a table at rest and marks the table occupied.
///
/// A concurrent opener loses on the one-active-session index and gets
/// `TableOccupied`.
pub(crate) async fn open_session(
    uow: &mut UnitOfWork,
    ctx: &RequestContext,
    table: &mut Table,
    customer_name: Option<String>,
    customer_count: Option<i64>,
) -> EngineResult<TableSession> {
    if uow
        .tables()
        .active_session(&ctx.tenant_id, &table.id)
        .await?
        .is_some()
    {
        return Err(CoreError::TableOccupied {
            table_id: table.id.clone(),
        }
        .into());
    }
    table.status.ensure_transition(TableStatus::Occupied)?;

    let session = TableSession {
        id: Uuid::new_v4().to_string(),
        tenant_id: ctx.tenant_id.clone(),
        table_id: table.id.clone(),
        status: TableStatus::Occupied,
        total_cents: 0,
        paid_cents: 0,
        customer_name,
        customer_count,
        shift_id: None,
        notes: None,
        started_at: Utc::now(),
        ended_at: None,
        ended_by: None,
        forced_close: false,
        closing_snapshot: None,
        created_by: ctx.actor_id(),
        version: 0,
    };

    uow.tables()
        .insert_session(&session)
        .await
        .map_err(|e| {
            if e.is_unique_violation_on("table_id") {
                EngineError::from(CoreError::TableOccupied {
                    table_id: session.table_id.clone(),
                })
            } else {
                EngineError::from(e)
            }
        })?;

    table.status = TableStatus::Occupied;
    table.is_occupied = true;
    table.current_session_id = Some(session.id.clone());
    table.current_total_cents = 0;
    uow.tables().update_table(table).await?;

    info!(table_id = %table.id, session_id = %session.id, number = table.number, "Table session started");
    Ok(session)
}

/// Moves a table (and its active session) to `next` if the state machine
/// allows it. Returns the previous status.
pub(crate) async fn move_table(
    uow: &mut UnitOfWork,
    table: &mut Table,
    session: Option<&mut TableSession>,
    next: TableStatus,
) -> EngineResult<TableStatus> {
    table.status.ensure_transition(next)?;
    let previous = table.status;

    table.status = next;
    uow.tables().update_table(table).await?;

    if let Some(session) = session {
        session.status = next;
        uow.tables().update_session(session).await?;
    }

    debug!(table_id = %table.id, from = %previous, to = %next, "Table status changed");
    Ok(previous)
}

/// Loads the guest an item is being attributed to and checks it belongs to
/// `session_id` and can still receive items.
pub(crate) async fn attributable_guest(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    guest_id: &str,
    session_id: Option<&str>,
) -> EngineResult<Guest> {
    let guest = uow
        .tables()
        .get_guest(tenant_id, guest_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Guest", guest_id))?;

    if session_id != Some(guest.session_id.as_str()) {
        return Err(CoreError::Integrity {
            reason: format!("guest {} is not part of this order's session", guest.id),
        }
        .into());
    }
    if guest.status.is_terminal() {
        return Err(CoreError::GuestTerminal {
            guest_id: guest.id,
            status: guest.status,
        }
        .into());
    }
    Ok(guest)
}
