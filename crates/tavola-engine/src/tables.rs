//! # Table Manager
//!
//! Table sessions, QR guests, session payments, bill splits and item
//! reassignment.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   free/closed ──open_table / join_as_guest / table order──► occupied    │
//! │        ▲                                                       │        │
//! │        │                                   kitchen starts      ▼        │
//! │        │                                                  in_progress   │
//! │        │                                                       │        │
//! │        │                                                       ▼        │
//! │        │                                              awaiting_payment  │
//! │        │                                                       │        │
//! │        └──────── end_session (paid ≥ total, or forced) ◄───────┘        │
//! │                  closing snapshot, guests → left                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A table has at most one active session (`ended_at IS NULL`). The unique
//! index on active sessions settles concurrent openers.

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use crate::events::EventSink;
use crate::sessions::{attributable_guest, move_table, open_session, refresh_guests, refresh_session};
use tavola_core::table::{equal_split, validate_itemized};
use tavola_core::validation::{
    normalize_optional, validate_non_negative, validate_positive, validate_split_count,
};
use tavola_core::{
    AllocationRequest, BillSplit, Capability, ClosingSnapshot, CoreError, DomainEvent, Guest,
    GuestStatus, ItemReassignment, Money, Order, OrderItem, Payment, PaymentMethod,
    PaymentStatus, SplitAllocation, SplitStatus, SplitType, Table, TableSession, TableStatus,
    ValidationError, GUEST_TOKEN_BYTES,
};
use tavola_db::{Database, DbError, UnitOfWork};

// =============================================================================
// Response Types
// =============================================================================

/// A guest admitted through the QR flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuestPass {
    pub guest: Guest,
    pub table_id: String,
    pub table_number: i64,
    /// True when this join opened the session.
    pub opened_session: bool,
}

/// Everything attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOverview {
    pub session: TableSession,
    pub guests: Vec<Guest>,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub splits: Vec<BillSplit>,
}

// =============================================================================
// Table Manager
// =============================================================================

/// Table session operations.
#[derive(Clone)]
pub struct TableManager {
    db: Database,
    events: Arc<dyn EventSink>,
}

impl TableManager {
    pub fn new(db: Database, events: Arc<dyn EventSink>) -> Self {
        TableManager { db, events }
    }

    fn publish(&self, tenant_id: &str, events: Vec<DomainEvent>) {
        for event in events {
            self.events.publish(tenant_id, event);
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Seats a party at a table at rest.
    pub async fn open_table(
        &self,
        ctx: &RequestContext,
        table_id: &str,
        customer_name: Option<String>,
        customer_count: Option<i64>,
    ) -> EngineResult<TableSession> {
        ctx.require(Capability::ManageTables)?;
        if let Some(count) = customer_count {
            if count < 1 {
                return Err(CoreError::from(ValidationError::MustBePositive {
                    field: "customer_count".to_string(),
                })
                .into());
            }
        }
        debug!(table_id = %table_id, "open_table");

        let mut uow = self.db.begin().await?;
        let mut table = load_table(&mut uow, ctx, table_id).await?;
        let previous = table.status;

        let session = open_session(
            &mut uow,
            ctx,
            &mut table,
            normalize_optional(customer_name.as_deref()),
            customer_count,
        )
        .await?;
        uow.commit().await?;

        self.publish(
            &ctx.tenant_id,
            vec![
                DomainEvent::TableSessionStarted {
                    table_id: table.id.clone(),
                    session_id: session.id.clone(),
                },
                DomainEvent::TableStatusChanged {
                    table_id: table.id.clone(),
                    from: previous,
                    to: TableStatus::Occupied,
                },
            ],
        );
        Ok(session)
    }

    /// Admits a QR guest at table `table_number`, opening a session if the
    /// table has none.
    ///
    /// The guest token is 32 random bytes from the OS, hex-encoded. It is the
    /// guest's only credential.
    pub async fn join_as_guest(
        &self,
        ctx: &RequestContext,
        table_number: i64,
        name: Option<String>,
    ) -> EngineResult<GuestPass> {
        ctx.require(Capability::JoinTable)?;
        debug!(tenant_id = %ctx.tenant_id, table_number, "join_as_guest");

        let mut uow = self.db.begin().await?;
        let mut table = uow
            .tables()
            .list_tables(&ctx.tenant_id)
            .await?
            .into_iter()
            .find(|t| t.number == table_number)
            .ok_or_else(|| EngineError::not_found("Table", table_number.to_string()))?;

        let mut events = Vec::new();
        let (session, opened_session) =
            match uow.tables().active_session(&ctx.tenant_id, &table.id).await? {
                Some(session) => (session, false),
                None => {
                    let previous = table.status;
                    let session = open_session(&mut uow, ctx, &mut table, None, None).await?;
                    events.push(DomainEvent::TableSessionStarted {
                        table_id: table.id.clone(),
                        session_id: session.id.clone(),
                    });
                    events.push(DomainEvent::TableStatusChanged {
                        table_id: table.id.clone(),
                        from: previous,
                        to: TableStatus::Occupied,
                    });
                    (session, true)
                }
            };

        let now = Utc::now();
        let guest = Guest {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            session_id: session.id.clone(),
            name: normalize_optional(name.as_deref()),
            seat_number: None,
            token: generate_guest_token(),
            status: GuestStatus::Active,
            subtotal_cents: 0,
            joined_at: now,
            updated_at: now,
        };
        uow.tables().insert_guest(&guest).await?;
        uow.commit().await?;

        info!(
            table_id = %table.id,
            session_id = %session.id,
            guest_id = %guest.id,
            opened_session,
            "Guest joined"
        );

        events.push(DomainEvent::GuestJoined {
            session_id: session.id.clone(),
            guest_id: guest.id.clone(),
            table_number: table.number,
            name: guest.name.clone(),
        });
        self.publish(&ctx.tenant_id, events);

        Ok(GuestPass {
            guest,
            table_id: table.id,
            table_number: table.number,
            opened_session,
        })
    }

    /// Resolves a guest device token.
    pub async fn guest_by_token(&self, ctx: &RequestContext, token: &str) -> EngineResult<Guest> {
        let mut uow = self.db.begin().await?;
        let guest = uow.tables().guest_by_token(&ctx.tenant_id, token).await?;
        uow.rollback().await?;

        guest.ok_or_else(|| EngineError::not_found("Guest", "token"))
    }

    /// Flags that a table wants its bill. Notification only.
    ///
    /// With a guest token the guest moves to `awaiting_bill`; without one a
    /// table-wide `bill_requested` event goes out.
    pub async fn request_bill(
        &self,
        ctx: &RequestContext,
        table_id: &str,
        guest_token: Option<&str>,
    ) -> EngineResult<Option<Guest>> {
        ctx.require(Capability::RequestBill)?;
        debug!(table_id = %table_id, with_token = guest_token.is_some(), "request_bill");

        let mut uow = self.db.begin().await?;
        let table = load_table(&mut uow, ctx, table_id).await?;
        let session = require_active(&mut uow, ctx, &table).await?;

        let mut events = Vec::new();
        let guest = match guest_token {
            Some(token) => {
                let mut guest = uow
                    .tables()
                    .guest_by_token(&ctx.tenant_id, token)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Guest", "token"))?;
                if guest.session_id != session.id {
                    return Err(CoreError::Integrity {
                        reason: format!("guest {} is not seated at table {}", guest.id, table.id),
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

                let now = Utc::now();
                uow.tables()
                    .set_guest_status(&guest.id, GuestStatus::AwaitingBill, now)
                    .await?;
                guest.status = GuestStatus::AwaitingBill;
                guest.updated_at = now;

                events.push(DomainEvent::GuestStatusChanged {
                    guest_id: guest.id.clone(),
                    status: GuestStatus::AwaitingBill,
                });
                Some(guest)
            }
            None => None,
        };
        uow.commit().await?;

        info!(table_id = %table.id, session_id = %session.id, "Bill requested");
        events.push(DomainEvent::BillRequested {
            table_id: table.id.clone(),
            session_id: session.id.clone(),
            guest_id: guest.as_ref().map(|g| g.id.clone()),
        });
        self.publish(&ctx.tenant_id, events);

        Ok(guest)
    }

    /// Records a payment against the table's session as a whole.
    pub async fn add_payment(
        &self,
        ctx: &RequestContext,
        table_id: &str,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> EngineResult<TableSession> {
        ctx.require(Capability::RecordPayment)?;
        validate_positive("amount", amount).map_err(CoreError::from)?;
        debug!(table_id = %table_id, amount = amount.cents(), %method, "add_payment");

        let mut uow = self.db.begin().await?;
        let table = load_table(&mut uow, ctx, table_id).await?;
        let session = require_active(&mut uow, ctx, &table).await?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            order_id: None,
            session_id: Some(session.id.clone()),
            method,
            amount_cents: amount.cents(),
            tendered_cents: amount.cents(),
            change_cents: 0,
            reference: normalize_optional(reference.as_deref()),
            recorded_by: ctx.actor_id(),
            created_at: Utc::now(),
        };
        uow.payments().insert(&payment).await?;

        let session = refresh_session(&mut uow, &ctx.tenant_id, &session.id).await?;
        uow.commit().await?;

        info!(
            session_id = %session.id,
            payment_id = %payment.id,
            amount = amount.cents(),
            paid = session.paid_cents,
            total = session.total_cents,
            "Session payment recorded"
        );
        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::SessionPaymentRecorded {
                session_id: session.id.clone(),
                amount,
                paid: session.paid(),
            }],
        );
        Ok(session)
    }

    /// Closes the table's active session.
    ///
    /// ## Settlement Rule
    /// ```text
    /// paid ≥ total (non-cancelled orders) ──────────────► close
    /// paid < total, force = false ──────────────────────► SessionNotSettled
    /// paid < total, force = true, ForceCloseSession ─────► close, forced
    /// ```
    pub async fn end_session(
        &self,
        ctx: &RequestContext,
        table_id: &str,
        force: bool,
    ) -> EngineResult<ClosingSnapshot> {
        if force {
            ctx.require(Capability::ForceCloseSession)?;
        } else {
            ctx.require(Capability::EndSession)?;
        }
        debug!(table_id = %table_id, force, "end_session");

        let mut uow = self.db.begin().await?;
        let table = load_table(&mut uow, ctx, table_id).await?;
        if table.status.is_rest() {
            return Err(CoreError::TableNotInUse {
                table_id: table.id.clone(),
                status: table.status,
            }
            .into());
        }
        let active = require_active(&mut uow, ctx, &table).await?;

        // Totals are recomputed from rows, never trusted from the mirror.
        let mut session = refresh_session(&mut uow, &ctx.tenant_id, &active.id).await?;
        if let Err(err) = session.ensure_closable(force) {
            warn!(session_id = %session.id, total = session.total_cents, paid = session.paid_cents, "Session not settled");
            return Err(err.into());
        }
        // The refresh may have rewritten the table's total mirror.
        let mut table = load_table(&mut uow, ctx, table_id).await?;

        let orders = uow.orders().list_for_session(&ctx.tenant_id, &session.id).await?;
        let guests = uow.tables().list_guests(&session.id).await?;
        let payments = uow.payments().list_for_session(&session.id).await?;

        let now = Utc::now();
        let forced = !session.is_settled();
        let snapshot = ClosingSnapshot {
            session_id: session.id.clone(),
            table_id: table.id.clone(),
            table_number: table.number,
            total: session.total(),
            paid: session.paid(),
            balance: (session.total() - session.paid()).non_negative(),
            order_count: orders.iter().filter(|o| !o.is_cancelled()).count(),
            cancelled_order_count: orders.iter().filter(|o| o.is_cancelled()).count(),
            guest_count: guests.len(),
            payment_count: payments.len(),
            forced,
            closed_by: ctx.actor_id(),
            closed_at: now,
        };

        session.status = TableStatus::Closed;
        session.ended_at = Some(now);
        session.ended_by = ctx.actor_id();
        session.forced_close = forced;
        session.closing_snapshot = Some(serde_json::to_string(&snapshot)?);
        uow.tables().update_session(&mut session).await?;

        let released = uow.tables().release_guests(&session.id, now).await?;

        let previous = table.status;
        table.status = TableStatus::Free;
        table.is_occupied = false;
        table.current_session_id = None;
        table.current_total_cents = 0;
        uow.tables().update_table(&mut table).await?;

        uow.commit().await?;

        info!(
            table_id = %table.id,
            session_id = %session.id,
            total = snapshot.total.cents(),
            paid = snapshot.paid.cents(),
            forced,
            released,
            "Table session ended"
        );
        self.publish(
            &ctx.tenant_id,
            vec![
                DomainEvent::TableSessionEnded {
                    table_id: table.id.clone(),
                    session_id: session.id.clone(),
                    total: snapshot.total,
                    paid: snapshot.paid,
                    forced,
                },
                DomainEvent::TableStatusChanged {
                    table_id: table.id.clone(),
                    from: previous,
                    to: TableStatus::Free,
                },
            ],
        );
        Ok(snapshot)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Operator-driven table status change.
    ///
    /// Opening and closing sessions have their own operations: a table at
    /// rest cannot be moved to `occupied` here, and a table with an active
    /// session cannot be put to rest here.
    pub async fn update_table_status(
        &self,
        ctx: &RequestContext,
        table_id: &str,
        next: TableStatus,
    ) -> EngineResult<Table> {
        ctx.require(Capability::ManageTables)?;
        debug!(table_id = %table_id, %next, "update_table_status");

        let mut uow = self.db.begin().await?;
        let mut table = load_table(&mut uow, ctx, table_id).await?;
        let mut session = uow.tables().active_session(&ctx.tenant_id, &table.id).await?;

        if next.is_rest() && session.is_some() {
            return Err(CoreError::TableOccupied {
                table_id: table.id.clone(),
            }
            .into());
        }
        if table.status.is_rest() && !next.is_rest() {
            return Err(CoreError::InvalidTableTransition {
                from: table.status,
                to: next,
            }
            .into());
        }

        let previous = move_table(&mut uow, &mut table, session.as_mut(), next).await?;
        uow.commit().await?;

        info!(table_id = %table.id, from = %previous, to = %next, "Table status updated");
        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::TableStatusChanged {
                table_id: table.id.clone(),
                from: previous,
                to: next,
            }],
        );
        Ok(table)
    }

    /// Marks a guest `paid`, `left` or back to `active`. Terminal guests stay
    /// terminal.
    pub async fn update_guest_status(
        &self,
        ctx: &RequestContext,
        guest_id: &str,
        status: GuestStatus,
    ) -> EngineResult<Guest> {
        ctx.require(Capability::ManageTables)?;

        let mut uow = self.db.begin().await?;
        let mut guest = uow
            .tables()
            .get_guest(&ctx.tenant_id, guest_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Guest", guest_id))?;

        if guest.status.is_terminal() && guest.status != status {
            return Err(CoreError::GuestTerminal {
                guest_id: guest.id,
                status: guest.status,
            }
            .into());
        }

        let now = Utc::now();
        uow.tables().set_guest_status(&guest.id, status, now).await?;
        uow.commit().await?;

        info!(guest_id = %guest.id, from = %guest.status, to = %status, "Guest status updated");
        guest.status = status;
        guest.updated_at = now;

        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::GuestStatusChanged {
                guest_id: guest.id.clone(),
                status,
            }],
        );
        Ok(guest)
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Moves an item to another guest of the same session.
    ///
    /// Writes an audit row with the item as it was before the move.
    pub async fn reassign_item(
        &self,
        ctx: &RequestContext,
        item_id: &str,
        new_guest_id: &str,
        reason: Option<String>,
    ) -> EngineResult<OrderItem> {
        ctx.require(Capability::ReassignItems)?;
        debug!(item_id = %item_id, new_guest_id = %new_guest_id, "reassign_item");

        let mut uow = self.db.begin().await?;
        let mut item = uow
            .orders()
            .get_item(&ctx.tenant_id, item_id)
            .await?
            .ok_or_else(|| EngineError::not_found("OrderItem", item_id))?;
        if !item.is_active() {
            return Err(CoreError::ItemRemoved { item_id: item.id }.into());
        }

        let order = uow.orders().require(&ctx.tenant_id, &item.order_id).await?;
        order.ensure_mutable()?;
        if order.payment_status == PaymentStatus::Paid {
            return Err(CoreError::OrderAlreadyPaid { order_id: order.id }.into());
        }
        let session_id = order.session_id.clone().ok_or_else(|| CoreError::Integrity {
            reason: format!("order {} is not part of a table session", order.id),
        })?;

        let session = uow.tables().require_session(&ctx.tenant_id, &session_id).await?;
        session.ensure_active()?;

        if item.guest_id.as_deref() == Some(new_guest_id) {
            return Err(CoreError::SameGuest {
                item_id: item.id,
                guest_id: new_guest_id.to_string(),
            }
            .into());
        }

        attributable_guest(&mut uow, &ctx.tenant_id, new_guest_id, Some(&session_id)).await?;
        if let Some(from) = &item.guest_id {
            let previous = uow.tables().require_guest(&ctx.tenant_id, from).await?;
            if previous.session_id != session_id {
                return Err(CoreError::Integrity {
                    reason: format!("guest {} is not part of session {}", previous.id, session_id),
                }
                .into());
            }
        }

        let snapshot = serde_json::to_string(&item)?;
        let from_guest_id = item.guest_id.replace(new_guest_id.to_string());
        uow.orders().update_item(&item).await?;

        uow.audit()
            .insert_reassignment(&ItemReassignment {
                id: Uuid::new_v4().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                order_item_id: item.id.clone(),
                session_id: session_id.clone(),
                from_guest_id: from_guest_id.clone(),
                to_guest_id: new_guest_id.to_string(),
                reason: normalize_optional(reason.as_deref()),
                reassigned_by: ctx.actor_id(),
                item_snapshot: snapshot,
                created_at: Utc::now(),
            })
            .await?;

        refresh_guests(
            &mut uow,
            from_guest_id.as_deref().into_iter().chain([new_guest_id]),
        )
        .await?;
        uow.commit().await?;

        info!(
            item_id = %item.id,
            from_guest_id = ?from_guest_id,
            to_guest_id = %new_guest_id,
            "Item reassigned"
        );
        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::ItemReassigned {
                item_id: item.id.clone(),
                from_guest_id,
                to_guest_id: new_guest_id.to_string(),
            }],
        );
        Ok(item)
    }

    // =========================================================================
    // Bill Splits
    // =========================================================================

    /// Records a proposed division of a session's bill. Moves no money.
    ///
    /// ## Split Types
    /// - `equal`: `split_count` shares computed here; leftover cents go to the
    ///   first shares. Allocation requests only supply labels and guests.
    /// - `itemized`: each allocation carries its amount; they must add up to
    ///   `total` exactly.
    pub async fn create_bill_split(
        &self,
        ctx: &RequestContext,
        session_id: &str,
        split_type: SplitType,
        total: Money,
        split_count: i64,
        allocations: Vec<AllocationRequest>,
    ) -> EngineResult<BillSplit> {
        ctx.require(Capability::ManageBillSplits)?;
        validate_non_negative("total", total.cents()).map_err(CoreError::from)?;
        debug!(session_id = %session_id, %split_type, total = total.cents(), "create_bill_split");

        let amounts = match split_type {
            SplitType::Equal => {
                let count = validate_split_count(split_count).map_err(CoreError::from)?;
                equal_split(total, count)?
            }
            SplitType::Itemized => {
                if allocations.is_empty() {
                    return Err(CoreError::from(ValidationError::Required {
                        field: "allocations".to_string(),
                    })
                    .into());
                }
                validate_split_count(allocations.len() as i64).map_err(CoreError::from)?;
                let amounts = allocations
                    .iter()
                    .map(|a| {
                        a.amount_cents.map(Money::from_cents).ok_or_else(|| {
                            CoreError::from(ValidationError::Required {
                                field: "amount_cents".to_string(),
                            })
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                validate_itemized(total, &amounts)?;
                amounts
            }
        };

        let mut uow = self.db.begin().await?;
        let session = uow.tables().require_session(&ctx.tenant_id, session_id).await?;
        session.ensure_active()?;

        for request in &allocations {
            self.check_allocation(&mut uow, ctx, &session.id, request).await?;
        }

        let split_id = Uuid::new_v4().to_string();
        let allocations = amounts
            .iter()
            .enumerate()
            .map(|(position, amount)| {
                let request = allocations.get(position);
                SplitAllocation {
                    id: Uuid::new_v4().to_string(),
                    split_id: split_id.clone(),
                    position: position as i64,
                    label: request
                        .and_then(|r| normalize_optional(Some(r.label.as_str())))
                        .unwrap_or_else(|| format!("Share {}", position + 1)),
                    guest_id: request.and_then(|r| r.guest_id.clone()),
                    amount_cents: amount.cents(),
                    item_ids: request.map(|r| r.item_ids.join(",")).unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();

        let split = BillSplit {
            id: split_id,
            tenant_id: ctx.tenant_id.clone(),
            session_id: session.id.clone(),
            split_type,
            total_cents: total.cents(),
            split_count: allocations.len() as i64,
            status: SplitStatus::Draft,
            created_by: ctx.actor_id(),
            created_at: Utc::now(),
            finalized_at: None,
            allocations,
        };
        uow.splits().insert(&split).await?;
        uow.commit().await?;

        info!(split_id = %split.id, session_id = %split.session_id, shares = split.split_count, "Bill split created");
        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::BillSplitUpdated {
                session_id: split.session_id.clone(),
                split_id: split.id.clone(),
                finalized: false,
            }],
        );
        Ok(split)
    }

    /// Allocation guests and items must belong to the split's session.
    async fn check_allocation(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        session_id: &str,
        request: &AllocationRequest,
    ) -> EngineResult<()> {
        if let Some(guest_id) = &request.guest_id {
            let guest = uow
                .tables()
                .get_guest(&ctx.tenant_id, guest_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Guest", guest_id))?;
            if guest.session_id != session_id {
                return Err(CoreError::Integrity {
                    reason: format!("guest {} is not part of session {}", guest.id, session_id),
                }
                .into());
            }
        }

        for item_id in &request.item_ids {
            let item = uow
                .orders()
                .get_item(&ctx.tenant_id, item_id)
                .await?
                .ok_or_else(|| EngineError::not_found("OrderItem", item_id))?;
            let order = uow.orders().require(&ctx.tenant_id, &item.order_id).await?;
            if order.session_id.as_deref() != Some(session_id) {
                return Err(CoreError::Integrity {
                    reason: format!("item {} is not part of session {}", item.id, session_id),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Freezes a draft split.
    pub async fn finalize_bill_split(
        &self,
        ctx: &RequestContext,
        split_id: &str,
    ) -> EngineResult<BillSplit> {
        ctx.require(Capability::ManageBillSplits)?;

        let mut uow = self.db.begin().await?;
        let split = uow
            .splits()
            .get(&ctx.tenant_id, split_id)
            .await?
            .ok_or_else(|| EngineError::not_found("BillSplit", split_id))?;

        uow.splits()
            .finalize(&split.id, Utc::now())
            .await
            .map_err(|e| match e {
                DbError::GuardFailed { .. } => EngineError::from(CoreError::SplitFinalized {
                    split_id: split.id.clone(),
                }),
                e => e.into(),
            })?;

        let split = uow.splits().require(&ctx.tenant_id, split_id).await?;
        uow.commit().await?;

        info!(split_id = %split.id, "Bill split finalized");
        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::BillSplitUpdated {
                session_id: split.session_id.clone(),
                split_id: split.id.clone(),
                finalized: true,
            }],
        );
        Ok(split)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_table(&self, ctx: &RequestContext, table_id: &str) -> EngineResult<Table> {
        let mut uow = self.db.begin().await?;
        let table = load_table(&mut uow, ctx, table_id).await?;
        uow.rollback().await?;
        Ok(table)
    }

    /// Session with guests, orders, payments and splits.
    ///
    /// The payments list is informational; if it cannot be read the overview
    /// is still returned with an empty list.
    pub async fn session_overview(
        &self,
        ctx: &RequestContext,
        session_id: &str,
    ) -> EngineResult<SessionOverview> {
        ctx.require(Capability::ManageTables)?;

        let mut uow = self.db.begin().await?;
        let session = uow
            .tables()
            .get_session(&ctx.tenant_id, session_id)
            .await?
            .ok_or_else(|| EngineError::not_found("TableSession", session_id))?;
        let guests = uow.tables().list_guests(&session.id).await?;
        let orders = uow.orders().list_for_session(&ctx.tenant_id, &session.id).await?;
        let payments = match uow.payments().list_for_session(&session.id).await {
            Ok(payments) => payments,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Session payments unavailable");
                Vec::new()
            }
        };
        let splits = uow.splits().list_for_session(&session.id).await?;
        uow.rollback().await?;

        Ok(SessionOverview {
            session,
            guests,
            orders,
            payments,
            splits,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_table(
    uow: &mut UnitOfWork,
    ctx: &RequestContext,
    table_id: &str,
) -> EngineResult<Table> {
    uow.tables()
        .get_table(&ctx.tenant_id, table_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Table", table_id))
}

async fn require_active(
    uow: &mut UnitOfWork,
    ctx: &RequestContext,
    table: &Table,
) -> EngineResult<TableSession> {
    uow.tables()
        .active_session(&ctx.tenant_id, &table.id)
        .await?
        .ok_or_else(|| {
            EngineError::from(CoreError::NoActiveSession {
                table_id: table.id.clone(),
            })
        })
}

/// 256-bit random guest credential, hex-encoded.
fn generate_guest_token() -> String {
    let mut bytes = [0u8; GUEST_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::NewOrder;
    use crate::test_support::{cashier, engine, guest, kitchen, manager, waiter};
    use tavola_core::{ErrorKind, ItemRequest, OrderStatus, OrderType, MAX_SPLIT_COUNT};

    fn table_order(table_id: &str) -> NewOrder {
        NewOrder {
            order_type: Some(OrderType::Table),
            table_id: Some(table_id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_guest_token_is_256_bits_of_hex() {
        let a = generate_guest_token();
        let b = generate_guest_token();
        assert_eq!(a.len(), GUEST_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_join_as_guest_opens_free_table() {
        let engine = engine().await;
        let mut rx = engine.subscribe();

        let pass = engine
            .tables()
            .join_as_guest(&guest(), 1, Some("Ana".to_string()))
            .await
            .unwrap();
        assert!(pass.opened_session);
        assert_eq!(pass.guest.status, GuestStatus::Active);
        assert_eq!(pass.guest.token.len(), 64);

        let table = engine.tables().get_table(&manager(), "table-1").await.unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_session_id.as_deref(), Some(pass.guest.session_id.as_str()));

        // Second guest joins the same session.
        let second = engine
            .tables()
            .join_as_guest(&guest(), 1, None)
            .await
            .unwrap();
        assert!(!second.opened_session);
        assert_eq!(second.guest.session_id, pass.guest.session_id);
        assert_ne!(second.guest.token, pass.guest.token);

        let found = engine
            .tables()
            .guest_by_token(&guest(), &pass.guest.token)
            .await
            .unwrap();
        assert_eq!(found.id, pass.guest.id);

        let names: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event.name())
            .collect();
        assert_eq!(
            names,
            [
                "table_session_started",
                "table_status_changed",
                "guest_joined",
                "guest_joined"
            ]
        );
    }

    #[tokio::test]
    async fn test_join_unknown_table_is_not_found() {
        let engine = engine().await;
        let err = engine
            .tables()
            .join_as_guest(&guest(), 99, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_open_table_twice_is_rejected() {
        let engine = engine().await;
        engine
            .tables()
            .open_table(&waiter(), "table-1", Some("Party".to_string()), Some(4))
            .await
            .unwrap();

        let err = engine
            .tables()
            .open_table(&waiter(), "table-1", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::TableOccupied { .. })));
    }

    #[tokio::test]
    async fn test_end_session_requires_settlement() {
        let engine = engine().await;
        let details = engine
            .orders()
            .create_order(&waiter(), table_order("table-1"), vec![ItemRequest::new("soup", 1), ItemRequest::new("bread", 1)])
            .await
            .unwrap();
        assert_eq!(details.order.total_cents, 300);

        engine
            .tables()
            .add_payment(&cashier(), "table-1", Money::from_cents(150), PaymentMethod::Cash, None)
            .await
            .unwrap();

        let err = engine
            .tables()
            .end_session(&cashier(), "table-1", false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::SessionNotSettled { total: 300, paid: 150, .. })
        ));

        // Cashiers may not force.
        let err = engine
            .tables()
            .end_session(&cashier(), "table-1", true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let snapshot = engine
            .tables()
            .end_session(&manager(), "table-1", true)
            .await
            .unwrap();
        assert!(snapshot.forced);
        assert_eq!(snapshot.balance.cents(), 150);
        assert_eq!(snapshot.order_count, 1);

        let table = engine.tables().get_table(&manager(), "table-1").await.unwrap();
        assert_eq!(table.status, TableStatus::Free);
        assert!(table.current_session_id.is_none());
        assert_eq!(table.current_total_cents, 0);
    }

    #[tokio::test]
    async fn test_orders_of_ended_session_are_frozen() {
        let engine = engine().await;
        let details = engine
            .orders()
            .create_order(&waiter(), table_order("table-1"), vec![ItemRequest::new("soup", 1)])
            .await
            .unwrap();
        let order_id = details.order.id.clone();
        let session_id = details.order.session_id.clone().unwrap();

        engine
            .tables()
            .add_payment(&cashier(), "table-1", Money::from_cents(200), PaymentMethod::Cash, None)
            .await
            .unwrap();
        let snapshot = engine
            .tables()
            .end_session(&cashier(), "table-1", false)
            .await
            .unwrap();
        assert_eq!(snapshot.total.cents(), 200);

        let orders = engine.orders();
        for err in [
            orders
                .add_item(&waiter(), &order_id, ItemRequest::new("soup", 3))
                .await
                .unwrap_err(),
            orders.apply_coupon(&waiter(), &order_id, "SAVE200").await.unwrap_err(),
            orders
                .record_payment(&cashier(), &order_id, Money::from_cents(100), PaymentMethod::Cash, None)
                .await
                .unwrap_err(),
            orders.cancel_order(&manager(), &order_id, None).await.unwrap_err(),
        ] {
            assert!(matches!(err, EngineError::Core(CoreError::SessionEnded { .. })));
            assert_eq!(err.kind(), ErrorKind::StateConflict);
        }

        let overview = engine.tables().session_overview(&manager(), &session_id).await.unwrap();
        assert!(overview.session.ended_at.is_some());
        assert_eq!(overview.session.total_cents, 200);
        assert_eq!(overview.session.paid_cents, 200);
        assert_eq!(overview.orders[0].total_cents, 200);
        assert_eq!(overview.payments.len(), 1);

        let table = engine.tables().get_table(&manager(), "table-1").await.unwrap();
        assert_eq!(table.status, TableStatus::Free);
        assert_eq!(table.current_total_cents, 0);
    }

    #[tokio::test]
    async fn test_end_settled_session_releases_guests() {
        let engine = engine().await;
        let pass = engine.tables().join_as_guest(&guest(), 2, None).await.unwrap();
        let details = engine
            .orders()
            .create_order(
                &guest(),
                table_order("table-2"),
                vec![ItemRequest::new("soup", 1).for_guest(&pass.guest.id)],
            )
            .await
            .unwrap();
        engine
            .orders()
            .record_payment(&cashier(), &details.order.id, Money::from_cents(200), PaymentMethod::Card, None)
            .await
            .unwrap();

        let snapshot = engine
            .tables()
            .end_session(&cashier(), "table-2", false)
            .await
            .unwrap();
        assert!(!snapshot.forced);
        assert_eq!(snapshot.total.cents(), 200);
        assert_eq!(snapshot.paid.cents(), 200);
        assert_eq!(snapshot.guest_count, 1);

        let overview = engine
            .tables()
            .session_overview(&manager(), &pass.guest.session_id)
            .await
            .unwrap();
        assert!(overview.session.ended_at.is_some());
        assert!(overview.session.closing_snapshot.is_some());
        assert_eq!(overview.guests[0].status, GuestStatus::Left);

        // The table can host a new session afterwards.
        let err = engine
            .tables()
            .end_session(&cashier(), "table-2", false)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::TableNotInUse { .. })));
        engine
            .tables()
            .open_table(&waiter(), "table-2", None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_bill_marks_guest() {
        let engine = engine().await;
        let pass = engine.tables().join_as_guest(&guest(), 1, None).await.unwrap();

        let updated = engine
            .tables()
            .request_bill(&guest(), "table-1", Some(&pass.guest.token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, GuestStatus::AwaitingBill);

        assert!(engine
            .tables()
            .request_bill(&guest(), "table-1", None)
            .await
            .unwrap()
            .is_none());

        let err = engine
            .tables()
            .request_bill(&guest(), "table-2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NoActiveSession { .. })));
    }

    #[tokio::test]
    async fn test_reassign_item_between_guests() {
        let engine = engine().await;
        let ana = engine.tables().join_as_guest(&guest(), 1, None).await.unwrap().guest;
        let ben = engine.tables().join_as_guest(&guest(), 1, None).await.unwrap().guest;

        let details = engine
            .orders()
            .create_order(
                &waiter(),
                table_order("table-1"),
                vec![
                    ItemRequest::new("soup", 1).for_guest(&ana.id),
                    ItemRequest::new("bread", 1).for_guest(&ana.id),
                ],
            )
            .await
            .unwrap();
        let soup = details.items.iter().find(|i| i.menu_item_id == "soup").unwrap();

        let moved = engine
            .tables()
            .reassign_item(&waiter(), &soup.id, &ben.id, Some("wrong seat".to_string()))
            .await
            .unwrap();
        assert_eq!(moved.guest_id.as_deref(), Some(ben.id.as_str()));

        let overview = engine
            .tables()
            .session_overview(&manager(), &ana.session_id)
            .await
            .unwrap();
        let subtotal = |id: &str| overview.guests.iter().find(|g| g.id == id).unwrap().subtotal_cents;
        assert_eq!(subtotal(&ana.id), 100);
        assert_eq!(subtotal(&ben.id), 200);

        let mut uow = engine.database().begin().await.unwrap();
        let log = uow.audit().reassignments(&ana.session_id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].from_guest_id.as_deref(), Some(ana.id.as_str()));
        assert!(log[0].item_snapshot.contains(&ana.id));
        uow.rollback().await.unwrap();

        let err = engine
            .tables()
            .reassign_item(&waiter(), &soup.id, &ben.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::SameGuest { .. })));
    }

    #[tokio::test]
    async fn test_reassign_rejects_terminal_and_foreign_guests() {
        let engine = engine().await;
        let ana = engine.tables().join_as_guest(&guest(), 1, None).await.unwrap().guest;
        let ben = engine.tables().join_as_guest(&guest(), 1, None).await.unwrap().guest;
        let other = engine.tables().join_as_guest(&guest(), 2, None).await.unwrap().guest;

        let details = engine
            .orders()
            .create_order(
                &waiter(),
                table_order("table-1"),
                vec![ItemRequest::new("soup", 1).for_guest(&ana.id)],
            )
            .await
            .unwrap();
        let item_id = details.items[0].id.clone();

        let err = engine
            .tables()
            .reassign_item(&waiter(), &item_id, &other.id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);

        engine
            .tables()
            .update_guest_status(&waiter(), &ben.id, GuestStatus::Left)
            .await
            .unwrap();
        let err = engine
            .tables()
            .reassign_item(&waiter(), &item_id, &ben.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::GuestTerminal { .. })));

        engine
            .orders()
            .update_order_status(&waiter(), &details.order.id, OrderStatus::Served)
            .await
            .unwrap();
        let err = engine
            .tables()
            .reassign_item(&waiter(), &item_id, &ana.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::OrderAlreadyServed { .. })));
    }

    #[tokio::test]
    async fn test_equal_split_then_finalize() {
        let engine = engine().await;
        let session = engine
            .tables()
            .open_table(&waiter(), "table-1", None, Some(3))
            .await
            .unwrap();

        let split = engine
            .tables()
            .create_bill_split(&waiter(), &session.id, SplitType::Equal, Money::from_cents(1000), 3, Vec::new())
            .await
            .unwrap();
        let amounts: Vec<i64> = split.allocations.iter().map(|a| a.amount_cents).collect();
        assert_eq!(amounts, [334, 333, 333]);
        assert_eq!(split.allocations[0].label, "Share 1");
        assert_eq!(split.status, SplitStatus::Draft);

        let finalized = engine
            .tables()
            .finalize_bill_split(&waiter(), &split.id)
            .await
            .unwrap();
        assert_eq!(finalized.status, SplitStatus::Finalized);
        assert!(finalized.finalized_at.is_some());

        let err = engine
            .tables()
            .finalize_bill_split(&waiter(), &split.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::SplitFinalized { .. })));
    }

    #[tokio::test]
    async fn test_split_count_is_bounded() {
        let engine = engine().await;
        let session = engine
            .tables()
            .open_table(&waiter(), "table-1", None, None)
            .await
            .unwrap();

        for count in [0, MAX_SPLIT_COUNT + 1, 4_000_000_000] {
            let err = engine
                .tables()
                .create_bill_split(&waiter(), &session.id, SplitType::Equal, Money::from_cents(1000), count, Vec::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let split = engine
            .tables()
            .create_bill_split(&waiter(), &session.id, SplitType::Equal, Money::from_cents(1000), MAX_SPLIT_COUNT, Vec::new())
            .await
            .unwrap();
        assert_eq!(split.allocations.len(), 100);
        assert_eq!(split.allocations.iter().map(|a| a.amount_cents).sum::<i64>(), 1000);
    }

    #[tokio::test]
    async fn test_itemized_split_must_balance() {
        let engine = engine().await;
        let session = engine
            .tables()
            .open_table(&waiter(), "table-1", None, None)
            .await
            .unwrap();
        let share = |label: &str, cents: i64| AllocationRequest {
            label: label.to_string(),
            guest_id: None,
            amount_cents: Some(cents),
            item_ids: Vec::new(),
        };

        let err = engine
            .tables()
            .create_bill_split(
                &waiter(),
                &session.id,
                SplitType::Itemized,
                Money::from_cents(1000),
                2,
                vec![share("A", 600), share("B", 300)],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::AllocationMismatch { total: 1000, allocated: 900 })
        ));

        let split = engine
            .tables()
            .create_bill_split(
                &waiter(),
                &session.id,
                SplitType::Itemized,
                Money::from_cents(1000),
                2,
                vec![share("A", 600), share("B", 400)],
            )
            .await
            .unwrap();
        assert_eq!(split.allocations[1].label, "B");
        assert_eq!(split.split_count, 2);
    }

    #[tokio::test]
    async fn test_update_table_status_guards_sessions() {
        let engine = engine().await;

        let err = engine
            .tables()
            .update_table_status(&waiter(), "table-1", TableStatus::Occupied)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        engine
            .tables()
            .open_table(&waiter(), "table-1", None, None)
            .await
            .unwrap();
        let table = engine
            .tables()
            .update_table_status(&waiter(), "table-1", TableStatus::AwaitingPayment)
            .await
            .unwrap();
        assert_eq!(table.status, TableStatus::AwaitingPayment);

        let err = engine
            .tables()
            .update_table_status(&waiter(), "table-1", TableStatus::Free)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::TableOccupied { .. })));

        // Kitchen staff cannot manage tables.
        let err = engine
            .tables()
            .update_table_status(&kitchen(), "table-1", TableStatus::InProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_table_order_reopens_awaiting_payment_table() {
        let engine = engine().await;
        engine
            .orders()
            .create_order(&waiter(), table_order("table-1"), vec![ItemRequest::new("soup", 1)])
            .await
            .unwrap();
        engine
            .tables()
            .update_table_status(&waiter(), "table-1", TableStatus::AwaitingPayment)
            .await
            .unwrap();

        engine
            .orders()
            .create_order(&waiter(), table_order("table-1"), vec![ItemRequest::new("bread", 1)])
            .await
            .unwrap();

        let table = engine.tables().get_table(&manager(), "table-1").await.unwrap();
        assert_eq!(table.status, TableStatus::InProgress);
        assert_eq!(table.current_total_cents, 300);
    }
}
