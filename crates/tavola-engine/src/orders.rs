//! # Order Manager
//!
//! Order lifecycle: creation, item and modifier changes, coupons, loyalty,
//! payments, refunds, cancellation and kitchen status.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ctx.require(capability)          PermissionDenied                      │
//! │       │                                                                 │
//! │  verifier.verify(items)           catalog lookups, before the tx        │
//! │       │                                                                 │
//! │  db.begin() ───────────────────────────────────────────────┐            │
//! │       │  load order (tenant-scoped)                        │            │
//! │       │  order.ensure_mutable()   OrderAlreadyServed /     │ one        │
//! │       │                           OrderCancelled           │ SQLite     │
//! │       │  mutate + order.reprice(items)                     │ tx         │
//! │       │  versioned update, guarded claims                  │            │
//! │       │  refresh guest + session mirrors                   │            │
//! │  uow.commit() ─────────────────────────────────────────────┘            │
//! │       │                                                                 │
//! │  events.publish(..)               after commit only                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OrderSettings;
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use crate::events::EventSink;
use crate::sessions::{
    attributable_guest, ensure_session_open, move_table, open_session, refresh_guests,
    refresh_session,
};
use crate::verifier::{PriceVerifier, VerifiedItem};
use tavola_core::coupon::{validate_coupon, CouponValidation};
use tavola_core::loyalty::{calculate_redemption, points_earned};
use tavola_core::pricing::{apply_payment, compute_totals, remaining_balance, value_before_loyalty};
use tavola_core::validation::{
    infer_order_type, normalize_optional, validate_item_count, validate_non_negative,
    validate_order_contact, validate_percent_bps, validate_positive, validate_quantity,
    OrderContact,
};
use tavola_core::{
    Actor, Capability, CouponRejection, CouponUsage, CoreError, DiscountKind, DomainEvent,
    ItemRequest, LoyaltyTier, LoyaltyTransaction, LoyaltyTxKind, Money, Order, OrderItem,
    OrderStatus, OrderType, Payment, PaymentMethod, PaymentStatus, TableStatus, ValidationError,
};
use tavola_db::{Database, DbError, UnitOfWork};

// =============================================================================
// Request / Response Types
// =============================================================================

/// Header fields of a new order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Inferred from `table_id` / `delivery_address` when absent.
    #[serde(default)]
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An order with its lines and payments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    /// Every line, removed ones included (see `removed_at`).
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

impl OrderDetails {
    pub fn active_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| item.is_active())
    }
}

/// Result of [`OrderManager::record_payment`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub order: Order,
    /// Loyalty points credited because this payment completed the order.
    pub points_earned: i64,
}

// =============================================================================
// Order Manager
// =============================================================================

/// Order lifecycle operations.
#[derive(Clone)]
pub struct OrderManager {
    db: Database,
    verifier: PriceVerifier,
    events: Arc<dyn EventSink>,
    settings: OrderSettings,
}

impl OrderManager {
    pub fn new(
        db: Database,
        verifier: PriceVerifier,
        events: Arc<dyn EventSink>,
        settings: OrderSettings,
    ) -> Self {
        OrderManager {
            db,
            verifier,
            events,
            settings,
        }
    }

    fn publish(&self, tenant_id: &str, events: Vec<DomainEvent>) {
        for event in events {
            self.events.publish(tenant_id, event);
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an order from catalog-verified lines.
    ///
    /// ## Steps
    /// 1. Verify every line against the catalog (client prices are never read)
    /// 2. Infer the order type and check its contact fields
    /// 3. Table orders: join the active session, or open one on a free table
    /// 4. Price, persist, refresh guest and session mirrors
    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        new: NewOrder,
        items: Vec<ItemRequest>,
    ) -> EngineResult<OrderDetails> {
        ctx.require(Capability::CreateOrder)?;
        if ctx.actor == Actor::Guest && !self.settings.guest_ordering {
            return Err(EngineError::PermissionDenied {
                actor: ctx.actor.label(),
                capability: Capability::CreateOrder,
            });
        }
        debug!(tenant_id = %ctx.tenant_id, items = items.len(), "create_order");

        validate_item_count(items.len()).map_err(CoreError::from)?;
        if items.len() > self.settings.max_items {
            return Err(CoreError::TooManyItems {
                max: self.settings.max_items,
            }
            .into());
        }

        let table_id = normalize_optional(new.table_id.as_deref());
        let delivery_address = normalize_optional(new.delivery_address.as_deref());
        let customer_name = normalize_optional(new.customer_name.as_deref());
        let customer_phone = normalize_optional(new.customer_phone.as_deref());

        let order_type = infer_order_type(
            new.order_type,
            table_id.as_deref(),
            delivery_address.as_deref(),
        );
        validate_order_contact(
            order_type,
            &OrderContact {
                table_id: table_id.as_deref(),
                customer_name: customer_name.as_deref(),
                customer_phone: customer_phone.as_deref(),
                delivery_address: delivery_address.as_deref(),
            },
        )
        .map_err(CoreError::from)?;

        let verified = self.verifier.verify(&ctx.tenant_id, &items).await?;

        let mut uow = self.db.begin().await?;
        let mut events = Vec::new();

        if let Some(customer_id) = &new.customer_id {
            uow.loyalty()
                .require_customer(&ctx.tenant_id, customer_id)
                .await?;
        }

        // Table orders always belong to a session.
        let session_id = match (&table_id, order_type) {
            (Some(table_id), OrderType::Table) => {
                let (session_id, opened) = self
                    .attach_to_table(&mut uow, ctx, table_id, customer_name.clone())
                    .await?;
                events.extend(opened);
                Some(session_id)
            }
            _ => None,
        };

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            table_id: table_id.filter(|_| session_id.is_some()),
            session_id: session_id.clone(),
            branch_id: normalize_optional(new.branch_id.as_deref()),
            order_type,
            status: OrderStatus::Pending,
            customer_id: new.customer_id.clone(),
            customer_name,
            customer_phone,
            delivery_address,
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
            created_by: ctx.actor_id(),
            notes: normalize_optional(new.notes.as_deref()),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let rows = self
            .build_rows(&mut uow, ctx, &order, verified, now)
            .await?;
        order.reprice(&rows)?;

        uow.orders().insert(&order).await?;
        for row in &rows {
            uow.orders().insert_item(row).await?;
        }

        refresh_guests(&mut uow, rows.iter().filter_map(|r| r.guest_id.as_deref())).await?;
        if let Some(session_id) = &session_id {
            refresh_session(&mut uow, &ctx.tenant_id, session_id).await?;
        }

        uow.commit().await?;

        info!(
            order_id = %order.id,
            order_type = %order.order_type,
            total = order.total_cents,
            items = rows.len(),
            "Order created"
        );

        events.push(DomainEvent::NewOrder {
            order_id: order.id.clone(),
            order_type: order.order_type,
            table_id: order.table_id.clone(),
            total: order.total(),
        });
        self.publish(&ctx.tenant_id, events);

        Ok(OrderDetails {
            order,
            items: rows,
            payments: Vec::new(),
        })
    }

    /// Finds or opens the session a new table order joins.
    ///
    /// Returns the session id and any events caused by opening it.
    async fn attach_to_table(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        table_id: &str,
        customer_name: Option<String>,
    ) -> EngineResult<(String, Vec<DomainEvent>)> {
        let mut table = uow
            .tables()
            .get_table(&ctx.tenant_id, table_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Table", table_id))?;

        if let Some(mut session) = uow.tables().active_session(&ctx.tenant_id, table_id).await? {
            let mut events = Vec::new();
            if table.status == TableStatus::AwaitingPayment {
                let from =
                    move_table(uow, &mut table, Some(&mut session), TableStatus::InProgress).await?;
                events.push(DomainEvent::TableStatusChanged {
                    table_id: table.id.clone(),
                    from,
                    to: TableStatus::InProgress,
                });
            }
            if !table.is_occupied {
                table.is_occupied = true;
                uow.tables().update_table(&mut table).await?;
            }
            return Ok((session.id, events));
        }

        let session = open_session(uow, ctx, &mut table, customer_name, None).await?;
        Ok((
            session.id.clone(),
            vec![DomainEvent::TableSessionStarted {
                table_id: table.id.clone(),
                session_id: session.id,
            }],
        ))
    }

    /// Turns verified lines into rows, checking guest attribution.
    async fn build_rows(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        order: &Order,
        verified: Vec<VerifiedItem>,
        now: chrono::DateTime<Utc>,
    ) -> EngineResult<Vec<OrderItem>> {
        let mut rows = Vec::with_capacity(verified.len());
        for item in verified {
            if let Some(guest_id) = &item.guest_id {
                attributable_guest(uow, &ctx.tenant_id, guest_id, order.session_id.as_deref())
                    .await?;
            }
            rows.push(item.into_order_item(&order.id, now));
        }
        Ok(rows)
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Adds a catalog-verified line to an open order.
    pub async fn add_item(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        item: ItemRequest,
    ) -> EngineResult<OrderDetails> {
        ctx.require(Capability::ModifyOrder)?;
        debug!(order_id = %order_id, menu_item_id = %item.menu_item_id, "add_item");

        let verified = self
            .verifier
            .verify(&ctx.tenant_id, std::slice::from_ref(&item))
            .await?;

        let mut uow = self.db.begin().await?;
        let mut order = self.load_mutable(&mut uow, ctx, order_id).await?;

        let mut items = uow.orders().items(&order.id).await?;
        let active = items.iter().filter(|i| i.is_active()).count();
        if active + 1 > self.settings.max_items {
            return Err(CoreError::TooManyItems {
                max: self.settings.max_items,
            }
            .into());
        }

        let rows = self
            .build_rows(&mut uow, ctx, &order, verified, Utc::now())
            .await?;
        for row in &rows {
            uow.orders().insert_item(row).await?;
        }
        items.extend(rows.iter().cloned());

        order.reprice(&items)?;
        uow.orders().update(&mut order).await?;

        refresh_guests(&mut uow, rows.iter().filter_map(|r| r.guest_id.as_deref())).await?;
        self.refresh_order_session(&mut uow, ctx, &order).await?;
        uow.commit().await?;

        info!(order_id = %order.id, total = order.total_cents, "Item added");
        self.publish_updated(ctx, &order);

        Ok(OrderDetails {
            order,
            items,
            payments: Vec::new(),
        })
    }

    /// Changes the quantity of an active line.
    pub async fn update_item_quantity(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ModifyOrder)?;
        validate_quantity(quantity).map_err(CoreError::from)?;
        debug!(order_id = %order_id, item_id = %item_id, quantity, "update_item_quantity");

        self.change_item(ctx, order_id, item_id, |item| item.quantity = quantity)
            .await
    }

    /// Soft-removes a line; it stays on the order but no longer counts.
    pub async fn remove_item(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        item_id: &str,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ModifyOrder)?;
        debug!(order_id = %order_id, item_id = %item_id, "remove_item");

        let now = Utc::now();
        self.change_item(ctx, order_id, item_id, |item| item.removed_at = Some(now))
            .await
    }

    async fn change_item<F>(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        item_id: &str,
        change: F,
    ) -> EngineResult<Order>
    where
        F: FnOnce(&mut OrderItem),
    {
        let mut uow = self.db.begin().await?;
        let mut order = self.load_mutable(&mut uow, ctx, order_id).await?;

        let mut items = uow.orders().items(&order.id).await?;
        let item = items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| EngineError::not_found("OrderItem", item_id))?;
        if !item.is_active() {
            return Err(CoreError::ItemRemoved {
                item_id: item.id.clone(),
            }
            .into());
        }

        change(item);
        let guest_id = item.guest_id.clone();
        uow.orders().update_item(item).await?;

        order.reprice(&items)?;
        uow.orders().update(&mut order).await?;

        refresh_guests(&mut uow, guest_id.as_deref()).await?;
        self.refresh_order_session(&mut uow, ctx, &order).await?;
        uow.commit().await?;

        info!(order_id = %order.id, item_id = %item_id, total = order.total_cents, "Item changed");
        self.publish_updated(ctx, &order);
        Ok(order)
    }

    // =========================================================================
    // Modifiers
    // =========================================================================

    /// Sets the order-level discount. Percent values are basis points.
    pub async fn apply_discount(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        kind: DiscountKind,
        value: i64,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ApplyDiscount)?;
        validate_non_negative("discount_value", value).map_err(CoreError::from)?;
        if kind == DiscountKind::Percent {
            validate_percent_bps("discount_value", value).map_err(CoreError::from)?;
        }
        debug!(order_id = %order_id, ?kind, value, "apply_discount");

        self.modify(ctx, order_id, |order| {
            order.discount_kind = kind;
            order.discount_value = value;
        })
        .await
    }

    pub async fn apply_service_charge(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        amount: Money,
        label: Option<String>,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ApplyFees)?;
        validate_non_negative("service_charge", amount.cents()).map_err(CoreError::from)?;
        debug!(order_id = %order_id, amount = amount.cents(), "apply_service_charge");

        let label = normalize_optional(label.as_deref());
        self.modify(ctx, order_id, |order| {
            order.service_charge_cents = amount.cents();
            order.service_charge_label = label;
        })
        .await
    }

    pub async fn apply_delivery_fee(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        amount: Money,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ApplyFees)?;
        validate_non_negative("delivery_fee", amount.cents()).map_err(CoreError::from)?;

        self.modify(ctx, order_id, |order| order.delivery_fee_cents = amount.cents())
            .await
    }

    pub async fn apply_packaging_fee(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        amount: Money,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ApplyFees)?;
        validate_non_negative("packaging_fee", amount.cents()).map_err(CoreError::from)?;

        self.modify(ctx, order_id, |order| order.packaging_fee_cents = amount.cents())
            .await
    }

    /// Overwrites modifier fields and reprices.
    async fn modify<F>(&self, ctx: &RequestContext, order_id: &str, change: F) -> EngineResult<Order>
    where
        F: FnOnce(&mut Order),
    {
        let mut uow = self.db.begin().await?;
        let mut order = self.load_mutable(&mut uow, ctx, order_id).await?;
        let items = uow.orders().items(&order.id).await?;

        // Reprice a copy so a rejected change leaves nothing half-applied.
        let mut changed = order.clone();
        change(&mut changed);
        changed.reprice(&items)?;
        order = changed;

        uow.orders().update(&mut order).await?;
        self.refresh_order_session(&mut uow, ctx, &order).await?;
        uow.commit().await?;

        info!(order_id = %order.id, total = order.total_cents, "Order modifiers updated");
        self.publish_updated(ctx, &order);
        Ok(order)
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    /// Applies a coupon code.
    ///
    /// The discount is computed on the order subtotal. The usage claim is a
    /// guarded increment, so two orders racing for the last use cannot both
    /// succeed.
    pub async fn apply_coupon(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        code: &str,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ApplyCoupon)?;
        debug!(order_id = %order_id, code = %code, "apply_coupon");

        let mut uow = self.db.begin().await?;
        let mut order = self.load_mutable(&mut uow, ctx, order_id).await?;
        if order.coupon_id.is_some() {
            return Err(CoreError::CouponAlreadyApplied {
                order_id: order.id.clone(),
            }
            .into());
        }

        let items = uow.orders().items(&order.id).await?;
        let order_value = compute_totals(&items, &order.modifiers()).subtotal;

        let coupon = uow.coupons().find_by_code(&ctx.tenant_id, code).await?;
        let customer_uses = match (&coupon, &order.customer_id) {
            (Some(coupon), Some(customer_id)) => Some(
                uow.coupons()
                    .customer_usage_count(&coupon.id, customer_id)
                    .await?,
            ),
            _ => None,
        };

        let quote = validate_coupon(
            code,
            coupon.as_ref(),
            Utc::now(),
            order_value,
            order.order_type,
            customer_uses,
        )
        .map_err(|rejection| {
            warn!(order_id = %order.id, code = %code, reason = %rejection, "Coupon rejected");
            CoreError::from(rejection)
        })?;

        uow.coupons()
            .claim_use(&quote.coupon_id)
            .await
            .map_err(|e| match (e, &coupon) {
                (DbError::GuardFailed { .. }, Some(coupon)) => {
                    EngineError::from(CoreError::from(CouponRejection::UsageLimitReached {
                        code: coupon.code.clone(),
                        current: coupon.max_uses.unwrap_or(coupon.current_uses),
                        max: coupon.max_uses.unwrap_or(coupon.current_uses),
                    }))
                }
                (e, _) => e.into(),
            })?;

        uow.coupons()
            .insert_usage(&CouponUsage {
                id: Uuid::new_v4().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                coupon_id: quote.coupon_id.clone(),
                order_id: order.id.clone(),
                customer_id: order.customer_id.clone(),
                discount_cents: quote.discount.cents(),
                used_at: Utc::now(),
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation_on("order_id") {
                    EngineError::from(CoreError::CouponAlreadyApplied {
                        order_id: order.id.clone(),
                    })
                } else {
                    EngineError::from(e)
                }
            })?;

        order.coupon_id = Some(quote.coupon_id.clone());
        order.coupon_discount_cents = quote.discount.cents();
        order.reprice(&items)?;

        uow.orders().update(&mut order).await?;
        self.refresh_order_session(&mut uow, ctx, &order).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id,
            coupon_id = %quote.coupon_id,
            discount = quote.discount.cents(),
            total = order.total_cents,
            "Coupon applied"
        );
        self.publish_updated(ctx, &order);
        Ok(order)
    }

    /// Read-only coupon preview.
    pub async fn validate_coupon(
        &self,
        ctx: &RequestContext,
        code: &str,
        order_value: Money,
        order_type: OrderType,
        customer_id: Option<&str>,
    ) -> EngineResult<CouponValidation> {
        ctx.require(Capability::CreateOrder)?;

        let mut uow = self.db.begin().await?;
        let coupon = uow.coupons().find_by_code(&ctx.tenant_id, code).await?;
        let customer_uses = match (&coupon, customer_id) {
            (Some(coupon), Some(customer_id)) => Some(
                uow.coupons()
                    .customer_usage_count(&coupon.id, customer_id)
                    .await?,
            ),
            _ => None,
        };
        uow.rollback().await?;

        let result = validate_coupon(
            code,
            coupon.as_ref(),
            Utc::now(),
            order_value,
            order_type,
            customer_uses,
        );
        Ok(CouponValidation::from_result(coupon, result))
    }

    // =========================================================================
    // Loyalty
    // =========================================================================

    /// Attaches a tenant customer to an open order.
    pub async fn link_customer(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        customer_id: &str,
    ) -> EngineResult<Order> {
        ctx.require(Capability::ModifyOrder)?;

        let mut uow = self.db.begin().await?;
        let mut order = self.load_mutable(&mut uow, ctx, order_id).await?;

        if order.loyalty_points_redeemed > 0 && order.customer_id.as_deref() != Some(customer_id) {
            return Err(CoreError::LoyaltyAlreadyRedeemed {
                order_id: order.id.clone(),
            }
            .into());
        }

        let customer = uow
            .loyalty()
            .require_customer(&ctx.tenant_id, customer_id)
            .await?;

        order.customer_id = Some(customer.id.clone());
        if order.customer_name.is_none() {
            order.customer_name = Some(customer.name.clone());
        }
        if order.customer_phone.is_none() {
            order.customer_phone = customer.phone.clone();
        }

        uow.orders().update(&mut order).await?;
        uow.commit().await?;

        info!(order_id = %order.id, customer_id = %customer.id, "Customer linked");
        self.publish_updated(ctx, &order);
        Ok(order)
    }

    /// Redeems loyalty points against the order's remaining value.
    ///
    /// The debit is guarded in SQL, so concurrent redemptions can never take
    /// the balance below zero.
    pub async fn redeem_loyalty_points(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        points: i64,
    ) -> EngineResult<Order> {
        ctx.require(Capability::RedeemLoyalty)?;
        if points <= 0 {
            return Err(CoreError::from(ValidationError::MustBePositive {
                field: "points".to_string(),
            })
            .into());
        }
        debug!(order_id = %order_id, points, "redeem_loyalty_points");

        let mut uow = self.db.begin().await?;
        let mut order = self.load_mutable(&mut uow, ctx, order_id).await?;

        if order.loyalty_points_redeemed > 0 {
            return Err(CoreError::LoyaltyAlreadyRedeemed {
                order_id: order.id.clone(),
            }
            .into());
        }
        let customer_id = order.customer_id.clone().ok_or_else(|| CoreError::NoLinkedCustomer {
            order_id: order.id.clone(),
        })?;

        let program = uow
            .loyalty()
            .program(&ctx.tenant_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CoreError::LoyaltyProgramInactive)?;

        let customer = uow
            .loyalty()
            .require_customer(&ctx.tenant_id, &customer_id)
            .await?;

        if points > customer.loyalty_points {
            warn!(order_id = %order.id, balance = customer.loyalty_points, points, "Insufficient points");
            return Err(CoreError::InsufficientPoints {
                balance: customer.loyalty_points,
                requested: points,
            }
            .into());
        }
        if points < program.min_redeem_points {
            return Err(CoreError::BelowMinimumRedemption {
                minimum: program.min_redeem_points,
                requested: points,
            }
            .into());
        }

        let items = uow.orders().items(&order.id).await?;
        let remaining = value_before_loyalty(&items, &order.modifiers());
        let redemption =
            calculate_redemption(&program, customer.loyalty_points, points, remaining);
        if redemption.is_empty() {
            return Err(CoreError::NothingToRedeem {
                order_id: order.id.clone(),
            }
            .into());
        }

        let balance_after = uow
            .loyalty()
            .debit_points(&ctx.tenant_id, &customer_id, redemption.points)
            .await
            .map_err(|e| match e {
                DbError::GuardFailed { .. } => EngineError::from(CoreError::InsufficientPoints {
                    balance: customer.loyalty_points,
                    requested: redemption.points,
                }),
                e => e.into(),
            })?;

        uow.loyalty()
            .insert_transaction(&LoyaltyTransaction {
                id: Uuid::new_v4().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                customer_id: customer_id.clone(),
                kind: LoyaltyTxKind::Redeemed,
                points: -redemption.points,
                balance_after,
                order_id: Some(order.id.clone()),
                description: Some(format!("Redeemed on order {}", order.id)),
                created_at: Utc::now(),
            })
            .await?;

        order.loyalty_points_redeemed = redemption.points;
        order.loyalty_discount_cents = redemption.discount.cents();
        order.reprice(&items)?;

        uow.orders().update(&mut order).await?;
        self.refresh_order_session(&mut uow, ctx, &order).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id,
            customer_id = %customer_id,
            points = redemption.points,
            discount = redemption.discount.cents(),
            balance_after,
            "Loyalty points redeemed"
        );
        self.publish_updated(ctx, &order);
        Ok(order)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Records a payment against an order.
    ///
    /// ## Payment Flow
    /// ```text
    /// total 1150, paid 0, tendered 2000
    ///      │
    ///      ▼
    /// applied 1150, change 850 → paid 1150 → status paid
    ///      │
    ///      ▼
    /// order_payment_recorded + order_payment_completed, loyalty credited
    /// ```
    /// Status is never advanced by a payment.
    pub async fn record_payment(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> EngineResult<PaymentReceipt> {
        ctx.require(Capability::RecordPayment)?;
        validate_positive("amount", amount).map_err(CoreError::from)?;
        debug!(order_id = %order_id, amount = amount.cents(), %method, "record_payment");

        let mut uow = self.db.begin().await?;
        let mut order = self.load(&mut uow, ctx, order_id).await?;
        order.ensure_mutable()?;
        ensure_session_open(&mut uow, &ctx.tenant_id, &order).await?;
        if order.total().is_zero() {
            return Err(CoreError::NothingToPay {
                order_id: order.id.clone(),
            }
            .into());
        }
        order.ensure_payable()?;
        if remaining_balance(order.total(), order.paid()).is_zero() {
            return Err(CoreError::OrderAlreadyPaid {
                order_id: order.id.clone(),
            }
            .into());
        }

        let outcome = apply_payment(order.total(), order.paid(), amount);
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            order_id: Some(order.id.clone()),
            session_id: order.session_id.clone(),
            method,
            amount_cents: outcome.applied.cents(),
            tendered_cents: amount.cents(),
            change_cents: outcome.change.cents(),
            reference: normalize_optional(reference.as_deref()),
            recorded_by: ctx.actor_id(),
            created_at: Utc::now(),
        };
        uow.payments().insert(&payment).await?;

        order.paid_cents = outcome.new_paid.cents();
        order.payment_status = outcome.status;
        order.payment_method = Some(method);
        order.change_cents = outcome.change.cents();
        uow.orders().update(&mut order).await?;

        let completed = outcome.status == PaymentStatus::Paid;
        let points = if completed {
            self.credit_loyalty(&mut uow, ctx, &order).await?
        } else {
            0
        };

        self.refresh_order_session(&mut uow, ctx, &order).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id,
            payment_id = %payment.id,
            applied = outcome.applied.cents(),
            change = outcome.change.cents(),
            paid = order.paid_cents,
            status = %order.payment_status,
            "Payment recorded"
        );

        let mut events = vec![DomainEvent::OrderPaymentRecorded {
            order_id: order.id.clone(),
            amount: outcome.applied,
            method,
            paid: order.paid(),
            payment_status: order.payment_status,
        }];
        if completed {
            events.push(DomainEvent::OrderPaymentCompleted {
                order_id: order.id.clone(),
                total: order.total(),
            });
        }
        self.publish(&ctx.tenant_id, events);

        Ok(PaymentReceipt {
            payment,
            order,
            points_earned: points,
        })
    }

    /// Credits purchase points and spend to the linked customer.
    async fn credit_loyalty(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        order: &Order,
    ) -> EngineResult<i64> {
        let Some(customer_id) = &order.customer_id else {
            return Ok(0);
        };

        let points = match uow.loyalty().program(&ctx.tenant_id).await? {
            Some(program) => points_earned(&program, order.total()),
            None => 0,
        };

        let customer = uow
            .loyalty()
            .credit_purchase(&ctx.tenant_id, customer_id, points, order.total_cents)
            .await?;

        let tier = LoyaltyTier::for_total_spent(customer.total_spent());
        if tier != customer.tier {
            uow.loyalty().set_tier(&customer.id, tier).await?;
            info!(customer_id = %customer.id, %tier, "Customer tier changed");
        }

        if points > 0 {
            uow.loyalty()
                .insert_transaction(&LoyaltyTransaction {
                    id: Uuid::new_v4().to_string(),
                    tenant_id: ctx.tenant_id.clone(),
                    customer_id: customer.id.clone(),
                    kind: LoyaltyTxKind::Earned,
                    points,
                    balance_after: customer.loyalty_points,
                    order_id: Some(order.id.clone()),
                    description: Some(format!("Earned on order {}", order.id)),
                    created_at: Utc::now(),
                })
                .await?;
        }

        debug!(customer_id = %customer.id, points, "Loyalty credited");
        Ok(points)
    }

    /// Records a manual refund. Allowed in any status; never exceeds paid.
    pub async fn record_refund(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        amount: Money,
        reason: Option<String>,
    ) -> EngineResult<Order> {
        ctx.require(Capability::RecordRefund)?;
        validate_positive("amount", amount).map_err(CoreError::from)?;

        let mut uow = self.db.begin().await?;
        let mut order = self.load(&mut uow, ctx, order_id).await?;

        if order.refunded() + amount > order.paid() {
            warn!(order_id = %order.id, paid = order.paid_cents, refunded = order.refunded_cents, "Refund exceeds paid");
            return Err(CoreError::RefundExceedsPaid {
                paid: order.paid_cents,
                refunded: order.refunded_cents,
                requested: amount.cents(),
            }
            .into());
        }

        order.refunded_cents += amount.cents();
        uow.orders().update(&mut order).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id,
            amount = amount.cents(),
            refunded = order.refunded_cents,
            reason = reason.as_deref().unwrap_or(""),
            "Refund recorded"
        );
        self.publish_updated(ctx, &order);
        Ok(order)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Cancels an open order. Payments are kept.
    pub async fn cancel_order(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        reason: Option<String>,
    ) -> EngineResult<Order> {
        ctx.require(Capability::CancelOrder)?;
        debug!(order_id = %order_id, "cancel_order");

        let mut uow = self.db.begin().await?;
        let mut order = self.load(&mut uow, ctx, order_id).await?;
        order.transition_to(OrderStatus::Cancelled)?;
        ensure_session_open(&mut uow, &ctx.tenant_id, &order).await?;

        order.cancellation_reason = normalize_optional(reason.as_deref());
        order.cancelled_by = ctx.actor_id();
        order.cancelled_at = Some(Utc::now());
        uow.orders().update(&mut order).await?;

        let items = uow.orders().items(&order.id).await?;
        refresh_guests(&mut uow, items.iter().filter_map(|i| i.guest_id.as_deref())).await?;
        self.refresh_order_session(&mut uow, ctx, &order).await?;
        uow.commit().await?;

        info!(order_id = %order.id, reason = ?order.cancellation_reason, "Order cancelled");
        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::OrderCancelled {
                order_id: order.id.clone(),
                reason: order.cancellation_reason.clone(),
            }],
        );
        Ok(order)
    }

    /// Moves an order forward through the kitchen flow.
    ///
    /// ## Table Effects
    /// - Kitchen starts (`preparing`/`ready`/`served`) on an `occupied`
    ///   table → table `in_progress`
    /// - `served` → table occupancy flag cleared; the session stays open
    pub async fn update_order_status(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        next: OrderStatus,
    ) -> EngineResult<Order> {
        if next == OrderStatus::Cancelled {
            return self.cancel_order(ctx, order_id, None).await;
        }
        ctx.require(Capability::UpdateOrderStatus)?;
        debug!(order_id = %order_id, %next, "update_order_status");

        let mut uow = self.db.begin().await?;
        let mut order = self.load(&mut uow, ctx, order_id).await?;
        let previous = order.transition_to(next)?;
        uow.orders().update(&mut order).await?;

        let mut events = vec![DomainEvent::OrderStatusUpdated {
            order_id: order.id.clone(),
            from: previous,
            to: next,
        }];

        if let (Some(table_id), Some(session_id)) = (&order.table_id, &order.session_id) {
            let mut table = uow.tables().require_table(&ctx.tenant_id, table_id).await?;
            let mut session = uow.tables().require_session(&ctx.tenant_id, session_id).await?;

            if session.is_active() && table.current_session_id.as_deref() == Some(session_id) {
                if table.status == TableStatus::Occupied {
                    let from = move_table(
                        &mut uow,
                        &mut table,
                        Some(&mut session),
                        TableStatus::InProgress,
                    )
                    .await?;
                    events.push(DomainEvent::TableStatusChanged {
                        table_id: table.id.clone(),
                        from,
                        to: TableStatus::InProgress,
                    });
                }
                if next == OrderStatus::Served && table.is_occupied {
                    table.is_occupied = false;
                    uow.tables().update_table(&mut table).await?;
                }
            }
        }

        uow.commit().await?;

        info!(order_id = %order.id, from = %previous, to = %next, "Order status updated");
        self.publish(&ctx.tenant_id, events);
        Ok(order)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Order with all lines and payments.
    pub async fn get_order(&self, ctx: &RequestContext, order_id: &str) -> EngineResult<OrderDetails> {
        let mut uow = self.db.begin().await?;
        let order = self.load(&mut uow, ctx, order_id).await?;
        let items = uow.orders().items(&order.id).await?;
        let payments = uow.payments().list_for_order(&order.id).await?;
        uow.rollback().await?;

        Ok(OrderDetails {
            order,
            items,
            payments,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        order_id: &str,
    ) -> EngineResult<Order> {
        uow.orders()
            .get(&ctx.tenant_id, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))
    }

    async fn load_mutable(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        order_id: &str,
    ) -> EngineResult<Order> {
        let order = self.load(uow, ctx, order_id).await?;
        if let Err(err) = order.ensure_mutable() {
            warn!(order_id = %order.id, status = %order.status, "Order is frozen");
            return Err(err.into());
        }
        ensure_session_open(uow, &ctx.tenant_id, &order).await?;
        Ok(order)
    }

    async fn refresh_order_session(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        order: &Order,
    ) -> EngineResult<()> {
        if let Some(session_id) = &order.session_id {
            refresh_session(uow, &ctx.tenant_id, session_id).await?;
        }
        Ok(())
    }

    fn publish_updated(&self, ctx: &RequestContext, order: &Order) {
        self.publish(
            &ctx.tenant_id,
            vec![DomainEvent::OrderUpdated {
                order_id: order.id.clone(),
                total: order.total(),
            }],
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::test_support::{
        cashier, engine, engine_with, guest, kitchen, manager, other_tenant, waiter, CUSTOMER,
    };
    use tavola_core::{ErrorKind, OrderStatus};

    fn takeout() -> NewOrder {
        NewOrder {
            customer_name: Some("Ada".to_string()),
            customer_phone: Some("+15550100".to_string()),
            ..Default::default()
        }
    }

    fn pasta_and_salad() -> Vec<ItemRequest> {
        vec![ItemRequest::new("pasta", 1), ItemRequest::new("salad", 1)]
    }

    #[tokio::test]
    async fn test_percent_discount_totals() {
        let engine = engine().await;
        let details = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap();
        assert_eq!(details.order.order_type, OrderType::Takeout);
        assert_eq!(details.order.status, OrderStatus::Pending);
        assert_eq!(details.order.subtotal_cents, 1500);

        let order = engine
            .orders()
            .apply_discount(&cashier(), &details.order.id, DiscountKind::Percent, 1000)
            .await
            .unwrap();
        assert_eq!(order.subtotal_cents, 1500);
        assert_eq!(order.discount_cents, 150);
        assert_eq!(order.total_cents, 1350);
    }

    #[tokio::test]
    async fn test_coupon_then_exact_payment() {
        let engine = engine().await;
        let mut rx = engine.subscribe();
        let id = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;
        engine
            .orders()
            .apply_discount(&cashier(), &id, DiscountKind::Percent, 1000)
            .await
            .unwrap();

        let order = engine.orders().apply_coupon(&cashier(), &id, "save200").await.unwrap();
        assert_eq!(order.coupon_discount_cents, 200);
        assert_eq!(order.total_cents, 1150);

        let receipt = engine
            .orders()
            .record_payment(&cashier(), &id, Money::from_cents(1150), PaymentMethod::Cash, None)
            .await
            .unwrap();
        assert_eq!(receipt.order.payment_status, PaymentStatus::Paid);
        assert_eq!(receipt.order.paid_cents, 1150);
        // Payment never advances the kitchen status.
        assert_eq!(receipt.order.status, OrderStatus::Pending);

        let names: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event.name())
            .collect();
        assert_eq!(
            names,
            [
                "new_order",
                "order_updated",
                "order_updated",
                "order_payment_recorded",
                "order_payment_completed"
            ]
        );
    }

    #[tokio::test]
    async fn test_served_order_is_frozen() {
        let engine = engine().await;
        let details = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap();
        let id = details.order.id.clone();
        engine
            .orders()
            .update_order_status(&kitchen(), &id, OrderStatus::Served)
            .await
            .unwrap();

        let err = engine
            .orders()
            .add_item(&waiter(), &id, ItemRequest::new("salad", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert!(matches!(err, EngineError::Core(CoreError::OrderAlreadyServed { .. })));

        for err in [
            engine
                .orders()
                .apply_discount(&cashier(), &id, DiscountKind::Fixed, 100)
                .await
                .unwrap_err(),
            engine.orders().apply_coupon(&cashier(), &id, "SAVE200").await.unwrap_err(),
            engine.orders().cancel_order(&cashier(), &id, None).await.unwrap_err(),
            engine
                .orders()
                .record_payment(&cashier(), &id, Money::from_cents(100), PaymentMethod::Cash, None)
                .await
                .unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::StateConflict);
        }

        let after = engine.orders().get_order(&manager(), &id).await.unwrap();
        assert_eq!(after.order.total_cents, details.order.total_cents);
        assert_eq!(after.order.subtotal_cents, 1500);
        assert_eq!(after.active_items().count(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_returns_change() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;

        let receipt = engine
            .orders()
            .record_payment(&cashier(), &id, Money::from_cents(400), PaymentMethod::Card, None)
            .await
            .unwrap();
        assert_eq!(receipt.order.payment_status, PaymentStatus::Partial);

        let receipt = engine
            .orders()
            .record_payment(&cashier(), &id, Money::from_cents(2000), PaymentMethod::Cash, None)
            .await
            .unwrap();
        assert_eq!(receipt.payment.amount_cents, 1100);
        assert_eq!(receipt.payment.tendered_cents, 2000);
        assert_eq!(receipt.payment.change_cents, 900);
        assert_eq!(receipt.order.paid_cents, 1500);

        let err = engine
            .orders()
            .record_payment(&cashier(), &id, Money::from_cents(1), PaymentMethod::Cash, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::OrderAlreadyPaid { .. })));

        let details = engine.orders().get_order(&manager(), &id).await.unwrap();
        assert_eq!(details.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_modifier_cannot_drop_total_below_paid() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;
        engine
            .orders()
            .record_payment(&cashier(), &id, Money::from_cents(1400), PaymentMethod::Cash, None)
            .await
            .unwrap();

        let err = engine
            .orders()
            .apply_discount(&cashier(), &id, DiscountKind::Fixed, 200)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::TotalBelowPaid { total: 1300, paid: 1400 })));

        let order = engine.orders().get_order(&manager(), &id).await.unwrap().order;
        assert_eq!(order.discount_value, 0);
        assert_eq!(order.total_cents, 1500);
    }

    #[tokio::test]
    async fn test_item_changes_reprice() {
        let engine = engine().await;
        let details = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap();
        let id = details.order.id.clone();
        let salad = details.items.iter().find(|i| i.menu_item_id == "salad").unwrap().id.clone();

        let order = engine
            .orders()
            .update_item_quantity(&waiter(), &id, &salad, 3)
            .await
            .unwrap();
        assert_eq!(order.subtotal_cents, 2500);

        let order = engine.orders().remove_item(&waiter(), &id, &salad).await.unwrap();
        assert_eq!(order.subtotal_cents, 1000);

        let err = engine
            .orders()
            .update_item_quantity(&waiter(), &id, &salad, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::ItemRemoved { .. })));

        let details = engine
            .orders()
            .add_item(&waiter(), &id, ItemRequest::new("burger", 1).with_option("cheese", 1))
            .await
            .unwrap();
        assert_eq!(details.order.subtotal_cents, 1000 + 1300);
        assert_eq!(details.items.len(), 3);
        assert_eq!(details.active_items().count(), 2);
    }

    #[tokio::test]
    async fn test_create_order_validation() {
        let engine = engine().await;

        let err = engine
            .orders()
            .create_order(&waiter(), NewOrder::default(), pasta_and_salad())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let delivery = NewOrder {
            delivery_address: Some("1 Main St".to_string()),
            customer_name: Some("Ada".to_string()),
            customer_phone: Some("+15550100".to_string()),
            ..Default::default()
        };
        let details = engine
            .orders()
            .create_order(&waiter(), delivery, pasta_and_salad())
            .await
            .unwrap();
        assert_eq!(details.order.order_type, OrderType::Delivery);

        let err = engine
            .orders()
            .create_order(&waiter(), takeout(), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = engine
            .orders()
            .create_order(&other_tenant(), takeout(), pasta_and_salad())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_order_item_limit_from_config() {
        let mut config = EngineConfig::in_memory();
        config.orders.max_items = 2;
        let engine = engine_with(config).await;

        let err = engine
            .orders()
            .create_order(
                &waiter(),
                takeout(),
                vec![
                    ItemRequest::new("pasta", 1),
                    ItemRequest::new("salad", 1),
                    ItemRequest::new("soup", 1),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::TooManyItems { max: 2 })));

        let id = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;
        let err = engine
            .orders()
            .add_item(&waiter(), &id, ItemRequest::new("soup", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    #[tokio::test]
    async fn test_capabilities_are_enforced() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(&guest(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;

        let err = engine
            .orders()
            .apply_discount(&guest(), &id, DiscountKind::Fixed, 100)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = engine
            .orders()
            .record_refund(&cashier(), &id, Money::from_cents(100), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        // Kitchen may move status but a cancel still needs CancelOrder.
        let err = engine
            .orders()
            .update_order_status(&kitchen(), &id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let mut config = EngineConfig::in_memory();
        config.orders.guest_ordering = false;
        let closed = engine_with(config).await;
        let err = closed
            .orders()
            .create_order(&guest(), takeout(), pasta_and_salad())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_coupon_usage_cap_holds() {
        let engine = engine().await;
        let first = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;
        let second = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;

        let order = engine.orders().apply_coupon(&waiter(), &first, "ONCE").await.unwrap();
        assert_eq!(order.coupon_discount_cents, 150);

        let err = engine
            .orders()
            .apply_coupon(&waiter(), &first, "SAVE200")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::CouponAlreadyApplied { .. })));

        let err = engine
            .orders()
            .apply_coupon(&waiter(), &second, "ONCE")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert!(matches!(
            err,
            EngineError::Core(CoreError::Coupon(CouponRejection::UsageLimitReached { current: 1, max: 1, .. }))
        ));

        let mut uow = engine.database().begin().await.unwrap();
        let coupon = uow.coupons().find_by_code(crate::test_support::TENANT, "ONCE").await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 1);
        assert_eq!(uow.coupons().usages(&coupon.id).await.unwrap().len(), 1);
        uow.rollback().await.unwrap();

        let err = engine
            .orders()
            .apply_coupon(&waiter(), &second, "NOPE")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_coupon_per_customer_cap_holds() {
        let engine = engine().await;
        let mut ids = Vec::new();
        for _ in 0..2 {
            let details = engine
                .orders()
                .create_order(
                    &waiter(),
                    NewOrder {
                        customer_id: Some(CUSTOMER.to_string()),
                        ..takeout()
                    },
                    pasta_and_salad(),
                )
                .await
                .unwrap();
            ids.push(details.order.id);
        }

        let order = engine.orders().apply_coupon(&waiter(), &ids[0], "REGULAR").await.unwrap();
        assert_eq!(order.coupon_discount_cents, 100);

        let err = engine
            .orders()
            .apply_coupon(&waiter(), &ids[1], "REGULAR")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert!(matches!(
            err,
            EngineError::Core(CoreError::Coupon(CouponRejection::CustomerLimitReached { current: 1, max: 1, .. }))
        ));

        let mut uow = engine.database().begin().await.unwrap();
        let coupon = uow
            .coupons()
            .find_by_code(crate::test_support::TENANT, "REGULAR")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(coupon.current_uses, 1);
        assert_eq!(uow.coupons().customer_usage_count(&coupon.id, CUSTOMER).await.unwrap(), 1);
        uow.rollback().await.unwrap();

        let second = engine.orders().get_order(&manager(), &ids[1]).await.unwrap();
        assert_eq!(second.order.coupon_id, None);
        assert_eq!(second.order.total_cents, 1500);

        // A walk-in without a linked customer is only bound by the global cap.
        let walk_in = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;
        let order = engine.orders().apply_coupon(&waiter(), &walk_in, "REGULAR").await.unwrap();
        assert_eq!(order.total_cents, 1400);
    }

    #[tokio::test]
    async fn test_coupon_preview() {
        let engine = engine().await;
        let ok = engine
            .orders()
            .validate_coupon(&waiter(), "save200", Money::from_cents(1500), OrderType::Takeout, None)
            .await
            .unwrap();
        assert!(ok.valid);
        assert_eq!(ok.discount.cents(), 200);

        let missing = engine
            .orders()
            .validate_coupon(&waiter(), "missing", Money::from_cents(1500), OrderType::Takeout, None)
            .await
            .unwrap();
        assert!(!missing.valid);
        assert!(missing.message.is_some());
    }

    #[tokio::test]
    async fn test_loyalty_redemption_and_earning() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;

        let err = engine
            .orders()
            .redeem_loyalty_points(&waiter(), &id, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NoLinkedCustomer { .. })));

        engine.orders().link_customer(&waiter(), &id, CUSTOMER).await.unwrap();

        let err = engine
            .orders()
            .redeem_loyalty_points(&waiter(), &id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::BelowMinimumRedemption { .. })));

        let err = engine
            .orders()
            .redeem_loyalty_points(&waiter(), &id, 501)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);

        let order = engine
            .orders()
            .redeem_loyalty_points(&waiter(), &id, 100)
            .await
            .unwrap();
        assert_eq!(order.loyalty_points_redeemed, 100);
        assert_eq!(order.loyalty_discount_cents, 1000);
        assert_eq!(order.total_cents, 500);

        let err = engine
            .orders()
            .redeem_loyalty_points(&waiter(), &id, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::LoyaltyAlreadyRedeemed { .. })));

        let receipt = engine
            .orders()
            .record_payment(&cashier(), &id, Money::from_cents(500), PaymentMethod::Card, None)
            .await
            .unwrap();
        assert_eq!(receipt.points_earned, 5);

        let mut uow = engine.database().begin().await.unwrap();
        let customer = uow
            .loyalty()
            .require_customer(crate::test_support::TENANT, CUSTOMER)
            .await
            .unwrap();
        assert_eq!(customer.loyalty_points, 500 - 100 + 5);
        assert_eq!(customer.total_spent_cents, 500);
        assert_eq!(customer.visit_count, 1);

        let ledger = uow.loyalty().transactions(CUSTOMER).await.unwrap();
        let points: Vec<i64> = ledger.iter().map(|t| t.points).collect();
        assert!(points.contains(&-100));
        assert!(points.contains(&5));
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_redemption_never_exceeds_remaining_value() {
        let engine = engine().await;
        let details = engine
            .orders()
            .create_order(
                &waiter(),
                NewOrder {
                    customer_id: Some(CUSTOMER.to_string()),
                    ..takeout()
                },
                vec![ItemRequest::new("salad", 1)],
            )
            .await
            .unwrap();

        let order = engine
            .orders()
            .redeem_loyalty_points(&waiter(), &details.order.id, 500)
            .await
            .unwrap();
        assert_eq!(order.loyalty_discount_cents, 500);
        assert_eq!(order.loyalty_points_redeemed, 50);
        assert_eq!(order.total_cents, 0);

        let err = engine
            .orders()
            .record_payment(&cashier(), &order.id, Money::from_cents(100), PaymentMethod::Cash, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NothingToPay { .. })));
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let details = engine.orders().get_order(&manager(), &order.id).await.unwrap();
        assert!(details.payments.is_empty());
    }

    #[tokio::test]
    async fn test_redeemed_points_are_fully_backed() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(
                &waiter(),
                NewOrder {
                    customer_id: Some(CUSTOMER.to_string()),
                    ..takeout()
                },
                vec![ItemRequest::new("salad", 1)],
            )
            .await
            .unwrap()
            .order
            .id;
        engine
            .orders()
            .apply_discount(&cashier(), &id, DiscountKind::Fixed, 66)
            .await
            .unwrap();

        // 434 left: 43 whole points, the last 4 cents stay on the bill.
        let order = engine
            .orders()
            .redeem_loyalty_points(&waiter(), &id, 500)
            .await
            .unwrap();
        assert_eq!(order.loyalty_points_redeemed, 43);
        assert_eq!(order.loyalty_discount_cents, 430);
        assert_eq!(order.total_cents, 4);

        let mut uow = engine.database().begin().await.unwrap();
        let customer = uow
            .loyalty()
            .require_customer(crate::test_support::TENANT, CUSTOMER)
            .await
            .unwrap();
        assert_eq!(customer.loyalty_points, 500 - 43);
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_refund_is_capped_by_paid() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;
        engine
            .orders()
            .record_payment(&cashier(), &id, Money::from_cents(1500), PaymentMethod::Cash, None)
            .await
            .unwrap();
        engine
            .orders()
            .update_order_status(&kitchen(), &id, OrderStatus::Served)
            .await
            .unwrap();

        let order = engine
            .orders()
            .record_refund(&manager(), &id, Money::from_cents(500), Some("cold soup".to_string()))
            .await
            .unwrap();
        assert_eq!(order.refunded_cents, 500);
        assert_eq!(order.paid_cents, 1500);

        let err = engine
            .orders()
            .record_refund(&manager(), &id, Money::from_cents(1001), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::RefundExceedsPaid { paid: 1500, refunded: 500, requested: 1001 })
        ));
    }

    #[tokio::test]
    async fn test_cancel_keeps_payments_and_frees_session_total() {
        let engine = engine().await;
        let details = engine
            .orders()
            .create_order(
                &waiter(),
                NewOrder {
                    table_id: Some("table-1".to_string()),
                    ..Default::default()
                },
                pasta_and_salad(),
            )
            .await
            .unwrap();
        assert_eq!(details.order.order_type, OrderType::Table);
        let session_id = details.order.session_id.clone().unwrap();
        engine
            .orders()
            .record_payment(&cashier(), &details.order.id, Money::from_cents(300), PaymentMethod::Cash, None)
            .await
            .unwrap();

        let order = engine
            .orders()
            .cancel_order(&cashier(), &details.order.id, Some("walked out".to_string()))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.paid_cents, 300);
        assert_eq!(order.cancelled_by.as_deref(), Some("cashier-1"));

        let overview = engine
            .tables()
            .session_overview(&manager(), &session_id)
            .await
            .unwrap();
        assert_eq!(overview.session.total_cents, 0);
        assert_eq!(overview.session.paid_cents, 300);

        let err = engine
            .orders()
            .cancel_order(&cashier(), &details.order.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::OrderCancelled { .. })));
    }

    #[tokio::test]
    async fn test_status_moves_forward_and_drives_table() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(
                &waiter(),
                NewOrder {
                    table_id: Some("table-2".to_string()),
                    ..Default::default()
                },
                pasta_and_salad(),
            )
            .await
            .unwrap()
            .order
            .id;

        engine
            .orders()
            .update_order_status(&kitchen(), &id, OrderStatus::Preparing)
            .await
            .unwrap();
        let table = engine.tables().get_table(&manager(), "table-2").await.unwrap();
        assert_eq!(table.status, TableStatus::InProgress);
        assert!(table.is_occupied);

        let err = engine
            .orders()
            .update_order_status(&kitchen(), &id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidStatusTransition { .. })));

        // Skipping forward is allowed.
        let order = engine
            .orders()
            .update_order_status(&kitchen(), &id, OrderStatus::Served)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Served);

        let table = engine.tables().get_table(&manager(), "table-2").await.unwrap();
        assert!(!table.is_occupied);
        assert!(table.current_session_id.is_some());
    }

    #[tokio::test]
    async fn test_orders_are_tenant_scoped() {
        let engine = engine().await;
        let id = engine
            .orders()
            .create_order(&waiter(), takeout(), pasta_and_salad())
            .await
            .unwrap()
            .order
            .id;

        let err = engine.orders().get_order(&other_tenant(), &id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = engine
            .orders()
            .cancel_order(&other_tenant(), &id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
