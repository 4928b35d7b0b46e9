//! # Price Verifier
//!
//! Prices every requested line from the catalog.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ItemRequest { menu_item_id, quantity, options: [ {option_id, qty} ] }  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  catalog.menu_item(id)                                                  │
//! │       ├── None / other tenant ──► NotFound("MenuItem")                  │
//! │       ├── is_available = false ─► MenuItemUnavailable                   │
//! │       ▼                                                                 │
//! │  catalog.option_groups(id)                                              │
//! │       ├── option not in groups ─► OptionNotFound                        │
//! │       ▼                                                                 │
//! │  unit price = base + Σ(adjustment × option qty)                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests carry no price field at all, so a client price can never leak
//! into an order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::error::{EngineError, EngineResult};
use tavola_core::pricing::unit_price_with_options;
use tavola_core::validation::validate_quantity;
use tavola_core::{
    CoreError, ItemRequest, MenuOption, Money, OrderItem, SelectedOption, ValidationError,
};

/// A line priced from the catalog, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedItem {
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub guest_id: Option<String>,
    pub notes: Option<String>,
    pub options: Vec<VerifiedOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedOption {
    pub option_id: String,
    pub name: String,
    pub price_adjustment: Money,
    pub quantity: i64,
}

impl VerifiedItem {
    /// Snapshot row for `order_id`.
    pub fn into_order_item(self, order_id: &str, now: DateTime<Utc>) -> OrderItem {
        let id = Uuid::new_v4().to_string();
        let options = self
            .options
            .into_iter()
            .map(|option| SelectedOption {
                id: Uuid::new_v4().to_string(),
                order_item_id: id.clone(),
                option_id: option.option_id,
                name_snapshot: option.name,
                price_adjustment_cents: option.price_adjustment.cents(),
                quantity: option.quantity,
            })
            .collect();

        OrderItem {
            id,
            order_id: order_id.to_string(),
            menu_item_id: self.menu_item_id,
            name_snapshot: self.name,
            quantity: self.quantity,
            unit_price_cents: self.unit_price.cents(),
            guest_id: self.guest_id,
            notes: self.notes,
            removed_at: None,
            created_at: now,
            options,
        }
    }
}

/// Catalog-backed line pricing.
#[derive(Clone)]
pub struct PriceVerifier {
    catalog: Arc<dyn Catalog>,
}

impl PriceVerifier {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        PriceVerifier { catalog }
    }

    /// Verifies and prices every requested line for `tenant_id`.
    ///
    /// Fails on the first bad line; nothing is partially accepted.
    pub async fn verify(
        &self,
        tenant_id: &str,
        items: &[ItemRequest],
    ) -> EngineResult<Vec<VerifiedItem>> {
        let mut verified = Vec::with_capacity(items.len());
        for request in items {
            verified.push(self.verify_one(tenant_id, request).await?);
        }
        Ok(verified)
    }

    async fn verify_one(&self, tenant_id: &str, request: &ItemRequest) -> EngineResult<VerifiedItem> {
        validate_quantity(request.quantity).map_err(CoreError::from)?;

        let menu_item = match self.catalog.menu_item(&request.menu_item_id).await? {
            Some(item) if item.tenant_id == tenant_id => item,
            _ => {
                warn!(tenant_id = %tenant_id, menu_item_id = %request.menu_item_id, "Menu item not found");
                return Err(EngineError::not_found("MenuItem", &request.menu_item_id));
            }
        };

        if !menu_item.is_available {
            return Err(CoreError::MenuItemUnavailable {
                menu_item_id: menu_item.id,
            }
            .into());
        }

        let catalog_options: HashMap<String, MenuOption> = if request.options.is_empty() {
            HashMap::new()
        } else {
            self.catalog
                .option_groups(&menu_item.id)
                .await?
                .into_iter()
                .flat_map(|group| group.options)
                .map(|option| (option.id.clone(), option))
                .collect()
        };

        let mut options = Vec::with_capacity(request.options.len());
        for choice in &request.options {
            if choice.quantity < 1 {
                return Err(CoreError::from(ValidationError::MustBePositive {
                    field: "option_quantity".to_string(),
                })
                .into());
            }
            let option = catalog_options.get(&choice.option_id).ok_or_else(|| {
                CoreError::OptionNotFound {
                    menu_item_id: menu_item.id.clone(),
                    option_id: choice.option_id.clone(),
                }
            })?;
            options.push(VerifiedOption {
                option_id: option.id.clone(),
                name: option.name.clone(),
                price_adjustment: option.price_adjustment(),
                quantity: choice.quantity,
            });
        }

        let unit_price = unit_price_with_options(
            menu_item.price(),
            options.iter().map(|o| (o.price_adjustment, o.quantity)),
        );

        debug!(
            menu_item_id = %menu_item.id,
            unit_price = unit_price.cents(),
            options = options.len(),
            "Item verified"
        );

        Ok(VerifiedItem {
            menu_item_id: menu_item.id,
            name: menu_item.name,
            quantity: request.quantity,
            unit_price,
            guest_id: request.guest_id.clone(),
            notes: request.notes.clone(),
            options,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
