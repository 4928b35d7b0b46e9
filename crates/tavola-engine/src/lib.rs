//! # tavola-engine: Order & Table Session Services
//!
//! Runs the restaurant rules from `tavola-core` over `tavola-db`
//! transactions.
//!
//! ## Module Organization
//! ```text
//! tavola_engine/
//! ├── lib.rs          ◄─── You are here (Engine wiring)
//! ├── config.rs       ◄─── EngineConfig: file, env, defaults
//! ├── telemetry.rs    ◄─── tracing subscriber setup
//! ├── context.rs      ◄─── RequestContext: tenant + actor
//! ├── error.rs        ◄─── EngineError, ErrorReport
//! ├── events.rs       ◄─── EventSink, BroadcastSink
//! ├── catalog.rs      ◄─── Catalog seam (menu reads)
//! ├── verifier.rs     ◄─── PriceVerifier: catalog-backed line pricing
//! ├── orders.rs       ◄─── OrderManager
//! ├── tables.rs       ◄─── TableManager
//! └── sessions.rs     ◄─── Session/guest mirrors shared by both managers
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. EngineConfig::load() ──► validate()                                 │
//! │                                                                         │
//! │  2. Database::new(config.db_config()) ──► migrations                    │
//! │                                                                         │
//! │  3. Event sink                                                          │
//! │     • events.enabled  → BroadcastSink (subscribe() for displays)        │
//! │     • otherwise       → NullSink                                        │
//! │                                                                         │
//! │  4. SqliteCatalog ──► PriceVerifier ──► OrderManager                    │
//! │                                         TableManager                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tavola_engine::{Engine, EngineConfig, RequestContext};
//! use tavola_core::{Actor, ItemRequest, Role};
//!
//! let engine = Engine::start(EngineConfig::load(None)?).await?;
//! let ctx = RequestContext::new("tenant-1", Actor::staff("u1", Role::Waiter));
//! let order = engine
//!     .orders()
//!     .create_order(&ctx, new_order, vec![ItemRequest::new("pasta", 1)])
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod orders;
pub mod tables;
pub mod telemetry;
pub mod verifier;

pub(crate) mod sessions;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{Catalog, SqliteCatalog};
pub use config::EngineConfig;
pub use context::RequestContext;
pub use error::{EngineError, EngineResult, ErrorReport};
pub use events::{BroadcastSink, EventSink, NullSink, TenantEvent};
pub use orders::{NewOrder, OrderDetails, OrderManager, PaymentReceipt};
pub use tables::{GuestPass, SessionOverview, TableManager};
pub use telemetry::init_tracing;
pub use verifier::{PriceVerifier, VerifiedItem, VerifiedOption};

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use tavola_db::Database;

// =============================================================================
// Engine
// =============================================================================

/// Wired-up services sharing one database and one event sink.
#[derive(Clone)]
pub struct Engine {
    db: Database,
    config: EngineConfig,
    broadcast: BroadcastSink,
    verifier: PriceVerifier,
    orders: OrderManager,
    tables: TableManager,
}

impl Engine {
    /// Opens the database and builds the managers from `config`.
    pub async fn start(config: EngineConfig) -> EngineResult<Engine> {
        config.validate()?;

        let db = Database::new(config.db_config()?).await?;
        let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(db.clone()));

        let engine = Self::with_parts(config, db, catalog);
        info!(
            events = engine.config.events.enabled,
            max_items = engine.config.orders.max_items,
            "Engine started"
        );
        Ok(engine)
    }

    /// Builds the managers over an existing database and catalog.
    pub fn with_parts(config: EngineConfig, db: Database, catalog: Arc<dyn Catalog>) -> Engine {
        let broadcast = BroadcastSink::new(config.events.capacity);
        let events: Arc<dyn EventSink> = if config.events.enabled {
            Arc::new(broadcast.clone())
        } else {
            Arc::new(NullSink)
        };

        let verifier = PriceVerifier::new(catalog);
        let orders = OrderManager::new(
            db.clone(),
            verifier.clone(),
            Arc::clone(&events),
            config.orders.clone(),
        );
        let tables = TableManager::new(db.clone(), events);

        Engine {
            db,
            config,
            broadcast,
            verifier,
            orders,
            tables,
        }
    }

    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }

    pub fn tables(&self) -> &TableManager {
        &self.tables
    }

    pub fn verifier(&self) -> &PriceVerifier {
        &self.verifier
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receiver for committed domain events. Sees nothing when events are
    /// disabled.
    pub fn subscribe(&self) -> broadcast::Receiver<TenantEvent> {
        self.broadcast.subscribe()
    }

    /// Closes the connection pool.
    pub async fn shutdown(&self) {
        self.db.close().await;
        info!("Engine stopped");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
