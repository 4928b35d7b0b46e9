//! # Catalog
//!
//! The menu is owned elsewhere; the engine only reads it to price items.

use async_trait::async_trait;

use crate::error::EngineResult;
use tavola_core::{MenuItem, OptionGroup};
use tavola_db::{CatalogRepository, Database};

/// Read access to menu items and their option groups.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Menu item by ID, any tenant. `None` when it does not exist.
    async fn menu_item(&self, id: &str) -> EngineResult<Option<MenuItem>>;

    /// Option groups of a menu item, options attached.
    async fn option_groups(&self, menu_item_id: &str) -> EngineResult<Vec<OptionGroup>>;
}

/// Catalog backed by the `menu_items`/`option_groups` tables.
///
/// Lookups take their own pooled connection, so they must not run while the
/// caller holds an open transaction on a single-connection pool.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db: Database,
}

impl SqliteCatalog {
    pub fn new(db: Database) -> Self {
        SqliteCatalog { db }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn menu_item(&self, id: &str) -> EngineResult<Option<MenuItem>> {
        let mut conn = self.db.acquire().await?;
        Ok(CatalogRepository::new(&mut *conn).menu_item(id).await?)
    }

    async fn option_groups(&self, menu_item_id: &str) -> EngineResult<Vec<OptionGroup>> {
        let mut conn = self.db.acquire().await?;
        Ok(CatalogRepository::new(&mut *conn)
            .option_groups(menu_item_id)
            .await?)
    }
}
