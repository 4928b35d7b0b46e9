//! # Catalog Repository
//!
//! Read access to menu items and their option groups; the authoritative
//! source of prices. Inserts exist for seeding and tests.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use tavola_core::{MenuItem, MenuOption, OptionGroup};

/// Repository for menu data.
pub struct CatalogRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CatalogRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CatalogRepository { conn }
    }

    /// Gets a menu item by ID regardless of tenant.
    ///
    /// Callers compare `tenant_id` themselves so that a foreign item reads
    /// the same as a missing one.
    pub async fn menu_item(&mut self, id: &str) -> DbResult<Option<MenuItem>> {
        let item = sqlx::query_as::<_, MenuItem>("SELECT * FROM menu_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(item)
    }

    /// Option groups of a menu item, each with its options.
    pub async fn option_groups(&mut self, menu_item_id: &str) -> DbResult<Vec<OptionGroup>> {
        let mut groups = sqlx::query_as::<_, OptionGroup>(
            "SELECT * FROM option_groups WHERE menu_item_id = ?1 ORDER BY name ASC",
        )
        .bind(menu_item_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let options = sqlx::query_as::<_, MenuOption>(
            r#"
            SELECT o.* FROM menu_options o
            JOIN option_groups g ON g.id = o.group_id
            WHERE g.menu_item_id = ?1
            ORDER BY o.name ASC
            "#,
        )
        .bind(menu_item_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let mut by_group: HashMap<String, Vec<MenuOption>> = HashMap::new();
        for option in options {
            by_group.entry(option.group_id.clone()).or_default().push(option);
        }
        for group in &mut groups {
            group.options = by_group.remove(&group.id).unwrap_or_default();
        }

        Ok(groups)
    }

    pub async fn insert_menu_item(&mut self, item: &MenuItem) -> DbResult<()> {
        debug!(id = %item.id, name = %item.name, "Inserting menu item");

        sqlx::query(
            r#"
            INSERT INTO menu_items (id, tenant_id, name, price_cents, is_available)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&item.id)
        .bind(&item.tenant_id)
        .bind(&item.name)
        .bind(item.price_cents)
        .bind(item.is_available)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Inserts an option group and its options.
    pub async fn insert_option_group(&mut self, group: &OptionGroup) -> DbResult<()> {
        sqlx::query("INSERT INTO option_groups (id, menu_item_id, name) VALUES (?1, ?2, ?3)")
            .bind(&group.id)
            .bind(&group.menu_item_id)
            .bind(&group.name)
            .execute(&mut *self.conn)
            .await?;

        for option in &group.options {
            sqlx::query(
                r#"
                INSERT INTO menu_options (id, group_id, name, price_adjustment_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&option.id)
            .bind(&option.group_id)
            .bind(&option.name)
            .bind(option.price_adjustment_cents)
            .execute(&mut *self.conn)
            .await?;
        }

        Ok(())
    }

    pub async fn set_availability(&mut self, id: &str, is_available: bool) -> DbResult<()> {
        sqlx::query("UPDATE menu_items SET is_available = ?1 WHERE id = ?2")
            .bind(is_available)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }
}
