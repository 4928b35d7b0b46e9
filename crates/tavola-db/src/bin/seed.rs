//! # Seed Data Generator
//!
//! Populates a database with a demo restaurant for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tavola_dev.db with 12 tables for tenant "demo"
//! cargo run -p tavola-db --bin seed
//!
//! # Custom table count, tenant and database path
//! cargo run -p tavola-db --bin seed -- --tables 20 --tenant bistro --db ./data/tavola.db
//! ```
//!
//! ## Generated Data
//! - Dining tables numbered 1..N across "Main" and "Terrace"
//! - A menu with option groups (sizes, extras)
//! - Coupon `WELCOME10` (10% off, capped at 5.00, 200 uses)
//! - An active loyalty program (1 point per 1.00, 1 point = 0.01)
//! - One loyalty customer with 500 points

use chrono::Utc;
use std::env;
use tavola_core::{
    Coupon, Customer, DiscountKind, LoyaltyProgram, LoyaltyTier, MenuItem, MenuOption,
    OptionGroup, OrderType, Table, TableStatus,
};
use tavola_db::{Database, DbConfig};
use uuid::Uuid;

/// Menu: (name, price in cents, option groups as (group, [(option, adjustment)]))
#[allow(clippy::type_complexity)]
const MENU: &[(&str, i64, &[(&str, &[(&str, i64)])])] = &[
    (
        "Margherita Pizza",
        1100,
        &[
            ("Size", &[("Medium", 0), ("Large", 300)]),
            ("Extras", &[("Burrata", 250), ("Basil Oil", 50)]),
        ],
    ),
    ("Spaghetti Carbonara", 1350, &[("Extras", &[("Extra Guanciale", 200)])]),
    ("Caesar Salad", 900, &[("Protein", &[("Chicken", 300), ("Shrimp", 450)])]),
    ("Tiramisu", 650, &[]),
    ("Sparkling Water", 300, &[("Size", &[("Small", 0), ("Large", 150)])]),
    ("Espresso", 250, &[("Shot", &[("Double", 100)])]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut tables: i64 = 12;
    let mut tenant = String::from("demo");
    let mut db_path = String::from("./tavola_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tables" | "-t" => {
                if i + 1 < args.len() {
                    tables = args[i + 1].parse().unwrap_or(12);
                    i += 1;
                }
            }
            "--tenant" => {
                if i + 1 < args.len() {
                    tenant = args[i + 1].clone();
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tavola Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --tables <N>     Number of dining tables (default: 12)");
                println!("      --tenant <ID>    Tenant id to seed (default: demo)");
                println!("  -d, --db <PATH>      Database file path (default: ./tavola_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tavola Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant);
    println!("Tables:   {}", tables);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut uow = db.begin().await?;

    let existing = uow.tables().list_tables(&tenant).await?;
    if !existing.is_empty() {
        println!("⚠ Tenant '{}' already has {} tables", tenant, existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();

    // Tables
    for number in 1..=tables {
        let table = Table {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.clone(),
            number,
            capacity: if number % 3 == 0 { 6 } else { 4 },
            area: Some(if number <= tables / 2 { "Main" } else { "Terrace" }.to_string()),
            status: TableStatus::Free,
            is_occupied: false,
            current_session_id: None,
            current_total_cents: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        uow.tables().insert_table(&table).await?;
    }
    println!("✓ Created {} tables", tables);

    // Menu
    let mut option_count = 0;
    for (name, price_cents, groups) in MENU {
        let item_id = Uuid::new_v4().to_string();
        uow.catalog()
            .insert_menu_item(&MenuItem {
                id: item_id.clone(),
                tenant_id: tenant.clone(),
                name: name.to_string(),
                price_cents: *price_cents,
                is_available: true,
            })
            .await?;

        for (group_name, options) in groups.iter() {
            let group_id = Uuid::new_v4().to_string();
            let options = options
                .iter()
                .map(|(option_name, adjustment)| MenuOption {
                    id: Uuid::new_v4().to_string(),
                    group_id: group_id.clone(),
                    name: option_name.to_string(),
                    price_adjustment_cents: *adjustment,
                })
                .collect::<Vec<_>>();
            option_count += options.len();

            uow.catalog()
                .insert_option_group(&OptionGroup {
                    id: group_id,
                    menu_item_id: item_id.clone(),
                    name: group_name.to_string(),
                    options,
                })
                .await?;
        }
    }
    println!("✓ Created {} menu items ({} options)", MENU.len(), option_count);

    // Coupon
    uow.coupons()
        .insert(&Coupon {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.clone(),
            code: "WELCOME10".to_string(),
            description: Some("10% off your first visit".to_string()),
            discount_kind: DiscountKind::Percent,
            discount_value: 1000,
            max_discount_cents: Some(500),
            min_order_cents: 1000,
            valid_from: None,
            valid_until: None,
            max_uses: Some(200),
            max_uses_per_customer: Some(1),
            current_uses: 0,
            applicable_order_types: Coupon::encode_order_types(&[
                OrderType::Table,
                OrderType::Takeout,
            ]),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;
    println!("✓ Created coupon WELCOME10");

    // Loyalty
    uow.loyalty()
        .save_program(&LoyaltyProgram {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.clone(),
            is_active: true,
            earn_rate_bps: 10_000,
            cents_per_point: 1,
            min_redeem_points: 100,
            max_redeem_points_per_order: Some(2_000),
            created_at: now,
            updated_at: now,
        })
        .await?;

    let customer_id = Uuid::new_v4().to_string();
    uow.loyalty()
        .insert_customer(&Customer {
            id: customer_id.clone(),
            tenant_id: tenant.clone(),
            name: "Giulia Rossi".to_string(),
            phone: Some("+393331234567".to_string()),
            email: None,
            loyalty_points: 500,
            tier: LoyaltyTier::Bronze,
            total_spent_cents: 0,
            visit_count: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        })
        .await?;
    println!("✓ Created loyalty program and customer {}", customer_id);

    uow.commit().await?;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
