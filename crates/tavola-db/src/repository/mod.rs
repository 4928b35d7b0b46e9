//! # Repository Module
//!
//! Database repository implementations for Tavola.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Engine operation                                                      │
//! │       │                                                                 │
//! │       │  let mut uow = db.begin().await?;                              │
//! │       │  uow.orders().require(tenant, id)                              │
//! │       ▼                                                                 │
//! │  OrderRepository<'_>  (borrows the transaction's connection)           │
//! │  ├── get / require                                                     │
//! │  ├── insert / insert_item                                              │
//! │  └── update (version-checked)                                          │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every read is tenant-scoped: a row of another tenant is reported      │
//! │  exactly like a missing one.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`] - Orders, items, selected options
//! - [`TableRepository`] - Tables, sessions, guests
//! - [`PaymentRepository`] - Payment records
//! - [`CouponRepository`] - Coupons and usage claims
//! - [`LoyaltyRepository`] - Programs, customers, points ledger
//! - [`SplitRepository`] - Bill split proposals
//! - [`AuditRepository`] - Item reassignment log
//! - [`CatalogRepository`] - Menu items and option groups

pub mod audit;
pub mod catalog;
pub mod coupon;
pub mod loyalty;
pub mod order;
pub mod payment;
pub mod split;
pub mod table;

pub use audit::AuditRepository;
pub use catalog::CatalogRepository;
pub use coupon::CouponRepository;
pub use loyalty::LoyaltyRepository;
pub use order::OrderRepository;
pub use payment::PaymentRepository;
pub use split::SplitRepository;
pub use table::TableRepository;
