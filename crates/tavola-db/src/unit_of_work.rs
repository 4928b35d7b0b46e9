//! # Unit of Work
//!
//! One SQLite transaction per engine operation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Unit of Work                                   │
//! │                                                                         │
//! │  db.begin() ──► BEGIN                                                  │
//! │                   │                                                     │
//! │                   ├── uow.orders().require(..)      read                │
//! │                   ├── (pure check in tavola-core)                       │
//! │                   ├── uow.coupons().claim_use(..)   guarded write       │
//! │                   ├── uow.orders().update(..)       versioned write     │
//! │                   │                                                     │
//! │  uow.commit() ◄───┘   COMMIT  (drop without commit = ROLLBACK)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories borrow the transaction's connection mutably, so only one is
//! live at a time: `uow.orders().get(..)` then `uow.tables().get(..)`.

use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::DbResult;
use crate::repository::{
    AuditRepository, CatalogRepository, CouponRepository, LoyaltyRepository, OrderRepository,
    PaymentRepository, SplitRepository, TableRepository,
};

/// A database transaction with typed repository accessors.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        UnitOfWork { tx }
    }

    /// Raw access to the transaction's connection.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub fn orders(&mut self) -> OrderRepository<'_> {
        OrderRepository::new(&mut *self.tx)
    }

    pub fn tables(&mut self) -> TableRepository<'_> {
        TableRepository::new(&mut *self.tx)
    }

    pub fn payments(&mut self) -> PaymentRepository<'_> {
        PaymentRepository::new(&mut *self.tx)
    }

    pub fn coupons(&mut self) -> CouponRepository<'_> {
        CouponRepository::new(&mut *self.tx)
    }

    pub fn loyalty(&mut self) -> LoyaltyRepository<'_> {
        LoyaltyRepository::new(&mut *self.tx)
    }

    pub fn splits(&mut self) -> SplitRepository<'_> {
        SplitRepository::new(&mut *self.tx)
    }

    pub fn audit(&mut self) -> AuditRepository<'_> {
        AuditRepository::new(&mut *self.tx)
    }

    pub fn catalog(&mut self) -> CatalogRepository<'_> {
        CatalogRepository::new(&mut *self.tx)
    }

    /// Commits every write made through this unit of work.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discards every write made through this unit of work.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
