//! Postgres implementation of the ledger store.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

mod convert;
mod error;
mod ledger;
mod unit_of_work;

pub use error::PgStoreError;
pub use ledger::PgLedgerStore;
