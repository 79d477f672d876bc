//! Transactional ledger engine.
//!
//! - [`store`]: the persistence seam and its unit of work
//! - [`memory`]: an in-memory store with fault injection
//! - [`events`]: change notifications
//! - [`ledger`]: the [`Ledger`] facade every caller goes through

pub mod events;
pub mod ledger;
pub mod memory;
pub mod store;

#[cfg(test)]
mod tests;

pub use events::LedgerEvent;
pub use ledger::{CommittedEntry, Ledger};
pub use memory::MemoryStore;
pub use store::{
    CommitReceipt, Guard, LedgerSnapshot, LedgerStore, LineRange, RunUpdate, StagedEntry, StoreError,
    StoreResult, UnitOfWork,
};
