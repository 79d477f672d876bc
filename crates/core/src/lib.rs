//! Core ledger logic for Partida.
//!
//! This crate contains the double-entry posting engine with ZERO web or
//! database dependencies. Persistence is reached only through the
//! [`engine::LedgerStore`] trait.
//!
//! # Modules
//!
//! - `chart` - Chart of accounts, account types and sign conventions
//! - `ledger` - Journal entries, line validation and numbering
//! - `reports` - Subledger aggregation (balances, P&L, tax summaries)
//! - `bank` - Bank accounts and bank movement postings
//! - `payroll` - Payroll and partner-compensation run lifecycle
//! - `fiscal` - Accounting periods and closure
//! - `engine` - Transactional `Ledger` facade, store seam and events

pub mod bank;
pub mod chart;
pub mod engine;
pub mod fiscal;
pub mod ledger;
pub mod payroll;
pub mod reports;

pub use engine::{Ledger, LedgerEvent, LedgerStore, MemoryStore};
pub use ledger::LedgerError;
