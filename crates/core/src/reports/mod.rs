//! Subledger aggregation.
//!
//! Pure read-side computations over journal lines:
//! - Balance sheet (trial balance per account with totals)
//! - Profit and loss
//! - Third-party balances (clients, suppliers, technicians)
//! - VAT, IRPF and corporate tax summaries
//! - Bank balances
//!
//! [`BalanceAccumulator`] maintains balances incrementally from ledger events
//! and always agrees with a full recomputation.

pub mod accumulator;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use accumulator::BalanceAccumulator;
pub use service::ReportService;
pub use types::*;
