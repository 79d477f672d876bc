//! Journal engine: double-entry bookkeeping logic.
//!
//! This module implements:
//! - Journal entry and line types
//! - Line-level and entry-level validation (balance, non-negative, single-sided)
//! - Reference resolution against the chart and the third-party registry
//! - Gap-free human-readable numbering
//! - The ledger error taxonomy

pub mod error;
pub mod numbering;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use error::{LedgerError, LineIssue};
pub use numbering::{entry_number, payment_number, run_number};
pub use service::{LedgerService, ValidatedEntry};
pub use types::{
    EntryFilter, EntryReference, EntryTotals, EntryType, JournalEntry, JournalEntryLine,
    LedgerLine, NewEntryLine, NewJournalEntry, ThirdParty, ThirdPartyType,
};
pub use validation::validate_lines;
