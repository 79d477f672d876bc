//! `SeaORM` entities for the ledger schema.

pub mod prelude;

pub mod accounting_periods;
pub mod accounts;
pub mod bank_accounts;
pub mod compensation_runs;
pub mod entry_sequences;
pub mod journal_entries;
pub mod journal_entry_lines;
pub mod payroll_payments;
pub mod third_parties;
