//! Entity re-exports.

pub use super::accounting_periods::Entity as AccountingPeriods;
pub use super::accounts::Entity as Accounts;
pub use super::bank_accounts::Entity as BankAccounts;
pub use super::compensation_runs::Entity as CompensationRuns;
pub use super::entry_sequences::Entity as EntrySequences;
pub use super::journal_entries::Entity as JournalEntries;
pub use super::journal_entry_lines::Entity as JournalEntryLines;
pub use super::payroll_payments::Entity as PayrollPayments;
pub use super::third_parties::Entity as ThirdParties;
