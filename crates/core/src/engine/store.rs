//! Persistence seam of the ledger.
//!
//! Reads are plain lookups. Every journal write goes through
//! [`LedgerStore::commit`], which applies a [`UnitOfWork`] as one transaction:
//! guards are evaluated first, then numbers are allocated and rows written.
//! A failed guard or any other error leaves the store untouched.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use partida_shared::types::{BankAccountId, JournalEntryId, RunId, ThirdPartyId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::bank::BankAccount;
use crate::chart::Account;
use crate::fiscal::{Period, PeriodKey};
use crate::ledger::{EntryFilter, JournalEntry, JournalEntryLine, LedgerLine, ThirdParty, ValidatedEntry};
use crate::payroll::{CompensationRun, NewPayment, NewRun, PayrollPayment, RunFilter, RunStatus};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A precondition checked inside the committing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The period containing the date is open.
    PeriodOpen(NaiveDate),
    /// The run exists and has the expected status.
    RunStatus {
        /// Run to check.
        run: RunId,
        /// Required current status.
        expected: RunStatus,
    },
    /// Paying `amount` does not exceed the run's pending amount.
    PendingCovers {
        /// Run to check.
        run: RunId,
        /// Amount about to be paid.
        amount: Decimal,
    },
    /// The account's `debit - credit` net as of a date still equals what the
    /// caller computed.
    AccountBalance {
        /// Account code.
        code: String,
        /// Balance date, inclusive.
        as_of: NaiveDate,
        /// Net the caller observed.
        expected: Decimal,
    },
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeriodOpen(date) => write!(f, "period of {date} must be open"),
            Self::RunStatus { run, expected } => write!(f, "run {run} must be {expected}"),
            Self::PendingCovers { run, amount } => {
                write!(f, "run {run} must have at least {amount} pending")
            }
            Self::AccountBalance { code, as_of, expected } => {
                write!(f, "account {code} must have net {expected} as of {as_of}")
            }
        }
    }
}

/// Store-layer failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A guard did not hold; nothing was written.
    #[error("Precondition failed: {0}")]
    GuardFailed(Guard),

    /// A concurrent writer got there first (unique key, serialization failure).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other backend failure.
    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::GuardFailed(_) => "PRECONDITION_FAILED",
            Self::Conflict(_) => "CONFLICT",
            Self::Backend(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::GuardFailed(_) | Self::Conflict(_) => 409,
            Self::Backend(_) => 500,
        }
    }

    /// Returns true if repeating the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

/// Which posted lines a [`LedgerSnapshot`] covers, by entry date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineRange {
    /// Earliest entry date, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest entry date, inclusive.
    pub to: Option<NaiveDate>,
}

impl LineRange {
    /// Every line.
    #[must_use]
    pub const fn all() -> Self {
        Self { from: None, to: None }
    }

    /// Lines dated on or before `as_of`.
    #[must_use]
    pub const fn until(as_of: NaiveDate) -> Self {
        Self {
            from: None,
            to: Some(as_of),
        }
    }

    /// Lines dated in `[from, to]`.
    #[must_use]
    pub const fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns true if the date falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }
}

/// A consistent point-in-time read of the chart, the third parties and the
/// posted lines in a range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Every account.
    pub accounts: Vec<Account>,
    /// Every registered third party.
    pub third_parties: Vec<ThirdParty>,
    /// Posted lines in the requested range.
    pub lines: Vec<LedgerLine>,
}

/// An entry to insert as part of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// The validated entry.
    pub entry: ValidatedEntry,
    /// Lock the entry immediately.
    pub lock: bool,
}

/// A run status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunUpdate {
    /// Run to update.
    pub run: RunId,
    /// New status.
    pub status: RunStatus,
    /// Accrual entry to link, if any.
    pub journal_entry_id: Option<JournalEntryId>,
}

/// Everything one business operation writes, applied atomically.
///
/// When `payment` is set the store also moves the run to PAID once its
/// payments cover the net amount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    /// Preconditions evaluated before anything is written.
    pub guards: Vec<Guard>,
    /// Entry to insert.
    pub entry: Option<StagedEntry>,
    /// Existing entry to lock.
    pub lock_entry: Option<JournalEntryId>,
    /// Run status change.
    pub run_update: Option<RunUpdate>,
    /// Payment to insert.
    pub payment: Option<NewPayment>,
    /// Period to close, locking every entry dated in it.
    pub close_period: Option<PeriodKey>,
}

/// What a committed unit of work wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Inserted entry header.
    pub entry: Option<JournalEntry>,
    /// Inserted entry lines.
    pub lines: Vec<JournalEntryLine>,
    /// Inserted payment.
    pub payment: Option<PayrollPayment>,
    /// Entries that went from unlocked to locked.
    pub locked_entries: Vec<JournalEntryId>,
    /// Period marked closed.
    pub closed_period: Option<Period>,
    /// Run after its status change.
    pub run: Option<CompensationRun>,
}

/// Persistence backend of the ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Lists every account, ordered by code.
    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    /// Looks up an account.
    async fn get_account(&self, code: &str) -> StoreResult<Option<Account>>;

    /// Inserts an account. Returns false if the code already exists.
    async fn insert_account(&self, account: &Account) -> StoreResult<bool>;

    /// Replaces an existing account.
    ///
    /// With `unreferenced_only`, the write happens only while no journal line
    /// or bank account references the account; the check and the write are
    /// atomic. Returns false when a reference blocked the write.
    async fn update_account(&self, account: &Account, unreferenced_only: bool) -> StoreResult<bool>;

    /// Lists every registered third party.
    async fn list_third_parties(&self) -> StoreResult<Vec<ThirdParty>>;

    /// Looks up a third party.
    async fn get_third_party(&self, id: ThirdPartyId) -> StoreResult<Option<ThirdParty>>;

    /// Inserts or renames a third party.
    async fn upsert_third_party(&self, party: &ThirdParty) -> StoreResult<()>;

    /// Lists bank accounts.
    async fn list_bank_accounts(&self) -> StoreResult<Vec<BankAccount>>;

    /// Looks up a bank account.
    async fn get_bank_account(&self, id: BankAccountId) -> StoreResult<Option<BankAccount>>;

    /// Inserts a bank account, together with its new ledger account if given.
    async fn insert_bank_account(&self, bank: &BankAccount, ledger_account: Option<&Account>) -> StoreResult<()>;

    /// Looks up an entry header.
    async fn get_entry(&self, id: JournalEntryId) -> StoreResult<Option<JournalEntry>>;

    /// Lists entry headers matching the filter, ordered by date then number.
    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>>;

    /// Lines of an entry in line order.
    async fn entry_lines(&self, id: JournalEntryId) -> StoreResult<Vec<JournalEntryLine>>;

    /// Reads a consistent snapshot of the chart and the lines in `range`.
    async fn snapshot(&self, range: LineRange) -> StoreResult<LedgerSnapshot>;

    /// Looks up a run.
    async fn get_run(&self, id: RunId) -> StoreResult<Option<CompensationRun>>;

    /// Lists runs matching the filter, newest period first.
    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<CompensationRun>>;

    /// Inserts a draft run, allocating its number.
    async fn insert_run(&self, run: NewRun) -> StoreResult<CompensationRun>;

    /// Deletes a run if it still has the expected status.
    async fn delete_run(&self, id: RunId, expected: RunStatus) -> StoreResult<()>;

    /// Payments of a run in payment order.
    async fn list_payments(&self, run: RunId) -> StoreResult<Vec<PayrollPayment>>;

    /// Periods with a recorded closure state.
    async fn list_periods(&self) -> StoreResult<Vec<Period>>;

    /// Applies a unit of work atomically.
    async fn commit(&self, work: UnitOfWork) -> StoreResult<CommitReceipt>;
}
