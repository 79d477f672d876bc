//! Ledger error types.
//!
//! Every rejected operation returns one of these with enough context for the
//! caller to render an actionable message: the balance delta, the offending
//! line and account, the period boundaries or the pending amount.

use std::fmt;

use chrono::NaiveDate;
use partida_shared::types::ThirdPartyId;
use partida_shared::types::money::MAX_AMOUNT;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::ThirdPartyType;
use crate::engine::StoreError;
use crate::payroll::RunStatus;

/// Why a single journal line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineIssue {
    /// The account code is not in the chart.
    UnknownAccount(String),
    /// The account exists but is inactive.
    InactiveAccount(String),
    /// The third party is not registered.
    UnknownThirdParty(ThirdPartyId),
    /// The third party is registered with a different type.
    ThirdPartyTypeMismatch {
        /// Type stated on the line.
        stated: ThirdPartyType,
        /// Registered type.
        registered: ThirdPartyType,
    },
    /// Only one of third-party id and type was provided.
    IncompleteThirdParty,
    /// A debit or credit amount is negative.
    NegativeAmount,
    /// Both debit and credit are non-zero.
    TwoSided,
    /// Both debit and credit are zero.
    ZeroAmount,
    /// The amount carries precision below one cent.
    SubCentPrecision,
    /// The amount exceeds the largest storable amount.
    AmountTooLarge,
}

impl fmt::Display for LineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAccount(code) => write!(f, "account {code} does not exist"),
            Self::InactiveAccount(code) => write!(f, "account {code} is inactive"),
            Self::UnknownThirdParty(id) => write!(f, "third party {id} does not exist"),
            Self::ThirdPartyTypeMismatch { stated, registered } => {
                write!(f, "third party is a {registered}, not a {stated}")
            }
            Self::IncompleteThirdParty => {
                f.write_str("third party id and type must be given together")
            }
            Self::NegativeAmount => f.write_str("amounts cannot be negative"),
            Self::TwoSided => f.write_str("a line must have either a debit or a credit, not both"),
            Self::ZeroAmount => f.write_str("a line must have a non-zero debit or credit"),
            Self::SubCentPrecision => f.write_str("amounts cannot have more than 2 decimals"),
            Self::AmountTooLarge => write!(f, "amounts cannot exceed {MAX_AMOUNT}"),
        }
    }
}

impl LineIssue {
    /// Returns the offending account code, if the issue is about an account.
    #[must_use]
    pub fn account_code(&self) -> Option<&str> {
        match self {
            Self::UnknownAccount(code) | Self::InactiveAccount(code) => Some(code),
            _ => None,
        }
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Debits and credits differ.
    #[error("Entry is not balanced. Debit: {debit}, Credit: {credit}, Delta: {delta}")]
    UnbalancedEntry {
        /// Sum of debits.
        debit: Decimal,
        /// Sum of credits.
        credit: Decimal,
        /// `debit - credit`.
        delta: Decimal,
    },

    /// A line is malformed or references something unknown.
    #[error("Invalid line {line}: {reason}")]
    InvalidLine {
        /// 1-based line position.
        line: usize,
        /// What is wrong with the line.
        reason: LineIssue,
    },

    // ========== Chart Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account code already registered.
    #[error("Account {0} already exists")]
    DuplicateAccount(String),

    /// Only the active flag of a referenced account may change.
    #[error("Account {0} is referenced; only its active flag may change")]
    AccountImmutable(String),

    // ========== Period Errors ==========
    /// The target period is closed.
    #[error("Period {year}-{month:02} is closed ({start} to {end})")]
    PeriodClosed {
        /// Year of the closed period.
        year: i32,
        /// Month of the closed period.
        month: u32,
        /// First day of the period.
        start: NaiveDate,
        /// Last day of the period.
        end: NaiveDate,
    },

    // ========== Run Errors ==========
    /// Illegal run state change.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: RunStatus,
        /// Requested status.
        to: RunStatus,
    },

    /// The run was already posted. Converted into idempotent success by the engine.
    #[error("Run already posted as entry {entry_number}")]
    AlreadyPosted {
        /// Number of the existing entry.
        entry_number: String,
    },

    /// Payment exceeds what is still owed on the run.
    #[error("Payment of {requested} exceeds pending amount {pending}")]
    InsufficientPendingAmount {
        /// Requested payment amount.
        requested: Decimal,
        /// Amount still pending.
        pending: Decimal,
    },

    /// Only draft runs can be deleted.
    #[error("Cannot delete a run in status {0}")]
    RunNotDeletable(RunStatus),

    // ========== Lookup Errors ==========
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    // ========== Infrastructure Errors ==========
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Shorthand for [`LedgerError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::InvalidLine { .. } => "INVALID_LINE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            Self::AccountImmutable(_) => "ACCOUNT_IMMUTABLE",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AlreadyPosted { .. } => "ALREADY_POSTED",
            Self::InsufficientPendingAmount { .. } => "INSUFFICIENT_PENDING_AMOUNT",
            Self::RunNotDeletable(_) => "RUN_NOT_DELETABLE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Store(err) => err.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::Validation(_)
            | Self::UnbalancedEntry { .. }
            | Self::InvalidLine { .. }
            | Self::InsufficientPendingAmount { .. } => 400,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::NotFound { .. } => 404,

            // 409 Conflict - state errors
            Self::DuplicateAccount(_)
            | Self::AccountImmutable(_)
            | Self::PeriodClosed { .. }
            | Self::InvalidTransition { .. }
            | Self::AlreadyPosted { .. }
            | Self::RunNotDeletable(_) => 409,

            Self::Store(err) => err.http_status_code(),
        }
    }

    /// Returns true if the caller may retry the same request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_retryable())
    }
}
