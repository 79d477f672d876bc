//! Run and payment types.
//!
//! The valid run transitions are:
//! - Draft → Posted (post)
//! - Posted → Paid (pay, once payments cover the net amount)
//! - Draft → Cancelled (cancel)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use partida_shared::PostingAccounts;
use partida_shared::types::{BankAccountId, JournalEntryId, PaymentId, PersonId, RunId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::EntryType;

/// Kind of compensation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunKind {
    /// Employee payroll.
    Payroll,
    /// Compensation paid to a partner.
    PartnerCompensation,
}

impl RunKind {
    /// Prefix of the run number.
    #[must_use]
    pub const fn number_prefix(self) -> &'static str {
        match self {
            Self::Payroll => "NOM",
            Self::PartnerCompensation => "SOC",
        }
    }

    /// Entry type of the accrual entry.
    #[must_use]
    pub const fn entry_type(self) -> EntryType {
        match self {
            Self::Payroll => EntryType::Payroll,
            Self::PartnerCompensation => EntryType::PartnerCompensation,
        }
    }

    /// Reference type stored on entries originating from this kind of run.
    #[must_use]
    pub const fn reference_type(self) -> &'static str {
        match self {
            Self::Payroll => "payroll_run",
            Self::PartnerCompensation => "partner_compensation_run",
        }
    }

    /// Account charged with the gross amount.
    #[must_use]
    pub fn expense_account(self, posting: &PostingAccounts) -> &str {
        match self {
            Self::Payroll => &posting.payroll_expense,
            Self::PartnerCompensation => &posting.partner_expense,
        }
    }

    /// Account holding the net amount owed to the person.
    #[must_use]
    pub fn payable_account(self, posting: &PostingAccounts) -> &str {
        match self {
            Self::Payroll => &posting.payroll_payable,
            Self::PartnerCompensation => &posting.partner_payable,
        }
    }

    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payroll => "PAYROLL",
            Self::PartnerCompensation => "PARTNER_COMPENSATION",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Payroll, Self::PartnerCompensation]
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown run kind: {s}"))
    }
}

/// Stored status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Editable, not yet in the journal.
    Draft,
    /// Accrued in the journal; payments may be pending.
    Posted,
    /// Fully paid.
    Paid,
    /// Discarded before posting.
    Cancelled,
}

impl RunStatus {
    /// Returns the wire name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns true if the state machine allows moving to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Posted) | (Self::Posted, Self::Paid) | (Self::Draft, Self::Cancelled)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Draft, Self::Posted, Self::Paid, Self::Cancelled]
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown run status: {s}"))
    }
}

/// Payment progress derived from payments; not a stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Nothing paid yet.
    Unpaid,
    /// `0 < pending < net`.
    Partial,
    /// Nothing pending.
    Paid,
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Bank transfer.
    Transfer,
    /// Direct debit.
    DirectDebit,
    /// Cheque.
    Check,
    /// Cash withdrawn from the bank.
    Cash,
}

impl PaymentMethod {
    /// Returns the wire name of this method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "TRANSFER",
            Self::DirectDebit => "DIRECT_DEBIT",
            Self::Check => "CHECK",
            Self::Cash => "CASH",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Transfer, Self::DirectDebit, Self::Check, Self::Cash]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown payment method: {s}"))
    }
}

/// A payroll or partner-compensation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationRun {
    /// Unique identifier.
    pub id: RunId,
    /// Payroll or partner compensation.
    pub kind: RunKind,
    /// e.g. `NOM-2026-0003`.
    pub run_number: String,
    /// Year the run belongs to.
    pub period_year: i32,
    /// Month the run belongs to, 1-12.
    pub period_month: u32,
    /// Employee or partner.
    pub person_id: PersonId,
    /// Name at creation time.
    pub person_name: String,
    /// Gross amount.
    pub gross_amount: Decimal,
    /// IRPF rate in percent, snapshotted at creation.
    pub irpf_rate: Decimal,
    /// `gross_amount * irpf_rate / 100`.
    pub irpf_amount: Decimal,
    /// `gross_amount - irpf_amount`.
    pub net_amount: Decimal,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Accrual entry, once posted.
    pub journal_entry_id: Option<JournalEntryId>,
    /// Creator.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Request to create a draft run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRunRequest {
    /// Payroll or partner compensation.
    pub kind: RunKind,
    /// Year.
    pub period_year: i32,
    /// Month, 1-12.
    pub period_month: u32,
    /// Employee or partner.
    pub person_id: PersonId,
    /// Employee or partner name.
    pub person_name: String,
    /// Gross amount.
    pub gross_amount: Decimal,
    /// IRPF rate in percent.
    pub irpf_rate: Decimal,
}

/// Gross, withholding and net of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAmounts {
    /// Gross amount.
    pub gross_amount: Decimal,
    /// IRPF rate in percent.
    pub irpf_rate: Decimal,
    /// Withheld amount.
    pub irpf_amount: Decimal,
    /// Amount owed to the person.
    pub net_amount: Decimal,
}

/// A validated draft run ready to be stored. The store assigns the run number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRun {
    /// Identifier.
    pub id: RunId,
    /// Payroll or partner compensation.
    pub kind: RunKind,
    /// Year.
    pub period_year: i32,
    /// Month.
    pub period_month: u32,
    /// Employee or partner.
    pub person_id: PersonId,
    /// Name.
    pub person_name: String,
    /// Computed amounts.
    pub amounts: RunAmounts,
    /// Creator.
    pub created_by: UserId,
}

/// A payment against a posted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollPayment {
    /// Unique identifier.
    pub id: PaymentId,
    /// e.g. `PAG-2026-0012`.
    pub payment_number: String,
    /// Paid run.
    pub run_id: RunId,
    /// Kind of the paid run.
    pub run_kind: RunKind,
    /// Amount paid.
    pub amount: Decimal,
    /// Value date.
    pub payment_date: NaiveDate,
    /// Method.
    pub payment_method: PaymentMethod,
    /// Paying bank account.
    pub bank_account_id: BankAccountId,
    /// Bank movement entry.
    pub journal_entry_id: JournalEntryId,
    /// Recorder.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A payment to store with the entry of the same unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    /// Identifier.
    pub id: PaymentId,
    /// Paid run.
    pub run_id: RunId,
    /// Amount paid.
    pub amount: Decimal,
    /// Value date.
    pub payment_date: NaiveDate,
    /// Method.
    pub payment_method: PaymentMethod,
    /// Paying bank account.
    pub bank_account_id: BankAccountId,
    /// Bank movement entry.
    pub journal_entry_id: JournalEntryId,
    /// Recorder.
    pub created_by: UserId,
}

/// Request to pay (part of) a posted run. The target run travels in the
/// request itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Run being paid.
    pub run_id: RunId,
    /// Paying bank account.
    pub bank_account_id: BankAccountId,
    /// Amount, at most the pending amount.
    pub amount: Decimal,
    /// Value date.
    pub payment_date: NaiveDate,
    /// Method.
    pub payment_method: PaymentMethod,
}

/// A run with its derived payment figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunView {
    /// The stored run.
    #[serde(flatten)]
    pub run: CompensationRun,
    /// Sum of payments.
    pub paid_amount: Decimal,
    /// `net_amount - paid_amount`.
    pub pending_amount: Decimal,
    /// Derived payment label.
    pub payment_state: PaymentState,
}

/// Filters for listing runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    /// Kind of run.
    pub kind: Option<RunKind>,
    /// Period year.
    pub year: Option<i32>,
    /// Status.
    pub status: Option<RunStatus>,
}

impl RunFilter {
    /// Returns true if the run passes the filter.
    #[must_use]
    pub fn matches(&self, run: &CompensationRun) -> bool {
        self.kind.is_none_or(|k| run.kind == k)
            && self.year.is_none_or(|y| run.period_year == y)
            && self.status.is_none_or(|s| run.status == s)
    }
}

/// Result of posting a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostOutcome {
    /// Run after posting.
    pub run: RunView,
    /// Accrual entry.
    pub entry_id: JournalEntryId,
    /// Number of the accrual entry.
    pub entry_number: String,
    /// True when the run had already been posted and nothing was written.
    pub already_posted: bool,
}

/// Result of paying a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// Run after the payment.
    pub run: RunView,
    /// Stored payment.
    pub payment: PayrollPayment,
    /// Number of the bank movement entry.
    pub entry_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use RunStatus::{Cancelled, Draft, Paid, Posted};
        let all = [Draft, Posted, Paid, Cancelled];
        let allowed = [(Draft, Posted), (Posted, Paid), (Draft, Cancelled)];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_kind_accounts() {
        let posting = PostingAccounts::default();
        assert_eq!(RunKind::Payroll.expense_account(&posting), "640000");
        assert_eq!(RunKind::Payroll.payable_account(&posting), "465000");
        assert_eq!(RunKind::PartnerCompensation.expense_account(&posting), "640100");
        assert_eq!(RunKind::PartnerCompensation.payable_account(&posting), "551000");
        assert_eq!(RunKind::PartnerCompensation.number_prefix(), "SOC");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("posted".parse::<RunStatus>().unwrap(), RunStatus::Posted);
        assert!("partial".parse::<RunStatus>().is_err());
    }
}
