//! Bank account and movement request types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use partida_shared::types::{BankAccountId, JournalEntryId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bank account. Its balance is derived from the journal, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Unique identifier.
    pub id: BankAccountId,
    /// Account holder.
    pub holder: String,
    /// Bank display name.
    pub bank: String,
    /// Normalized IBAN.
    pub iban: String,
    /// Linked ledger account (`572xxx`).
    pub account_code: Option<String>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for registering a bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBankAccount {
    /// Account holder.
    pub holder: String,
    /// Bank display name.
    pub bank: String,
    /// IBAN, spaces allowed.
    pub iban: String,
    /// Existing ledger account to link. A new `572xxx` account is created when absent.
    #[serde(default)]
    pub account_code: Option<String>,
}

/// Tax settled by a tax payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxType {
    /// Value added tax settlement (modelo 303).
    Vat,
    /// Withholdings on salaries and partner compensation (modelo 111).
    Irpf,
    /// Corporate income tax (modelo 200/202).
    CorporateTax,
}

impl TaxType {
    /// Returns the wire name of this tax type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vat => "VAT",
            Self::Irpf => "IRPF",
            Self::CorporateTax => "CORPORATE_TAX",
        }
    }
}

impl fmt::Display for TaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tax period a payment settles: a year, optionally a quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPeriod {
    /// Fiscal year.
    pub year: i32,
    /// Quarter 1-4, absent for annual taxes.
    #[serde(default)]
    pub quarter: Option<u32>,
}

impl fmt::Display for TaxPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter {
            Some(q) => write!(f, "{}-{q}T", self.year),
            None => write!(f, "{}", self.year),
        }
    }
}

/// Direction of a manual bank movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Money coming into the bank.
    Income,
    /// Money leaving the bank.
    Expense,
}

/// Opening balance of one bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalance {
    /// Bank account.
    pub bank_account_id: BankAccountId,
    /// Balance at the opening date; negative for overdrafts.
    pub balance: Decimal,
}

/// Request to record bank opening balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningEntryRequest {
    /// Opening date.
    pub date: NaiveDate,
    /// One balance per bank account.
    pub balances: Vec<OpeningBalance>,
}

/// Request to move money between two own bank accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Bank account debited in the real world (credited in the ledger).
    pub source_bank_id: BankAccountId,
    /// Bank account receiving the money.
    pub target_bank_id: BankAccountId,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Value date.
    pub date: NaiveDate,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to pay a tax liability from a bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPaymentRequest {
    /// Paying bank account.
    pub bank_account_id: BankAccountId,
    /// Tax being settled.
    pub tax_type: TaxType,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Value date.
    pub date: NaiveDate,
    /// Tax period settled.
    #[serde(default)]
    pub period: Option<TaxPeriod>,
}

/// Request to record a manual income or expense on a bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualMovementRequest {
    /// Bank account.
    pub bank_account_id: BankAccountId,
    /// Category, mapped to a ledger account by configuration.
    pub category: String,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Direction.
    pub kind: MovementKind,
    /// Value date.
    pub date: NaiveDate,
    /// Description.
    pub description: String,
}

/// Request to align a bank's derived balance with a real statement balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAdjustmentRequest {
    /// Bank account.
    pub bank_account_id: BankAccountId,
    /// Balance shown by the bank.
    pub new_balance: Decimal,
    /// Statement date.
    pub date: NaiveDate,
}

/// Result of a bank movement operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementOutcome {
    /// Created entry, absent for a no-op adjustment.
    pub entry_id: Option<JournalEntryId>,
    /// Number of the created entry.
    pub entry_number: Option<String>,
    /// Amount moved, or the signed delta for adjustments.
    pub amount: Decimal,
}

impl MovementOutcome {
    /// Returns true when no entry was created.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.entry_id.is_none()
    }
}
