//! Domain types for journal entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use partida_shared::types::{JournalEntryId, ProjectId, ThirdPartyId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Business event a journal entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Sales invoice issued.
    InvoiceSale,
    /// Purchase invoice received.
    InvoicePurchase,
    /// Payment received from a client.
    PaymentReceived,
    /// Payment made to a supplier, technician, employee or partner.
    PaymentMade,
    /// Transfer between two own bank accounts.
    BankTransfer,
    /// Settlement paid to the tax agency.
    TaxPayment,
    /// Accrual of a tax liability.
    TaxProvision,
    /// Opening balances of bank accounts.
    BankOpening,
    /// Bank balance adjustment.
    Adjustment,
    /// Manual income on a bank account.
    ManualIncome,
    /// Manual expense on a bank account.
    ManualExpense,
    /// Payroll run accrual.
    Payroll,
    /// Partner compensation run accrual.
    PartnerCompensation,
}

impl EntryType {
    /// All entry types.
    pub const ALL: [Self; 13] = [
        Self::InvoiceSale,
        Self::InvoicePurchase,
        Self::PaymentReceived,
        Self::PaymentMade,
        Self::BankTransfer,
        Self::TaxPayment,
        Self::TaxProvision,
        Self::BankOpening,
        Self::Adjustment,
        Self::ManualIncome,
        Self::ManualExpense,
        Self::Payroll,
        Self::PartnerCompensation,
    ];

    /// Returns the wire name of this entry type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvoiceSale => "INVOICE_SALE",
            Self::InvoicePurchase => "INVOICE_PURCHASE",
            Self::PaymentReceived => "PAYMENT_RECEIVED",
            Self::PaymentMade => "PAYMENT_MADE",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::TaxPayment => "TAX_PAYMENT",
            Self::TaxProvision => "TAX_PROVISION",
            Self::BankOpening => "BANK_OPENING",
            Self::Adjustment => "ADJUSTMENT",
            Self::ManualIncome => "MANUAL_INCOME",
            Self::ManualExpense => "MANUAL_EXPENSE",
            Self::Payroll => "PAYROLL",
            Self::PartnerCompensation => "PARTNER_COMPENSATION",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown entry type: {s}"))
    }
}

/// Kind of third party a line can be attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThirdPartyType {
    /// Customer.
    Client,
    /// Goods supplier.
    Supplier,
    /// Freelance technician.
    Technician,
}

impl ThirdPartyType {
    /// Returns the wire name of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Supplier => "SUPPLIER",
            Self::Technician => "TECHNICIAN",
        }
    }
}

impl fmt::Display for ThirdPartyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThirdPartyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Client, Self::Supplier, Self::Technician]
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown third party type: {s}"))
    }
}

/// A registered client, supplier or technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdParty {
    /// Identifier shared with the owning business module.
    pub id: ThirdPartyId,
    /// Kind of third party.
    pub party_type: ThirdPartyType,
    /// Display name.
    pub name: String,
}

/// Pointer to the business document that originated an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryReference {
    /// Document kind, e.g. `invoice` or `payroll_run`.
    pub reference_type: String,
    /// Document identifier.
    pub reference_id: String,
}

impl EntryReference {
    /// Creates a reference.
    pub fn new(reference_type: impl Into<String>, reference_id: impl ToString) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_id: reference_id.to_string(),
        }
    }
}

/// A line of a journal entry being created.
///
/// Exactly one of `debit` and `credit` is non-zero; both are non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntryLine {
    /// Account code.
    pub account_code: String,
    /// Debit amount.
    #[serde(default)]
    pub debit: Decimal,
    /// Credit amount.
    #[serde(default)]
    pub credit: Decimal,
    /// Optional line memo.
    #[serde(default)]
    pub description: Option<String>,
    /// Third party the line is attributed to.
    #[serde(default)]
    pub third_party_id: Option<ThirdPartyId>,
    /// Type of the attributed third party.
    #[serde(default)]
    pub third_party_type: Option<ThirdPartyType>,
}

impl NewEntryLine {
    /// Creates a debit line.
    pub fn debit(account_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
            third_party_id: None,
            third_party_type: None,
        }
    }

    /// Creates a credit line.
    pub fn credit(account_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
            third_party_id: None,
            third_party_type: None,
        }
    }

    /// Sets the line memo.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attributes the line to a third party.
    #[must_use]
    pub fn with_third_party(mut self, id: ThirdPartyId, party_type: ThirdPartyType) -> Self {
        self.third_party_id = Some(id);
        self.third_party_type = Some(party_type);
        self
    }
}

/// Header and lines of a journal entry to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Business event type.
    pub entry_type: EntryType,
    /// Free-text description.
    pub description: String,
    /// Originating business document.
    #[serde(default)]
    pub reference: Option<EntryReference>,
    /// Project the entry is charged to.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// User recording the entry.
    pub created_by: UserId,
    /// Ordered lines.
    pub lines: Vec<NewEntryLine>,
}

/// A committed journal entry header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Gap-free number within the fiscal year, e.g. `2026-000123`.
    pub entry_number: String,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Business event type.
    pub entry_type: EntryType,
    /// Free-text description.
    pub description: String,
    /// Originating business document.
    pub reference: Option<EntryReference>,
    /// Project the entry is charged to.
    pub project_id: Option<ProjectId>,
    /// Sum of debits (equal to the sum of credits).
    pub total_amount: Decimal,
    /// Locked entries can no longer change.
    pub is_locked: bool,
    /// User who recorded the entry.
    pub created_by: UserId,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// A committed journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// 1-based position within the entry.
    pub line_order: i32,
    /// Account code.
    pub account_code: String,
    /// Debit amount.
    pub debit_amount: Decimal,
    /// Credit amount.
    pub credit_amount: Decimal,
    /// Line memo.
    pub description: Option<String>,
    /// Attributed third party.
    pub third_party_id: Option<ThirdPartyId>,
    /// Type of the attributed third party.
    pub third_party_type: Option<ThirdPartyType>,
}

/// A committed line joined with the header fields aggregations need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Accounting date of the owning entry.
    pub entry_date: NaiveDate,
    /// Type of the owning entry.
    pub entry_type: EntryType,
    /// Account code.
    pub account_code: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Attributed third party.
    pub third_party_id: Option<ThirdPartyId>,
    /// Type of the attributed third party.
    pub third_party_type: Option<ThirdPartyType>,
}

impl LedgerLine {
    /// Joins a committed line with its entry header.
    #[must_use]
    pub fn from_parts(entry: &JournalEntry, line: &JournalEntryLine) -> Self {
        Self {
            entry_id: entry.id,
            entry_date: entry.entry_date,
            entry_type: entry.entry_type,
            account_code: line.account_code.clone(),
            debit: line.debit_amount,
            credit: line.credit_amount,
            third_party_id: line.third_party_id,
            third_party_type: line.third_party_type,
        }
    }

    /// Returns `debit - credit`.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Debit and credit totals of a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums the given lines, or `None` if a sum overflows.
    #[must_use]
    pub fn of(lines: &[NewEntryLine]) -> Option<Self> {
        lines.iter().try_fold(
            Self { debit: Decimal::ZERO, credit: Decimal::ZERO },
            |acc, line| {
                Some(Self {
                    debit: acc.debit.checked_add(line.debit)?,
                    credit: acc.credit.checked_add(line.credit)?,
                })
            },
        )
    }

    /// Returns `debit - credit`.
    #[must_use]
    pub fn delta(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Returns true when debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}

/// Filters for listing journal entries.
///
/// Empty fields do not filter. Line-level filters (`account_code`,
/// `third_party_id`) match entries with at least one matching line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Earliest entry date, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest entry date, inclusive.
    pub to: Option<NaiveDate>,
    /// Allowed entry types.
    #[serde(default)]
    pub entry_types: Vec<EntryType>,
    /// Entries touching this account.
    pub account_code: Option<String>,
    /// Entries attributed to this third party.
    pub third_party_id: Option<ThirdPartyId>,
    /// Originating document.
    pub reference: Option<EntryReference>,
    /// Project.
    pub project_id: Option<ProjectId>,
    /// Locked state.
    pub locked: Option<bool>,
}

impl EntryFilter {
    /// Returns true if the header passes the header-level filters.
    #[must_use]
    pub fn matches_header(&self, entry: &JournalEntry) -> bool {
        self.from.is_none_or(|from| entry.entry_date >= from)
            && self.to.is_none_or(|to| entry.entry_date <= to)
            && (self.entry_types.is_empty() || self.entry_types.contains(&entry.entry_type))
            && self
                .reference
                .as_ref()
                .is_none_or(|r| entry.reference.as_ref() == Some(r))
            && self.project_id.is_none_or(|p| entry.project_id == Some(p))
            && self.locked.is_none_or(|locked| entry.is_locked == locked)
    }

    /// Returns true if the lines pass the line-level filters.
    #[must_use]
    pub fn matches_lines(&self, lines: &[JournalEntryLine]) -> bool {
        self.account_code
            .as_ref()
            .is_none_or(|code| lines.iter().any(|l| &l.account_code == code))
            && self
                .third_party_id
                .is_none_or(|tp| lines.iter().any(|l| l.third_party_id == Some(tp)))
    }

    /// Returns true if any line-level filter is set.
    #[must_use]
    pub fn has_line_filters(&self) -> bool {
        self.account_code.is_some() || self.third_party_id.is_some()
    }
}
