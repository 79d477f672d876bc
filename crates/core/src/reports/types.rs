//! Report data types.
//!
//! Sign convention: `net_balance = debit_balance - credit_balance` for every
//! account type. Positive net means a debit balance (money held by or owed to
//! us on ASSET accounts, money spent on EXPENSE accounts); LIABILITY, EQUITY,
//! REVENUE and TAX accounts normally carry a negative net. `natural_balance`
//! flips the sign for credit-normal types so it is positive whenever the
//! account carries its usual balance.

use chrono::NaiveDate;
use partida_shared::types::{BankAccountId, ThirdPartyId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chart::{AccountType, NormalSide};
use crate::ledger::ThirdPartyType;

/// One account row of the balance sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetItem {
    /// Account code.
    pub account_code: String,
    /// Account name.
    pub account_name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Side on which the account normally carries its balance.
    pub normal_side: NormalSide,
    /// Sum of debits.
    pub debit_balance: Decimal,
    /// Sum of credits.
    pub credit_balance: Decimal,
    /// `debit_balance - credit_balance`.
    pub net_balance: Decimal,
    /// `net_balance` signed by the normal side.
    pub natural_balance: Decimal,
}

/// Balance of every account as of a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    /// Lines dated on or before this date are included.
    pub as_of: NaiveDate,
    /// One item per account, ordered by code.
    pub items: Vec<BalanceSheetItem>,
    /// Sum of all debits.
    pub total_debit: Decimal,
    /// Sum of all credits.
    pub total_credit: Decimal,
    /// Whether total debits equal total credits.
    pub is_balanced: bool,
}

impl BalanceSheet {
    /// Finds the item of an account.
    #[must_use]
    pub fn item(&self, code: &str) -> Option<&BalanceSheetItem> {
        self.items.iter().find(|i| i.account_code == code)
    }
}

/// One account row of the profit and loss statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitLossItem {
    /// Account code.
    pub account_code: String,
    /// Account name.
    pub account_name: String,
    /// REVENUE or EXPENSE.
    pub account_type: AccountType,
    /// `credit - debit`: positive for income, negative for expenses.
    pub amount: Decimal,
}

/// Profit and loss over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    /// First day, inclusive.
    pub period_start: NaiveDate,
    /// Last day, inclusive.
    pub period_end: NaiveDate,
    /// Accounts with activity in the range, ordered by code.
    pub items: Vec<ProfitLossItem>,
    /// Sum of revenue amounts.
    pub total_income: Decimal,
    /// Sum of expense amounts, as a positive figure.
    pub total_expenses: Decimal,
    /// `total_income - total_expenses`.
    pub profit: Decimal,
}

/// Running balance of one third party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdPartyBalance {
    /// Third party.
    pub third_party_id: ThirdPartyId,
    /// Kind of third party.
    pub third_party_type: ThirdPartyType,
    /// Registered name, if known.
    pub name: Option<String>,
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
    /// `debit - credit`: positive when the party owes us, negative when we owe them.
    pub net: Decimal,
}

/// VAT position over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatSummary {
    /// First day, inclusive.
    pub period_start: NaiveDate,
    /// Last day, inclusive.
    pub period_end: NaiveDate,
    /// Output VAT charged to clients.
    pub vat_received: Decimal,
    /// Input VAT paid to suppliers.
    pub vat_paid: Decimal,
    /// `vat_received - vat_paid`.
    pub net: Decimal,
    /// `max(0, net)`.
    pub to_pay: Decimal,
    /// `max(0, -net)`, carried forward against future periods.
    pub to_compensate: Decimal,
    /// VAT settlements paid to the tax agency in the range.
    pub paid_to_agency: Decimal,
}

/// IRPF withholding position over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrpfSummary {
    /// First day, inclusive.
    pub period_start: NaiveDate,
    /// Last day, inclusive.
    pub period_end: NaiveDate,
    /// IRPF withheld from employees and partners.
    pub withheld: Decimal,
    /// IRPF withheld from us by clients.
    pub retained_by_clients: Decimal,
    /// Withholdings paid to the tax agency.
    pub paid_to_agency: Decimal,
    /// `withheld - paid_to_agency`.
    pub pending: Decimal,
}

/// Corporate tax position over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorporateTaxSummary {
    /// First day, inclusive.
    pub period_start: NaiveDate,
    /// Last day, inclusive.
    pub period_end: NaiveDate,
    /// Revenue in the range.
    pub income: Decimal,
    /// Expenses in the range, excluding corporate tax itself.
    pub expenses: Decimal,
    /// `income - expenses`.
    pub profit_before_tax: Decimal,
    /// Configured rate, in percent.
    pub rate: Decimal,
    /// `max(0, profit_before_tax * rate / 100)`, rounded to cents.
    pub estimated_tax: Decimal,
    /// Corporate tax expense already provisioned in the range.
    pub provisioned: Decimal,
    /// Corporate tax paid to the tax agency in the range.
    pub paid: Decimal,
    /// `max(0, estimated_tax - provisioned)`.
    pub to_provision: Decimal,
    /// `max(0, provisioned - paid)`.
    pub pending_payment: Decimal,
}

/// Derived balance of a bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankBalance {
    /// Bank account.
    pub bank_account_id: BankAccountId,
    /// Account holder.
    pub holder: String,
    /// Bank display name.
    pub bank: String,
    /// IBAN.
    pub iban: String,
    /// Linked ledger account.
    pub account_code: Option<String>,
    /// Net of all lines on the ledger account up to the date.
    pub balance: Decimal,
}
