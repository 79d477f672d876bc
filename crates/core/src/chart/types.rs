//! Chart of accounts types.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Assets (banks, receivables).
    Asset,
    /// Liabilities (payables, amounts owed to partners).
    Liability,
    /// Equity (capital, opening balances).
    Equity,
    /// Revenue.
    Revenue,
    /// Expenses.
    Expense,
    /// Tax agency accounts (VAT, withholdings, corporate tax).
    Tax,
}

/// The side on which an account type conventionally carries its balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalSide {
    /// Balance grows with debits.
    Debit,
    /// Balance grows with credits.
    Credit,
}

impl AccountType {
    /// All account types, in chart order.
    pub const ALL: [Self; 6] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
        Self::Tax,
    ];

    /// Returns the normal balance side for this type.
    ///
    /// ASSET and EXPENSE are debit-normal. LIABILITY, EQUITY, REVENUE and
    /// TAX are credit-normal. TAX groups amounts owed to the tax agency, so
    /// input VAT and client withholdings show a negative natural balance.
    #[must_use]
    pub const fn normal_side(self) -> NormalSide {
        match self {
            Self::Asset | Self::Expense => NormalSide::Debit,
            Self::Liability | Self::Equity | Self::Revenue | Self::Tax => NormalSide::Credit,
        }
    }

    /// Returns true for types that feed the profit and loss statement.
    #[must_use]
    pub const fn is_profit_and_loss(self) -> bool {
        matches!(self, Self::Revenue | Self::Expense)
    }

    /// Returns the wire name of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
            Self::Tax => "TAX",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown account type: {s}"))
    }
}

impl NormalSide {
    /// Converts a `debit - credit` net balance into the natural balance
    /// for this side: positive when the account carries its usual balance.
    #[must_use]
    pub fn natural(self, net_balance: Decimal) -> Decimal {
        match self {
            Self::Debit => net_balance,
            Self::Credit => -net_balance,
        }
    }
}

/// An account in the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Hierarchical numeric code, e.g. `572000`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Inactive accounts cannot receive new lines.
    pub is_active: bool,
}

impl Account {
    /// Returns the normal balance side of this account.
    #[must_use]
    pub const fn normal_side(&self) -> NormalSide {
        self.account_type.normal_side()
    }
}

/// Input for registering a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Account code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
}

impl NewAccount {
    /// Creates a new account definition.
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
        }
    }
}

/// Partial update of an existing account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// New display name; only allowed while nothing references the account.
    pub name: Option<String>,
    /// New type; only allowed while nothing references the account.
    pub account_type: Option<AccountType>,
    /// Activate or deactivate the account.
    pub is_active: Option<bool>,
}
