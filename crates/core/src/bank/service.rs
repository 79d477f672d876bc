//! Bank movement service.
//!
//! Builds the journal entry for each bank operation. Nothing here touches
//! storage; the engine resolves the bank accounts, validates the entry and
//! commits it.

use std::collections::HashSet;

use chrono::NaiveDate;
use partida_shared::PostingAccounts;
use partida_shared::types::UserId;
use partida_shared::types::money::{MAX_AMOUNT, has_minor_unit_precision, within_max_amount};
use rust_decimal::Decimal;

use super::iban::normalize_iban;
use super::types::{
    BalanceAdjustmentRequest, BankAccount, ManualMovementRequest, MovementKind, NewBankAccount,
    TaxPaymentRequest, TaxType, TransferRequest,
};
use crate::chart::ChartService;
use crate::ledger::{EntryReference, EntryType, LedgerError, NewEntryLine, NewJournalEntry};

/// Outcome of planning a balance adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentPlan {
    /// `new_balance - current_balance`.
    pub delta: Decimal,
    /// Entry to post, absent when the balance already matches.
    pub entry: Option<NewJournalEntry>,
}

/// Stateless service that turns bank operations into journal entries.
pub struct BankMovementService;

impl BankMovementService {
    /// Validates and normalizes a bank account registration.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank names, a bad IBAN or a bad account code.
    pub fn prepare_bank_account(input: &NewBankAccount) -> Result<NewBankAccount, LedgerError> {
        let holder = input.holder.trim();
        let bank = input.bank.trim();
        if holder.is_empty() || bank.is_empty() {
            return Err(LedgerError::Validation(
                "bank account holder and bank name are required".to_string(),
            ));
        }
        if let Some(code) = &input.account_code {
            ChartService::validate_code(code)?;
        }

        Ok(NewBankAccount {
            holder: holder.to_string(),
            bank: bank.to_string(),
            iban: normalize_iban(&input.iban)?,
            account_code: input.account_code.clone(),
        })
    }

    /// Builds the opening entry for a set of bank balances.
    ///
    /// Each non-zero balance becomes one bank line (debit when positive,
    /// credit when overdrawn) against a single offsetting line on the opening
    /// equity account.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the balances sum to zero (including an empty
    /// list), a bank is repeated, or an amount has sub-cent precision or is
    /// out of range.
    pub fn opening_entry(
        balances: &[(BankAccount, Decimal)],
        date: NaiveDate,
        posting: &PostingAccounts,
        created_by: UserId,
    ) -> Result<NewJournalEntry, LedgerError> {
        let mut seen = HashSet::new();
        for (bank, balance) in balances {
            if !seen.insert(bank.id) {
                return Err(LedgerError::Validation(format!(
                    "bank account {} appears more than once",
                    bank.id
                )));
            }
            if !has_minor_unit_precision(*balance) {
                return Err(LedgerError::Validation(format!(
                    "opening balance {balance} has more than 2 decimals"
                )));
            }
            if !within_max_amount(*balance) {
                return Err(LedgerError::Validation(format!(
                    "opening balance {balance} exceeds {MAX_AMOUNT}"
                )));
            }
        }

        let total = balances
            .iter()
            .try_fold(Decimal::ZERO, |acc, (_, b)| acc.checked_add(*b))
            .filter(|t| within_max_amount(*t))
            .ok_or_else(|| LedgerError::Validation(format!("opening balances total more than {MAX_AMOUNT}")))?;
        if total.is_zero() {
            return Err(LedgerError::Validation(
                "opening balances sum to zero; nothing to open".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(balances.len() + 1);
        for (bank, balance) in balances.iter().filter(|(_, b)| !b.is_zero()) {
            let code = Self::ledger_code(bank)?;
            let line = if balance.is_sign_positive() {
                NewEntryLine::debit(code, *balance)
            } else {
                NewEntryLine::credit(code, balance.abs())
            };
            lines.push(line.with_description(format!("Saldo inicial {}", bank.bank)));
        }

        let offset = if total.is_sign_positive() {
            NewEntryLine::credit(&posting.opening_equity, total)
        } else {
            NewEntryLine::debit(&posting.opening_equity, total.abs())
        };
        lines.push(offset.with_description("Contrapartida saldos iniciales"));

        Ok(NewJournalEntry {
            entry_date: date,
            entry_type: EntryType::BankOpening,
            description: "Asiento de apertura de bancos".to_string(),
            reference: None,
            project_id: None,
            created_by,
            lines,
        })
    }

    /// Builds a transfer between two own bank accounts.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if source and target are the same account or the
    /// amount is not strictly positive.
    pub fn transfer(
        request: &TransferRequest,
        source: &BankAccount,
        target: &BankAccount,
        created_by: UserId,
    ) -> Result<NewJournalEntry, LedgerError> {
        if request.source_bank_id == request.target_bank_id || source.id == target.id {
            return Err(LedgerError::Validation(
                "source and target bank accounts must differ".to_string(),
            ));
        }
        Self::require_amount(request.amount)?;

        let source_code = Self::ledger_code(source)?;
        let target_code = Self::ledger_code(target)?;
        if source_code == target_code {
            return Err(LedgerError::Validation(
                "source and target bank accounts share a ledger account".to_string(),
            ));
        }

        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map_or_else(
                || format!("Traspaso {} -> {}", source.bank, target.bank),
                str::to_string,
            );

        Ok(NewJournalEntry {
            entry_date: request.date,
            entry_type: EntryType::BankTransfer,
            description,
            reference: None,
            project_id: None,
            created_by,
            lines: vec![
                NewEntryLine::debit(target_code, request.amount),
                NewEntryLine::credit(source_code, request.amount),
            ],
        })
    }

    /// Returns the liability account a tax type is settled against.
    #[must_use]
    pub fn tax_liability_account(tax_type: TaxType, posting: &PostingAccounts) -> &str {
        match tax_type {
            TaxType::Vat => &posting.vat_payable,
            TaxType::Irpf => &posting.irpf_payable,
            TaxType::CorporateTax => &posting.corporate_tax_payable,
        }
    }

    /// Builds a tax payment: debit the tax liability, credit the bank.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the amount is not strictly positive or the
    /// quarter is out of range.
    pub fn tax_payment(
        request: &TaxPaymentRequest,
        bank: &BankAccount,
        posting: &PostingAccounts,
        created_by: UserId,
    ) -> Result<NewJournalEntry, LedgerError> {
        Self::require_amount(request.amount)?;
        if let Some(period) = request.period
            && period.quarter.is_some_and(|q| !(1..=4).contains(&q))
        {
            return Err(LedgerError::Validation("quarter must be 1-4".to_string()));
        }

        let liability = Self::tax_liability_account(request.tax_type, posting);
        let description = match request.period {
            Some(period) => format!("Pago {} {period}", request.tax_type),
            None => format!("Pago {}", request.tax_type),
        };

        Ok(NewJournalEntry {
            entry_date: request.date,
            entry_type: EntryType::TaxPayment,
            description,
            reference: request
                .period
                .map(|p| EntryReference::new("tax_period", format!("{}:{p}", request.tax_type))),
            project_id: None,
            created_by,
            lines: vec![
                NewEntryLine::debit(liability, request.amount),
                NewEntryLine::credit(Self::ledger_code(bank)?, request.amount),
            ],
        })
    }

    /// Builds a manual income or expense against the category's account.
    ///
    /// Unknown categories fall back to the default manual income/expense
    /// account.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a non-positive amount or a blank description.
    pub fn manual_movement(
        request: &ManualMovementRequest,
        bank: &BankAccount,
        posting: &PostingAccounts,
        created_by: UserId,
    ) -> Result<NewJournalEntry, LedgerError> {
        Self::require_amount(request.amount)?;
        let description = request.description.trim();
        if description.is_empty() {
            return Err(LedgerError::Validation("description is required".to_string()));
        }

        let bank_code = Self::ledger_code(bank)?;
        let category_account = posting.manual_category_account(request.category.trim());

        let (entry_type, lines) = match request.kind {
            MovementKind::Income => {
                let counter = category_account.unwrap_or(&posting.manual_income);
                (
                    EntryType::ManualIncome,
                    vec![
                        NewEntryLine::debit(bank_code, request.amount),
                        NewEntryLine::credit(counter, request.amount),
                    ],
                )
            }
            MovementKind::Expense => {
                let counter = category_account.unwrap_or(&posting.manual_expense);
                (
                    EntryType::ManualExpense,
                    vec![
                        NewEntryLine::debit(counter, request.amount),
                        NewEntryLine::credit(bank_code, request.amount),
                    ],
                )
            }
        };

        Ok(NewJournalEntry {
            entry_date: request.date,
            entry_type,
            description: description.to_string(),
            reference: None,
            project_id: None,
            created_by,
            lines,
        })
    }

    /// Plans an adjustment bringing the bank's derived balance to `new_balance`.
    ///
    /// A zero delta is a legitimate no-op and yields no entry. Otherwise the
    /// bank is debited (positive delta) or credited (negative delta) by
    /// `|delta|` against the suspense account.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the new balance has sub-cent precision or the
    /// balance or delta is out of range.
    pub fn balance_adjustment(
        request: &BalanceAdjustmentRequest,
        bank: &BankAccount,
        current_balance: Decimal,
        posting: &PostingAccounts,
        created_by: UserId,
    ) -> Result<AdjustmentPlan, LedgerError> {
        if !has_minor_unit_precision(request.new_balance) {
            return Err(LedgerError::Validation(
                "new balance cannot have more than 2 decimals".to_string(),
            ));
        }
        if !within_max_amount(request.new_balance) {
            return Err(LedgerError::Validation(format!(
                "new balance cannot exceed {MAX_AMOUNT} in absolute value"
            )));
        }

        let delta = request
            .new_balance
            .checked_sub(current_balance)
            .filter(|d| within_max_amount(*d))
            .ok_or_else(|| {
                LedgerError::Validation(format!(
                    "adjustment from {current_balance} to {} is out of range",
                    request.new_balance
                ))
            })?;
        if delta.is_zero() {
            return Ok(AdjustmentPlan { delta, entry: None });
        }

        let bank_code = Self::ledger_code(bank)?;
        let amount = delta.abs();
        let lines = if delta.is_sign_positive() {
            vec![
                NewEntryLine::debit(bank_code, amount),
                NewEntryLine::credit(&posting.adjustment_suspense, amount),
            ]
        } else {
            vec![
                NewEntryLine::debit(&posting.adjustment_suspense, amount),
                NewEntryLine::credit(bank_code, amount),
            ]
        };

        Ok(AdjustmentPlan {
            delta,
            entry: Some(NewJournalEntry {
                entry_date: request.date,
                entry_type: EntryType::Adjustment,
                description: format!("Ajuste de saldo {} a {}", bank.bank, request.new_balance),
                reference: None,
                project_id: None,
                created_by,
                lines,
            }),
        })
    }

    /// Returns the ledger account of a bank.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the bank has no linked ledger account.
    pub fn ledger_code(bank: &BankAccount) -> Result<&str, LedgerError> {
        bank.account_code.as_deref().ok_or_else(|| {
            LedgerError::Validation(format!("bank account {} has no ledger account", bank.id))
        })
    }

    fn require_amount(amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "amount must be greater than zero, got {amount}"
            )));
        }
        if !has_minor_unit_precision(amount) {
            return Err(LedgerError::Validation(format!(
                "amount {amount} has more than 2 decimals"
            )));
        }
        if !within_max_amount(amount) {
            return Err(LedgerError::Validation(format!(
                "amount {amount} exceeds {MAX_AMOUNT}"
            )));
        }
        Ok(())
    }
}
