//! Incrementally maintained balances.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use partida_shared::types::JournalEntryId;
use rust_decimal::Decimal;

use super::service::{AccountTotals, ReportService};
use super::types::BalanceSheet;
use crate::chart::Account;
use crate::engine::LedgerEvent;
use crate::ledger::{EntryTotals, JournalEntry, JournalEntryLine};

/// Read-side cache of per-account balances fed by [`LedgerEvent`]s.
///
/// Totals are bucketed by day so any `as_of` date can be answered. Entries are
/// applied at most once.
#[derive(Debug, Default, Clone)]
pub struct BalanceAccumulator {
    accounts: BTreeMap<String, Account>,
    daily: BTreeMap<String, BTreeMap<NaiveDate, EntryTotals>>,
    applied: HashSet<JournalEntryId>,
}

impl BalanceAccumulator {
    /// Creates an accumulator seeded with the chart of accounts.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.code.clone(), a)).collect(),
            ..Self::default()
        }
    }

    /// Applies a ledger event. Events that do not move balances are ignored.
    pub fn apply(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::AccountSaved(account) => {
                self.accounts.insert(account.code.clone(), account.clone());
            }
            LedgerEvent::EntryCommitted { entry, lines } => {
                self.record_entry(entry, lines);
            }
            _ => {}
        }
    }

    /// Adds the lines of a committed entry. Returns false if already applied.
    pub fn record_entry(&mut self, entry: &JournalEntry, lines: &[JournalEntryLine]) -> bool {
        if !self.applied.insert(entry.id) {
            return false;
        }
        for line in lines {
            let day = self
                .daily
                .entry(line.account_code.clone())
                .or_default()
                .entry(entry.entry_date)
                .or_insert(EntryTotals {
                    debit: Decimal::ZERO,
                    credit: Decimal::ZERO,
                });
            day.debit += line.debit_amount;
            day.credit += line.credit_amount;
        }
        true
    }

    /// Number of entries applied so far.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.applied.len()
    }

    /// Returns the `debit - credit` net of one account as of a date.
    #[must_use]
    pub fn account_net(&self, code: &str, as_of: NaiveDate) -> Decimal {
        self.totals_for(code, as_of).map_or(Decimal::ZERO, |t| t.delta())
    }

    /// Produces the balance sheet as of a date.
    #[must_use]
    pub fn balance_sheet(&self, as_of: NaiveDate) -> BalanceSheet {
        let totals: AccountTotals = self
            .daily
            .keys()
            .filter_map(|code| self.totals_for(code, as_of).map(|t| (code.clone(), t)))
            .collect();
        ReportService::balance_sheet_from_totals(self.accounts.values(), &totals, as_of)
    }

    fn totals_for(&self, code: &str, as_of: NaiveDate) -> Option<EntryTotals> {
        let days = self.daily.get(code)?;
        let mut totals = EntryTotals {
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
        };
        let mut any = false;
        for day in days.range(..=as_of).map(|(_, t)| t) {
            totals.debit += day.debit;
            totals.credit += day.credit;
            any = true;
        }
        any.then_some(totals)
    }
}
