//! Period closure rules.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use super::period::{Period, PeriodKey, PeriodSummary};
use crate::chart::Account;
use crate::ledger::{LedgerError, LedgerLine};
use crate::reports::ReportService;

/// Largest look-back accepted when listing periods for closure.
pub const MAX_MONTHS_BACK: u32 = 120;

/// Stateless service for period checks and summaries.
pub struct FiscalService;

impl FiscalService {
    /// Fails if the date falls inside a closed period.
    ///
    /// # Errors
    ///
    /// Returns `PeriodClosed` with the period boundaries.
    pub fn check_open<F>(date: NaiveDate, is_closed: F) -> Result<(), LedgerError>
    where
        F: Fn(PeriodKey) -> bool,
    {
        let key = PeriodKey::of(date);
        if is_closed(key) {
            return Err(key.closed_error());
        }
        Ok(())
    }

    /// Lists the current month and the previous `months_back` months, newest
    /// first, merging the closure state of periods already recorded.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `months_back` exceeds [`MAX_MONTHS_BACK`].
    pub fn periods_for_closure(
        today: NaiveDate,
        months_back: u32,
        recorded: &[Period],
    ) -> Result<Vec<Period>, LedgerError> {
        if months_back > MAX_MONTHS_BACK {
            return Err(LedgerError::Validation(format!(
                "months_back cannot exceed {MAX_MONTHS_BACK}"
            )));
        }

        let known: HashMap<PeriodKey, &Period> = recorded.iter().map(|p| (p.key(), p)).collect();
        let current = PeriodKey::of(today);

        Ok((0..=months_back)
            .map(|n| current.months_before(n))
            .map(|key| known.get(&key).map_or_else(|| Period::open(key), |p| (*p).clone()))
            .collect())
    }

    /// Computes the profit figures of a period.
    ///
    /// `lines` may cover more than the period; only lines dated inside it count.
    #[must_use]
    pub fn summarize(period: &Period, accounts: &[Account], lines: &[LedgerLine]) -> PeriodSummary {
        let key = period.key();
        let (start, end) = (key.start(), key.end());
        let pnl = ReportService::profit_and_loss(accounts, lines, start, end);
        let entry_count = lines
            .iter()
            .filter(|l| l.entry_date >= start && l.entry_date <= end)
            .map(|l| l.entry_id)
            .collect::<HashSet<_>>()
            .len();

        PeriodSummary {
            year: period.year,
            month: period.month,
            start,
            end,
            is_closed: period.is_closed,
            closed_at: period.closed_at,
            income: pnl.total_income,
            expenses: pnl.total_expenses,
            profit: pnl.profit,
            entry_count,
        }
    }
}
