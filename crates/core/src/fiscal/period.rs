//! Accounting period types.

use std::fmt;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;

/// A calendar month, the closing unit of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey {
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
}

impl PeriodKey {
    /// Creates a key, validating the month.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the month or year is out of range.
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::Validation(format!("month must be 1-12, got {month}")));
        }
        if !(1900..=9999).contains(&year) {
            return Err(LedgerError::Validation(format!("year out of range: {year}")));
        }
        Ok(Self { year, month })
    }

    /// Returns the period containing a date.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the period.
    #[must_use]
    pub fn start(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the period.
    #[must_use]
    pub fn end(self) -> NaiveDate {
        self.next().start().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    /// Returns true if the date falls inside this period.
    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        Self::of(date) == self
    }

    /// The following month.
    #[must_use]
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// The month `n` months earlier.
    #[must_use]
    pub fn months_before(self, n: u32) -> Self {
        self.start()
            .checked_sub_months(Months::new(n))
            .map_or(self, Self::of)
    }

    /// The error returned when writing into this period once it is closed.
    #[must_use]
    pub fn closed_error(self) -> LedgerError {
        LedgerError::PeriodClosed {
            year: self.year,
            month: self.month,
            start: self.start(),
            end: self.end(),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Closure state of an accounting period. Periods are open until closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
    /// Closed periods reject new and changed entries.
    pub is_closed: bool,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Period {
    /// An open period.
    #[must_use]
    pub fn open(key: PeriodKey) -> Self {
        Self {
            year: key.year,
            month: key.month,
            is_closed: false,
            closed_at: None,
        }
    }

    /// Returns the period key.
    #[must_use]
    pub fn key(&self) -> PeriodKey {
        PeriodKey {
            year: self.year,
            month: self.month,
        }
    }
}

/// A period with its profit figures, as listed for closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
    /// Closure state.
    pub is_closed: bool,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Revenue recognised in the period.
    pub income: Decimal,
    /// Expenses recognised in the period.
    pub expenses: Decimal,
    /// `income - expenses`.
    pub profit: Decimal,
    /// Number of journal entries dated in the period.
    pub entry_count: usize,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(2026, 1, date(2026, 1, 31))]
    #[case(2026, 2, date(2026, 2, 28))]
    #[case(2024, 2, date(2024, 2, 29))]
    #[case(2026, 12, date(2026, 12, 31))]
    fn test_period_end(#[case] year: i32, #[case] month: u32, #[case] end: NaiveDate) {
        let key = PeriodKey::new(year, month).unwrap();
        assert_eq!(key.end(), end);
        assert_eq!(key.start(), date(year, month, 1));
    }

    #[test]
    fn test_invalid_month() {
        assert!(PeriodKey::new(2026, 0).is_err());
        assert!(PeriodKey::new(2026, 13).is_err());
    }

    #[test]
    fn test_months_before_crosses_year() {
        let key = PeriodKey::new(2026, 2).unwrap();
        assert_eq!(key.months_before(3), PeriodKey::new(2025, 11).unwrap());
        assert_eq!(key.months_before(0), key);
    }

    #[test]
    fn test_contains() {
        let key = PeriodKey::new(2026, 3).unwrap();
        assert!(key.contains(date(2026, 3, 31)));
        assert!(!key.contains(date(2026, 4, 1)));
        assert_eq!(key.to_string(), "2026-03");
    }
}
