//! Money helpers with minor-unit precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Ledger amounts are `rust_decimal::Decimal` values carrying at most
//! [`MINOR_UNIT_SCALE`] decimal places (euro cents).

use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places of the ledger currency (EUR cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// ISO 4217 code of the ledger currency.
pub const LEDGER_CURRENCY: &str = "EUR";

/// Largest amount a single posting may carry: `9_999_999_999_999.99`.
///
/// Matches the `NUMERIC(15, 2)` amount columns.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_7FFF, 0x0003_8D7E, 0, false, MINOR_UNIT_SCALE);

/// Returns true if `|amount|` does not exceed [`MAX_AMOUNT`].
#[must_use]
pub fn within_max_amount(amount: Decimal) -> bool {
    amount.abs() <= MAX_AMOUNT
}

/// Rounds an amount to the ledger's minor unit.
///
/// Uses banker's rounding (round half to even) to minimize cumulative errors.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Returns true if the amount has no precision below one cent.
#[must_use]
pub fn has_minor_unit_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= MINOR_UNIT_SCALE
}

/// A monetary amount in the ledger currency, always rounded to cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero euros.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a new amount, rounding to the minor unit.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(round_money(amount))
    }

    /// Creates an amount from a number of cents.
    #[must_use]
    pub fn from_minor_units(cents: i64) -> Self {
        Self(Decimal::new(cents, MINOR_UNIT_SCALE))
    }

    /// Returns the underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Returns `rate` percent of this amount, rounded to the minor unit.
    ///
    /// `rate` is expressed in percent, e.g. `15` for 15%.
    #[must_use]
    pub fn percent(self, rate: Decimal) -> Self {
        Self::new(self.0 * rate / Decimal::ONE_HUNDRED)
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly negative.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value.
    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
