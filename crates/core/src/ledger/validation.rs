//! Business rule validation for journal lines.
//!
//! All checks here are pure and run before anything is written.

use partida_shared::types::money::{MAX_AMOUNT, has_minor_unit_precision, within_max_amount};
use rust_decimal::Decimal;

use super::error::{LedgerError, LineIssue};
use super::types::{EntryTotals, NewEntryLine};

/// Minimum number of lines in a double-entry journal entry.
pub const MIN_LINES: usize = 2;

/// Validates the shape of a single line.
///
/// # Errors
///
/// Returns the first issue found on the line.
pub fn validate_line(line: &NewEntryLine) -> Result<(), LineIssue> {
    if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
        return Err(LineIssue::NegativeAmount);
    }
    if !line.debit.is_zero() && !line.credit.is_zero() {
        return Err(LineIssue::TwoSided);
    }
    if line.debit.is_zero() && line.credit.is_zero() {
        return Err(LineIssue::ZeroAmount);
    }
    if !within_max_amount(line.debit) || !within_max_amount(line.credit) {
        return Err(LineIssue::AmountTooLarge);
    }
    if !has_minor_unit_precision(line.debit) || !has_minor_unit_precision(line.credit) {
        return Err(LineIssue::SubCentPrecision);
    }
    if line.third_party_id.is_some() != line.third_party_type.is_some() {
        return Err(LineIssue::IncompleteThirdParty);
    }
    Ok(())
}

/// Validates every line and the balance of the whole set.
///
/// Rules:
/// - At least [`MIN_LINES`] lines
/// - Each line is single-sided, non-negative, non-zero and cent-precise
/// - No line and neither total exceeds [`MAX_AMOUNT`]
/// - Total debits equal total credits exactly
///
/// # Errors
///
/// Returns `Validation` for too few lines, `InvalidLine` for the first bad
/// line, or `UnbalancedEntry` with the delta.
pub fn validate_lines(lines: &[NewEntryLine]) -> Result<EntryTotals, LedgerError> {
    if lines.len() < MIN_LINES {
        return Err(LedgerError::Validation(format!(
            "a journal entry needs at least {MIN_LINES} lines, got {}",
            lines.len()
        )));
    }

    for (index, line) in lines.iter().enumerate() {
        validate_line(line).map_err(|reason| LedgerError::InvalidLine {
            line: index + 1,
            reason,
        })?;
    }

    let totals = EntryTotals::of(lines)
        .filter(|t| t.debit <= MAX_AMOUNT && t.credit <= MAX_AMOUNT)
        .ok_or_else(|| LedgerError::Validation(format!("entry totals cannot exceed {MAX_AMOUNT}")))?;
    if !totals.is_balanced() {
        return Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
            delta: totals.delta(),
        });
    }

    Ok(totals)
}
