//! Human-readable sequential numbers.
//!
//! Numbers are allocated by the store inside the committing transaction, so a
//! rolled-back commit never consumes a number.

/// Formats a journal entry number, e.g. `2026-000123`.
#[must_use]
pub fn entry_number(fiscal_year: i32, seq: u64) -> String {
    format!("{fiscal_year}-{seq:06}")
}

/// Formats a run number, e.g. `NOM-2026-0007`.
#[must_use]
pub fn run_number(prefix: &str, year: i32, seq: u64) -> String {
    format!("{prefix}-{year}-{seq:04}")
}

/// Formats a payroll payment number, e.g. `PAG-2026-0012`.
#[must_use]
pub fn payment_number(year: i32, seq: u64) -> String {
    format!("PAG-{year}-{seq:04}")
}
