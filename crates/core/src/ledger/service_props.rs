//! Property-based tests for LedgerService.
//!
//! - Validated entries are always balanced
//! - A single unresolvable account anywhere rejects the whole entry

use chrono::NaiveDate;
use partida_shared::types::UserId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::{LedgerError, LineIssue};
use super::service::LedgerService;
use super::types::{EntryType, NewEntryLine, NewJournalEntry};
use crate::chart::{Account, AccountType};

const KNOWN_CODES: [&str; 4] = ["572001", "430000", "705000", "629000"];

/// Strategy to generate a positive cent amount (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn known_code() -> impl Strategy<Value = &'static str> {
    prop::sample::select(KNOWN_CODES.to_vec())
}

fn lookup(code: &str) -> Option<Account> {
    KNOWN_CODES.contains(&code).then(|| Account {
        code: code.to_string(),
        name: code.to_string(),
        account_type: AccountType::Asset,
        is_active: true,
    })
}

fn entry(lines: Vec<NewEntryLine>) -> NewJournalEntry {
    NewJournalEntry {
        entry_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        entry_type: EntryType::Adjustment,
        description: "property".to_string(),
        reference: None,
        project_id: None,
        created_by: UserId::new(),
        lines,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* pair of debit/credit lines on known accounts with the same
    /// amount, the validated entry SHALL have equal totals.
    #[test]
    fn prop_validated_entries_are_balanced(
        pairs in prop::collection::vec((known_code(), known_code(), positive_amount()), 1..6),
    ) {
        let lines: Vec<NewEntryLine> = pairs
            .iter()
            .flat_map(|(dr, cr, amount)| {
                [NewEntryLine::debit(*dr, *amount), NewEntryLine::credit(*cr, *amount)]
            })
            .collect();
        let expected: Decimal = pairs.iter().map(|(_, _, a)| *a).sum();

        let validated = LedgerService::validate_entry(entry(lines), lookup, |_| None).unwrap();
        prop_assert_eq!(validated.totals.debit, expected);
        prop_assert_eq!(validated.totals.credit, expected);
    }

    /// *For any* balanced entry where one line names an unknown account, the
    /// whole entry SHALL be rejected and the offending line reported.
    #[test]
    fn prop_unknown_account_rejects_entry(
        amounts in prop::collection::vec(positive_amount(), 2..6),
        bad_index in any::<prop::sample::Index>(),
    ) {
        let mut lines: Vec<NewEntryLine> = amounts
            .iter()
            .flat_map(|a| [NewEntryLine::debit("572001", *a), NewEntryLine::credit("705000", *a)])
            .collect();
        let bad = bad_index.index(lines.len());
        lines[bad].account_code = "999999".to_string();

        let err = LedgerService::validate_entry(entry(lines), lookup, |_| None).unwrap_err();
        let is_expected = matches!(
            err,
            LedgerError::InvalidLine { line, reason: LineIssue::UnknownAccount(_) } if line == bad + 1
        );
        prop_assert!(is_expected, "unexpected error {:?}", err);
    }
}
