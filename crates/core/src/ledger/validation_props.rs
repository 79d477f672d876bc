//! Property-based tests for journal line validation.
//!
//! - Balanced, well-formed line sets are always accepted
//! - Any set whose debits and credits differ is rejected with the exact delta

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::{LedgerError, LineIssue};
use super::types::NewEntryLine;
use super::validation::validate_lines;

/// Strategy to generate a positive cent amount (0.01 to 100,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate one side of an entry: 1 to 5 positive amounts.
fn amounts() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(positive_amount(), 1..5)
}

/// Splits `total` into the given debit amounts plus a balancing remainder.
fn balanced_lines(debits: &[Decimal], extra_credit_lines: usize) -> Vec<NewEntryLine> {
    let total: Decimal = debits.iter().copied().sum();
    let mut lines: Vec<NewEntryLine> = debits
        .iter()
        .map(|amount| NewEntryLine::debit("572001", *amount))
        .collect();

    // spread the total over credit lines, putting the remainder on the last one
    let parts = Decimal::from(extra_credit_lines + 1);
    let share = (total / parts).round_dp(2);
    let mut remaining = total;
    for _ in 0..extra_credit_lines {
        if share > Decimal::ZERO && remaining > share {
            lines.push(NewEntryLine::credit("705000", share));
            remaining -= share;
        }
    }
    lines.push(NewEntryLine::credit("705000", remaining));
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* balanced set of well-formed lines, validation SHALL accept it
    /// and report equal totals.
    #[test]
    fn prop_balanced_lines_accepted(
        debits in amounts(),
        extra in 0usize..4,
    ) {
        let lines = balanced_lines(&debits, extra);
        let totals = validate_lines(&lines);
        prop_assert!(totals.is_ok(), "balanced lines rejected: {:?}", totals);
        let totals = totals.unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
    }

    /// *For any* debit and credit sides with different sums, validation SHALL
    /// reject with `UnbalancedEntry` carrying `delta = debit - credit`.
    #[test]
    fn prop_unbalanced_lines_rejected_with_delta(
        debits in amounts(),
        credits in amounts(),
    ) {
        let debit_total: Decimal = debits.iter().copied().sum();
        let credit_total: Decimal = credits.iter().copied().sum();
        prop_assume!(debit_total != credit_total);

        let lines: Vec<NewEntryLine> = debits
            .iter()
            .map(|a| NewEntryLine::debit("572001", *a))
            .chain(credits.iter().map(|a| NewEntryLine::credit("705000", *a)))
            .collect();

        match validate_lines(&lines) {
            Err(LedgerError::UnbalancedEntry { debit, credit, delta }) => {
                prop_assert_eq!(debit, debit_total);
                prop_assert_eq!(credit, credit_total);
                prop_assert_eq!(delta, debit_total - credit_total);
            }
            other => prop_assert!(false, "expected UnbalancedEntry, got {:?}", other),
        }
    }

    /// *For any* otherwise balanced entry, a single negative line SHALL be
    /// rejected before balance is considered.
    #[test]
    fn prop_negative_line_rejected(
        amount in positive_amount(),
    ) {
        let lines = vec![
            NewEntryLine::debit("572001", -amount),
            NewEntryLine::credit("705000", -amount),
        ];
        prop_assert!(matches!(
            validate_lines(&lines),
            Err(LedgerError::InvalidLine { line: 1, reason: LineIssue::NegativeAmount })
        ),
            "expected InvalidLine NegativeAmount on line 1"
        );
    }

    /// *For any* amount with sub-cent precision, validation SHALL reject it.
    #[test]
    fn prop_sub_cent_rejected(
        mills in 1i64..10_000_000i64,
    ) {
        prop_assume!(mills % 10 != 0);
        let amount = Decimal::new(mills, 3);
        let lines = vec![
            NewEntryLine::debit("572001", amount),
            NewEntryLine::credit("705000", amount),
        ];
        prop_assert!(matches!(
            validate_lines(&lines),
            Err(LedgerError::InvalidLine { reason: LineIssue::SubCentPrecision, .. })
        ),
            "expected InvalidLine SubCentPrecision"
        );
    }
}
