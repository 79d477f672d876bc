//! Property-based tests for PayrollService.
//!
//! - Withholding plus net always equals gross
//! - The accrual entry is always balanced
//! - Payments never exceed the pending amount

use chrono::Utc;
use partida_shared::PostingAccounts;
use partida_shared::types::{JournalEntryId, PersonId, RunId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::PayrollService;
use super::types::{CompensationRun, RunKind, RunStatus};
use crate::ledger::{LedgerError, validate_lines};

/// Gross amounts from 100.00 up, large enough that any rate below 100 leaves
/// a positive net.
fn gross_amount() -> impl Strategy<Value = Decimal> {
    (10_000i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Rates from 0 to 99.99 with up to two decimals.
fn irpf_rate() -> impl Strategy<Value = Decimal> {
    (0i64..10_000i64).prop_map(|bp| Decimal::new(bp, 2))
}

fn run_kind() -> impl Strategy<Value = RunKind> {
    prop_oneof![Just(RunKind::Payroll), Just(RunKind::PartnerCompensation)]
}

fn run_status() -> impl Strategy<Value = RunStatus> {
    prop_oneof![
        Just(RunStatus::Draft),
        Just(RunStatus::Posted),
        Just(RunStatus::Paid),
        Just(RunStatus::Cancelled),
    ]
}

fn posted_run(kind: RunKind, gross: Decimal, rate: Decimal) -> CompensationRun {
    let amounts = PayrollService::compute_amounts(gross, rate).unwrap();
    CompensationRun {
        id: RunId::new(),
        kind,
        run_number: "NOM-2026-0001".to_string(),
        period_year: 2026,
        period_month: 2,
        person_id: PersonId::new(),
        person_name: "Prop".to_string(),
        gross_amount: amounts.gross_amount,
        irpf_rate: amounts.irpf_rate,
        irpf_amount: amounts.irpf_amount,
        net_amount: amounts.net_amount,
        status: RunStatus::Posted,
        journal_entry_id: Some(JournalEntryId::new()),
        created_by: UserId::new(),
        created_at: Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* gross amount and rate, irpf_amount + net_amount SHALL equal
    /// gross_amount and both SHALL be cent-precise and non-negative.
    #[test]
    fn prop_withholding_plus_net_is_gross(gross in gross_amount(), rate in irpf_rate()) {
        let amounts = PayrollService::compute_amounts(gross, rate).unwrap();

        prop_assert_eq!(amounts.irpf_amount + amounts.net_amount, gross);
        prop_assert!(amounts.irpf_amount >= Decimal::ZERO);
        prop_assert!(amounts.net_amount > Decimal::ZERO);
        prop_assert!(amounts.irpf_amount.normalize().scale() <= 2);
    }

    /// *For any* run, the accrual entry SHALL be balanced with the gross
    /// amount on the debit side.
    #[test]
    fn prop_posting_entry_is_balanced(kind in run_kind(), gross in gross_amount(), rate in irpf_rate()) {
        let run = posted_run(kind, gross, rate);
        let entry = PayrollService::posting_entry(&run, &PostingAccounts::default(), UserId::new()).unwrap();

        let totals = validate_lines(&entry.lines).unwrap();
        prop_assert_eq!(totals.debit, gross);
        prop_assert_eq!(entry.entry_type, kind.entry_type());
    }

    /// *For any* sequence of payments, the accepted ones SHALL never sum past
    /// the net amount.
    #[test]
    fn prop_payments_never_exceed_net(
        gross in gross_amount(),
        rate in irpf_rate(),
        attempts in prop::collection::vec(1i64..50_000_000i64, 1..8),
    ) {
        let run = posted_run(RunKind::Payroll, gross, rate);
        let mut paid = Decimal::ZERO;

        for cents in attempts {
            let amount = Decimal::new(cents, 2);
            let mut view = PayrollService::view(run.clone(), &[]);
            view.paid_amount = paid;
            view.pending_amount = run.net_amount - paid;

            match PayrollService::validate_payment(&view, amount) {
                Ok(()) => paid += amount,
                Err(LedgerError::InsufficientPendingAmount { requested, pending }) => {
                    prop_assert!(requested > pending);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
            prop_assert!(paid <= run.net_amount);
        }
    }

    /// *For any* pair of statuses, transition SHALL succeed exactly when the
    /// state machine allows it.
    #[test]
    fn prop_transition_matches_state_machine(from in run_status(), to in run_status()) {
        let result = PayrollService::transition(from, to);
        prop_assert_eq!(result.is_ok(), from.can_transition_to(to));
        if let Err(err) = result {
            let is_invalid_transition = matches!(err, LedgerError::InvalidTransition { .. });
            prop_assert!(is_invalid_transition);
        }
    }
}
