//! Payroll service for run state transitions and postings.
//!
//! Stateless: every function takes the current run (and payments) and either
//! returns what to write or the error explaining why the change is illegal.

use partida_shared::PostingAccounts;
use partida_shared::types::money::{MAX_AMOUNT, Money, has_minor_unit_precision, within_max_amount};
use partida_shared::types::{JournalEntryId, RunId, UserId};
use rust_decimal::Decimal;

use super::types::{
    CompensationRun, NewRun, NewRunRequest, PaymentState, PayrollPayment, RunAmounts, RunStatus,
    RunView,
};
use crate::bank::{BankAccount, BankMovementService};
use crate::fiscal::PeriodKey;
use crate::ledger::{EntryReference, EntryType, LedgerError, NewEntryLine, NewJournalEntry};

/// What posting a run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostDecision {
    /// The run is a draft: create the accrual entry.
    Post,
    /// The run was already posted with this entry: nothing to write.
    AlreadyPosted(JournalEntryId),
}

/// Stateless service for run transitions.
pub struct PayrollService;

impl PayrollService {
    /// Computes withholding and net from gross and rate.
    ///
    /// `irpf_amount = gross × rate / 100` rounded to cents,
    /// `net_amount = gross − irpf_amount`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if gross is not positive, not cent-precise or
    /// above [`MAX_AMOUNT`], or the rate is outside `0..100` or has more than
    /// two decimals. A run always leaves a positive net to pay.
    pub fn compute_amounts(gross_amount: Decimal, irpf_rate: Decimal) -> Result<RunAmounts, LedgerError> {
        if gross_amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "gross amount must be greater than zero".to_string(),
            ));
        }
        if !has_minor_unit_precision(gross_amount) {
            return Err(LedgerError::Validation(
                "gross amount cannot have more than 2 decimals".to_string(),
            ));
        }
        if !within_max_amount(gross_amount) {
            return Err(LedgerError::Validation(format!(
                "gross amount cannot exceed {MAX_AMOUNT}"
            )));
        }
        if irpf_rate < Decimal::ZERO || irpf_rate >= Decimal::ONE_HUNDRED {
            return Err(LedgerError::Validation(format!(
                "IRPF rate must be at least 0 and below 100, got {irpf_rate}"
            )));
        }
        if !has_minor_unit_precision(irpf_rate) {
            return Err(LedgerError::Validation(format!(
                "IRPF rate cannot have more than 2 decimals, got {irpf_rate}"
            )));
        }

        let irpf_amount = Money::new(gross_amount).percent(irpf_rate).amount();
        let net_amount = gross_amount - irpf_amount;
        if net_amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "IRPF of {irpf_amount} leaves nothing to pay on a gross of {gross_amount}"
            )));
        }
        Ok(RunAmounts {
            gross_amount,
            irpf_rate,
            irpf_amount,
            net_amount,
        })
    }

    /// Validates a draft run request.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad period, a blank name or bad amounts.
    pub fn prepare_run(request: &NewRunRequest, created_by: UserId) -> Result<NewRun, LedgerError> {
        PeriodKey::new(request.period_year, request.period_month)?;
        let person_name = request.person_name.trim();
        if person_name.is_empty() {
            return Err(LedgerError::Validation("person name is required".to_string()));
        }
        let amounts = Self::compute_amounts(request.gross_amount, request.irpf_rate)?;

        Ok(NewRun {
            id: RunId::new(),
            kind: request.kind,
            period_year: request.period_year,
            period_month: request.period_month,
            person_id: request.person_id,
            person_name: person_name.to_string(),
            amounts,
            created_by,
        })
    }

    /// Validates a state transition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the state machine forbids it.
    pub fn transition(from: RunStatus, to: RunStatus) -> Result<(), LedgerError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(LedgerError::InvalidTransition { from, to })
        }
    }

    /// Decides what posting a run means given its current state.
    ///
    /// POSTED and PAID runs are already in the journal: posting again is an
    /// idempotent success.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a cancelled run.
    pub fn decide_post(run: &CompensationRun) -> Result<PostDecision, LedgerError> {
        match (run.status, run.journal_entry_id) {
            (RunStatus::Posted | RunStatus::Paid, Some(entry_id)) => Ok(PostDecision::AlreadyPosted(entry_id)),
            (status, _) => Self::transition(status, RunStatus::Posted).map(|()| PostDecision::Post),
        }
    }

    /// Validates cancelling a run: only drafts without an entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` otherwise.
    pub fn check_cancel(run: &CompensationRun) -> Result<(), LedgerError> {
        Self::transition(run.status, RunStatus::Cancelled)?;
        if run.journal_entry_id.is_some() {
            return Err(LedgerError::InvalidTransition {
                from: RunStatus::Posted,
                to: RunStatus::Cancelled,
            });
        }
        Ok(())
    }

    /// Validates deleting a run: only drafts.
    ///
    /// # Errors
    ///
    /// Returns `RunNotDeletable` otherwise.
    pub fn check_delete(run: &CompensationRun) -> Result<(), LedgerError> {
        if run.status == RunStatus::Draft {
            Ok(())
        } else {
            Err(LedgerError::RunNotDeletable(run.status))
        }
    }

    /// Builds the accrual entry: debit expense (gross), credit IRPF payable
    /// (withholding), credit payable to the person (net).
    ///
    /// Dated on the last day of the run's period.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the run period is malformed.
    pub fn posting_entry(
        run: &CompensationRun,
        posting: &PostingAccounts,
        created_by: UserId,
    ) -> Result<NewJournalEntry, LedgerError> {
        let period = PeriodKey::new(run.period_year, run.period_month)?;
        let kind = run.kind;

        let mut lines = vec![
            NewEntryLine::debit(kind.expense_account(posting), run.gross_amount)
                .with_description(format!("Bruto {}", run.person_name)),
        ];
        if !run.irpf_amount.is_zero() {
            lines.push(
                NewEntryLine::credit(&posting.irpf_payable, run.irpf_amount)
                    .with_description(format!("Retención IRPF {}%", run.irpf_rate.normalize())),
            );
        }
        if !run.net_amount.is_zero() {
            lines.push(
                NewEntryLine::credit(kind.payable_account(posting), run.net_amount)
                    .with_description(format!("Líquido {}", run.person_name)),
            );
        }

        Ok(NewJournalEntry {
            entry_date: period.end(),
            entry_type: kind.entry_type(),
            description: format!("{} {} {period}", run.run_number, run.person_name),
            reference: Some(EntryReference::new(kind.reference_type(), run.id)),
            project_id: None,
            created_by,
            lines,
        })
    }

    /// Sum of payments recorded against a run.
    #[must_use]
    pub fn paid_amount(payments: &[PayrollPayment]) -> Decimal {
        payments.iter().map(|p| p.amount).sum()
    }

    /// Builds the view of a run with its derived payment figures.
    #[must_use]
    pub fn view(run: CompensationRun, payments: &[PayrollPayment]) -> RunView {
        let paid_amount = Self::paid_amount(payments);
        let pending_amount = match run.status {
            RunStatus::Posted | RunStatus::Paid => run.net_amount - paid_amount,
            RunStatus::Draft | RunStatus::Cancelled => Decimal::ZERO,
        };
        let payment_state = if run.status == RunStatus::Paid || (pending_amount.is_zero() && !paid_amount.is_zero()) {
            PaymentState::Paid
        } else if paid_amount.is_zero() {
            PaymentState::Unpaid
        } else {
            PaymentState::Partial
        };

        RunView {
            run,
            paid_amount,
            pending_amount,
            payment_state,
        }
    }

    /// Validates a payment against the run's pending amount.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the run is POSTED, `Validation` for a
    /// bad amount, or `InsufficientPendingAmount` when it exceeds the pending
    /// amount.
    pub fn validate_payment(run: &RunView, amount: Decimal) -> Result<(), LedgerError> {
        if run.run.status != RunStatus::Posted {
            return Err(LedgerError::InvalidTransition {
                from: run.run.status,
                to: RunStatus::Paid,
            });
        }
        if amount <= Decimal::ZERO || !has_minor_unit_precision(amount) {
            return Err(LedgerError::Validation(format!(
                "payment amount must be a positive amount in cents, got {amount}"
            )));
        }
        if amount > run.pending_amount {
            return Err(LedgerError::InsufficientPendingAmount {
                requested: amount,
                pending: run.pending_amount,
            });
        }
        Ok(())
    }

    /// Builds the payment entry: debit the person's payable, credit the bank.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the bank has no ledger account.
    pub fn payment_entry(
        run: &CompensationRun,
        bank: &BankAccount,
        amount: Decimal,
        payment_date: chrono::NaiveDate,
        posting: &PostingAccounts,
        created_by: UserId,
    ) -> Result<NewJournalEntry, LedgerError> {
        let bank_code = BankMovementService::ledger_code(bank)?;

        Ok(NewJournalEntry {
            entry_date: payment_date,
            entry_type: EntryType::PaymentMade,
            description: format!("Pago {} {}", run.run_number, run.person_name),
            reference: Some(EntryReference::new(run.kind.reference_type(), run.id)),
            project_id: None,
            created_by,
            lines: vec![
                NewEntryLine::debit(run.kind.payable_account(posting), amount),
                NewEntryLine::credit(bank_code, amount),
            ],
        })
    }
}
