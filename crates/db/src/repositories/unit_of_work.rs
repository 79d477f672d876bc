//! Atomic application of a [`UnitOfWork`] in one Postgres transaction.
//!
//! Lock order inside the transaction:
//! 1. accounting period rows (`FOR SHARE`, `FOR UPDATE` when closing)
//! 2. run rows (`FOR UPDATE`)
//! 3. account rows (`FOR UPDATE` for balance guards, `FOR SHARE` for posted lines)
//! 4. sequence counter rows (implicitly, by the upsert)
//!
//! Any error drops the transaction, which rolls back every write including
//! the number allocations.

use chrono::{DateTime, Datelike, Utc};
use partida_core::engine::{CommitReceipt, Guard, StagedEntry, StoreError, UnitOfWork};
use partida_core::fiscal::{Period, PeriodKey};
use partida_core::ledger::{JournalEntry, JournalEntryLine, entry_number, payment_number};
use partida_core::payroll::{CompensationRun, NewPayment, PayrollPayment, RunStatus};
use partida_shared::types::{JournalEntryId, RunId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait, QueryFilter,
    QuerySelect, Set, Statement, TransactionTrait,
};
use tracing::debug;

use super::convert;
use super::error::PgStoreError;
use super::ledger::{PgLedgerStore, next_sequence};
use crate::entities::{
    accounting_periods, accounts, compensation_runs, journal_entries, journal_entry_lines, payroll_payments,
};

const ENSURE_PERIOD_SQL: &str = r"
INSERT INTO accounting_periods (year, month, is_closed) VALUES ($1, $2, false)
ON CONFLICT (year, month) DO NOTHING
";

const CLOSE_PERIOD_SQL: &str = r"
INSERT INTO accounting_periods (year, month, is_closed, closed_at) VALUES ($1, $2, true, $3)
ON CONFLICT (year, month) DO UPDATE SET is_closed = true, closed_at = EXCLUDED.closed_at
";

const ACCOUNT_NET_SQL: &str = r"
SELECT COALESCE(SUM(l.debit_amount - l.credit_amount), 0) AS net
FROM journal_entry_lines l
JOIN journal_entries e ON e.id = l.entry_id
WHERE l.account_code = $1 AND e.entry_date <= $2
";

const RUN_PAID_SQL: &str = r"
SELECT COALESCE(SUM(amount), 0) AS paid FROM payroll_payments WHERE run_id = $1
";

fn guard_failed(guard: &Guard) -> PgStoreError {
    StoreError::GuardFailed(guard.clone()).into()
}

impl PgLedgerStore {
    pub(crate) async fn apply(&self, work: UnitOfWork) -> Result<CommitReceipt, PgStoreError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();
        let mut receipt = CommitReceipt::default();

        for guard in &work.guards {
            check_guard(&txn, guard, work.close_period).await?;
        }

        if let Some(staged) = &work.entry {
            let (entry, lines) = insert_entry(&txn, staged, now).await?;
            receipt.entry = Some(entry);
            receipt.lines = lines;
        }

        if let Some(id) = work.lock_entry {
            if lock_entry(&txn, id).await? {
                receipt.locked_entries.push(id);
            }
        }

        let mut run = match work.run_update {
            Some(update) => {
                let mut run = load_run(&txn, update.run).await?;
                run.status = update.status;
                if update.journal_entry_id.is_some() {
                    run.journal_entry_id = update.journal_entry_id;
                }
                save_run(&txn, &run).await?;
                Some(run)
            }
            None => None,
        };

        if let Some(new_payment) = &work.payment {
            let current = match run.take() {
                Some(r) if r.id == new_payment.run_id => r,
                Some(other) => {
                    return Err(StoreError::Conflict(format!(
                        "unit of work updates run {} but pays run {}",
                        other.id, new_payment.run_id
                    ))
                    .into());
                }
                None => load_run(&txn, new_payment.run_id).await?,
            };
            let (payment, paid_run) = insert_payment(&txn, new_payment, current, now).await?;
            receipt.payment = Some(payment);
            run = Some(paid_run);
        }

        if let Some(key) = work.close_period {
            receipt.locked_entries.extend(lock_period_entries(&txn, key).await?);
            receipt.closed_period = Some(close_period(&txn, key, now).await?);
        }

        txn.commit().await?;
        receipt.run = run;
        debug!(
            entry = ?receipt.entry.as_ref().map(|e| &e.entry_number),
            locked = receipt.locked_entries.len(),
            "unit of work committed"
        );
        Ok(receipt)
    }
}

async fn check_guard(
    txn: &DatabaseTransaction,
    guard: &Guard,
    closing: Option<PeriodKey>,
) -> Result<(), PgStoreError> {
    let holds = match guard {
        Guard::PeriodOpen(date) => {
            let key = PeriodKey::of(*date);
            let period = lock_period(txn, key, closing == Some(key)).await?;
            !period.is_closed
        }
        Guard::RunStatus { run, expected } => {
            let current = compensation_runs::Entity::find_by_id(run.into_inner())
                .lock_exclusive()
                .one(txn)
                .await?;
            current.is_some_and(|r| r.status == expected.as_str())
        }
        Guard::PendingCovers { run, amount } => {
            let current = compensation_runs::Entity::find_by_id(run.into_inner())
                .lock_exclusive()
                .one(txn)
                .await?;
            match current {
                Some(r) => run_paid(txn, *run).await? + *amount <= r.net_amount,
                None => false,
            }
        }
        Guard::AccountBalance { code, as_of, expected } => {
            accounts::Entity::find_by_id(code.clone())
                .lock_exclusive()
                .one(txn)
                .await?;
            let row = txn
                .query_one(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    ACCOUNT_NET_SQL,
                    [code.as_str().into(), (*as_of).into()],
                ))
                .await?
                .ok_or_else(|| PgStoreError::corrupt("journal_entry_lines", "net query returned no row"))?;
            let net: Decimal = row.try_get("", "net")?;
            net == *expected
        }
    };
    if holds { Ok(()) } else { Err(guard_failed(guard)) }
}

/// Locks the period row, creating it open if it was never recorded.
async fn lock_period(
    txn: &DatabaseTransaction,
    key: PeriodKey,
    exclusive: bool,
) -> Result<accounting_periods::Model, PgStoreError> {
    let month = convert::month_value(key.month)?;
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        ENSURE_PERIOD_SQL,
        [key.year.into(), month.into()],
    ))
    .await?;

    let query = accounting_periods::Entity::find_by_id((key.year, month));
    let query = if exclusive { query.lock_exclusive() } else { query.lock_shared() };
    query
        .one(txn)
        .await?
        .ok_or_else(|| PgStoreError::corrupt("accounting_periods", format!("period {key} vanished")))
}

async fn run_paid(txn: &DatabaseTransaction, run: RunId) -> Result<Decimal, PgStoreError> {
    let row = txn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            RUN_PAID_SQL,
            [run.into_inner().into()],
        ))
        .await?
        .ok_or_else(|| PgStoreError::corrupt("payroll_payments", "sum query returned no row"))?;
    Ok(row.try_get("", "paid")?)
}

async fn insert_entry(
    txn: &DatabaseTransaction,
    staged: &StagedEntry,
    now: DateTime<Utc>,
) -> Result<(JournalEntry, Vec<JournalEntryLine>), PgStoreError> {
    let validated = &staged.entry;
    let input = &validated.entry;

    // Posted lines pin their accounts against concurrent balance guards.
    let mut codes: Vec<&str> = input.lines.iter().map(|l| l.account_code.as_str()).collect();
    codes.sort_unstable();
    codes.dedup();
    accounts::Entity::find()
        .filter(accounts::Column::Code.is_in(codes))
        .lock_shared()
        .all(txn)
        .await?;

    let year = validated.fiscal_year();
    let seq = next_sequence(txn, &format!("entry:{year}")).await?;
    let entry = JournalEntry {
        id: validated.id,
        entry_number: entry_number(year, seq),
        entry_date: input.entry_date,
        entry_type: input.entry_type,
        description: input.description.clone(),
        reference: input.reference.clone(),
        project_id: input.project_id,
        total_amount: validated.totals.debit,
        is_locked: staged.lock,
        created_by: input.created_by,
        created_at: now,
    };

    // Lines go in while the header is unlocked; locking comes last.
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        entry_number: Set(entry.entry_number.clone()),
        entry_date: Set(entry.entry_date),
        entry_type: Set(entry.entry_type.as_str().to_string()),
        description: Set(entry.description.clone()),
        reference_type: Set(entry.reference.as_ref().map(|r| r.reference_type.clone())),
        reference_id: Set(entry.reference.as_ref().map(|r| r.reference_id.clone())),
        project_id: Set(entry.project_id.map(|p| p.into_inner())),
        total_amount: Set(entry.total_amount),
        is_locked: Set(false),
        created_by: Set(entry.created_by.into_inner()),
        created_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    let lines: Vec<JournalEntryLine> = input
        .lines
        .iter()
        .zip(1..)
        .map(|(line, line_order)| JournalEntryLine {
            entry_id: entry.id,
            line_order,
            account_code: line.account_code.clone(),
            debit_amount: line.debit,
            credit_amount: line.credit,
            description: line.description.clone(),
            third_party_id: line.third_party_id,
            third_party_type: line.third_party_type,
        })
        .collect();

    journal_entry_lines::Entity::insert_many(lines.iter().map(|line| journal_entry_lines::ActiveModel {
        entry_id: Set(line.entry_id.into_inner()),
        line_order: Set(line.line_order),
        account_code: Set(line.account_code.clone()),
        debit_amount: Set(line.debit_amount),
        credit_amount: Set(line.credit_amount),
        description: Set(line.description.clone()),
        third_party_id: Set(line.third_party_id.map(|id| id.into_inner())),
        third_party_type: Set(line.third_party_type.map(|t| t.as_str().to_string())),
    }))
    .exec_without_returning(txn)
    .await?;

    if staged.lock {
        lock_entry(txn, entry.id).await?;
    }

    Ok((entry, lines))
}

/// Locks an entry. Returns false if it was already locked.
async fn lock_entry(txn: &DatabaseTransaction, id: JournalEntryId) -> Result<bool, PgStoreError> {
    let result = journal_entries::Entity::update_many()
        .col_expr(journal_entries::Column::IsLocked, Expr::value(true))
        .filter(journal_entries::Column::Id.eq(id.into_inner()))
        .filter(journal_entries::Column::IsLocked.eq(false))
        .exec(txn)
        .await?;
    if result.rows_affected == 1 {
        return Ok(true);
    }
    match journal_entries::Entity::find_by_id(id.into_inner()).one(txn).await? {
        Some(_) => Ok(false),
        None => Err(StoreError::Conflict(format!("entry {id} does not exist")).into()),
    }
}

async fn load_run(txn: &DatabaseTransaction, id: RunId) -> Result<CompensationRun, PgStoreError> {
    let model = compensation_runs::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| PgStoreError::from(StoreError::Conflict(format!("run {id} does not exist"))))?;
    convert::run(model)
}

async fn save_run(txn: &DatabaseTransaction, run: &CompensationRun) -> Result<(), PgStoreError> {
    compensation_runs::Entity::update_many()
        .col_expr(compensation_runs::Column::Status, Expr::value(run.status.as_str()))
        .col_expr(
            compensation_runs::Column::JournalEntryId,
            Expr::value(run.journal_entry_id.map(|id| id.into_inner())),
        )
        .col_expr(compensation_runs::Column::UpdatedAt, SimpleExpr::from(Expr::current_timestamp()))
        .filter(compensation_runs::Column::Id.eq(run.id.into_inner()))
        .exec(txn)
        .await?;
    Ok(())
}

async fn insert_payment(
    txn: &DatabaseTransaction,
    new_payment: &NewPayment,
    mut run: CompensationRun,
    now: DateTime<Utc>,
) -> Result<(PayrollPayment, CompensationRun), PgStoreError> {
    let already_paid = run_paid(txn, run.id).await?;
    let year = new_payment.payment_date.year();
    let seq = next_sequence(txn, &format!("PAG:{year}")).await?;

    let payment = PayrollPayment {
        id: new_payment.id,
        payment_number: payment_number(year, seq),
        run_id: new_payment.run_id,
        run_kind: run.kind,
        amount: new_payment.amount,
        payment_date: new_payment.payment_date,
        payment_method: new_payment.payment_method,
        bank_account_id: new_payment.bank_account_id,
        journal_entry_id: new_payment.journal_entry_id,
        created_by: new_payment.created_by,
        created_at: now,
    };

    payroll_payments::ActiveModel {
        id: Set(payment.id.into_inner()),
        payment_number: Set(payment.payment_number.clone()),
        run_id: Set(payment.run_id.into_inner()),
        amount: Set(payment.amount),
        payment_date: Set(payment.payment_date),
        payment_method: Set(payment.payment_method.as_str().to_string()),
        bank_account_id: Set(payment.bank_account_id.into_inner()),
        journal_entry_id: Set(payment.journal_entry_id.into_inner()),
        created_by: Set(payment.created_by.into_inner()),
        created_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    if already_paid + payment.amount >= run.net_amount {
        run.status = RunStatus::Paid;
        save_run(txn, &run).await?;
    }
    Ok((payment, run))
}

async fn lock_period_entries(txn: &DatabaseTransaction, key: PeriodKey) -> Result<Vec<JournalEntryId>, PgStoreError> {
    let locked = journal_entries::Entity::update_many()
        .col_expr(journal_entries::Column::IsLocked, Expr::value(true))
        .filter(journal_entries::Column::EntryDate.between(key.start(), key.end()))
        .filter(journal_entries::Column::IsLocked.eq(false))
        .exec_with_returning(txn)
        .await?;
    Ok(locked.into_iter().map(|e| JournalEntryId::from_uuid(e.id)).collect())
}

async fn close_period(txn: &DatabaseTransaction, key: PeriodKey, now: DateTime<Utc>) -> Result<Period, PgStoreError> {
    let month = convert::month_value(key.month)?;
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        CLOSE_PERIOD_SQL,
        [key.year.into(), month.into(), now.into()],
    ))
    .await?;
    let model = accounting_periods::Entity::find_by_id((key.year, month))
        .one(txn)
        .await?
        .ok_or_else(|| PgStoreError::corrupt("accounting_periods", format!("period {key} vanished")))?;
    convert::period(model)
}
