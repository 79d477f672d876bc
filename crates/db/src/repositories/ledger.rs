//! Postgres implementation of `LedgerStore`.
//!
//! Reads use plain `SeaORM` queries. Snapshots run in a read-only
//! `REPEATABLE READ` transaction so the chart and the lines come from one
//! point in time. Writes are described in [`super::unit_of_work`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use chrono::Utc;
use partida_core::bank::BankAccount;
use partida_core::chart::Account;
use partida_core::engine::{
    CommitReceipt, Guard, LedgerSnapshot, LedgerStore, LineRange, StoreError, StoreResult, UnitOfWork,
};
use partida_core::fiscal::Period;
use partida_core::ledger::{EntryFilter, JournalEntry, JournalEntryLine, LedgerLine, ThirdParty, run_number};
use partida_core::payroll::{CompensationRun, NewRun, PayrollPayment, RunFilter, RunStatus};
use partida_shared::types::{BankAccountId, JournalEntryId, RunId, ThirdPartyId};
use sea_orm::sea_query::{Expr, OnConflict, Query, SimpleExpr};
use sea_orm::{
    AccessMode, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::convert;
use super::error::PgStoreError;
use crate::entities::{
    accounting_periods, accounts, bank_accounts, compensation_runs, journal_entries, journal_entry_lines,
    payroll_payments, third_parties,
};

const NEXT_SEQUENCE_SQL: &str = r"
INSERT INTO entry_sequences (scope, last_value) VALUES ($1, 1)
ON CONFLICT (scope) DO UPDATE SET last_value = entry_sequences.last_value + 1
RETURNING last_value
";

/// Allocates the next number of a sequence scope inside the caller's
/// transaction. The counter row stays locked until that transaction ends.
pub(crate) async fn next_sequence<C: ConnectionTrait>(conn: &C, scope: &str) -> Result<u64, PgStoreError> {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            NEXT_SEQUENCE_SQL,
            [scope.into()],
        ))
        .await?
        .ok_or_else(|| PgStoreError::corrupt("entry_sequences", format!("no counter for {scope}")))?;
    let value: i64 = row.try_get("", "last_value")?;
    u64::try_from(value).map_err(|_| PgStoreError::corrupt("entry_sequences", format!("negative counter {value}")))
}

/// Ledger store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pub(crate) db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a new Postgres ledger store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn accounts(&self) -> Result<Vec<Account>, PgStoreError> {
        accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::account)
            .collect()
    }

    async fn account(&self, code: &str) -> Result<Option<Account>, PgStoreError> {
        accounts::Entity::find_by_id(code.to_string())
            .one(&self.db)
            .await?
            .map(convert::account)
            .transpose()
    }

    async fn create_account(&self, account: &Account) -> Result<bool, PgStoreError> {
        let now = Utc::now().into();
        let model = accounts::ActiveModel {
            code: Set(account.code.clone()),
            name: Set(account.name.clone()),
            account_type: Set(account.account_type.as_str().to_string()),
            is_active: Set(account.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = accounts::Entity::insert(model)
            .on_conflict(OnConflict::column(accounts::Column::Code).do_nothing().to_owned())
            .exec_without_returning(&self.db)
            .await?;
        Ok(inserted == 1)
    }

    /// Rewrites an account. With `unreferenced_only` the row is locked and
    /// the reference check runs in the same transaction, so a concurrent
    /// first posting (which holds the row `FOR SHARE`) either commits first
    /// and is seen, or waits for this update.
    async fn save_account(&self, account: &Account, unreferenced_only: bool) -> Result<bool, PgStoreError> {
        let txn = self.db.begin().await?;
        let current = accounts::Entity::find_by_id(account.code.clone())
            .lock_exclusive()
            .one(&txn)
            .await?;
        if current.is_none() {
            return Err(StoreError::Conflict(format!("account {} was removed", account.code)).into());
        }
        if unreferenced_only && is_referenced(&txn, &account.code).await? {
            txn.rollback().await?;
            return Ok(false);
        }

        accounts::Entity::update_many()
            .col_expr(accounts::Column::Name, Expr::value(account.name.clone()))
            .col_expr(accounts::Column::AccountType, Expr::value(account.account_type.as_str()))
            .col_expr(accounts::Column::IsActive, Expr::value(account.is_active))
            .col_expr(accounts::Column::UpdatedAt, SimpleExpr::from(Expr::current_timestamp()))
            .filter(accounts::Column::Code.eq(account.code.as_str()))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn third_parties(&self) -> Result<Vec<ThirdParty>, PgStoreError> {
        third_parties::Entity::find()
            .order_by_asc(third_parties::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::third_party)
            .collect()
    }

    async fn third_party(&self, id: ThirdPartyId) -> Result<Option<ThirdParty>, PgStoreError> {
        third_parties::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .map(convert::third_party)
            .transpose()
    }

    async fn save_third_party(&self, party: &ThirdParty) -> Result<(), PgStoreError> {
        let now = Utc::now().into();
        let model = third_parties::ActiveModel {
            id: Set(party.id.into_inner()),
            party_type: Set(party.party_type.as_str().to_string()),
            name: Set(party.name.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        third_parties::Entity::insert(model)
            .on_conflict(
                OnConflict::column(third_parties::Column::Id)
                    .update_columns([third_parties::Column::Name, third_parties::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn bank_accounts(&self) -> Result<Vec<BankAccount>, PgStoreError> {
        Ok(bank_accounts::Entity::find()
            .order_by_asc(bank_accounts::Column::CreatedAt)
            .order_by_asc(bank_accounts::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::bank_account)
            .collect())
    }

    async fn bank_account(&self, id: BankAccountId) -> Result<Option<BankAccount>, PgStoreError> {
        Ok(bank_accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .map(convert::bank_account))
    }

    async fn create_bank_account(&self, bank: &BankAccount, ledger_account: Option<&Account>) -> Result<(), PgStoreError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().into();

        if let Some(account) = ledger_account {
            accounts::ActiveModel {
                code: Set(account.code.clone()),
                name: Set(account.name.clone()),
                account_type: Set(account.account_type.as_str().to_string()),
                is_active: Set(account.is_active),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        bank_accounts::ActiveModel {
            id: Set(bank.id.into_inner()),
            holder: Set(bank.holder.clone()),
            bank: Set(bank.bank.clone()),
            iban: Set(bank.iban.clone()),
            account_code: Set(bank.account_code.clone()),
            created_at: Set(bank.created_at.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, PgStoreError> {
        journal_entries::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .map(convert::entry)
            .transpose()
    }

    async fn entries(&self, filter: &EntryFilter) -> Result<Vec<JournalEntry>, PgStoreError> {
        let mut query = journal_entries::Entity::find();
        if let Some(from) = filter.from {
            query = query.filter(journal_entries::Column::EntryDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(journal_entries::Column::EntryDate.lte(to));
        }
        if !filter.entry_types.is_empty() {
            query = query.filter(journal_entries::Column::EntryType.is_in(filter.entry_types.iter().map(|t| t.as_str())));
        }
        if let Some(reference) = &filter.reference {
            query = query
                .filter(journal_entries::Column::ReferenceType.eq(reference.reference_type.as_str()))
                .filter(journal_entries::Column::ReferenceId.eq(reference.reference_id.as_str()));
        }
        if let Some(project) = filter.project_id {
            query = query.filter(journal_entries::Column::ProjectId.eq(project.into_inner()));
        }
        if let Some(locked) = filter.locked {
            query = query.filter(journal_entries::Column::IsLocked.eq(locked));
        }
        if let Some(code) = &filter.account_code {
            query = query.filter(
                journal_entries::Column::Id.in_subquery(
                    Query::select()
                        .column(journal_entry_lines::Column::EntryId)
                        .from(journal_entry_lines::Entity)
                        .and_where(journal_entry_lines::Column::AccountCode.eq(code.as_str()))
                        .to_owned(),
                ),
            );
        }
        if let Some(party) = filter.third_party_id {
            query = query.filter(
                journal_entries::Column::Id.in_subquery(
                    Query::select()
                        .column(journal_entry_lines::Column::EntryId)
                        .from(journal_entry_lines::Entity)
                        .and_where(journal_entry_lines::Column::ThirdPartyId.eq(party.into_inner()))
                        .to_owned(),
                ),
            );
        }

        query
            .order_by_asc(journal_entries::Column::EntryDate)
            .order_by_asc(journal_entries::Column::EntryNumber)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::entry)
            .collect()
    }

    async fn lines(&self, id: JournalEntryId) -> Result<Vec<JournalEntryLine>, PgStoreError> {
        journal_entry_lines::Entity::find()
            .filter(journal_entry_lines::Column::EntryId.eq(id.into_inner()))
            .order_by_asc(journal_entry_lines::Column::LineOrder)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::line)
            .collect()
    }

    async fn read_snapshot(&self, range: LineRange) -> Result<LedgerSnapshot, PgStoreError> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly))
            .await?;

        let accounts = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&txn)
            .await?
            .into_iter()
            .map(convert::account)
            .collect::<Result<Vec<_>, _>>()?;
        let third_parties = third_parties::Entity::find()
            .all(&txn)
            .await?
            .into_iter()
            .map(convert::third_party)
            .collect::<Result<Vec<_>, _>>()?;

        let mut query = journal_entry_lines::Entity::find().find_also_related(journal_entries::Entity);
        if let Some(from) = range.from {
            query = query.filter(journal_entries::Column::EntryDate.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(journal_entries::Column::EntryDate.lte(to));
        }
        let rows = query
            .order_by_asc(journal_entries::Column::EntryDate)
            .order_by_asc(journal_entries::Column::EntryNumber)
            .order_by_asc(journal_entry_lines::Column::LineOrder)
            .all(&txn)
            .await?;
        txn.commit().await?;

        let mut headers: HashMap<Uuid, JournalEntry> = HashMap::new();
        let mut lines = Vec::with_capacity(rows.len());
        for (line, header) in rows {
            let header = header.ok_or_else(|| PgStoreError::corrupt("journal_entry_lines", "line without entry"))?;
            let entry = match headers.entry(header.id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => slot.insert(convert::entry(header)?),
            };
            lines.push(LedgerLine::from_parts(entry, &convert::line(line)?));
        }
        debug!(lines = lines.len(), from = ?range.from, to = ?range.to, "snapshot read");

        Ok(LedgerSnapshot {
            accounts,
            third_parties,
            lines,
        })
    }

    async fn run(&self, id: RunId) -> Result<Option<CompensationRun>, PgStoreError> {
        compensation_runs::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .map(convert::run)
            .transpose()
    }

    async fn runs(&self, filter: &RunFilter) -> Result<Vec<CompensationRun>, PgStoreError> {
        let mut query = compensation_runs::Entity::find();
        if let Some(kind) = filter.kind {
            query = query.filter(compensation_runs::Column::Kind.eq(kind.as_str()));
        }
        if let Some(year) = filter.year {
            query = query.filter(compensation_runs::Column::PeriodYear.eq(year));
        }
        if let Some(status) = filter.status {
            query = query.filter(compensation_runs::Column::Status.eq(status.as_str()));
        }
        query
            .order_by_desc(compensation_runs::Column::PeriodYear)
            .order_by_desc(compensation_runs::Column::PeriodMonth)
            .order_by_asc(compensation_runs::Column::RunNumber)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::run)
            .collect()
    }

    async fn create_run(&self, run: NewRun) -> Result<CompensationRun, PgStoreError> {
        let txn = self.db.begin().await?;
        let prefix = run.kind.number_prefix();
        let seq = next_sequence(&txn, &format!("{prefix}:{}", run.period_year)).await?;
        let now = Utc::now().into();

        let model = compensation_runs::ActiveModel {
            id: Set(run.id.into_inner()),
            kind: Set(run.kind.as_str().to_string()),
            run_number: Set(run_number(prefix, run.period_year, seq)),
            period_year: Set(run.period_year),
            period_month: Set(convert::month_value(run.period_month)?),
            person_id: Set(run.person_id.into_inner()),
            person_name: Set(run.person_name),
            gross_amount: Set(run.amounts.gross_amount),
            irpf_rate: Set(run.amounts.irpf_rate),
            irpf_amount: Set(run.amounts.irpf_amount),
            net_amount: Set(run.amounts.net_amount),
            status: Set(RunStatus::Draft.as_str().to_string()),
            journal_entry_id: Set(None),
            created_by: Set(run.created_by.into_inner()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        convert::run(model)
    }

    async fn remove_run(&self, id: RunId, expected: RunStatus) -> Result<(), PgStoreError> {
        let txn = self.db.begin().await?;
        let current = compensation_runs::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await?;
        if current.is_none_or(|run| run.status != expected.as_str()) {
            return Err(StoreError::GuardFailed(Guard::RunStatus { run: id, expected }).into());
        }
        compensation_runs::Entity::delete_by_id(id.into_inner()).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn payments(&self, run: RunId) -> Result<Vec<PayrollPayment>, PgStoreError> {
        let Some(owner) = self.run(run).await? else {
            return Ok(Vec::new());
        };
        payroll_payments::Entity::find()
            .filter(payroll_payments::Column::RunId.eq(run.into_inner()))
            .order_by_asc(payroll_payments::Column::PaymentDate)
            .order_by_asc(payroll_payments::Column::PaymentNumber)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| convert::payment(p, owner.kind))
            .collect()
    }

    async fn periods(&self) -> Result<Vec<Period>, PgStoreError> {
        accounting_periods::Entity::find()
            .order_by_asc(accounting_periods::Column::Year)
            .order_by_asc(accounting_periods::Column::Month)
            .all(&self.db)
            .await?
            .into_iter()
            .map(convert::period)
            .collect()
    }
}

/// True if a journal line or a bank account uses the account code.
async fn is_referenced(txn: &DatabaseTransaction, code: &str) -> Result<bool, PgStoreError> {
    let line = journal_entry_lines::Entity::find()
        .filter(journal_entry_lines::Column::AccountCode.eq(code))
        .one(txn)
        .await?;
    if line.is_some() {
        return Ok(true);
    }
    let bank = bank_accounts::Entity::find()
        .filter(bank_accounts::Column::AccountCode.eq(code))
        .one(txn)
        .await?;
    Ok(bank.is_some())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(self.accounts().await?)
    }

    async fn get_account(&self, code: &str) -> StoreResult<Option<Account>> {
        Ok(self.account(code).await?)
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<bool> {
        Ok(self.create_account(account).await?)
    }

    async fn update_account(&self, account: &Account, unreferenced_only: bool) -> StoreResult<bool> {
        Ok(self.save_account(account, unreferenced_only).await?)
    }

    async fn list_third_parties(&self) -> StoreResult<Vec<ThirdParty>> {
        Ok(self.third_parties().await?)
    }

    async fn get_third_party(&self, id: ThirdPartyId) -> StoreResult<Option<ThirdParty>> {
        Ok(self.third_party(id).await?)
    }

    async fn upsert_third_party(&self, party: &ThirdParty) -> StoreResult<()> {
        Ok(self.save_third_party(party).await?)
    }

    async fn list_bank_accounts(&self) -> StoreResult<Vec<BankAccount>> {
        Ok(self.bank_accounts().await?)
    }

    async fn get_bank_account(&self, id: BankAccountId) -> StoreResult<Option<BankAccount>> {
        Ok(self.bank_account(id).await?)
    }

    async fn insert_bank_account(&self, bank: &BankAccount, ledger_account: Option<&Account>) -> StoreResult<()> {
        Ok(self.create_bank_account(bank, ledger_account).await?)
    }

    async fn get_entry(&self, id: JournalEntryId) -> StoreResult<Option<JournalEntry>> {
        Ok(self.entry(id).await?)
    }

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>> {
        Ok(self.entries(filter).await?)
    }

    async fn entry_lines(&self, id: JournalEntryId) -> StoreResult<Vec<JournalEntryLine>> {
        Ok(self.lines(id).await?)
    }

    async fn snapshot(&self, range: LineRange) -> StoreResult<LedgerSnapshot> {
        Ok(self.read_snapshot(range).await?)
    }

    async fn get_run(&self, id: RunId) -> StoreResult<Option<CompensationRun>> {
        Ok(self.run(id).await?)
    }

    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<CompensationRun>> {
        Ok(self.runs(filter).await?)
    }

    async fn insert_run(&self, run: NewRun) -> StoreResult<CompensationRun> {
        Ok(self.create_run(run).await?)
    }

    async fn delete_run(&self, id: RunId, expected: RunStatus) -> StoreResult<()> {
        Ok(self.remove_run(id, expected).await?)
    }

    async fn list_payments(&self, run: RunId) -> StoreResult<Vec<PayrollPayment>> {
        Ok(self.payments(run).await?)
    }

    async fn list_periods(&self) -> StoreResult<Vec<Period>> {
        Ok(self.periods().await?)
    }

    async fn commit(&self, work: UnitOfWork) -> StoreResult<CommitReceipt> {
        Ok(self.apply(work).await?)
    }
}
