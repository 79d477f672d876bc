//! In-memory [`LedgerStore`].
//!
//! All state sits behind one `RwLock`; `commit` holds the write lock for the
//! whole unit of work, which serializes writers the way a serializable
//! transaction would. Readers always see fully applied commits.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use partida_shared::types::{BankAccountId, JournalEntryId, RunId, ThirdPartyId};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::store::{
    CommitReceipt, Guard, LedgerSnapshot, LedgerStore, LineRange, StoreError, StoreResult,
    UnitOfWork,
};
use crate::bank::BankAccount;
use crate::chart::Account;
use crate::fiscal::{Period, PeriodKey};
use crate::ledger::{
    EntryFilter, JournalEntry, JournalEntryLine, LedgerLine, ThirdParty, entry_number, payment_number,
    run_number,
};
use crate::payroll::{CompensationRun, NewRun, PayrollPayment, RunFilter, RunStatus};

const FAULT_DISARMED: usize = usize::MAX;

#[derive(Debug, Default, Clone)]
struct State {
    accounts: BTreeMap<String, Account>,
    third_parties: BTreeMap<ThirdPartyId, ThirdParty>,
    banks: BTreeMap<BankAccountId, BankAccount>,
    entries: BTreeMap<JournalEntryId, JournalEntry>,
    lines: BTreeMap<JournalEntryId, Vec<JournalEntryLine>>,
    runs: BTreeMap<RunId, CompensationRun>,
    payments: Vec<PayrollPayment>,
    periods: BTreeMap<PeriodKey, Period>,
    sequences: HashMap<String, u64>,
}

impl State {
    fn next_seq(sequences: &mut HashMap<String, u64>, key: String) -> u64 {
        let seq = sequences.entry(key).or_insert(0);
        *seq += 1;
        *seq
    }

    fn period_closed(&self, key: PeriodKey) -> bool {
        self.periods.get(&key).is_some_and(|p| p.is_closed)
    }

    fn paid(&self, run: RunId) -> Decimal {
        self.payments.iter().filter(|p| p.run_id == run).map(|p| p.amount).sum()
    }

    fn account_net(&self, code: &str, as_of: chrono::NaiveDate) -> Decimal {
        self.entries
            .values()
            .filter(|e| e.entry_date <= as_of)
            .filter_map(|e| self.lines.get(&e.id))
            .flatten()
            .filter(|l| l.account_code == code)
            .map(|l| l.debit_amount - l.credit_amount)
            .sum()
    }

    fn check(&self, guard: &Guard) -> bool {
        match guard {
            Guard::PeriodOpen(date) => !self.period_closed(PeriodKey::of(*date)),
            Guard::RunStatus { run, expected } => {
                self.runs.get(run).is_some_and(|r| r.status == *expected)
            }
            Guard::PendingCovers { run, amount } => self
                .runs
                .get(run)
                .is_some_and(|r| self.paid(*run) + *amount <= r.net_amount),
            Guard::AccountBalance { code, as_of, expected } => self.account_net(code, *as_of) == *expected,
        }
    }
}

/// Ledger store kept entirely in memory.
///
/// Used by the test suites and by the API tests; it honours the same
/// atomicity and numbering rules as the Postgres store.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
    fail_after: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            unavailable: AtomicBool::new(false),
            fail_after: AtomicUsize::new(FAULT_DISARMED),
        }
    }

    /// Makes the next commit that writes entry lines fail after staging `n`
    /// of them. Nothing of that commit is applied.
    pub fn fail_after_lines(&self, n: usize) {
        self.fail_after.store(n, Ordering::SeqCst);
    }

    /// Simulates the backend going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn injected_fault(&self, staged_lines: usize) -> StoreResult<()> {
        let limit = self.fail_after.load(Ordering::SeqCst);
        if limit != FAULT_DISARMED && staged_lines >= limit {
            self.fail_after.store(FAULT_DISARMED, Ordering::SeqCst);
            return Err(StoreError::Backend(format!(
                "injected failure after {staged_lines} lines"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        self.ensure_available()?;
        Ok(self.state.read().await.accounts.values().cloned().collect())
    }

    async fn get_account(&self, code: &str) -> StoreResult<Option<Account>> {
        self.ensure_available()?;
        Ok(self.state.read().await.accounts.get(code).cloned())
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<bool> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.code) {
            return Ok(false);
        }
        state.accounts.insert(account.code.clone(), account.clone());
        Ok(true)
    }

    async fn update_account(&self, account: &Account, unreferenced_only: bool) -> StoreResult<bool> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let code = account.code.as_str();
        if unreferenced_only
            && (state.lines.values().flatten().any(|l| l.account_code == code)
                || state.banks.values().any(|b| b.account_code.as_deref() == Some(code)))
        {
            return Ok(false);
        }
        match state.accounts.get_mut(code) {
            Some(existing) => {
                *existing = account.clone();
                Ok(true)
            }
            None => Err(StoreError::Conflict(format!("account {code} was removed"))),
        }
    }

    async fn list_third_parties(&self) -> StoreResult<Vec<ThirdParty>> {
        self.ensure_available()?;
        Ok(self.state.read().await.third_parties.values().cloned().collect())
    }

    async fn get_third_party(&self, id: ThirdPartyId) -> StoreResult<Option<ThirdParty>> {
        self.ensure_available()?;
        Ok(self.state.read().await.third_parties.get(&id).cloned())
    }

    async fn upsert_third_party(&self, party: &ThirdParty) -> StoreResult<()> {
        self.ensure_available()?;
        self.state.write().await.third_parties.insert(party.id, party.clone());
        Ok(())
    }

    async fn list_bank_accounts(&self) -> StoreResult<Vec<BankAccount>> {
        self.ensure_available()?;
        let mut banks: Vec<BankAccount> = self.state.read().await.banks.values().cloned().collect();
        banks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(banks)
    }

    async fn get_bank_account(&self, id: BankAccountId) -> StoreResult<Option<BankAccount>> {
        self.ensure_available()?;
        Ok(self.state.read().await.banks.get(&id).cloned())
    }

    async fn insert_bank_account(&self, bank: &BankAccount, ledger_account: Option<&Account>) -> StoreResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if let Some(account) = ledger_account {
            if state.accounts.contains_key(&account.code) {
                return Err(StoreError::Conflict(format!("account {} already exists", account.code)));
            }
            state.accounts.insert(account.code.clone(), account.clone());
        }
        state.banks.insert(bank.id, bank.clone());
        Ok(())
    }

    async fn get_entry(&self, id: JournalEntryId) -> StoreResult<Option<JournalEntry>> {
        self.ensure_available()?;
        Ok(self.state.read().await.entries.get(&id).cloned())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut entries: Vec<JournalEntry> = state
            .entries
            .values()
            .filter(|e| filter.matches_header(e))
            .filter(|e| {
                !filter.has_line_filters()
                    || state.lines.get(&e.id).is_some_and(|lines| filter.matches_lines(lines))
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.entry_date
                .cmp(&b.entry_date)
                .then_with(|| a.entry_number.cmp(&b.entry_number))
        });
        Ok(entries)
    }

    async fn entry_lines(&self, id: JournalEntryId) -> StoreResult<Vec<JournalEntryLine>> {
        self.ensure_available()?;
        Ok(self.state.read().await.lines.get(&id).cloned().unwrap_or_default())
    }

    async fn snapshot(&self, range: LineRange) -> StoreResult<LedgerSnapshot> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let lines = state
            .entries
            .values()
            .filter(|e| range.contains(e.entry_date))
            .flat_map(|entry| {
                state
                    .lines
                    .get(&entry.id)
                    .into_iter()
                    .flatten()
                    .map(move |line| LedgerLine::from_parts(entry, line))
            })
            .collect();

        Ok(LedgerSnapshot {
            accounts: state.accounts.values().cloned().collect(),
            third_parties: state.third_parties.values().cloned().collect(),
            lines,
        })
    }

    async fn get_run(&self, id: RunId) -> StoreResult<Option<CompensationRun>> {
        self.ensure_available()?;
        Ok(self.state.read().await.runs.get(&id).cloned())
    }

    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<CompensationRun>> {
        self.ensure_available()?;
        let mut runs: Vec<CompensationRun> = self
            .state
            .read()
            .await
            .runs
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            (b.period_year, b.period_month)
                .cmp(&(a.period_year, a.period_month))
                .then_with(|| a.run_number.cmp(&b.run_number))
        });
        Ok(runs)
    }

    async fn insert_run(&self, run: NewRun) -> StoreResult<CompensationRun> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let prefix = run.kind.number_prefix();
        let seq = State::next_seq(&mut state.sequences, format!("{prefix}:{}", run.period_year));

        let stored = CompensationRun {
            id: run.id,
            kind: run.kind,
            run_number: run_number(prefix, run.period_year, seq),
            period_year: run.period_year,
            period_month: run.period_month,
            person_id: run.person_id,
            person_name: run.person_name,
            gross_amount: run.amounts.gross_amount,
            irpf_rate: run.amounts.irpf_rate,
            irpf_amount: run.amounts.irpf_amount,
            net_amount: run.amounts.net_amount,
            status: RunStatus::Draft,
            journal_entry_id: None,
            created_by: run.created_by,
            created_at: Utc::now(),
        };
        state.runs.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_run(&self, id: RunId, expected: RunStatus) -> StoreResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let guard = Guard::RunStatus { run: id, expected };
        if !state.check(&guard) {
            return Err(StoreError::GuardFailed(guard));
        }
        state.runs.remove(&id);
        Ok(())
    }

    async fn list_payments(&self, run: RunId) -> StoreResult<Vec<PayrollPayment>> {
        self.ensure_available()?;
        Ok(self
            .state
            .read()
            .await
            .payments
            .iter()
            .filter(|p| p.run_id == run)
            .cloned()
            .collect())
    }

    async fn list_periods(&self) -> StoreResult<Vec<Period>> {
        self.ensure_available()?;
        Ok(self.state.read().await.periods.values().cloned().collect())
    }

    async fn commit(&self, work: UnitOfWork) -> StoreResult<CommitReceipt> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if let Some(failed) = work.guards.iter().find(|g| !state.check(g)) {
            return Err(StoreError::GuardFailed(failed.clone()));
        }

        // Stage every write against copies; apply only once all succeeded.
        let now = Utc::now();
        let mut sequences = state.sequences.clone();
        let mut receipt = CommitReceipt::default();

        if let Some(staged) = &work.entry {
            let validated = &staged.entry;
            if state.entries.contains_key(&validated.id) {
                return Err(StoreError::Conflict(format!("entry {} already exists", validated.id)));
            }
            let year = validated.fiscal_year();
            let seq = State::next_seq(&mut sequences, format!("entry:{year}"));
            let input = &validated.entry;

            let mut lines = Vec::with_capacity(input.lines.len());
            for (line, line_order) in input.lines.iter().zip(1..) {
                self.injected_fault(lines.len())?;
                lines.push(JournalEntryLine {
                    entry_id: validated.id,
                    line_order,
                    account_code: line.account_code.clone(),
                    debit_amount: line.debit,
                    credit_amount: line.credit,
                    description: line.description.clone(),
                    third_party_id: line.third_party_id,
                    third_party_type: line.third_party_type,
                });
            }
            self.injected_fault(lines.len())?;

            receipt.entry = Some(JournalEntry {
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
            });
            receipt.lines = lines;
        }

        if let Some(id) = work.lock_entry {
            match state.entries.get(&id) {
                Some(entry) if !entry.is_locked => receipt.locked_entries.push(id),
                Some(_) => {}
                None => return Err(StoreError::Conflict(format!("entry {id} does not exist"))),
            }
        }

        let mut run = match work.run_update {
            Some(update) => {
                let mut run = state
                    .runs
                    .get(&update.run)
                    .cloned()
                    .ok_or_else(|| StoreError::Conflict(format!("run {} does not exist", update.run)))?;
                run.status = update.status;
                if update.journal_entry_id.is_some() {
                    run.journal_entry_id = update.journal_entry_id;
                }
                Some(run)
            }
            None => None,
        };

        if let Some(new_payment) = &work.payment {
            let mut paid_run = match run.take() {
                Some(r) if r.id == new_payment.run_id => r,
                Some(other) => {
                    return Err(StoreError::Conflict(format!(
                        "unit of work updates run {} but pays run {}",
                        other.id, new_payment.run_id
                    )));
                }
                None => {
                    state.runs.get(&new_payment.run_id).cloned().ok_or_else(|| {
                        StoreError::Conflict(format!("run {} does not exist", new_payment.run_id))
                    })?
                }
            };
            let seq = State::next_seq(&mut sequences, format!("PAG:{}", new_payment.payment_date.year()));
            let payment = PayrollPayment {
                id: new_payment.id,
                payment_number: payment_number(new_payment.payment_date.year(), seq),
                run_id: new_payment.run_id,
                run_kind: paid_run.kind,
                amount: new_payment.amount,
                payment_date: new_payment.payment_date,
                payment_method: new_payment.payment_method,
                bank_account_id: new_payment.bank_account_id,
                journal_entry_id: new_payment.journal_entry_id,
                created_by: new_payment.created_by,
                created_at: now,
            };
            if state.paid(paid_run.id) + payment.amount >= paid_run.net_amount {
                paid_run.status = RunStatus::Paid;
            }
            receipt.payment = Some(payment);
            run = Some(paid_run);
        }

        if let Some(key) = work.close_period {
            receipt.locked_entries.extend(
                state
                    .entries
                    .values()
                    .filter(|e| key.contains(e.entry_date) && !e.is_locked)
                    .map(|e| e.id),
            );
            receipt.closed_period = Some(Period {
                year: key.year,
                month: key.month,
                is_closed: true,
                closed_at: Some(now),
            });
        }

        // Apply.
        state.sequences = sequences;
        if let Some(entry) = &receipt.entry {
            state.entries.insert(entry.id, entry.clone());
            state.lines.insert(entry.id, receipt.lines.clone());
        }
        for id in &receipt.locked_entries {
            if let Some(entry) = state.entries.get_mut(id) {
                entry.is_locked = true;
            }
        }
        if let Some(run) = &run {
            state.runs.insert(run.id, run.clone());
        }
        if let Some(payment) = &receipt.payment {
            state.payments.push(payment.clone());
        }
        if let Some(period) = &receipt.closed_period {
            state.periods.insert(period.key(), period.clone());
        }
        receipt.run = run;

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use partida_shared::types::UserId;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::chart::AccountType;
    use crate::engine::store::StagedEntry;
    use crate::ledger::{EntryType, LedgerService, NewEntryLine, NewJournalEntry};

    fn account(code: &str) -> Account {
        Account {
            code: code.to_string(),
            name: code.to_string(),
            account_type: AccountType::Asset,
            is_active: true,
        }
    }

    fn staged(date: NaiveDate, amount: rust_decimal::Decimal) -> StagedEntry {
        let input = NewJournalEntry {
            entry_date: date,
            entry_type: EntryType::Adjustment,
            description: "test".to_string(),
            reference: None,
            project_id: None,
            created_by: UserId::new(),
            lines: vec![NewEntryLine::debit("572001", amount), NewEntryLine::credit("555000", amount)],
        };
        let entry = LedgerService::validate_entry(input, |c| Some(account(c)), |_| None).unwrap();
        StagedEntry { entry, lock: false }
    }

    fn work(entry: StagedEntry) -> UnitOfWork {
        UnitOfWork {
            guards: vec![Guard::PeriodOpen(entry.entry.entry.entry_date)],
            entry: Some(entry),
            ..UnitOfWork::default()
        }
    }

    #[tokio::test]
    async fn test_entry_numbers_are_sequential_per_year() {
        let store = MemoryStore::new();
        let d = |y| NaiveDate::from_ymd_opt(y, 3, 1).unwrap();

        let first = store.commit(work(staged(d(2026), dec!(10)))).await.unwrap();
        let second = store.commit(work(staged(d(2026), dec!(10)))).await.unwrap();
        let other_year = store.commit(work(staged(d(2027), dec!(10)))).await.unwrap();

        assert_eq!(first.entry.unwrap().entry_number, "2026-000001");
        assert_eq!(second.entry.unwrap().entry_number, "2026-000002");
        assert_eq!(other_year.entry.unwrap().entry_number, "2027-000001");
    }

    #[tokio::test]
    async fn test_injected_fault_writes_nothing_and_keeps_numbering() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        store.fail_after_lines(1);
        let err = store.commit(work(staged(date, dec!(10)))).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(store.snapshot(LineRange::all()).await.unwrap().lines.is_empty());

        let receipt = store.commit(work(staged(date, dec!(10)))).await.unwrap();
        assert_eq!(receipt.entry.unwrap().entry_number, "2026-000001");
    }

    #[tokio::test]
    async fn test_failed_guard_aborts_commit() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        store
            .commit(UnitOfWork {
                close_period: Some(PeriodKey::of(date)),
                ..UnitOfWork::default()
            })
            .await
            .unwrap();

        let err = store.commit(work(staged(date, dec!(10)))).await.unwrap_err();
        assert!(matches!(err, StoreError::GuardFailed(Guard::PeriodOpen(d)) if d == date));
        assert!(store.list_entries(&EntryFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_fast() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.list_accounts().await, Err(StoreError::Unavailable(_))));
        store.set_unavailable(false);
        assert!(store.list_accounts().await.unwrap().is_empty());
    }
}
