//! Transactional facade over the ledger.
//!
//! Every operation follows the same shape: read what it needs, build and
//! validate the entry with the stateless services, then hand one
//! [`UnitOfWork`] to the store. Nothing is written unless the commit
//! succeeds, and every successful commit is published as [`LedgerEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use partida_shared::types::{BankAccountId, JournalEntryId, PaymentId, RunId, ThirdPartyId, UserId};
use partida_shared::{PostingAccounts, TaxRates};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::events::{EVENT_BUFFER_SIZE, LedgerEvent};
use super::store::{
    CommitReceipt, Guard, LedgerSnapshot, LedgerStore, LineRange, RunUpdate, StagedEntry, StoreError,
    UnitOfWork,
};
use crate::bank::{
    BalanceAdjustmentRequest, BankAccount, BankMovementService, ManualMovementRequest, MovementOutcome,
    NewBankAccount, OpeningEntryRequest, TaxPaymentRequest, TransferRequest,
};
use crate::chart::{Account, AccountType, AccountUpdate, ChartService, NewAccount, default_chart};
use crate::fiscal::{FiscalService, Period, PeriodKey, PeriodSummary};
use crate::ledger::{
    EntryFilter, EntryType, JournalEntry, JournalEntryLine, LedgerError, LedgerService, NewEntryLine,
    NewJournalEntry, ThirdParty, ThirdPartyType, ValidatedEntry,
};
use crate::payroll::{
    CompensationRun, NewPayment, NewRunRequest, PaymentOutcome, PaymentRequest, PayrollPayment,
    PayrollService, PostDecision, PostOutcome, RunFilter, RunKind, RunStatus, RunView,
};
use crate::reports::{
    BalanceSheet, BankBalance, CorporateTaxSummary, IrpfSummary, ProfitAndLoss, ReportService,
    ThirdPartyBalance, VatSummary,
};

/// A committed entry with its lines.
pub type CommittedEntry = (JournalEntry, Vec<JournalEntryLine>);

/// The double-entry ledger.
///
/// Cheap to clone; clones share the store and the event channel.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    posting: Arc<PostingAccounts>,
    tax: TaxRates,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Creates a ledger over a store with the given posting configuration.
    pub fn new(store: Arc<dyn LedgerStore>, posting: PostingAccounts, tax: TaxRates) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            store,
            posting: Arc::new(posting),
            tax,
            events,
        }
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Posting accounts in use.
    pub fn posting(&self) -> &PostingAccounts {
        &self.posting
    }

    fn publish(&self, event: LedgerEvent) {
        if self.events.send(event).is_err() {
            debug!("no ledger event subscribers");
        }
    }

    fn publish_receipt(&self, receipt: &CommitReceipt) {
        if let Some(entry) = &receipt.entry {
            self.publish(LedgerEvent::EntryCommitted {
                entry: entry.clone(),
                lines: receipt.lines.clone(),
            });
        }
        if let Some(period) = &receipt.closed_period {
            self.publish(LedgerEvent::PeriodClosed {
                period: period.clone(),
                locked_entries: receipt.locked_entries.len(),
            });
        } else {
            for entry_id in &receipt.locked_entries {
                self.publish(LedgerEvent::EntryLocked { entry_id: *entry_id });
            }
        }
        if let Some(payment) = &receipt.payment {
            self.publish(LedgerEvent::PaymentRecorded {
                payment: payment.clone(),
            });
        }
        if let Some(run) = &receipt.run {
            self.publish(LedgerEvent::RunStatusChanged {
                run_id: run.id,
                kind: run.kind,
                status: run.status,
            });
        }
    }

    // ========== Chart of accounts ==========

    /// Lists accounts ordered by code.
    pub async fn list_accounts(&self, active_only: bool) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.store.list_accounts().await?;
        if active_only {
            accounts.retain(|a| a.is_active);
        }
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    /// Looks up one account.
    pub async fn get_account(&self, code: &str) -> Result<Account, LedgerError> {
        self.store
            .get_account(code)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()))
    }

    /// Registers a new account.
    #[instrument(skip(self), fields(code = %input.code))]
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let exists = self.store.get_account(&input.code).await?.is_some();
        let account = ChartService::create_account(&input, exists)?;
        if !self.store.insert_account(&account).await? {
            return Err(LedgerError::DuplicateAccount(account.code));
        }
        info!(code = %account.code, account_type = %account.account_type, "account created");
        self.publish(LedgerEvent::AccountSaved(account.clone()));
        Ok(account)
    }

    /// Renames, retypes or (de)activates an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountImmutable` when renaming or retyping an account that a
    /// journal line or bank account already references.
    #[instrument(skip(self, update))]
    pub async fn update_account(&self, code: &str, update: AccountUpdate) -> Result<Account, LedgerError> {
        let account = self.get_account(code).await?;
        let updated = ChartService::apply_update(&account, &update)?;
        let unreferenced_only = ChartService::changes_identity(&account, &updated);
        if !self.store.update_account(&updated, unreferenced_only).await? {
            warn!(code, "referenced account can only be (de)activated");
            return Err(LedgerError::AccountImmutable(code.to_string()));
        }
        info!(code, is_active = updated.is_active, "account updated");
        self.publish(LedgerEvent::AccountSaved(updated.clone()));
        Ok(updated)
    }

    /// Activates or deactivates an account.
    pub async fn set_account_active(&self, code: &str, is_active: bool) -> Result<Account, LedgerError> {
        self.update_account(
            code,
            AccountUpdate {
                is_active: Some(is_active),
                ..AccountUpdate::default()
            },
        )
        .await
    }

    /// Inserts every default account that is missing. Returns how many were added.
    #[instrument(skip(self))]
    pub async fn seed_default_chart(&self) -> Result<usize, LedgerError> {
        let mut inserted = 0;
        for input in default_chart() {
            let account = ChartService::create_account(&input, false)?;
            if self.store.insert_account(&account).await? {
                inserted += 1;
                self.publish(LedgerEvent::AccountSaved(account));
            }
        }
        info!(inserted, "default chart seeded");
        Ok(inserted)
    }

    // ========== Third parties ==========

    /// Registers a third party, or renames an already registered one.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank name or an attempt to change the type.
    #[instrument(skip(self, name), fields(%id, %party_type))]
    pub async fn register_third_party(
        &self,
        id: ThirdPartyId,
        party_type: ThirdPartyType,
        name: &str,
    ) -> Result<ThirdParty, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("third party name is required".to_string()));
        }
        if let Some(existing) = self.store.get_third_party(id).await?
            && existing.party_type != party_type
        {
            return Err(LedgerError::Validation(format!(
                "third party {id} is registered as {}",
                existing.party_type
            )));
        }
        let party = ThirdParty {
            id,
            party_type,
            name: name.to_string(),
        };
        self.store.upsert_third_party(&party).await?;
        Ok(party)
    }

    // ========== Journal ==========

    /// Validates an entry against the current chart and third-party registry.
    async fn validate(&self, input: NewJournalEntry) -> Result<ValidatedEntry, LedgerError> {
        let mut accounts = HashMap::new();
        for code in LedgerService::referenced_accounts(&input) {
            if let Some(account) = self.store.get_account(&code).await? {
                accounts.insert(code, account);
            }
        }
        let mut parties = HashMap::new();
        for id in LedgerService::referenced_third_parties(&input) {
            if let Some(party) = self.store.get_third_party(id).await? {
                parties.insert(id, party);
            }
        }

        let validated = LedgerService::validate_entry(
            input,
            |code| accounts.get(code).cloned(),
            |id| parties.get(&id).cloned(),
        )?;

        self.ensure_open(validated.entry.entry_date).await?;
        Ok(validated)
    }

    /// Fails with `PeriodClosed` when `date` falls in a closed period.
    async fn ensure_open(&self, date: NaiveDate) -> Result<(), LedgerError> {
        let periods = self.store.list_periods().await?;
        FiscalService::check_open(date, |key| periods.iter().any(|p| p.key() == key && p.is_closed))
    }

    /// Commits a unit of work, translating guard failures into domain errors.
    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt, LedgerError> {
        let target = work
            .run_update
            .map(|u| u.status)
            .or(work.payment.as_ref().map(|_| RunStatus::Paid));
        match self.store.commit(work).await {
            Ok(receipt) => {
                if let Some(entry) = &receipt.entry {
                    info!(
                        entry_number = %entry.entry_number,
                        entry_type = %entry.entry_type,
                        total = %entry.total_amount,
                        "journal entry committed"
                    );
                }
                self.publish_receipt(&receipt);
                Ok(receipt)
            }
            Err(err) => {
                warn!(error = %err, "commit rejected");
                Err(self.guard_error(err, target).await)
            }
        }
    }

    /// `target` is the run status the unit of work was moving to, if any.
    async fn guard_error(&self, err: StoreError, target: Option<RunStatus>) -> LedgerError {
        let StoreError::GuardFailed(guard) = err else {
            return LedgerError::Store(err);
        };
        match guard {
            Guard::PeriodOpen(date) => PeriodKey::of(date).closed_error(),
            Guard::RunStatus { run, expected } => match self.store.get_run(run).await {
                Ok(Some(current)) => LedgerError::InvalidTransition {
                    from: current.status,
                    to: target.unwrap_or(expected),
                },
                Ok(None) => LedgerError::not_found("run", run),
                Err(err) => LedgerError::Store(err),
            },
            Guard::PendingCovers { run, amount } => match self.run_view_by_id(run).await {
                Ok(view) => LedgerError::InsufficientPendingAmount {
                    requested: amount,
                    pending: view.pending_amount,
                },
                Err(err) => err,
            },
            guard @ Guard::AccountBalance { .. } => {
                LedgerError::Store(StoreError::Conflict(format!("{guard}; balance changed, retry")))
            }
        }
    }

    /// Validates and commits an entry in its period.
    async fn post_entry(&self, input: NewJournalEntry, lock: bool) -> Result<CommittedEntry, LedgerError> {
        let validated = self.validate(input).await?;
        let receipt = self
            .commit(UnitOfWork {
                guards: vec![Guard::PeriodOpen(validated.entry.entry_date)],
                entry: Some(StagedEntry { entry: validated, lock }),
                ..UnitOfWork::default()
            })
            .await?;
        committed(receipt)
    }

    /// Creates a journal entry.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure (unbalanced, invalid line,
    /// unknown or inactive account, closed period); nothing is written.
    #[instrument(skip(self, input), fields(entry_type = %input.entry_type, entry_date = %input.entry_date))]
    pub async fn create_entry(&self, input: NewJournalEntry) -> Result<CommittedEntry, LedgerError> {
        self.post_entry(input, false).await
    }

    /// Looks up an entry header.
    pub async fn get_entry(&self, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        self.store
            .get_entry(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("journal entry", id))
    }

    /// Lines of an entry, in order.
    pub async fn get_entry_lines(&self, id: JournalEntryId) -> Result<Vec<JournalEntryLine>, LedgerError> {
        self.get_entry(id).await?;
        Ok(self.store.entry_lines(id).await?)
    }

    /// Lists entry headers.
    pub async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<JournalEntry>, LedgerError> {
        Ok(self.store.list_entries(filter).await?)
    }

    /// Locks an entry. Locking a locked entry is a no-op.
    #[instrument(skip(self))]
    pub async fn lock_entry(&self, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        let entry = self.get_entry(id).await?;
        if entry.is_locked {
            debug!(entry_number = %entry.entry_number, "entry already locked");
            return Ok(entry);
        }
        self.commit(UnitOfWork {
            lock_entry: Some(id),
            ..UnitOfWork::default()
        })
        .await?;
        self.get_entry(id).await
    }

    // ========== Subledger ==========

    /// Balance sheet with every account as of a date.
    pub async fn balance_sheet(&self, as_of: NaiveDate) -> Result<BalanceSheet, LedgerError> {
        let snapshot = self.store.snapshot(LineRange::until(as_of)).await?;
        Ok(ReportService::balance_sheet(&snapshot.accounts, &snapshot.lines, as_of))
    }

    /// `debit - credit` net of one account as of a date.
    pub async fn account_balance(&self, code: &str, as_of: NaiveDate) -> Result<Decimal, LedgerError> {
        self.get_account(code).await?;
        let snapshot = self.store.snapshot(LineRange::until(as_of)).await?;
        Ok(ReportService::account_net(&snapshot.lines, code, as_of))
    }

    /// Profit and loss for `[from, to]`.
    pub async fn profit_and_loss(&self, from: NaiveDate, to: NaiveDate) -> Result<ProfitAndLoss, LedgerError> {
        let snapshot = self.range_snapshot(from, to).await?;
        Ok(ReportService::profit_and_loss(&snapshot.accounts, &snapshot.lines, from, to))
    }

    /// Client balances as of a date.
    pub async fn client_balances(&self, as_of: NaiveDate) -> Result<Vec<ThirdPartyBalance>, LedgerError> {
        self.third_party_balances(&[ThirdPartyType::Client], as_of).await
    }

    /// Supplier and technician balances as of a date.
    pub async fn supplier_technician_balances(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<ThirdPartyBalance>, LedgerError> {
        self.third_party_balances(&[ThirdPartyType::Supplier, ThirdPartyType::Technician], as_of)
            .await
    }

    async fn third_party_balances(
        &self,
        types: &[ThirdPartyType],
        as_of: NaiveDate,
    ) -> Result<Vec<ThirdPartyBalance>, LedgerError> {
        let snapshot = self.store.snapshot(LineRange::until(as_of)).await?;
        Ok(ReportService::third_party_balances(
            &snapshot.third_parties,
            &snapshot.lines,
            types,
            as_of,
        ))
    }

    /// VAT position for `[from, to]`.
    pub async fn vat_summary(&self, from: NaiveDate, to: NaiveDate) -> Result<VatSummary, LedgerError> {
        let snapshot = self.range_snapshot(from, to).await?;
        Ok(ReportService::vat_summary(&snapshot.lines, &self.posting, from, to))
    }

    /// IRPF position for `[from, to]`.
    pub async fn irpf_summary(&self, from: NaiveDate, to: NaiveDate) -> Result<IrpfSummary, LedgerError> {
        let snapshot = self.range_snapshot(from, to).await?;
        Ok(ReportService::irpf_summary(&snapshot.lines, &self.posting, from, to))
    }

    /// Corporate tax position for `[from, to]`.
    pub async fn corporate_tax_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CorporateTaxSummary, LedgerError> {
        let snapshot = self.range_snapshot(from, to).await?;
        Ok(ReportService::corporate_tax_summary(
            &snapshot.accounts,
            &snapshot.lines,
            &self.posting,
            self.tax.corporate_tax_rate,
            from,
            to,
        ))
    }

    async fn range_snapshot(&self, from: NaiveDate, to: NaiveDate) -> Result<LedgerSnapshot, LedgerError> {
        if from > to {
            return Err(LedgerError::Validation(format!(
                "period start {from} is after period end {to}"
            )));
        }
        Ok(self.store.snapshot(LineRange::between(from, to)).await?)
    }

    // ========== Bank accounts and movements ==========

    /// Registers a bank account.
    ///
    /// Without an explicit ledger account the next free code under the bank
    /// prefix is created as an ASSET account.
    #[instrument(skip(self, input), fields(bank = %input.bank))]
    pub async fn create_bank_account(&self, input: NewBankAccount) -> Result<BankAccount, LedgerError> {
        let input = BankMovementService::prepare_bank_account(&input)?;

        let (code, new_account) = match input.account_code.clone() {
            Some(code) => match self.store.get_account(&code).await? {
                Some(_) => (code, None),
                None => {
                    let account = ChartService::create_account(
                        &NewAccount::new(code.clone(), format!("Banco {}", input.bank), AccountType::Asset),
                        false,
                    )?;
                    (code, Some(account))
                }
            },
            None => {
                let accounts = self.store.list_accounts().await?;
                let code = ChartService::next_code_under(
                    &self.posting.bank_prefix,
                    accounts.iter().map(|a| a.code.as_str()),
                )?;
                let account = ChartService::create_account(
                    &NewAccount::new(code.clone(), format!("Banco {}", input.bank), AccountType::Asset),
                    false,
                )?;
                (code, Some(account))
            }
        };

        let bank = BankAccount {
            id: BankAccountId::new(),
            holder: input.holder,
            bank: input.bank,
            iban: input.iban,
            account_code: Some(code),
            created_at: Utc::now(),
        };
        self.store.insert_bank_account(&bank, new_account.as_ref()).await?;
        if let Some(account) = new_account {
            self.publish(LedgerEvent::AccountSaved(account));
        }
        info!(bank_account_id = %bank.id, account_code = ?bank.account_code, "bank account created");
        Ok(bank)
    }

    /// Lists bank accounts.
    pub async fn list_bank_accounts(&self) -> Result<Vec<BankAccount>, LedgerError> {
        Ok(self.store.list_bank_accounts().await?)
    }

    /// Looks up a bank account.
    pub async fn get_bank_account(&self, id: BankAccountId) -> Result<BankAccount, LedgerError> {
        self.store
            .get_bank_account(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("bank account", id))
    }

    /// Every bank account with its derived balance as of a date.
    pub async fn bank_balances(&self, as_of: NaiveDate) -> Result<Vec<BankBalance>, LedgerError> {
        let banks = self.store.list_bank_accounts().await?;
        let snapshot = self.store.snapshot(LineRange::until(as_of)).await?;
        Ok(ReportService::bank_balances(&banks, &snapshot.lines, as_of))
    }

    /// Records opening balances of bank accounts in one entry.
    #[instrument(skip(self, request), fields(date = %request.date, banks = request.balances.len()))]
    pub async fn create_opening_entry(
        &self,
        request: OpeningEntryRequest,
        user: UserId,
    ) -> Result<MovementOutcome, LedgerError> {
        let mut balances = Vec::with_capacity(request.balances.len());
        for opening in &request.balances {
            balances.push((self.get_bank_account(opening.bank_account_id).await?, opening.balance));
        }
        let input = BankMovementService::opening_entry(&balances, request.date, &self.posting, user)?;
        let (entry, _) = self.post_entry(input, false).await?;
        Ok(outcome(&entry))
    }

    /// Transfers between two own bank accounts.
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn create_transfer(&self, request: TransferRequest, user: UserId) -> Result<MovementOutcome, LedgerError> {
        let source = self.get_bank_account(request.source_bank_id).await?;
        let target = self.get_bank_account(request.target_bank_id).await?;
        let input = BankMovementService::transfer(&request, &source, &target, user)?;
        let (entry, _) = self.post_entry(input, false).await?;
        Ok(outcome(&entry))
    }

    /// Pays a tax liability from a bank account. The entry is locked at once.
    #[instrument(skip(self, request), fields(tax_type = %request.tax_type, amount = %request.amount))]
    pub async fn create_tax_payment(
        &self,
        request: TaxPaymentRequest,
        user: UserId,
    ) -> Result<MovementOutcome, LedgerError> {
        let bank = self.get_bank_account(request.bank_account_id).await?;
        let input = BankMovementService::tax_payment(&request, &bank, &self.posting, user)?;
        let (entry, _) = self.post_entry(input, true).await?;
        Ok(outcome(&entry))
    }

    /// Records a manual income or expense on a bank account.
    #[instrument(skip(self, request), fields(category = %request.category, amount = %request.amount))]
    pub async fn create_manual_movement(
        &self,
        request: ManualMovementRequest,
        user: UserId,
    ) -> Result<MovementOutcome, LedgerError> {
        let bank = self.get_bank_account(request.bank_account_id).await?;
        let input = BankMovementService::manual_movement(&request, &bank, &self.posting, user)?;
        let (entry, _) = self.post_entry(input, false).await?;
        Ok(outcome(&entry))
    }

    /// Brings a bank's derived balance to a statement balance.
    ///
    /// A zero delta writes nothing and returns an outcome without entry. A
    /// closed period is rejected even then.
    #[instrument(skip(self, request), fields(new_balance = %request.new_balance, date = %request.date))]
    pub async fn adjust_balance(
        &self,
        request: BalanceAdjustmentRequest,
        user: UserId,
    ) -> Result<MovementOutcome, LedgerError> {
        self.ensure_open(request.date).await?;
        let bank = self.get_bank_account(request.bank_account_id).await?;
        let code = BankMovementService::ledger_code(&bank)?.to_string();
        let snapshot = self.store.snapshot(LineRange::until(request.date)).await?;
        let current = ReportService::account_net(&snapshot.lines, &code, request.date);

        let plan = BankMovementService::balance_adjustment(&request, &bank, current, &self.posting, user)?;
        let Some(input) = plan.entry else {
            debug!(bank_account_id = %bank.id, "balance already matches");
            return Ok(MovementOutcome {
                entry_id: None,
                entry_number: None,
                amount: Decimal::ZERO,
            });
        };

        let validated = self.validate(input).await?;
        let receipt = self
            .commit(UnitOfWork {
                guards: vec![
                    Guard::PeriodOpen(request.date),
                    Guard::AccountBalance {
                        code,
                        as_of: request.date,
                        expected: current,
                    },
                ],
                entry: Some(StagedEntry {
                    entry: validated,
                    lock: false,
                }),
                ..UnitOfWork::default()
            })
            .await?;
        let (entry, _) = committed(receipt)?;
        Ok(MovementOutcome {
            entry_id: Some(entry.id),
            entry_number: Some(entry.entry_number),
            amount: plan.delta,
        })
    }

    // ========== Payroll and partner compensation ==========

    /// Creates a draft run.
    #[instrument(skip(self, request), fields(kind = %request.kind, year = request.period_year, month = request.period_month))]
    pub async fn create_run(&self, request: NewRunRequest, user: UserId) -> Result<RunView, LedgerError> {
        let new_run = PayrollService::prepare_run(&request, user)?;
        let run = self.store.insert_run(new_run).await?;
        info!(run_number = %run.run_number, gross = %run.gross_amount, "run created");
        Ok(PayrollService::view(run, &[]))
    }

    async fn load_run(&self, kind: RunKind, id: RunId) -> Result<CompensationRun, LedgerError> {
        match self.store.get_run(id).await? {
            Some(run) if run.kind == kind => Ok(run),
            _ => Err(LedgerError::not_found("run", id)),
        }
    }

    async fn run_view_by_id(&self, id: RunId) -> Result<RunView, LedgerError> {
        let run = self
            .store
            .get_run(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("run", id))?;
        self.view(run).await
    }

    async fn view(&self, run: CompensationRun) -> Result<RunView, LedgerError> {
        let payments = self.store.list_payments(run.id).await?;
        Ok(PayrollService::view(run, &payments))
    }

    /// Looks up a run with its payment figures.
    pub async fn get_run(&self, kind: RunKind, id: RunId) -> Result<RunView, LedgerError> {
        let run = self.load_run(kind, id).await?;
        self.view(run).await
    }

    /// Lists runs with their payment figures.
    pub async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<RunView>, LedgerError> {
        let runs = self.store.list_runs(filter).await?;
        let mut views = Vec::with_capacity(runs.len());
        for run in runs {
            views.push(self.view(run).await?);
        }
        Ok(views)
    }

    /// Payments recorded against a run.
    pub async fn list_payments(&self, kind: RunKind, id: RunId) -> Result<Vec<PayrollPayment>, LedgerError> {
        self.load_run(kind, id).await?;
        Ok(self.store.list_payments(id).await?)
    }

    /// Posts a draft run to the journal.
    ///
    /// Idempotent: posting a run that is already POSTED or PAID returns its
    /// existing entry with `already_posted` set, including when a concurrent
    /// call won the race.
    #[instrument(skip(self), fields(%kind, %id))]
    pub async fn post_run(&self, kind: RunKind, id: RunId, user: UserId) -> Result<PostOutcome, LedgerError> {
        let run = self.load_run(kind, id).await?;
        if let PostDecision::AlreadyPosted(entry_id) = PayrollService::decide_post(&run)? {
            return self.already_posted(run, entry_id).await;
        }

        let input = PayrollService::posting_entry(&run, &self.posting, user)?;
        let validated = self.validate(input).await?;
        let entry_id = validated.id;
        let work = UnitOfWork {
            guards: vec![
                Guard::PeriodOpen(validated.entry.entry_date),
                Guard::RunStatus {
                    run: id,
                    expected: RunStatus::Draft,
                },
            ],
            entry: Some(StagedEntry {
                entry: validated,
                lock: false,
            }),
            run_update: Some(RunUpdate {
                run: id,
                status: RunStatus::Posted,
                journal_entry_id: Some(entry_id),
            }),
            ..UnitOfWork::default()
        };

        match self.store.commit(work).await {
            Ok(receipt) => {
                self.publish_receipt(&receipt);
                let (entry, _) = committed(receipt.clone())?;
                info!(run_number = %run.run_number, entry_number = %entry.entry_number, "run posted");
                let run = receipt.run.ok_or_else(|| LedgerError::not_found("run", id))?;
                Ok(PostOutcome {
                    run: self.view(run).await?,
                    entry_id: entry.id,
                    entry_number: entry.entry_number,
                    already_posted: false,
                })
            }
            Err(StoreError::GuardFailed(Guard::RunStatus { .. })) => {
                let current = self.load_run(kind, id).await?;
                match PayrollService::decide_post(&current)? {
                    PostDecision::AlreadyPosted(entry_id) => self.already_posted(current, entry_id).await,
                    PostDecision::Post => Err(LedgerError::Store(StoreError::Conflict(format!(
                        "run {id} changed while posting, retry"
                    )))),
                }
            }
            Err(err) => {
                warn!(error = %err, "run post rejected");
                Err(self.guard_error(err, Some(RunStatus::Posted)).await)
            }
        }
    }

    async fn already_posted(&self, run: CompensationRun, entry_id: JournalEntryId) -> Result<PostOutcome, LedgerError> {
        let entry = self.get_entry(entry_id).await?;
        debug!(run_number = %run.run_number, entry_number = %entry.entry_number, "run already posted");
        Ok(PostOutcome {
            run: self.view(run).await?,
            entry_id,
            entry_number: entry.entry_number,
            already_posted: true,
        })
    }

    /// Pays (part of) a posted run from a bank account.
    ///
    /// The run becomes PAID once its payments cover the net amount.
    #[instrument(skip(self, request), fields(%kind, run_id = %request.run_id, amount = %request.amount))]
    pub async fn pay_run(
        &self,
        kind: RunKind,
        request: PaymentRequest,
        user: UserId,
    ) -> Result<PaymentOutcome, LedgerError> {
        let run = self.load_run(kind, request.run_id).await?;
        let view = self.view(run).await?;
        PayrollService::validate_payment(&view, request.amount)?;

        let bank = self.get_bank_account(request.bank_account_id).await?;
        let input = PayrollService::payment_entry(
            &view.run,
            &bank,
            request.amount,
            request.payment_date,
            &self.posting,
            user,
        )?;
        let validated = self.validate(input).await?;
        let payment = NewPayment {
            id: PaymentId::new(),
            run_id: request.run_id,
            amount: request.amount,
            payment_date: request.payment_date,
            payment_method: request.payment_method,
            bank_account_id: bank.id,
            journal_entry_id: validated.id,
            created_by: user,
        };

        let receipt = self
            .commit(UnitOfWork {
                guards: vec![
                    Guard::PeriodOpen(request.payment_date),
                    Guard::RunStatus {
                        run: request.run_id,
                        expected: RunStatus::Posted,
                    },
                    Guard::PendingCovers {
                        run: request.run_id,
                        amount: request.amount,
                    },
                ],
                entry: Some(StagedEntry {
                    entry: validated,
                    lock: false,
                }),
                payment: Some(payment),
                ..UnitOfWork::default()
            })
            .await?;

        let entry_number = receipt
            .entry
            .as_ref()
            .map(|e| e.entry_number.clone())
            .unwrap_or_default();
        let payment = receipt
            .payment
            .ok_or_else(|| LedgerError::not_found("payment", request.run_id))?;
        let run = receipt.run.ok_or_else(|| LedgerError::not_found("run", request.run_id))?;
        info!(
            payment_number = %payment.payment_number,
            run_number = %run.run_number,
            status = %run.status,
            "run payment recorded"
        );
        Ok(PaymentOutcome {
            run: self.view(run).await?,
            payment,
            entry_number,
        })
    }

    /// Cancels a draft run.
    #[instrument(skip(self), fields(%kind, %id))]
    pub async fn cancel_run(&self, kind: RunKind, id: RunId) -> Result<RunView, LedgerError> {
        let run = self.load_run(kind, id).await?;
        PayrollService::check_cancel(&run)?;
        let receipt = self
            .commit(UnitOfWork {
                guards: vec![Guard::RunStatus {
                    run: id,
                    expected: RunStatus::Draft,
                }],
                run_update: Some(RunUpdate {
                    run: id,
                    status: RunStatus::Cancelled,
                    journal_entry_id: None,
                }),
                ..UnitOfWork::default()
            })
            .await?;
        let run = receipt.run.ok_or_else(|| LedgerError::not_found("run", id))?;
        Ok(PayrollService::view(run, &[]))
    }

    /// Deletes a draft run.
    #[instrument(skip(self), fields(%kind, %id))]
    pub async fn delete_run(&self, kind: RunKind, id: RunId) -> Result<(), LedgerError> {
        let run = self.load_run(kind, id).await?;
        PayrollService::check_delete(&run)?;
        match self.store.delete_run(id, RunStatus::Draft).await {
            Ok(()) => {
                info!(run_number = %run.run_number, "run deleted");
                Ok(())
            }
            Err(StoreError::GuardFailed(_)) => {
                let current = self.load_run(kind, id).await?;
                Err(LedgerError::RunNotDeletable(current.status))
            }
            Err(err) => Err(err.into()),
        }
    }

    // ========== Periods ==========

    /// The current month and the previous `months_back` months with their
    /// closure state and profit figures, newest first.
    pub async fn list_periods_for_closure(
        &self,
        today: NaiveDate,
        months_back: u32,
    ) -> Result<Vec<PeriodSummary>, LedgerError> {
        let recorded = self.store.list_periods().await?;
        let periods = FiscalService::periods_for_closure(today, months_back, &recorded)?;
        let (Some(newest), Some(oldest)) = (periods.first(), periods.last()) else {
            return Ok(Vec::new());
        };
        let range = LineRange::between(oldest.key().start(), newest.key().end());
        let snapshot = self.store.snapshot(range).await?;
        Ok(periods
            .iter()
            .map(|p| FiscalService::summarize(p, &snapshot.accounts, &snapshot.lines))
            .collect())
    }

    /// Closure state and profit figures of one period.
    pub async fn period_summary(&self, year: i32, month: u32) -> Result<PeriodSummary, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        let period = self.period(key).await?;
        let snapshot = self.store.snapshot(LineRange::between(key.start(), key.end())).await?;
        Ok(FiscalService::summarize(&period, &snapshot.accounts, &snapshot.lines))
    }

    async fn period(&self, key: PeriodKey) -> Result<Period, LedgerError> {
        Ok(self
            .store
            .list_periods()
            .await?
            .into_iter()
            .find(|p| p.key() == key)
            .unwrap_or_else(|| Period::open(key)))
    }

    /// Closes a period, locking every entry dated in it.
    ///
    /// # Errors
    ///
    /// Returns `PeriodClosed` if the period is already closed.
    #[instrument(skip(self))]
    pub async fn close_period(&self, year: i32, month: u32) -> Result<PeriodSummary, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        if self.period(key).await?.is_closed {
            return Err(key.closed_error());
        }
        let receipt = self
            .commit(UnitOfWork {
                guards: vec![Guard::PeriodOpen(key.start())],
                close_period: Some(key),
                ..UnitOfWork::default()
            })
            .await?;
        info!(period = %key, locked_entries = receipt.locked_entries.len(), "period closed");
        self.period_summary(year, month).await
    }

    // ========== Tax provisions ==========

    /// Provisions the corporate tax still due for a fiscal year.
    ///
    /// Posts `TAX_PROVISION` for `max(0, profit × rate) − provisioned`;
    /// writes nothing when that is zero. The date must be in an open period
    /// either way.
    #[instrument(skip(self))]
    pub async fn provision_corporate_tax(
        &self,
        year: i32,
        date: NaiveDate,
        user: UserId,
    ) -> Result<MovementOutcome, LedgerError> {
        if date.year() != year {
            return Err(LedgerError::Validation(format!(
                "provision date {date} is outside fiscal year {year}"
            )));
        }
        self.ensure_open(date).await?;
        let from = PeriodKey::new(year, 1)?.start();
        let to = PeriodKey::new(year, 12)?.end();
        let summary = self.corporate_tax_summary(from, to).await?;
        if summary.to_provision.is_zero() {
            debug!(year, "corporate tax already provisioned");
            return Ok(MovementOutcome {
                entry_id: None,
                entry_number: None,
                amount: Decimal::ZERO,
            });
        }

        let amount = summary.to_provision;
        let input = NewJournalEntry {
            entry_date: date,
            entry_type: EntryType::TaxProvision,
            description: format!("Provisión impuesto sobre sociedades {year}"),
            reference: None,
            project_id: None,
            created_by: user,
            lines: vec![
                NewEntryLine::debit(&self.posting.corporate_tax_expense, amount),
                NewEntryLine::credit(&self.posting.corporate_tax_payable, amount),
            ],
        };
        let expense_net = {
            let snapshot = self.store.snapshot(LineRange::until(to)).await?;
            ReportService::account_net(&snapshot.lines, &self.posting.corporate_tax_expense, to)
        };
        let validated = self.validate(input).await?;
        let receipt = self
            .commit(UnitOfWork {
                guards: vec![
                    Guard::PeriodOpen(date),
                    Guard::AccountBalance {
                        code: self.posting.corporate_tax_expense.clone(),
                        as_of: to,
                        expected: expense_net,
                    },
                ],
                entry: Some(StagedEntry {
                    entry: validated,
                    lock: false,
                }),
                ..UnitOfWork::default()
            })
            .await?;
        let (entry, _) = committed(receipt)?;
        Ok(MovementOutcome {
            entry_id: Some(entry.id),
            entry_number: Some(entry.entry_number),
            amount,
        })
    }
}

fn committed(receipt: CommitReceipt) -> Result<CommittedEntry, LedgerError> {
    receipt
        .entry
        .map(|entry| (entry, receipt.lines))
        .ok_or_else(|| LedgerError::Store(StoreError::Backend("commit returned no entry".to_string())))
}

fn outcome(entry: &JournalEntry) -> MovementOutcome {
    MovementOutcome {
        entry_id: Some(entry.id),
        entry_number: Some(entry.entry_number.clone()),
        amount: entry.total_amount,
    }
}
