//! End-to-end scenarios through the `Ledger` facade on a `MemoryStore`.

use std::sync::Arc;

use chrono::NaiveDate;
use partida_shared::types::{PersonId, ThirdPartyId, UserId};
use partida_shared::{PostingAccounts, TaxRates};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::events::LedgerEvent;
use super::ledger::Ledger;
use super::memory::MemoryStore;
use super::store::{LedgerStore, LineRange, StoreError};
use crate::bank::{
    BalanceAdjustmentRequest, BankAccount, ManualMovementRequest, MovementKind, NewBankAccount, OpeningBalance,
    OpeningEntryRequest, TaxPaymentRequest, TaxPeriod, TaxType, TransferRequest,
};
use crate::chart::{AccountType, AccountUpdate, NewAccount};
use crate::ledger::{
    EntryFilter, EntryType, LedgerError, LineIssue, NewEntryLine, NewJournalEntry, ThirdPartyType,
};
use crate::payroll::{
    NewRunRequest, PaymentMethod, PaymentRequest, PaymentState, RunFilter, RunKind, RunStatus,
};
use crate::reports::BalanceAccumulator;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn ledger() -> (Ledger, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store.clone(), PostingAccounts::default(), TaxRates::default());
    ledger.seed_default_chart().await.unwrap();
    (ledger, store)
}

async fn bank(ledger: &Ledger, name: &str) -> BankAccount {
    ledger
        .create_bank_account(NewBankAccount {
            holder: "Partida SL".to_string(),
            bank: name.to_string(),
            iban: "ES91 2100 0418 4502 0005 1332".to_string(),
            account_code: None,
        })
        .await
        .unwrap()
}

async fn opened(ledger: &Ledger) -> (BankAccount, BankAccount) {
    let a = bank(ledger, "BBVA").await;
    let b = bank(ledger, "Santander").await;
    ledger
        .create_opening_entry(
            OpeningEntryRequest {
                date: date(2026, 1, 1),
                balances: vec![
                    OpeningBalance { bank_account_id: a.id, balance: dec!(1000) },
                    OpeningBalance { bank_account_id: b.id, balance: dec!(500) },
                ],
            },
            UserId::new(),
        )
        .await
        .unwrap();
    (a, b)
}

fn manual_entry(entry_date: NaiveDate, lines: Vec<NewEntryLine>) -> NewJournalEntry {
    NewJournalEntry {
        entry_date,
        entry_type: EntryType::Adjustment,
        description: "manual".to_string(),
        reference: None,
        project_id: None,
        created_by: UserId::new(),
        lines,
    }
}

fn payroll_request() -> NewRunRequest {
    NewRunRequest {
        kind: RunKind::Payroll,
        period_year: 2026,
        period_month: 1,
        person_id: PersonId::new(),
        person_name: "Ana García".to_string(),
        gross_amount: dec!(2000),
        irpf_rate: dec!(15),
    }
}

fn payment(run: &crate::payroll::RunView, bank: &BankAccount, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        run_id: run.run.id,
        bank_account_id: bank.id,
        amount,
        payment_date: date(2026, 2, 5),
        payment_method: PaymentMethod::Transfer,
    }
}

#[tokio::test]
async fn test_opening_entry_scenario() {
    let (ledger, _) = ledger().await;
    let (a, b) = opened(&ledger).await;
    assert_eq!(a.account_code.as_deref(), Some("572001"));
    assert_eq!(b.account_code.as_deref(), Some("572002"));

    let sheet = ledger.balance_sheet(date(2026, 1, 1)).await.unwrap();
    assert!(sheet.is_balanced);
    assert_eq!(sheet.item("572001").unwrap().net_balance, dec!(1000));
    assert_eq!(sheet.item("572002").unwrap().net_balance, dec!(500));
    let equity = sheet.item("100000").unwrap();
    assert_eq!(equity.net_balance, dec!(-1500));
    assert_eq!(equity.natural_balance, dec!(1500));
}

#[tokio::test]
async fn test_transfer_scenario() {
    let (ledger, _) = ledger().await;
    let (a, b) = opened(&ledger).await;

    let outcome = ledger
        .create_transfer(
            TransferRequest {
                source_bank_id: a.id,
                target_bank_id: b.id,
                amount: dec!(200),
                date: date(2026, 1, 10),
                description: None,
            },
            UserId::new(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.entry_number.as_deref(), Some("2026-000002"));

    let balances = ledger.bank_balances(date(2026, 1, 31)).await.unwrap();
    assert_eq!(balances[0].balance, dec!(800));
    assert_eq!(balances[1].balance, dec!(700));
}

#[tokio::test]
async fn test_payroll_scenario() {
    let (ledger, _) = ledger().await;
    let (a, _) = opened(&ledger).await;
    let user = UserId::new();

    let run = ledger.create_run(payroll_request(), user).await.unwrap();
    assert_eq!(run.run.run_number, "NOM-2026-0001");
    assert_eq!(run.run.irpf_amount, dec!(300.00));
    assert_eq!(run.run.net_amount, dec!(1700.00));

    let posted = ledger.post_run(RunKind::Payroll, run.run.id, user).await.unwrap();
    assert!(!posted.already_posted);
    assert_eq!(posted.run.run.status, RunStatus::Posted);
    let lines = ledger.get_entry_lines(posted.entry_id).await.unwrap();
    let debit: Decimal = lines.iter().map(|l| l.debit_amount).sum();
    let credit: Decimal = lines.iter().map(|l| l.credit_amount).sum();
    assert_eq!((debit, credit), (dec!(2000), dec!(2000)));

    let first = ledger
        .pay_run(RunKind::Payroll, payment(&posted.run, &a, dec!(1000)), user)
        .await
        .unwrap();
    assert_eq!(first.payment.payment_number, "PAG-2026-0001");
    assert_eq!(first.run.run.status, RunStatus::Posted);
    assert_eq!(first.run.pending_amount, dec!(700));
    assert_eq!(first.run.payment_state, PaymentState::Partial);

    // A second payment of 1000 would overpay the 1700 net.
    let err = ledger
        .pay_run(RunKind::Payroll, payment(&posted.run, &a, dec!(1000)), user)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientPendingAmount { requested, pending }
            if requested == dec!(1000) && pending == dec!(700)
    ));

    let last = ledger
        .pay_run(RunKind::Payroll, payment(&posted.run, &a, dec!(700)), user)
        .await
        .unwrap();
    assert_eq!(last.run.run.status, RunStatus::Paid);
    assert_eq!(last.run.pending_amount, Decimal::ZERO);
    assert_eq!(last.run.payment_state, PaymentState::Paid);

    let payroll_entries = ledger
        .list_entries(&EntryFilter {
            entry_types: vec![EntryType::Payroll],
            ..EntryFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(payroll_entries.len(), 1);
    assert_eq!(ledger.account_balance("465000", date(2026, 2, 28)).await.unwrap(), Decimal::ZERO);
    assert_eq!(ledger.account_balance("572001", date(2026, 2, 28)).await.unwrap(), dec!(-700));
    assert_eq!(ledger.list_payments(RunKind::Payroll, run.run.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_post_is_idempotent() {
    let (ledger, _) = ledger().await;
    let user = UserId::new();
    let run = ledger.create_run(payroll_request(), user).await.unwrap();

    let first = ledger.post_run(RunKind::Payroll, run.run.id, user).await.unwrap();
    let second = ledger.post_run(RunKind::Payroll, run.run.id, user).await.unwrap();

    assert!(second.already_posted);
    assert_eq!(first.entry_id, second.entry_id);
    assert_eq!(first.entry_number, second.entry_number);
    assert_eq!(ledger.list_entries(&EntryFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_posts_create_one_entry() {
    let (ledger, _) = ledger().await;
    let user = UserId::new();
    let run = ledger.create_run(payroll_request(), user).await.unwrap();

    let (l1, l2) = (ledger.clone(), ledger.clone());
    let id = run.run.id;
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { l1.post_run(RunKind::Payroll, id, user).await }),
        tokio::spawn(async move { l2.post_run(RunKind::Payroll, id, user).await }),
    );
    let (r1, r2) = (r1.unwrap().unwrap(), r2.unwrap().unwrap());

    assert_eq!(r1.entry_number, r2.entry_number);
    assert_ne!(r1.already_posted, r2.already_posted);
    assert_eq!(ledger.list_entries(&EntryFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_kind_must_match() {
    let (ledger, _) = ledger().await;
    let run = ledger.create_run(payroll_request(), UserId::new()).await.unwrap();

    let err = ledger.get_run(RunKind::PartnerCompensation, run.run.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "run", .. }));
}

#[tokio::test]
async fn test_partner_compensation_run() {
    let (ledger, _) = ledger().await;
    let user = UserId::new();
    let run = ledger
        .create_run(
            NewRunRequest {
                kind: RunKind::PartnerCompensation,
                ..payroll_request()
            },
            user,
        )
        .await
        .unwrap();
    assert_eq!(run.run.run_number, "SOC-2026-0001");

    let posted = ledger.post_run(RunKind::PartnerCompensation, run.run.id, user).await.unwrap();
    let entry = ledger.get_entry(posted.entry_id).await.unwrap();
    assert_eq!(entry.entry_type, EntryType::PartnerCompensation);
    assert_eq!(ledger.account_balance("551000", date(2026, 1, 31)).await.unwrap(), dec!(-1700));
    assert_eq!(ledger.account_balance("640100", date(2026, 1, 31)).await.unwrap(), dec!(2000));
}

#[tokio::test]
async fn test_cancel_and_delete_runs() {
    let (ledger, _) = ledger().await;
    let user = UserId::new();

    let draft = ledger.create_run(payroll_request(), user).await.unwrap();
    let cancelled = ledger.cancel_run(RunKind::Payroll, draft.run.id).await.unwrap();
    assert_eq!(cancelled.run.status, RunStatus::Cancelled);
    let err = ledger.post_run(RunKind::Payroll, draft.run.id, user).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { from: RunStatus::Cancelled, .. }));

    let posted = ledger.create_run(payroll_request(), user).await.unwrap();
    ledger.post_run(RunKind::Payroll, posted.run.id, user).await.unwrap();
    let err = ledger.delete_run(RunKind::Payroll, posted.run.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::RunNotDeletable(RunStatus::Posted)));
    let err = ledger.cancel_run(RunKind::Payroll, posted.run.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { from: RunStatus::Posted, to: RunStatus::Cancelled }));

    let doomed = ledger.create_run(payroll_request(), user).await.unwrap();
    ledger.delete_run(RunKind::Payroll, doomed.run.id).await.unwrap();
    let remaining = ledger
        .list_runs(&RunFilter {
            kind: Some(RunKind::Payroll),
            ..RunFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn test_paying_a_draft_is_rejected() {
    let (ledger, _) = ledger().await;
    let (a, _) = opened(&ledger).await;
    let run = ledger.create_run(payroll_request(), UserId::new()).await.unwrap();

    let err = ledger
        .pay_run(RunKind::Payroll, payment(&run, &a, dec!(100)), UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { from: RunStatus::Draft, to: RunStatus::Paid }));
}

#[tokio::test]
async fn test_adjustment_noop_when_balance_matches() {
    let (ledger, _) = ledger().await;
    let (a, _) = opened(&ledger).await;
    let before = ledger.list_entries(&EntryFilter::default()).await.unwrap().len();

    let outcome = ledger
        .adjust_balance(
            BalanceAdjustmentRequest {
                bank_account_id: a.id,
                new_balance: dec!(1000),
                date: date(2026, 1, 15),
            },
            UserId::new(),
        )
        .await
        .unwrap();

    assert!(outcome.is_noop());
    assert_eq!(ledger.list_entries(&EntryFilter::default()).await.unwrap().len(), before);
}

#[tokio::test]
async fn test_adjustment_posts_delta_against_suspense() {
    let (ledger, _) = ledger().await;
    let (a, _) = opened(&ledger).await;

    let outcome = ledger
        .adjust_balance(
            BalanceAdjustmentRequest {
                bank_account_id: a.id,
                new_balance: dec!(950.50),
                date: date(2026, 1, 15),
            },
            UserId::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.amount, dec!(-49.50));
    assert_eq!(ledger.account_balance("572001", date(2026, 1, 15)).await.unwrap(), dec!(950.50));
    assert_eq!(ledger.account_balance("555000", date(2026, 1, 15)).await.unwrap(), dec!(49.50));
}

#[tokio::test]
async fn test_tax_payment_is_locked() {
    let (ledger, _) = ledger().await;
    let (a, _) = opened(&ledger).await;

    let outcome = ledger
        .create_tax_payment(
            TaxPaymentRequest {
                bank_account_id: a.id,
                tax_type: TaxType::Vat,
                amount: dec!(147),
                date: date(2026, 1, 20),
                period: Some(TaxPeriod { year: 2025, quarter: Some(4) }),
            },
            UserId::new(),
        )
        .await
        .unwrap();

    let entry = ledger.get_entry(outcome.entry_id.unwrap()).await.unwrap();
    assert!(entry.is_locked);
    assert_eq!(entry.entry_type, EntryType::TaxPayment);
    let vat = ledger.vat_summary(date(2026, 1, 1), date(2026, 3, 31)).await.unwrap();
    assert_eq!(vat.paid_to_agency, dec!(147));
}

#[tokio::test]
async fn test_manual_movement_uses_category_account() {
    let (ledger, _) = ledger().await;
    let (a, _) = opened(&ledger).await;

    ledger
        .create_manual_movement(
            ManualMovementRequest {
                bank_account_id: a.id,
                category: "bank_fees".to_string(),
                amount: dec!(12.50),
                kind: MovementKind::Expense,
                date: date(2026, 1, 31),
                description: "Comisión mantenimiento".to_string(),
            },
            UserId::new(),
        )
        .await
        .unwrap();

    let pnl = ledger.profit_and_loss(date(2026, 1, 1), date(2026, 1, 31)).await.unwrap();
    assert_eq!(pnl.total_expenses, dec!(12.50));
    assert_eq!(pnl.items[0].account_code, "626000");
}

#[tokio::test]
async fn test_closed_period_rejects_every_write() {
    let (ledger, store) = ledger().await;
    let (a, b) = opened(&ledger).await;
    let user = UserId::new();
    let run = ledger.create_run(payroll_request(), user).await.unwrap();

    let summary = ledger.close_period(2026, 1).await.unwrap();
    assert!(summary.is_closed);
    let opening = ledger.list_entries(&EntryFilter::default()).await.unwrap();
    assert!(opening.iter().all(|e| e.is_locked));
    let lines_before = store.snapshot(LineRange::all()).await.unwrap().lines.len();

    let closed = |err: LedgerError| matches!(err, LedgerError::PeriodClosed { year: 2026, month: 1, .. });

    let err = ledger
        .create_entry(manual_entry(
            date(2026, 1, 20),
            vec![NewEntryLine::debit("572001", dec!(5)), NewEntryLine::credit("555000", dec!(5))],
        ))
        .await
        .unwrap_err();
    assert!(closed(err));

    let err = ledger
        .create_transfer(
            TransferRequest {
                source_bank_id: a.id,
                target_bank_id: b.id,
                amount: dec!(10),
                date: date(2026, 1, 31),
                description: None,
            },
            user,
        )
        .await
        .unwrap_err();
    assert!(closed(err));

    let err = ledger.post_run(RunKind::Payroll, run.run.id, user).await.unwrap_err();
    assert!(closed(err));
    assert_eq!(ledger.get_run(RunKind::Payroll, run.run.id).await.unwrap().run.status, RunStatus::Draft);

    // Balance already matches, but the period is closed.
    let err = ledger
        .adjust_balance(
            BalanceAdjustmentRequest {
                bank_account_id: a.id,
                new_balance: dec!(1000),
                date: date(2026, 1, 31),
            },
            user,
        )
        .await
        .unwrap_err();
    assert!(closed(err));

    // Nothing to provision, but the period is closed.
    let err = ledger.provision_corporate_tax(2026, date(2026, 1, 31), user).await.unwrap_err();
    assert!(closed(err));

    let err = ledger.close_period(2026, 1).await.unwrap_err();
    assert!(closed(err));

    assert_eq!(store.snapshot(LineRange::all()).await.unwrap().lines.len(), lines_before);

    // February is still open.
    ledger
        .create_entry(manual_entry(
            date(2026, 2, 1),
            vec![NewEntryLine::debit("572001", dec!(5)), NewEntryLine::credit("555000", dec!(5))],
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_atomicity_under_injected_failure() {
    let (ledger, store) = ledger().await;
    opened(&ledger).await;
    let before = store.snapshot(LineRange::all()).await.unwrap().lines.len();

    store.fail_after_lines(2);
    let err = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![
                NewEntryLine::debit("572001", dec!(30)),
                NewEntryLine::debit("572002", dec!(20)),
                NewEntryLine::credit("555000", dec!(50)),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Store(StoreError::Backend(_))));
    assert_eq!(store.snapshot(LineRange::all()).await.unwrap().lines.len(), before);

    // The failed commit consumed no number.
    let (entry, _) = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![NewEntryLine::debit("572001", dec!(30)), NewEntryLine::credit("555000", dec!(30))],
        ))
        .await
        .unwrap();
    assert_eq!(entry.entry_number, "2026-000002");
}

#[tokio::test]
async fn test_rejections_carry_context() {
    let (ledger, _) = ledger().await;

    let err = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![NewEntryLine::debit("572000", dec!(100)), NewEntryLine::credit("555000", dec!(90))],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnbalancedEntry { delta, .. } if delta == dec!(10)));

    let err = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![NewEntryLine::debit("572000", dec!(100)), NewEntryLine::credit("999999", dec!(100))],
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidLine { line: 2, reason: LineIssue::UnknownAccount(ref code) } if code == "999999"
    ));

    ledger.set_account_active("629000", false).await.unwrap();
    let err = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![NewEntryLine::debit("629000", dec!(100)), NewEntryLine::credit("572000", dec!(100))],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidLine { line: 1, reason: LineIssue::InactiveAccount(_) }));
}

#[tokio::test]
async fn test_third_party_lines_must_match_registry() {
    let (ledger, _) = ledger().await;
    let client = ThirdPartyId::new();
    ledger.register_third_party(client, ThirdPartyType::Client, "Acme").await.unwrap();

    let sale = |party_type| {
        manual_entry(
            date(2026, 3, 1),
            vec![
                NewEntryLine::debit("430000", dec!(121)).with_third_party(client, party_type),
                NewEntryLine::credit("705000", dec!(100)),
                NewEntryLine::credit("477000", dec!(21)),
            ],
        )
    };

    let err = ledger.create_entry(sale(ThirdPartyType::Supplier)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidLine { line: 1, reason: LineIssue::ThirdPartyTypeMismatch { .. } }));

    ledger.create_entry(sale(ThirdPartyType::Client)).await.unwrap();
    let clients = ledger.client_balances(date(2026, 3, 31)).await.unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].net, dec!(121));
    assert!(ledger.supplier_technician_balances(date(2026, 3, 31)).await.unwrap().is_empty());

    let err = ledger
        .register_third_party(client, ThirdPartyType::Supplier, "Acme")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_account_frozen_once_referenced() {
    let (ledger, _) = ledger().await;
    let account = ledger
        .create_account(NewAccount::new("629100", "Software", AccountType::Expense))
        .await
        .unwrap();
    assert!(account.is_active);

    let err = ledger
        .create_account(NewAccount::new("629100", "Software", AccountType::Expense))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateAccount(_)));

    // Free to rename while unreferenced.
    let renamed = ledger
        .update_account(
            "629100",
            AccountUpdate {
                name: Some("Licencias de software".to_string()),
                ..AccountUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Licencias de software");

    ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![NewEntryLine::debit("629100", dec!(10)), NewEntryLine::credit("572000", dec!(10))],
        ))
        .await
        .unwrap();

    let retype = AccountUpdate {
        account_type: Some(AccountType::Asset),
        ..AccountUpdate::default()
    };
    let err = ledger.update_account("629100", retype).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountImmutable(ref code) if code == "629100"));

    let rename = AccountUpdate {
        name: Some("Renamed".to_string()),
        ..AccountUpdate::default()
    };
    let err = ledger.update_account("629100", rename).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountImmutable(_)));

    let stored = ledger.get_account("629100").await.unwrap();
    assert_eq!(stored.name, "Licencias de software");
    assert_eq!(stored.account_type, AccountType::Expense);

    // The active flag still toggles, and restating the same name is allowed.
    let toggled = ledger
        .update_account(
            "629100",
            AccountUpdate {
                name: Some("Licencias de software".to_string()),
                is_active: Some(false),
                ..AccountUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(!toggled.is_active);
}

#[tokio::test]
async fn test_bank_ledger_account_frozen_after_opening() {
    let (ledger, _) = ledger().await;
    let (a, _) = opened(&ledger).await;
    let code = a.account_code.clone().unwrap();

    let err = ledger
        .update_account(
            &code,
            AccountUpdate {
                name: Some("Renamed".to_string()),
                ..AccountUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountImmutable(_)));
    assert_ne!(ledger.get_account(&code).await.unwrap().name, "Renamed");
}

#[tokio::test]
async fn test_oversized_amounts_rejected_not_panicking() {
    let (ledger, _) = ledger().await;
    let err = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![
                NewEntryLine::debit("572000", Decimal::MAX),
                NewEntryLine::debit("572000", Decimal::MAX),
                NewEntryLine::credit("555000", Decimal::MAX),
                NewEntryLine::credit("555000", Decimal::MAX),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidLine { line: 1, reason: LineIssue::AmountTooLarge }));

    let err = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![
                NewEntryLine::debit("572000", dec!(10000000000000)),
                NewEntryLine::credit("555000", dec!(10000000000000)),
            ],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 400);
    assert!(ledger.list_entries(&EntryFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_rates_that_leave_nothing_to_pay_rejected() {
    let (ledger, _) = ledger().await;
    for irpf_rate in [dec!(100), dec!(15.125)] {
        let err = ledger
            .create_run(NewRunRequest { irpf_rate, ..payroll_request() }, UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
    assert!(ledger.list_runs(&RunFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corporate_tax_provision() {
    let (ledger, _) = ledger().await;
    let user = UserId::new();
    ledger
        .create_entry(manual_entry(
            date(2026, 6, 1),
            vec![NewEntryLine::debit("430000", dec!(10000)), NewEntryLine::credit("705000", dec!(10000))],
        ))
        .await
        .unwrap();

    let first = ledger.provision_corporate_tax(2026, date(2026, 12, 31), user).await.unwrap();
    assert_eq!(first.amount, dec!(2500));
    let again = ledger.provision_corporate_tax(2026, date(2026, 12, 31), user).await.unwrap();
    assert!(again.is_noop());

    let summary = ledger.corporate_tax_summary(date(2026, 1, 1), date(2026, 12, 31)).await.unwrap();
    assert_eq!(summary.provisioned, dec!(2500));
    assert_eq!(summary.to_provision, Decimal::ZERO);
    assert_eq!(summary.profit_before_tax, dec!(10000));

    let err = ledger.provision_corporate_tax(2026, date(2027, 1, 1), user).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_periods_for_closure() {
    let (ledger, _) = ledger().await;
    opened(&ledger).await;
    ledger
        .create_entry(manual_entry(
            date(2026, 2, 3),
            vec![NewEntryLine::debit("572001", dec!(80)), NewEntryLine::credit("759000", dec!(80))],
        ))
        .await
        .unwrap();
    ledger.close_period(2026, 1).await.unwrap();

    let periods = ledger.list_periods_for_closure(date(2026, 3, 10), 2).await.unwrap();
    let keys: Vec<(i32, u32)> = periods.iter().map(|p| (p.year, p.month)).collect();
    assert_eq!(keys, vec![(2026, 3), (2026, 2), (2026, 1)]);
    assert!(periods[2].is_closed);
    assert_eq!(periods[2].entry_count, 1);
    assert_eq!(periods[1].income, dec!(80));
    assert_eq!(periods[1].profit, dec!(80));
    assert!(!periods[1].is_closed);
}

#[tokio::test]
async fn test_unavailable_store_fails_fast() {
    let (ledger, store) = ledger().await;
    store.set_unavailable(true);
    let err = ledger.balance_sheet(date(2026, 1, 1)).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.http_status_code(), 503);
}

#[tokio::test]
async fn test_events_feed_accumulator() {
    let (ledger, _) = ledger().await;
    let mut events = ledger.subscribe();
    let mut accumulator = BalanceAccumulator::new(ledger.list_accounts(false).await.unwrap());

    let (a, b) = opened(&ledger).await;
    ledger
        .create_transfer(
            TransferRequest {
                source_bank_id: a.id,
                target_bank_id: b.id,
                amount: dec!(200),
                date: date(2026, 1, 10),
                description: Some("Traspaso".to_string()),
            },
            UserId::new(),
        )
        .await
        .unwrap();

    while let Ok(event) = events.try_recv() {
        accumulator.apply(&event);
    }
    let as_of = date(2026, 1, 31);
    assert_eq!(accumulator.entry_count(), 2);
    assert_eq!(accumulator.balance_sheet(as_of), ledger.balance_sheet(as_of).await.unwrap());
}

#[tokio::test]
async fn test_lock_entry_publishes_once() {
    let (ledger, _) = ledger().await;
    let (entry, _) = ledger
        .create_entry(manual_entry(
            date(2026, 1, 5),
            vec![NewEntryLine::debit("572000", dec!(10)), NewEntryLine::credit("555000", dec!(10))],
        ))
        .await
        .unwrap();
    let mut events = ledger.subscribe();

    assert!(ledger.lock_entry(entry.id).await.unwrap().is_locked);
    assert!(ledger.lock_entry(entry.id).await.unwrap().is_locked);

    let locked: Vec<LedgerEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(locked, vec![LedgerEvent::EntryLocked { entry_id: entry.id }]);
}

fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* set of lines, a committed entry SHALL have equal debit and
    /// credit totals, and a rejected one SHALL leave no trace.
    #[test]
    fn prop_committed_entries_are_balanced(
        debits in prop::collection::vec(amount(), 1..4),
        credits in prop::collection::vec(amount(), 1..4),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let (ledger, store) = ledger().await;
            let mut lines: Vec<NewEntryLine> = debits.iter().map(|d| NewEntryLine::debit("572000", *d)).collect();
            lines.extend(credits.iter().map(|c| NewEntryLine::credit("555000", *c)));
            let balanced = debits.iter().sum::<Decimal>() == credits.iter().sum::<Decimal>();

            match ledger.create_entry(manual_entry(date(2026, 4, 1), lines)).await {
                Ok((entry, lines)) => {
                    let debit: Decimal = lines.iter().map(|l| l.debit_amount).sum();
                    let credit: Decimal = lines.iter().map(|l| l.credit_amount).sum();
                    prop_assert!(balanced);
                    prop_assert_eq!(debit, credit);
                    prop_assert_eq!(entry.total_amount, debit);
                }
                Err(err) => {
                    prop_assert!(!balanced);
                    let is_unbalanced = matches!(err, LedgerError::UnbalancedEntry { .. });
                    prop_assert!(is_unbalanced);
                    prop_assert!(store.snapshot(LineRange::all()).await.unwrap().lines.is_empty());
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
