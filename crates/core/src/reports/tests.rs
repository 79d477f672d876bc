//! Scenario and property tests for report generation.

use chrono::{NaiveDate, Utc};
use partida_shared::PostingAccounts;
use partida_shared::types::{BankAccountId, JournalEntryId, ThirdPartyId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::accumulator::BalanceAccumulator;
use super::service::ReportService;
use crate::bank::BankAccount;
use crate::chart::{Account, AccountType, default_chart};
use crate::ledger::{
    EntryType, JournalEntry, JournalEntryLine, LedgerLine, NewEntryLine, ThirdParty, ThirdPartyType,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn chart() -> Vec<Account> {
    let mut accounts: Vec<Account> = default_chart()
        .into_iter()
        .map(|a| Account {
            code: a.code,
            name: a.name,
            account_type: a.account_type,
            is_active: true,
        })
        .collect();
    for (code, name) in [("572001", "BBVA"), ("572002", "Santander")] {
        accounts.push(Account {
            code: code.to_string(),
            name: name.to_string(),
            account_type: AccountType::Asset,
            is_active: true,
        });
    }
    accounts
}

/// Builds a committed entry from lines, the way the store would.
fn committed(entry_date: NaiveDate, entry_type: EntryType, lines: &[NewEntryLine]) -> (JournalEntry, Vec<JournalEntryLine>) {
    let id = JournalEntryId::new();
    let entry = JournalEntry {
        id,
        entry_number: "2026-000001".to_string(),
        entry_date,
        entry_type,
        description: "test".to_string(),
        reference: None,
        project_id: None,
        total_amount: lines.iter().map(|l| l.debit).sum(),
        is_locked: false,
        created_by: UserId::new(),
        created_at: Utc::now(),
    };
    let lines = lines
        .iter()
        .zip(1..)
        .map(|(l, line_order)| JournalEntryLine {
            entry_id: id,
            line_order,
            account_code: l.account_code.clone(),
            debit_amount: l.debit,
            credit_amount: l.credit,
            description: l.description.clone(),
            third_party_id: l.third_party_id,
            third_party_type: l.third_party_type,
        })
        .collect();
    (entry, lines)
}

fn flatten(entries: &[(JournalEntry, Vec<JournalEntryLine>)]) -> Vec<LedgerLine> {
    entries
        .iter()
        .flat_map(|(entry, lines)| lines.iter().map(move |l| LedgerLine::from_parts(entry, l)))
        .collect()
}

fn opening() -> (JournalEntry, Vec<JournalEntryLine>) {
    committed(
        date(2026, 1, 1),
        EntryType::BankOpening,
        &[
            NewEntryLine::debit("572001", dec!(1000)),
            NewEntryLine::debit("572002", dec!(500)),
            NewEntryLine::credit("100000", dec!(1500)),
        ],
    )
}

#[test]
fn test_opening_balances_and_natural_sign() {
    let lines = flatten(&[opening()]);
    let sheet = ReportService::balance_sheet(&chart(), &lines, date(2026, 1, 31));

    assert!(sheet.is_balanced);
    assert_eq!(sheet.total_debit, dec!(1500));
    assert_eq!(sheet.item("572001").unwrap().net_balance, dec!(1000));
    assert_eq!(sheet.item("572002").unwrap().net_balance, dec!(500));

    let equity = sheet.item("100000").unwrap();
    assert_eq!(equity.net_balance, dec!(-1500));
    assert_eq!(equity.natural_balance, dec!(1500));

    // every chart account is listed, even without movements
    assert_eq!(sheet.items.len(), chart().len());
    assert_eq!(sheet.item("430000").unwrap().net_balance, Decimal::ZERO);
}

#[test]
fn test_balance_sheet_respects_as_of() {
    let transfer = committed(
        date(2026, 2, 10),
        EntryType::BankTransfer,
        &[NewEntryLine::debit("572002", dec!(200)), NewEntryLine::credit("572001", dec!(200))],
    );
    let lines = flatten(&[opening(), transfer]);

    let before = ReportService::balance_sheet(&chart(), &lines, date(2026, 2, 9));
    assert_eq!(before.item("572001").unwrap().net_balance, dec!(1000));

    let after = ReportService::balance_sheet(&chart(), &lines, date(2026, 2, 10));
    assert_eq!(after.item("572001").unwrap().net_balance, dec!(800));
    assert_eq!(after.item("572002").unwrap().net_balance, dec!(700));
    assert_eq!(
        ReportService::account_net(&lines, "572001", date(2026, 2, 10)),
        dec!(800)
    );
}

#[test]
fn test_profit_and_loss_signs() {
    let sale = committed(
        date(2026, 3, 5),
        EntryType::InvoiceSale,
        &[
            NewEntryLine::debit("430000", dec!(1210)),
            NewEntryLine::credit("705000", dec!(1000)),
            NewEntryLine::credit("477000", dec!(210)),
        ],
    );
    let purchase = committed(
        date(2026, 3, 8),
        EntryType::InvoicePurchase,
        &[
            NewEntryLine::debit("629000", dec!(300)),
            NewEntryLine::debit("472000", dec!(63)),
            NewEntryLine::credit("400000", dec!(363)),
        ],
    );
    let lines = flatten(&[opening(), sale, purchase]);

    let pnl = ReportService::profit_and_loss(&chart(), &lines, date(2026, 3, 1), date(2026, 3, 31));
    assert_eq!(pnl.total_income, dec!(1000));
    assert_eq!(pnl.total_expenses, dec!(300));
    assert_eq!(pnl.profit, dec!(700));
    assert_eq!(pnl.items.len(), 2);
    assert_eq!(pnl.items[1].account_code, "705000");
    assert_eq!(pnl.items[0].amount, dec!(-300));

    let vat = ReportService::vat_summary(&lines, &PostingAccounts::default(), date(2026, 3, 1), date(2026, 3, 31));
    assert_eq!(vat.vat_received, dec!(210));
    assert_eq!(vat.vat_paid, dec!(63));
    assert_eq!(vat.to_pay, dec!(147));
    assert_eq!(vat.to_compensate, Decimal::ZERO);

    let april = ReportService::profit_and_loss(&chart(), &lines, date(2026, 4, 1), date(2026, 4, 30));
    assert!(april.items.is_empty());
    assert_eq!(april.profit, Decimal::ZERO);
}

#[test]
fn test_third_party_balances_filter_by_type() {
    let client = ThirdParty {
        id: ThirdPartyId::new(),
        party_type: ThirdPartyType::Client,
        name: "Acme".to_string(),
    };
    let supplier = ThirdParty {
        id: ThirdPartyId::new(),
        party_type: ThirdPartyType::Supplier,
        name: "Proveedora".to_string(),
    };
    let sale = committed(
        date(2026, 3, 5),
        EntryType::InvoiceSale,
        &[
            NewEntryLine::debit("430000", dec!(1210)).with_third_party(client.id, ThirdPartyType::Client),
            NewEntryLine::credit("705000", dec!(1210)),
        ],
    );
    let purchase = committed(
        date(2026, 3, 8),
        EntryType::InvoicePurchase,
        &[
            NewEntryLine::debit("629000", dec!(363)),
            NewEntryLine::credit("400000", dec!(363)).with_third_party(supplier.id, ThirdPartyType::Supplier),
        ],
    );
    let lines = flatten(&[sale, purchase]);
    let parties = vec![client.clone(), supplier.clone()];

    let clients = ReportService::third_party_balances(&parties, &lines, &[ThirdPartyType::Client], date(2026, 3, 31));
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].third_party_id, client.id);
    assert_eq!(clients[0].net, dec!(1210));
    assert_eq!(clients[0].name.as_deref(), Some("Acme"));

    let payables = ReportService::third_party_balances(
        &parties,
        &lines,
        &[ThirdPartyType::Supplier, ThirdPartyType::Technician],
        date(2026, 3, 31),
    );
    assert_eq!(payables.len(), 1);
    assert_eq!(payables[0].net, dec!(-363));

    let early = ReportService::third_party_balances(&parties, &lines, &[ThirdPartyType::Client], date(2026, 3, 1));
    assert!(early.is_empty());
}

#[test]
fn test_irpf_and_corporate_tax_summaries() {
    let posting = PostingAccounts::default();
    let sale = committed(
        date(2026, 1, 10),
        EntryType::InvoiceSale,
        &[NewEntryLine::debit("430000", dec!(10000)), NewEntryLine::credit("705000", dec!(10000))],
    );
    let payroll = committed(
        date(2026, 1, 31),
        EntryType::Payroll,
        &[
            NewEntryLine::debit("640000", dec!(2000)),
            NewEntryLine::credit("475100", dec!(300)),
            NewEntryLine::credit("465000", dec!(1700)),
        ],
    );
    let irpf_paid = committed(
        date(2026, 4, 20),
        EntryType::TaxPayment,
        &[NewEntryLine::debit("475100", dec!(300)), NewEntryLine::credit("572001", dec!(300))],
    );
    let provision = committed(
        date(2026, 12, 31),
        EntryType::TaxProvision,
        &[NewEntryLine::debit("630000", dec!(1000)), NewEntryLine::credit("475200", dec!(1000))],
    );
    let lines = flatten(&[opening(), sale, payroll, irpf_paid, provision]);
    let (from, to) = (date(2026, 1, 1), date(2026, 12, 31));

    let irpf = ReportService::irpf_summary(&lines, &posting, from, to);
    assert_eq!(irpf.withheld, dec!(300));
    assert_eq!(irpf.paid_to_agency, dec!(300));
    assert_eq!(irpf.pending, Decimal::ZERO);

    let tax = ReportService::corporate_tax_summary(&chart(), &lines, &posting, dec!(25), from, to);
    assert_eq!(tax.income, dec!(10000));
    assert_eq!(tax.expenses, dec!(2000));
    assert_eq!(tax.profit_before_tax, dec!(8000));
    assert_eq!(tax.estimated_tax, dec!(2000));
    assert_eq!(tax.provisioned, dec!(1000));
    assert_eq!(tax.to_provision, dec!(1000));
    assert_eq!(tax.pending_payment, dec!(1000));
}

#[test]
fn test_corporate_tax_never_negative() {
    let loss = committed(
        date(2026, 5, 1),
        EntryType::ManualExpense,
        &[NewEntryLine::debit("629000", dec!(500)), NewEntryLine::credit("572001", dec!(500))],
    );
    let lines = flatten(&[loss]);
    let tax = ReportService::corporate_tax_summary(
        &chart(),
        &lines,
        &PostingAccounts::default(),
        dec!(25),
        date(2026, 1, 1),
        date(2026, 12, 31),
    );
    assert_eq!(tax.profit_before_tax, dec!(-500));
    assert_eq!(tax.estimated_tax, Decimal::ZERO);
    assert_eq!(tax.to_provision, Decimal::ZERO);
}

#[test]
fn test_bank_balances() {
    let lines = flatten(&[opening()]);
    let bank = |code: Option<&str>| BankAccount {
        id: BankAccountId::new(),
        holder: "Partida SL".to_string(),
        bank: "BBVA".to_string(),
        iban: "ES9121000418450200051332".to_string(),
        account_code: code.map(str::to_string),
        created_at: Utc::now(),
    };
    let banks = vec![bank(Some("572001")), bank(None)];

    let balances = ReportService::bank_balances(&banks, &lines, date(2026, 1, 1));
    assert_eq!(balances[0].balance, dec!(1000));
    assert_eq!(balances[1].balance, Decimal::ZERO);
}

#[test]
fn test_accumulator_ignores_replayed_entries() {
    let (entry, lines) = opening();
    let mut acc = BalanceAccumulator::new(chart());

    assert!(acc.record_entry(&entry, &lines));
    assert!(!acc.record_entry(&entry, &lines));
    assert_eq!(acc.entry_count(), 1);
    assert_eq!(acc.account_net("572001", date(2026, 1, 1)), dec!(1000));
    assert_eq!(acc.account_net("572001", date(2025, 12, 31)), Decimal::ZERO);
}

const CODES: [&str; 6] = ["572001", "572002", "430000", "705000", "629000", "100000"];

fn entry_strategy() -> impl Strategy<Value = (u32, Vec<(usize, usize, i64)>)> {
    (
        1u32..=28,
        prop::collection::vec((0..CODES.len(), 0..CODES.len(), 1i64..1_000_000i64), 1..4),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* sequence of balanced entries, the incrementally maintained
    /// balance sheet SHALL equal a full recomputation at every date.
    #[test]
    fn prop_accumulator_matches_recomputation(
        entries in prop::collection::vec(entry_strategy(), 0..12),
        as_of_day in 1u32..=28,
    ) {
        let committed_entries: Vec<_> = entries
            .iter()
            .map(|(day, pairs)| {
                let lines: Vec<NewEntryLine> = pairs
                    .iter()
                    .flat_map(|(dr, cr, cents)| {
                        let amount = Decimal::new(*cents, 2);
                        [NewEntryLine::debit(CODES[*dr], amount), NewEntryLine::credit(CODES[*cr], amount)]
                    })
                    .collect();
                committed(date(2026, 6, *day), EntryType::Adjustment, &lines)
            })
            .collect();

        let mut acc = BalanceAccumulator::new(chart());
        for (entry, lines) in &committed_entries {
            acc.record_entry(entry, lines);
        }

        let as_of = date(2026, 6, as_of_day);
        let recomputed = ReportService::balance_sheet(&chart(), &flatten(&committed_entries), as_of);
        let incremental = acc.balance_sheet(as_of);

        prop_assert!(recomputed.is_balanced);
        prop_assert_eq!(incremental, recomputed);
    }

    /// *For any* set of balanced entries, total debits SHALL equal total
    /// credits in the balance sheet.
    #[test]
    fn prop_trial_balance_is_balanced(entries in prop::collection::vec(entry_strategy(), 1..12)) {
        let committed_entries: Vec<_> = entries
            .iter()
            .map(|(day, pairs)| {
                let lines: Vec<NewEntryLine> = pairs
                    .iter()
                    .flat_map(|(dr, cr, cents)| {
                        let amount = Decimal::new(*cents, 2);
                        [NewEntryLine::debit(CODES[*dr], amount), NewEntryLine::credit(CODES[*cr], amount)]
                    })
                    .collect();
                committed(date(2026, 6, *day), EntryType::Adjustment, &lines)
            })
            .collect();

        let sheet = ReportService::balance_sheet(&chart(), &flatten(&committed_entries), date(2026, 6, 30));
        let net_sum: Decimal = sheet.items.iter().map(|i| i.net_balance).sum();

        prop_assert_eq!(sheet.total_debit, sheet.total_credit);
        prop_assert_eq!(net_sum, Decimal::ZERO);
    }
}
