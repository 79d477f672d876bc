//! Report generation service.
//!
//! Every function here is a deterministic function of the line set it is
//! given; callers supply a consistent snapshot.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use partida_shared::PostingAccounts;
use partida_shared::types::ThirdPartyId;
use partida_shared::types::money::round_money;
use rust_decimal::Decimal;

use super::types::{
    BalanceSheet, BalanceSheetItem, BankBalance, CorporateTaxSummary, IrpfSummary, ProfitAndLoss,
    ProfitLossItem, ThirdPartyBalance, VatSummary,
};
use crate::bank::BankAccount;
use crate::chart::{Account, AccountType};
use crate::ledger::{EntryTotals, EntryType, LedgerLine, ThirdParty, ThirdPartyType};

/// Per-account debit and credit totals, keyed by account code.
pub type AccountTotals = BTreeMap<String, EntryTotals>;

/// Service for generating financial reports from journal lines.
pub struct ReportService;

impl ReportService {
    /// Sums debits and credits per account for lines dated in `[from, to]`.
    ///
    /// `from = None` means from the beginning of the ledger.
    #[must_use]
    pub fn account_totals(lines: &[LedgerLine], from: Option<NaiveDate>, to: NaiveDate) -> AccountTotals {
        let mut totals = AccountTotals::new();
        for line in lines
            .iter()
            .filter(|l| l.entry_date <= to && from.is_none_or(|f| l.entry_date >= f))
        {
            let entry = totals.entry(line.account_code.clone()).or_insert(EntryTotals {
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
            });
            entry.debit += line.debit;
            entry.credit += line.credit;
        }
        totals
    }

    /// Generates the balance sheet as of a date.
    ///
    /// Every account in the chart gets an item, including accounts without
    /// lines.
    #[must_use]
    pub fn balance_sheet(accounts: &[Account], lines: &[LedgerLine], as_of: NaiveDate) -> BalanceSheet {
        let totals = Self::account_totals(lines, None, as_of);
        Self::balance_sheet_from_totals(accounts, &totals, as_of)
    }

    /// Builds the balance sheet from precomputed per-account totals.
    #[must_use]
    pub fn balance_sheet_from_totals<'a>(
        accounts: impl IntoIterator<Item = &'a Account>,
        totals: &AccountTotals,
        as_of: NaiveDate,
    ) -> BalanceSheet {
        let mut items: Vec<BalanceSheetItem> = accounts
            .into_iter()
            .map(|account| {
                let (debit_balance, credit_balance) = totals
                    .get(&account.code)
                    .map_or((Decimal::ZERO, Decimal::ZERO), |t| (t.debit, t.credit));
                let net_balance = debit_balance - credit_balance;
                let normal_side = account.normal_side();

                BalanceSheetItem {
                    account_code: account.code.clone(),
                    account_name: account.name.clone(),
                    account_type: account.account_type,
                    normal_side,
                    debit_balance,
                    credit_balance,
                    net_balance,
                    natural_balance: normal_side.natural(net_balance),
                }
            })
            .collect();
        items.sort_by(|a, b| a.account_code.cmp(&b.account_code));

        let total_debit: Decimal = items.iter().map(|i| i.debit_balance).sum();
        let total_credit: Decimal = items.iter().map(|i| i.credit_balance).sum();

        BalanceSheet {
            as_of,
            items,
            total_debit,
            total_credit,
            is_balanced: total_debit == total_credit,
        }
    }

    /// Returns the `debit - credit` net of one account as of a date.
    #[must_use]
    pub fn account_net(lines: &[LedgerLine], code: &str, as_of: NaiveDate) -> Decimal {
        lines
            .iter()
            .filter(|l| l.account_code == code && l.entry_date <= as_of)
            .map(LedgerLine::net)
            .sum()
    }

    /// Generates the profit and loss statement for `[from, to]`.
    ///
    /// Item amounts are `credit - debit`, so income is positive.
    #[must_use]
    pub fn profit_and_loss(
        accounts: &[Account],
        lines: &[LedgerLine],
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProfitAndLoss {
        let totals = Self::account_totals(lines, Some(from), to);

        let mut items: Vec<ProfitLossItem> = accounts
            .iter()
            .filter(|a| a.account_type.is_profit_and_loss())
            .filter_map(|account| {
                totals.get(&account.code).map(|t| ProfitLossItem {
                    account_code: account.code.clone(),
                    account_name: account.name.clone(),
                    account_type: account.account_type,
                    amount: t.credit - t.debit,
                })
            })
            .collect();
        items.sort_by(|a, b| a.account_code.cmp(&b.account_code));

        let total_income: Decimal = items
            .iter()
            .filter(|i| i.account_type == AccountType::Revenue)
            .map(|i| i.amount)
            .sum();
        let total_expenses: Decimal = items
            .iter()
            .filter(|i| i.account_type == AccountType::Expense)
            .map(|i| -i.amount)
            .sum();

        ProfitAndLoss {
            period_start: from,
            period_end: to,
            items,
            total_income,
            total_expenses,
            profit: total_income - total_expenses,
        }
    }

    /// Groups lines by third party, restricted to the given types.
    ///
    /// Ordered by name, then id. Parties without lines are omitted.
    #[must_use]
    pub fn third_party_balances(
        parties: &[ThirdParty],
        lines: &[LedgerLine],
        types: &[ThirdPartyType],
        as_of: NaiveDate,
    ) -> Vec<ThirdPartyBalance> {
        let names: HashMap<ThirdPartyId, &str> =
            parties.iter().map(|p| (p.id, p.name.as_str())).collect();

        let mut grouped: BTreeMap<(ThirdPartyId, ThirdPartyType), EntryTotals> = BTreeMap::new();
        for line in lines.iter().filter(|l| l.entry_date <= as_of) {
            let (Some(id), Some(party_type)) = (line.third_party_id, line.third_party_type) else {
                continue;
            };
            if !types.contains(&party_type) {
                continue;
            }
            let totals = grouped.entry((id, party_type)).or_insert(EntryTotals {
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
            });
            totals.debit += line.debit;
            totals.credit += line.credit;
        }

        let mut balances: Vec<ThirdPartyBalance> = grouped
            .into_iter()
            .map(|((id, party_type), totals)| ThirdPartyBalance {
                third_party_id: id,
                third_party_type: party_type,
                name: names.get(&id).map(|n| (*n).to_string()),
                debit: totals.debit,
                credit: totals.credit,
                net: totals.delta(),
            })
            .collect();
        balances.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.third_party_id.cmp(&b.third_party_id))
        });
        balances
    }

    /// Computes the VAT position for `[from, to]`.
    #[must_use]
    pub fn vat_summary(
        lines: &[LedgerLine],
        posting: &PostingAccounts,
        from: NaiveDate,
        to: NaiveDate,
    ) -> VatSummary {
        let in_range: Vec<&LedgerLine> = Self::in_range(lines, from, to).collect();

        let vat_received: Decimal = in_range
            .iter()
            .filter(|l| l.account_code == posting.vat_output)
            .map(|l| l.credit - l.debit)
            .sum();
        let vat_paid: Decimal = in_range
            .iter()
            .filter(|l| l.account_code == posting.vat_input)
            .map(|l| l.net())
            .sum();
        let paid_to_agency = Self::tax_payments(&in_range, &posting.vat_payable);
        let net = vat_received - vat_paid;

        VatSummary {
            period_start: from,
            period_end: to,
            vat_received,
            vat_paid,
            net,
            to_pay: net.max(Decimal::ZERO),
            to_compensate: (-net).max(Decimal::ZERO),
            paid_to_agency,
        }
    }

    /// Computes the IRPF withholding position for `[from, to]`.
    #[must_use]
    pub fn irpf_summary(
        lines: &[LedgerLine],
        posting: &PostingAccounts,
        from: NaiveDate,
        to: NaiveDate,
    ) -> IrpfSummary {
        let in_range: Vec<&LedgerLine> = Self::in_range(lines, from, to).collect();

        let withheld: Decimal = in_range
            .iter()
            .filter(|l| l.account_code == posting.irpf_payable && l.entry_type != EntryType::TaxPayment)
            .map(|l| l.credit - l.debit)
            .sum();
        let retained_by_clients: Decimal = in_range
            .iter()
            .filter(|l| l.account_code == posting.irpf_receivable)
            .map(|l| l.net())
            .sum();
        let paid_to_agency = Self::tax_payments(&in_range, &posting.irpf_payable);

        IrpfSummary {
            period_start: from,
            period_end: to,
            withheld,
            retained_by_clients,
            paid_to_agency,
            pending: withheld - paid_to_agency,
        }
    }

    /// Computes the corporate tax position for `[from, to]`.
    ///
    /// `rate` is in percent. The corporate tax expense account is excluded
    /// from the profit the tax is computed on.
    #[must_use]
    pub fn corporate_tax_summary(
        accounts: &[Account],
        lines: &[LedgerLine],
        posting: &PostingAccounts,
        rate: Decimal,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CorporateTaxSummary {
        let pnl = Self::profit_and_loss(accounts, lines, from, to);
        let provisioned: Decimal = pnl
            .items
            .iter()
            .filter(|i| i.account_code == posting.corporate_tax_expense)
            .map(|i| -i.amount)
            .sum();

        let income = pnl.total_income;
        let expenses = pnl.total_expenses - provisioned;
        let profit_before_tax = income - expenses;
        let estimated_tax = round_money(profit_before_tax * rate / Decimal::ONE_HUNDRED).max(Decimal::ZERO);

        let in_range: Vec<&LedgerLine> = Self::in_range(lines, from, to).collect();
        let paid = Self::tax_payments(&in_range, &posting.corporate_tax_payable);

        CorporateTaxSummary {
            period_start: from,
            period_end: to,
            income,
            expenses,
            profit_before_tax,
            rate,
            estimated_tax,
            provisioned,
            paid,
            to_provision: (estimated_tax - provisioned).max(Decimal::ZERO),
            pending_payment: (provisioned - paid).max(Decimal::ZERO),
        }
    }

    /// Lists bank accounts with their derived balances as of a date.
    ///
    /// Banks without a linked ledger account report a zero balance.
    #[must_use]
    pub fn bank_balances(banks: &[BankAccount], lines: &[LedgerLine], as_of: NaiveDate) -> Vec<BankBalance> {
        let totals = Self::account_totals(lines, None, as_of);
        banks
            .iter()
            .map(|bank| BankBalance {
                bank_account_id: bank.id,
                holder: bank.holder.clone(),
                bank: bank.bank.clone(),
                iban: bank.iban.clone(),
                account_code: bank.account_code.clone(),
                balance: bank
                    .account_code
                    .as_ref()
                    .and_then(|code| totals.get(code))
                    .map_or(Decimal::ZERO, EntryTotals::delta),
            })
            .collect()
    }

    fn in_range(lines: &[LedgerLine], from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = &LedgerLine> {
        lines.iter().filter(move |l| l.entry_date >= from && l.entry_date <= to)
    }

    fn tax_payments(lines: &[&LedgerLine], liability_code: &str) -> Decimal {
        lines
            .iter()
            .filter(|l| l.account_code == liability_code && l.entry_type == EntryType::TaxPayment)
            .map(|l| l.debit)
            .sum()
    }
}
