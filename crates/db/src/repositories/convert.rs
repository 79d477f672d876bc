//! Row ↔ domain conversions.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use partida_core::bank::BankAccount;
use partida_core::chart::{Account, AccountType};
use partida_core::fiscal::Period;
use partida_core::ledger::{EntryReference, EntryType, JournalEntry, JournalEntryLine, ThirdParty, ThirdPartyType};
use partida_core::payroll::{CompensationRun, PaymentMethod, PayrollPayment, RunKind, RunStatus};
use partida_shared::types::{
    BankAccountId, JournalEntryId, PaymentId, PersonId, ProjectId, RunId, ThirdPartyId, UserId,
};
use sea_orm::prelude::DateTimeWithTimeZone;

use super::error::PgStoreError;
use crate::entities::{
    accounting_periods, accounts, bank_accounts, compensation_runs, journal_entries, journal_entry_lines,
    payroll_payments, third_parties,
};

fn parse<T: FromStr<Err = String>>(table: &'static str, value: &str) -> Result<T, PgStoreError> {
    value.parse().map_err(|reason: String| PgStoreError::corrupt(table, reason))
}

fn month(table: &'static str, value: i32) -> Result<u32, PgStoreError> {
    u32::try_from(value).map_err(|_| PgStoreError::corrupt(table, format!("invalid month {value}")))
}

/// Converts a validated 1-12 month into its column value.
pub(crate) fn month_value(month: u32) -> Result<i32, PgStoreError> {
    i32::try_from(month).map_err(|_| PgStoreError::corrupt("accounting_periods", format!("invalid month {month}")))
}

pub(crate) fn utc(ts: DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

pub(crate) fn account(model: accounts::Model) -> Result<Account, PgStoreError> {
    Ok(Account {
        account_type: parse::<AccountType>("accounts", &model.account_type)?,
        code: model.code,
        name: model.name,
        is_active: model.is_active,
    })
}

pub(crate) fn third_party(model: third_parties::Model) -> Result<ThirdParty, PgStoreError> {
    Ok(ThirdParty {
        id: ThirdPartyId::from_uuid(model.id),
        party_type: parse::<ThirdPartyType>("third_parties", &model.party_type)?,
        name: model.name,
    })
}

pub(crate) fn bank_account(model: bank_accounts::Model) -> BankAccount {
    BankAccount {
        id: BankAccountId::from_uuid(model.id),
        holder: model.holder,
        bank: model.bank,
        iban: model.iban,
        account_code: model.account_code,
        created_at: utc(model.created_at),
    }
}

pub(crate) fn entry(model: journal_entries::Model) -> Result<JournalEntry, PgStoreError> {
    let reference = match (model.reference_type, model.reference_id) {
        (Some(reference_type), Some(reference_id)) => Some(EntryReference {
            reference_type,
            reference_id,
        }),
        (None, None) => None,
        _ => return Err(PgStoreError::corrupt("journal_entries", "half-set reference")),
    };
    Ok(JournalEntry {
        id: JournalEntryId::from_uuid(model.id),
        entry_number: model.entry_number,
        entry_date: model.entry_date,
        entry_type: parse::<EntryType>("journal_entries", &model.entry_type)?,
        description: model.description,
        reference,
        project_id: model.project_id.map(ProjectId::from_uuid),
        total_amount: model.total_amount,
        is_locked: model.is_locked,
        created_by: UserId::from_uuid(model.created_by),
        created_at: utc(model.created_at),
    })
}

pub(crate) fn line(model: journal_entry_lines::Model) -> Result<JournalEntryLine, PgStoreError> {
    let third_party_type = model
        .third_party_type
        .as_deref()
        .map(|t| parse::<ThirdPartyType>("journal_entry_lines", t))
        .transpose()?;
    Ok(JournalEntryLine {
        entry_id: JournalEntryId::from_uuid(model.entry_id),
        line_order: model.line_order,
        account_code: model.account_code,
        debit_amount: model.debit_amount,
        credit_amount: model.credit_amount,
        description: model.description,
        third_party_id: model.third_party_id.map(ThirdPartyId::from_uuid),
        third_party_type,
    })
}

pub(crate) fn run(model: compensation_runs::Model) -> Result<CompensationRun, PgStoreError> {
    Ok(CompensationRun {
        id: RunId::from_uuid(model.id),
        kind: parse::<RunKind>("compensation_runs", &model.kind)?,
        run_number: model.run_number,
        period_year: model.period_year,
        period_month: month("compensation_runs", model.period_month)?,
        person_id: PersonId::from_uuid(model.person_id),
        person_name: model.person_name,
        gross_amount: model.gross_amount,
        irpf_rate: model.irpf_rate,
        irpf_amount: model.irpf_amount,
        net_amount: model.net_amount,
        status: parse::<RunStatus>("compensation_runs", &model.status)?,
        journal_entry_id: model.journal_entry_id.map(JournalEntryId::from_uuid),
        created_by: UserId::from_uuid(model.created_by),
        created_at: utc(model.created_at),
    })
}

pub(crate) fn payment(model: payroll_payments::Model, run_kind: RunKind) -> Result<PayrollPayment, PgStoreError> {
    Ok(PayrollPayment {
        id: PaymentId::from_uuid(model.id),
        payment_number: model.payment_number,
        run_id: RunId::from_uuid(model.run_id),
        run_kind,
        amount: model.amount,
        payment_date: model.payment_date,
        payment_method: parse::<PaymentMethod>("payroll_payments", &model.payment_method)?,
        bank_account_id: BankAccountId::from_uuid(model.bank_account_id),
        journal_entry_id: JournalEntryId::from_uuid(model.journal_entry_id),
        created_by: UserId::from_uuid(model.created_by),
        created_at: utc(model.created_at),
    })
}

pub(crate) fn period(model: accounting_periods::Model) -> Result<Period, PgStoreError> {
    Ok(Period {
        year: model.year,
        month: month("accounting_periods", model.month)?,
        is_closed: model.is_closed,
        closed_at: model.closed_at.map(utc),
    })
}
