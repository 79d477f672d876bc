//! Ledger service for journal entry validation and resolution.
//!
//! This module provides the core business logic for validating a journal
//! entry before it is committed by the store.

use chrono::Datelike;
use partida_shared::types::{JournalEntryId, ThirdPartyId};

use super::error::{LedgerError, LineIssue};
use super::types::{EntryTotals, NewJournalEntry, ThirdParty};
use super::validation::validate_lines;
use crate::chart::Account;

/// Maximum length of an entry description.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// A journal entry that passed every pre-write check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    /// Identifier assigned to the entry before commit.
    pub id: JournalEntryId,
    /// Normalized entry input.
    pub entry: NewJournalEntry,
    /// Debit and credit totals (equal).
    pub totals: EntryTotals,
}

impl ValidatedEntry {
    /// Fiscal year whose sequence numbers this entry.
    #[must_use]
    pub fn fiscal_year(&self) -> i32 {
        self.entry.entry_date.year()
    }
}

/// Ledger service for journal entry validation.
///
/// This service contains pure business logic with no database dependencies.
/// Lookups into the chart and the third-party registry are passed in as
/// closures so callers can back them with any store.
pub struct LedgerService;

impl LedgerService {
    /// Validate and resolve a journal entry before committing it.
    ///
    /// This function performs all validation steps:
    /// 1. Validates the header (description, reference)
    /// 2. Validates each line's shape (non-negative, single-sided, cent precision)
    /// 3. Validates balance (debits = credits)
    /// 4. Resolves each account (exists, active)
    /// 5. Resolves each third party (exists, matching type)
    ///
    /// # Arguments
    ///
    /// * `input` - The entry to validate
    /// * `account_lookup` - Looks up an account by code
    /// * `third_party_lookup` - Looks up a registered third party
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if validation fails. Nothing has been written.
    pub fn validate_entry<A, T>(
        input: NewJournalEntry,
        account_lookup: A,
        third_party_lookup: T,
    ) -> Result<ValidatedEntry, LedgerError>
    where
        A: Fn(&str) -> Option<Account>,
        T: Fn(ThirdPartyId) -> Option<ThirdParty>,
    {
        let mut entry = input;
        entry.description = entry.description.trim().to_string();
        Self::validate_header(&entry)?;

        let totals = validate_lines(&entry.lines)?;

        for (index, line) in entry.lines.iter().enumerate() {
            let invalid = |reason| LedgerError::InvalidLine {
                line: index + 1,
                reason,
            };

            match account_lookup(&line.account_code) {
                None => return Err(invalid(LineIssue::UnknownAccount(line.account_code.clone()))),
                Some(account) if !account.is_active => {
                    return Err(invalid(LineIssue::InactiveAccount(line.account_code.clone())));
                }
                Some(_) => {}
            }

            if let (Some(id), Some(stated)) = (line.third_party_id, line.third_party_type) {
                match third_party_lookup(id) {
                    None => return Err(invalid(LineIssue::UnknownThirdParty(id))),
                    Some(party) if party.party_type != stated => {
                        return Err(invalid(LineIssue::ThirdPartyTypeMismatch {
                            stated,
                            registered: party.party_type,
                        }));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(ValidatedEntry {
            id: JournalEntryId::new(),
            entry,
            totals,
        })
    }

    fn validate_header(entry: &NewJournalEntry) -> Result<(), LedgerError> {
        if entry.description.is_empty() {
            return Err(LedgerError::Validation("entry description is required".to_string()));
        }
        if entry.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::Validation(format!(
                "entry description cannot exceed {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if let Some(reference) = &entry.reference
            && (reference.reference_type.trim().is_empty() || reference.reference_id.trim().is_empty())
        {
            return Err(LedgerError::Validation(
                "reference type and id must both be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Collects the distinct account codes referenced by an entry.
    #[must_use]
    pub fn referenced_accounts(entry: &NewJournalEntry) -> Vec<String> {
        let mut codes: Vec<String> = entry.lines.iter().map(|l| l.account_code.clone()).collect();
        codes.sort();
        codes.dedup();
        codes
    }

    /// Collects the distinct third parties referenced by an entry.
    #[must_use]
    pub fn referenced_third_parties(entry: &NewJournalEntry) -> Vec<ThirdPartyId> {
        let mut ids: Vec<ThirdPartyId> = entry.lines.iter().filter_map(|l| l.third_party_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use partida_shared::types::UserId;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::chart::AccountType;
    use crate::ledger::types::{EntryReference, EntryType, NewEntryLine, ThirdPartyType};

    fn account(code: &str, is_active: bool) -> Account {
        Account {
            code: code.to_string(),
            name: code.to_string(),
            account_type: AccountType::Asset,
            is_active,
        }
    }

    fn chart(code: &str) -> Option<Account> {
        match code {
            "572001" | "430000" | "705000" | "477000" => Some(account(code, true)),
            "572999" => Some(account(code, false)),
            _ => None,
        }
    }

    fn sale(lines: Vec<NewEntryLine>) -> NewJournalEntry {
        NewJournalEntry {
            entry_date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            entry_type: EntryType::InvoiceSale,
            description: "  Factura F-2026-001 ".to_string(),
            reference: Some(EntryReference::new("invoice", "F-2026-001")),
            project_id: None,
            created_by: UserId::new(),
            lines,
        }
    }

    #[test]
    fn test_validate_sale_invoice() {
        let client = ThirdPartyId::new();
        let entry = sale(vec![
            NewEntryLine::debit("430000", dec!(121)).with_third_party(client, ThirdPartyType::Client),
            NewEntryLine::credit("705000", dec!(100)),
            NewEntryLine::credit("477000", dec!(21)),
        ]);

        let validated = LedgerService::validate_entry(entry, chart, |id| {
            (id == client).then(|| ThirdParty {
                id,
                party_type: ThirdPartyType::Client,
                name: "Acme".to_string(),
            })
        })
        .unwrap();

        assert_eq!(validated.totals.debit, dec!(121));
        assert_eq!(validated.entry.description, "Factura F-2026-001");
        assert_eq!(validated.fiscal_year(), 2026);
    }

    #[test]
    fn test_unknown_account_rejects_whole_entry() {
        let entry = sale(vec![
            NewEntryLine::debit("430000", dec!(100)),
            NewEntryLine::credit("999999", dec!(100)),
        ]);
        let err = LedgerService::validate_entry(entry, chart, |_| None).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidLine { line: 2, reason: LineIssue::UnknownAccount(ref code) } if code == "999999"
        ));
    }

    #[test]
    fn test_inactive_account_rejected() {
        let entry = sale(vec![
            NewEntryLine::debit("572999", dec!(100)),
            NewEntryLine::credit("705000", dec!(100)),
        ]);
        let err = LedgerService::validate_entry(entry, chart, |_| None).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidLine { line: 1, reason: LineIssue::InactiveAccount(_) }
        ));
    }

    #[test]
    fn test_third_party_must_exist_with_same_type() {
        let supplier = ThirdPartyId::new();
        let lookup = |id| {
            (id == supplier).then(|| ThirdParty {
                id,
                party_type: ThirdPartyType::Supplier,
                name: "Proveedor".to_string(),
            })
        };

        let entry = sale(vec![
            NewEntryLine::debit("430000", dec!(100)).with_third_party(supplier, ThirdPartyType::Client),
            NewEntryLine::credit("705000", dec!(100)),
        ]);
        let err = LedgerService::validate_entry(entry, chart, lookup).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidLine {
                reason: LineIssue::ThirdPartyTypeMismatch { .. },
                ..
            }
        ));

        let stranger = ThirdPartyId::new();
        let entry = sale(vec![
            NewEntryLine::debit("430000", dec!(100)).with_third_party(stranger, ThirdPartyType::Client),
            NewEntryLine::credit("705000", dec!(100)),
        ]);
        let err = LedgerService::validate_entry(entry, chart, lookup).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidLine { reason: LineIssue::UnknownThirdParty(id), .. } if id == stranger
        ));
    }

    #[test]
    fn test_blank_description_rejected() {
        let mut entry = sale(vec![
            NewEntryLine::debit("430000", dec!(100)),
            NewEntryLine::credit("705000", dec!(100)),
        ]);
        entry.description = "   ".to_string();
        let err = LedgerService::validate_entry(entry, chart, |_| None).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_referenced_accounts_deduplicated() {
        let entry = sale(vec![
            NewEntryLine::debit("430000", dec!(50)),
            NewEntryLine::debit("430000", dec!(50)),
            NewEntryLine::credit("705000", dec!(100)),
        ]);
        assert_eq!(LedgerService::referenced_accounts(&entry), vec!["430000", "705000"]);
    }
}
