//! Chart of accounts rules.

use super::types::{Account, AccountUpdate, NewAccount};
use crate::ledger::LedgerError;

/// Length of a leaf account code.
pub const ACCOUNT_CODE_LEN: usize = 6;

/// Stateless service for chart of accounts rules.
///
/// Persistence is the caller's concern; these functions only decide whether
/// a change is allowed and what the resulting account looks like.
pub struct ChartService;

impl ChartService {
    /// Validates an account code: 3 to 10 ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` when the code is malformed.
    pub fn validate_code(code: &str) -> Result<(), LedgerError> {
        if !(3..=10).contains(&code.len()) || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::Validation(format!(
                "account code must be 3 to 10 digits, got '{code}'"
            )));
        }
        Ok(())
    }

    /// Builds a new active account after checking code shape and uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad input or `DuplicateAccount` if the code
    /// is already registered.
    pub fn create_account(input: &NewAccount, already_exists: bool) -> Result<Account, LedgerError> {
        Self::validate_code(&input.code)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("account name is required".to_string()));
        }
        if already_exists {
            return Err(LedgerError::DuplicateAccount(input.code.clone()));
        }

        Ok(Account {
            code: input.code.clone(),
            name: name.to_string(),
            account_type: input.account_type,
            is_active: true,
        })
    }

    /// Applies an update to an account.
    ///
    /// Only the active flag may change once the account is referenced; the
    /// caller enforces that with [`ChartService::changes_identity`].
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty name.
    pub fn apply_update(account: &Account, update: &AccountUpdate) -> Result<Account, LedgerError> {
        let mut updated = account.clone();

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(LedgerError::Validation("account name is required".to_string()));
            }
            updated.name = name.to_string();
        }
        if let Some(account_type) = update.account_type {
            updated.account_type = account_type;
        }
        if let Some(is_active) = update.is_active {
            updated.is_active = is_active;
        }

        Ok(updated)
    }

    /// True if `after` differs from `before` in anything but the active flag.
    #[must_use]
    pub fn changes_identity(before: &Account, after: &Account) -> bool {
        before.name != after.name || before.account_type != after.account_type
    }

    /// Picks the next free leaf code under `prefix`, starting at `prefix` + `001`.
    ///
    /// With the default `572` prefix this yields `572001`, `572002`, ...
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the prefix is malformed or exhausted.
    pub fn next_code_under<'a>(
        prefix: &str,
        existing: impl IntoIterator<Item = &'a str>,
    ) -> Result<String, LedgerError> {
        if prefix.is_empty()
            || prefix.len() >= ACCOUNT_CODE_LEN
            || !prefix.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(LedgerError::Validation(format!("invalid account prefix '{prefix}'")));
        }

        let width = ACCOUNT_CODE_LEN - prefix.len();
        let mut used: Vec<u32> = existing
            .into_iter()
            .filter(|code| code.len() == ACCOUNT_CODE_LEN)
            .filter_map(|code| code.strip_prefix(prefix))
            .filter_map(|suffix| suffix.parse().ok())
            .collect();
        used.sort_unstable();

        // 10^width - 1 is the last suffix that still fits
        let max_suffix = 10u32.pow(u32::try_from(width).unwrap_or(u32::MAX).min(9)) - 1;
        let next = (1..=max_suffix)
            .find(|candidate| used.binary_search(candidate).is_err())
            .ok_or_else(|| {
                LedgerError::Validation(format!("no free account codes left under '{prefix}'"))
            })?;

        Ok(format!("{prefix}{next:0width$}"))
    }
}
