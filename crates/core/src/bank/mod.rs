//! Bank accounts and bank movement postings.
//!
//! Each movement operation synthesizes exactly one balanced journal entry
//! touching a bank account's ledger account.

pub mod iban;
pub mod service;
pub mod types;

pub use iban::normalize_iban;
pub use service::{AdjustmentPlan, BankMovementService};
pub use types::{
    BalanceAdjustmentRequest, BankAccount, ManualMovementRequest, MovementKind, MovementOutcome,
    NewBankAccount, OpeningBalance, OpeningEntryRequest, TaxPaymentRequest, TaxPeriod, TaxType,
    TransferRequest,
};
