//! Payroll and partner-compensation runs.
//!
//! Lifecycle: `DRAFT -> POSTED -> PAID`, plus `DRAFT -> CANCELLED`. Posting
//! accrues the run in the journal; payments settle it from a bank account.
//! "Partial" is derived from the payments, never stored.

pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use service::{PayrollService, PostDecision};
pub use types::{
    CompensationRun, NewPayment, NewRun, NewRunRequest, PaymentMethod, PaymentOutcome,
    PaymentRequest, PaymentState, PayrollPayment, PostOutcome, RunAmounts, RunFilter, RunKind,
    RunStatus, RunView,
};
