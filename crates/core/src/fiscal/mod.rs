//! Accounting periods and period closure.

pub mod period;
pub mod service;

pub use period::{Period, PeriodKey, PeriodSummary};
pub use service::FiscalService;
