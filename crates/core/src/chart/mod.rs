//! Chart of accounts.
//!
//! The registry of account codes and their types. Every journal line
//! references an account in this registry.

pub mod defaults;
pub mod service;
pub mod types;

pub use defaults::default_chart;
pub use service::ChartService;
pub use types::{Account, AccountType, AccountUpdate, NewAccount, NormalSide};
