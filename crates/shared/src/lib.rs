//! Shared types, errors, and configuration for Partida.
//!
//! This crate provides common types used across all other crates:
//! - Money helpers with minor-unit (cent) precision
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management, including the posting-account map

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, PostingAccounts, TaxRates};
pub use error::{AppError, AppResult};
