//! Database layer with `SeaORM` entities and the Postgres ledger store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - [`PgLedgerStore`], the Postgres implementation of `LedgerStore`
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{PgLedgerStore, PgStoreError};

use std::time::Duration;

use partida_shared::{AppError, AppResult};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns `AppError::Database` if the connection cannot be established.
pub async fn connect(database_url: &str) -> AppResult<DatabaseConnection> {
    Database::connect(database_url).await.map_err(connect_error)
}

/// Establishes a pooled connection with explicit pool bounds.
///
/// # Errors
///
/// Returns `AppError::Database` if the connection cannot be established.
pub async fn connect_pool(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> AppResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);
    Database::connect(options).await.map_err(connect_error)
}

fn connect_error(err: DbErr) -> AppError {
    AppError::Database(err.to_string())
}
