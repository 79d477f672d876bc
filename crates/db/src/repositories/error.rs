//! Error type of the Postgres store and its mapping onto `StoreError`.

use partida_core::engine::StoreError;
use sea_orm::{DbErr, RuntimeErr, SqlErr};

/// SQLSTATE of a serialization failure or deadlock.
const RETRYABLE_STATES: [&str; 2] = ["40001", "40P01"];

/// Error types for Postgres store operations.
#[derive(Debug, thiserror::Error)]
pub enum PgStoreError {
    /// A ledger-level store failure (failed guard, conflict).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A row that does not map onto a domain value.
    #[error("Corrupt {table} row: {reason}")]
    CorruptRow {
        /// Table the row came from.
        table: &'static str,
        /// What did not parse.
        reason: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl PgStoreError {
    /// Shorthand for [`PgStoreError::CorruptRow`].
    pub fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            reason: reason.into(),
        }
    }
}

impl From<PgStoreError> for StoreError {
    fn from(err: PgStoreError) -> Self {
        match err {
            PgStoreError::Store(inner) => inner,
            PgStoreError::CorruptRow { .. } => Self::Backend(err.to_string()),
            PgStoreError::Database(db) => classify(db),
        }
    }
}

fn classify(err: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return StoreError::Conflict(detail);
    }
    match &err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => StoreError::Unavailable(err.to_string()),
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err)) | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => {
            let state = sqlx_err
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code.to_string());
            match state {
                Some(code) if RETRYABLE_STATES.contains(&code.as_str()) => StoreError::Conflict(err.to_string()),
                _ if matches!(sqlx_err, sea_orm::sqlx::Error::PoolTimedOut | sea_orm::sqlx::Error::Io(_)) => {
                    StoreError::Unavailable(err.to_string())
                }
                _ => StoreError::Backend(err.to_string()),
            }
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partida_core::engine::Guard;

    #[test]
    fn test_store_errors_pass_through() {
        let guard = Guard::PeriodOpen(chrono::NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
        let err: StoreError = PgStoreError::Store(StoreError::GuardFailed(guard.clone())).into();
        assert!(matches!(err, StoreError::GuardFailed(g) if g == guard));
    }

    #[test]
    fn test_connection_errors_are_unavailable() {
        let err: StoreError = PgStoreError::Database(DbErr::Conn(RuntimeErr::Internal("refused".into()))).into();
        assert!(err.is_retryable());
        assert_eq!(err.http_status_code(), 503);
    }

    #[test]
    fn test_corrupt_rows_are_backend_errors() {
        let err: StoreError = PgStoreError::corrupt("accounts", "unknown account type: FOO").into();
        assert!(matches!(err, StoreError::Backend(ref msg) if msg.contains("accounts")));
    }
}
