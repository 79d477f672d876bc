//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Startup errors raised before the ledger is reachable.
///
/// Ledger rule violations have their own typed error in `partida-core`; this
/// enum covers the bootstrap around it (configuration and database setup).
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or holds an unusable value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database could not be reached.
    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    /// Returns the error code used in startup logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Configuration(String::new()), "CONFIGURATION_ERROR")]
    #[case(AppError::Database(String::new()), "DATABASE_ERROR")]
    fn test_error_code(#[case] err: AppError, #[case] code: &str) {
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Configuration("msg".into()).to_string(),
            "Configuration error: msg"
        );
        assert_eq!(
            AppError::Database("msg".into()).to_string(),
            "Database error: msg"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: AppError = config::ConfigError::NotFound("database.url".into()).into();
        assert!(matches!(err, AppError::Configuration(ref msg) if msg.contains("database.url")));
    }
}
