//! JSON error responses.
//!
//! Every failure renders as `{ "error": CODE, "message": text, "details": {...} }`.
//! Ledger rejections carry the context a client needs to fix the request:
//! the balance delta, the offending line and account, the period bounds or
//! the pending amount.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use partida_core::ledger::LedgerError;
use serde_json::{Value, json};
use tracing::{error, warn};
use validator::ValidationErrors;

/// An error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Value,
}

impl ApiError {
    /// Creates an error without details.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// 400 with a validation message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// 401 for a missing or malformed acting user.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Structured details.
    #[must_use]
    pub const fn details(&self) -> &Value {
        &self.details
    }
}

fn ledger_details(err: &LedgerError) -> Value {
    match err {
        LedgerError::UnbalancedEntry { debit, credit, delta } => json!({
            "debit": debit,
            "credit": credit,
            "delta": delta,
        }),
        LedgerError::InvalidLine { line, reason } => json!({
            "line": line,
            "reason": reason.to_string(),
            "account_code": reason.account_code(),
        }),
        LedgerError::AccountNotFound(code)
        | LedgerError::DuplicateAccount(code)
        | LedgerError::AccountImmutable(code) => json!({ "account_code": code }),
        LedgerError::PeriodClosed { year, month, start, end } => json!({
            "year": year,
            "month": month,
            "start": start,
            "end": end,
        }),
        LedgerError::InvalidTransition { from, to } => json!({ "from": from, "to": to }),
        LedgerError::AlreadyPosted { entry_number } => json!({ "entry_number": entry_number }),
        LedgerError::InsufficientPendingAmount { requested, pending } => json!({
            "requested": requested,
            "pending": pending,
        }),
        LedgerError::RunNotDeletable(status) => json!({ "status": status }),
        LedgerError::NotFound { entity, id } => json!({ "entity": entity, "id": id }),
        LedgerError::Store(_) => json!({ "retryable": err.is_retryable() }),
        LedgerError::Validation(_) => json!({}),
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            code: err.error_code(),
            message: err.to_string(),
            details: ledger_details(&err),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        let fields: serde_json::Map<String, Value> = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), ToString::to_string))
                    .collect();
                (field.to_string(), json!(messages))
            })
            .collect();
        Self::bad_request("request failed validation").with_details(json!({ "fields": fields }))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "INVALID_BODY", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), "INVALID_QUERY", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), "INVALID_PATH", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, message = %self.message, "request failed");
        } else {
            warn!(code = self.code, message = %self.message, "request rejected");
        }
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message,
                "details": self.details,
            })),
        )
            .into_response()
    }
}
