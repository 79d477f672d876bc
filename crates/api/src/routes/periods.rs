//! Period closure and tax provision routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use partida_core::bank::MovementOutcome;
use partida_core::fiscal::PeriodSummary;
use serde::Deserialize;
use validator::Validate;

use super::today;
use crate::middleware::{ActingUser, ApiPath, ApiQuery, ValidatedJson};
use crate::{ApiError, AppState};

/// Months listed when the query does not say.
const DEFAULT_MONTHS_BACK: u32 = 12;
const MAX_MONTHS_BACK: u32 = 120;

/// Creates the period routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/periods", get(list_periods))
        .route("/periods/{year}/{month}", get(period_summary))
        .route("/periods/{year}/{month}/close", post(close_period))
        .route("/tax/corporate-provision", post(provision_corporate_tax))
}

/// Query parameters for listing periods.
#[derive(Debug, Default, Deserialize)]
pub struct ListPeriodsQuery {
    /// Months before the current one to include.
    pub months_back: Option<u32>,
}

/// Request body for a corporate tax provision.
#[derive(Debug, Deserialize, Validate)]
pub struct ProvisionRequest {
    /// Fiscal year provisioned.
    #[validate(range(min = 1900, max = 9999))]
    pub year: i32,
    /// Entry date, inside the fiscal year.
    pub date: NaiveDate,
}

/// GET `/periods` - The current month and the previous `months_back`, newest first.
async fn list_periods(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListPeriodsQuery>,
) -> Result<Json<Vec<PeriodSummary>>, ApiError> {
    let months_back = query.months_back.unwrap_or(DEFAULT_MONTHS_BACK);
    if months_back > MAX_MONTHS_BACK {
        return Err(ApiError::bad_request(format!("months_back must be at most {MAX_MONTHS_BACK}")));
    }
    Ok(Json(state.ledger.list_periods_for_closure(today(), months_back).await?))
}

/// GET `/periods/{year}/{month}`
async fn period_summary(
    State(state): State<AppState>,
    ApiPath((year, month)): ApiPath<(i32, u32)>,
) -> Result<Json<PeriodSummary>, ApiError> {
    Ok(Json(state.ledger.period_summary(year, month).await?))
}

/// POST `/periods/{year}/{month}/close` - Lock every entry of the month and close it.
async fn close_period(
    State(state): State<AppState>,
    _user: ActingUser,
    ApiPath((year, month)): ApiPath<(i32, u32)>,
) -> Result<Json<PeriodSummary>, ApiError> {
    Ok(Json(state.ledger.close_period(year, month).await?))
}

/// POST `/tax/corporate-provision` - 200 without entry when nothing is due.
async fn provision_corporate_tax(
    State(state): State<AppState>,
    user: ActingUser,
    ValidatedJson(body): ValidatedJson<ProvisionRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    let outcome = state
        .ledger
        .provision_corporate_tax(body.year, body.date, user.user_id())
        .await?;
    let status = if outcome.entry_id.is_some() { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome)))
}
