//! Payroll and partner-compensation run routes.
//!
//! Both kinds share one set of handlers; the path prefix decides the kind and
//! a run is only visible under the prefix of its own kind.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use partida_core::payroll::{
    NewRunRequest, PaymentMethod, PaymentOutcome, PaymentRequest, PayrollPayment, PostOutcome, RunFilter, RunKind,
    RunStatus, RunView,
};
use partida_shared::types::{BankAccountId, PersonId, RunId};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::middleware::{ActingUser, ApiPath, ApiQuery, ValidatedJson};
use crate::{ApiError, AppState};

/// Creates the run routes for both kinds.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/payroll-runs", kind_routes(RunKind::Payroll))
        .nest("/partner-compensation-runs", kind_routes(RunKind::PartnerCompensation))
}

fn kind_routes(kind: RunKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list_runs).post(create_run))
        .route("/{id}", get(get_run).delete(delete_run))
        .route("/{id}/post", post(post_run))
        .route("/{id}/cancel", post(cancel_run))
        .route("/{id}/payments", get(list_payments).post(pay_run))
        .layer(Extension(kind))
}

/// Request body for a draft run.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRunRequest {
    /// Year the run belongs to.
    #[validate(range(min = 1900, max = 9999))]
    pub period_year: i32,
    /// Month, 1-12.
    #[validate(range(min = 1, max = 12))]
    pub period_month: u32,
    /// Employee or partner; generated when absent.
    pub person_id: Option<PersonId>,
    /// Name.
    #[validate(length(min = 1, max = 200))]
    pub person_name: String,
    /// Gross amount.
    pub gross_amount: Decimal,
    /// IRPF rate in percent.
    pub irpf_rate: Decimal,
}

/// Query parameters for listing runs.
#[derive(Debug, Default, Deserialize)]
pub struct ListRunsQuery {
    /// Period year.
    pub year: Option<i32>,
    /// Status.
    pub status: Option<RunStatus>,
}

/// Request body for paying a run.
#[derive(Debug, Deserialize, Validate)]
pub struct PayRunRequest {
    /// Paying bank account.
    pub bank_account_id: BankAccountId,
    /// Amount, at most the pending amount.
    pub amount: Decimal,
    /// Value date.
    pub payment_date: NaiveDate,
    /// Method.
    pub payment_method: PaymentMethod,
}

/// POST `/{kind}` - Create a draft run.
async fn create_run(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    user: ActingUser,
    ValidatedJson(body): ValidatedJson<CreateRunRequest>,
) -> Result<(StatusCode, Json<RunView>), ApiError> {
    let request = NewRunRequest {
        kind,
        period_year: body.period_year,
        period_month: body.period_month,
        person_id: body.person_id.unwrap_or_default(),
        person_name: body.person_name,
        gross_amount: body.gross_amount,
        irpf_rate: body.irpf_rate,
    };
    let run = state.ledger.create_run(request, user.user_id()).await?;
    Ok((StatusCode::CREATED, Json(run)))
}

/// GET `/{kind}`
async fn list_runs(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    ApiQuery(query): ApiQuery<ListRunsQuery>,
) -> Result<Json<Vec<RunView>>, ApiError> {
    let filter = RunFilter {
        kind: Some(kind),
        year: query.year,
        status: query.status,
    };
    Ok(Json(state.ledger.list_runs(&filter).await?))
}

/// GET `/{kind}/{id}`
async fn get_run(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    ApiPath(id): ApiPath<RunId>,
) -> Result<Json<RunView>, ApiError> {
    Ok(Json(state.ledger.get_run(kind, id).await?))
}

/// DELETE `/{kind}/{id}` - Only drafts can be deleted.
async fn delete_run(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    ApiPath(id): ApiPath<RunId>,
) -> Result<StatusCode, ApiError> {
    state.ledger.delete_run(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/{kind}/{id}/post` - Post the accrual entry. Posting twice returns the first entry.
async fn post_run(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    user: ActingUser,
    ApiPath(id): ApiPath<RunId>,
) -> Result<Json<PostOutcome>, ApiError> {
    Ok(Json(state.ledger.post_run(kind, id, user.user_id()).await?))
}

/// POST `/{kind}/{id}/cancel`
async fn cancel_run(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    ApiPath(id): ApiPath<RunId>,
) -> Result<Json<RunView>, ApiError> {
    Ok(Json(state.ledger.cancel_run(kind, id).await?))
}

/// GET `/{kind}/{id}/payments`
async fn list_payments(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    ApiPath(id): ApiPath<RunId>,
) -> Result<Json<Vec<PayrollPayment>>, ApiError> {
    Ok(Json(state.ledger.list_payments(kind, id).await?))
}

/// POST `/{kind}/{id}/payments`
async fn pay_run(
    State(state): State<AppState>,
    Extension(kind): Extension<RunKind>,
    user: ActingUser,
    ApiPath(id): ApiPath<RunId>,
    ValidatedJson(body): ValidatedJson<PayRunRequest>,
) -> Result<(StatusCode, Json<PaymentOutcome>), ApiError> {
    let request = PaymentRequest {
        run_id: id,
        bank_account_id: body.bank_account_id,
        amount: body.amount,
        payment_date: body.payment_date,
        payment_method: body.payment_method,
    };
    let outcome = state.ledger.pay_run(kind, request, user.user_id()).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
