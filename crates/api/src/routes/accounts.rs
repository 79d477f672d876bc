//! Chart of accounts and third-party registry routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use partida_core::chart::{Account, AccountType, AccountUpdate, NewAccount};
use partida_core::ledger::{ThirdParty, ThirdPartyType};
use partida_shared::types::ThirdPartyId;
use serde::Deserialize;
use validator::Validate;

use crate::middleware::{ApiPath, ApiQuery, ValidatedJson};
use crate::{ApiError, AppState};

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/{code}", get(get_account).patch(update_account))
        .route("/third-parties", post(register_third_party))
}

/// Query parameters for listing accounts.
#[derive(Debug, Default, Deserialize)]
pub struct ListAccountsQuery {
    /// Only active accounts.
    #[serde(default)]
    pub active_only: bool,
}

/// Request body for creating an account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    /// Account code, 3 to 10 digits.
    #[validate(length(min = 3, max = 10))]
    pub code: String,
    /// Display name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
}

/// Request body for updating an account. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    /// New display name, only while nothing references the account.
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    /// New type, only while nothing references the account.
    pub account_type: Option<AccountType>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
}

/// Request body for registering a third party.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterThirdPartyRequest {
    /// Identifier in the owning registry; generated when absent.
    pub id: Option<ThirdPartyId>,
    /// Client, supplier or technician.
    pub party_type: ThirdPartyType,
    /// Display name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// GET `/accounts` - List the chart, sorted by code.
async fn list_accounts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListAccountsQuery>,
) -> Result<Json<Vec<Account>>, ApiError> {
    Ok(Json(state.ledger.list_accounts(query.active_only).await?))
}

/// GET `/accounts/{code}`
async fn get_account(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.ledger.get_account(&code).await?))
}

/// POST `/accounts`
async fn create_account(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = state
        .ledger
        .create_account(NewAccount::new(body.code, body.name, body.account_type))
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// PATCH `/accounts/{code}` - Rename or retype an unreferenced account, or toggle any account.
async fn update_account(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
    ValidatedJson(body): ValidatedJson<UpdateAccountRequest>,
) -> Result<Json<Account>, ApiError> {
    let update = AccountUpdate {
        name: body.name,
        account_type: body.account_type,
        is_active: body.is_active,
    };
    Ok(Json(state.ledger.update_account(&code, update).await?))
}

/// POST `/third-parties` - Register or rename a third party.
async fn register_third_party(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterThirdPartyRequest>,
) -> Result<(StatusCode, Json<ThirdParty>), ApiError> {
    let party = state
        .ledger
        .register_third_party(body.id.unwrap_or_default(), body.party_type, &body.name)
        .await?;
    Ok((StatusCode::CREATED, Json(party)))
}
