//! Bank account registry and bank movement routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use partida_core::bank::{
    BalanceAdjustmentRequest, BankAccount, ManualMovementRequest, MovementKind, MovementOutcome, NewBankAccount,
    OpeningBalance, OpeningEntryRequest, TaxPaymentRequest, TransferRequest,
};
use partida_core::reports::BankBalance;
use partida_shared::types::BankAccountId;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::reports::AsOfQuery;
use super::today;
use crate::middleware::{ActingUser, ApiJson, ApiQuery, ValidatedJson};
use crate::{ApiError, AppState};

/// Creates the bank routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bank-accounts", get(list_bank_accounts).post(create_bank_account))
        .route("/bank-accounts/balances", get(bank_balances))
        .route("/bank-movements/opening", post(opening))
        .route("/bank-movements/transfer", post(transfer))
        .route("/bank-movements/tax-payment", post(tax_payment))
        .route("/bank-movements/manual", post(manual))
        .route("/bank-movements/adjustment", post(adjustment))
}

/// Request body for registering a bank account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBankAccountRequest {
    /// Account holder.
    #[validate(length(min = 1, max = 200))]
    pub holder: String,
    /// Bank name.
    #[validate(length(min = 1, max = 100))]
    pub bank: String,
    /// IBAN; spaces allowed.
    #[validate(length(min = 15, max = 42))]
    pub iban: String,
    /// Ledger account to link; a new `572xxx` account is created when absent.
    #[validate(length(min = 3, max = 10))]
    pub account_code: Option<String>,
}

/// Request body for opening balances.
#[derive(Debug, Deserialize, Validate)]
pub struct OpeningRequest {
    /// Opening date.
    pub date: NaiveDate,
    /// One balance per bank account.
    #[validate(length(min = 1))]
    pub balances: Vec<OpeningBalance>,
}

/// Request body for a transfer between own accounts.
#[derive(Debug, Deserialize, Validate)]
pub struct TransferBody {
    /// Paying account.
    pub source_bank_id: BankAccountId,
    /// Receiving account.
    pub target_bank_id: BankAccountId,
    /// Amount.
    pub amount: Decimal,
    /// Value date.
    pub date: NaiveDate,
    /// Optional description.
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// Request body for a manual income or expense.
#[derive(Debug, Deserialize, Validate)]
pub struct ManualMovementBody {
    /// Bank account.
    pub bank_account_id: BankAccountId,
    /// Category mapped to a ledger account.
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    /// Amount.
    pub amount: Decimal,
    /// Income or expense.
    pub kind: MovementKind,
    /// Value date.
    pub date: NaiveDate,
    /// Description.
    #[validate(length(min = 1, max = 500))]
    pub description: String,
}

/// GET `/bank-accounts`
async fn list_bank_accounts(State(state): State<AppState>) -> Result<Json<Vec<BankAccount>>, ApiError> {
    Ok(Json(state.ledger.list_bank_accounts().await?))
}

/// POST `/bank-accounts`
async fn create_bank_account(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateBankAccountRequest>,
) -> Result<(StatusCode, Json<BankAccount>), ApiError> {
    let bank = state
        .ledger
        .create_bank_account(NewBankAccount {
            holder: body.holder,
            bank: body.bank,
            iban: body.iban,
            account_code: body.account_code,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(bank)))
}

/// GET `/bank-accounts/balances` - Derived balance of every bank account.
async fn bank_balances(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AsOfQuery>,
) -> Result<Json<Vec<BankBalance>>, ApiError> {
    let as_of = query.as_of.unwrap_or_else(today);
    Ok(Json(state.ledger.bank_balances(as_of).await?))
}

fn created(outcome: MovementOutcome) -> (StatusCode, Json<MovementOutcome>) {
    let status = if outcome.entry_id.is_some() { StatusCode::CREATED } else { StatusCode::OK };
    (status, Json(outcome))
}

/// POST `/bank-movements/opening`
async fn opening(
    State(state): State<AppState>,
    user: ActingUser,
    ValidatedJson(body): ValidatedJson<OpeningRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    let request = OpeningEntryRequest {
        date: body.date,
        balances: body.balances,
    };
    Ok(created(state.ledger.create_opening_entry(request, user.user_id()).await?))
}

/// POST `/bank-movements/transfer`
async fn transfer(
    State(state): State<AppState>,
    user: ActingUser,
    ValidatedJson(body): ValidatedJson<TransferBody>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    let request = TransferRequest {
        source_bank_id: body.source_bank_id,
        target_bank_id: body.target_bank_id,
        amount: body.amount,
        date: body.date,
        description: body.description,
    };
    Ok(created(state.ledger.create_transfer(request, user.user_id()).await?))
}

/// POST `/bank-movements/tax-payment` - The entry is locked on creation.
async fn tax_payment(
    State(state): State<AppState>,
    user: ActingUser,
    ApiJson(request): ApiJson<TaxPaymentRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    Ok(created(state.ledger.create_tax_payment(request, user.user_id()).await?))
}

/// POST `/bank-movements/manual`
async fn manual(
    State(state): State<AppState>,
    user: ActingUser,
    ValidatedJson(body): ValidatedJson<ManualMovementBody>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    let request = ManualMovementRequest {
        bank_account_id: body.bank_account_id,
        category: body.category,
        amount: body.amount,
        kind: body.kind,
        date: body.date,
        description: body.description,
    };
    Ok(created(state.ledger.create_manual_movement(request, user.user_id()).await?))
}

/// POST `/bank-movements/adjustment` - 200 without entry when the balance already matches.
async fn adjustment(
    State(state): State<AppState>,
    user: ActingUser,
    ApiJson(request): ApiJson<BalanceAdjustmentRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    Ok(created(state.ledger.adjust_balance(request, user.user_id()).await?))
}
