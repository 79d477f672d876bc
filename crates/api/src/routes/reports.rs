//! Report routes.
//!
//! Every report is computed from posted lines; nothing here writes.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{Datelike, NaiveDate};
use partida_core::reports::{
    BalanceSheet, CorporateTaxSummary, IrpfSummary, ProfitAndLoss, ThirdPartyBalance, VatSummary,
};
use serde::Deserialize;

use super::today;
use crate::middleware::ApiQuery;
use crate::{ApiError, AppState};

/// Creates the report routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/balance-sheet", get(balance_sheet))
        .route("/reports/profit-and-loss", get(profit_and_loss))
        .route("/reports/third-parties/clients", get(client_balances))
        .route("/reports/third-parties/suppliers-technicians", get(supplier_technician_balances))
        .route("/reports/vat", get(vat_summary))
        .route("/reports/irpf", get(irpf_summary))
        .route("/reports/corporate-tax", get(corporate_tax_summary))
}

/// Query for point-in-time reports.
#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    /// Report date, inclusive. Defaults to today.
    pub as_of: Option<NaiveDate>,
}

impl AsOfQuery {
    fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(today)
    }
}

/// Query for period reports.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    /// First date, inclusive. Defaults to January 1st of the current year.
    pub from: Option<NaiveDate>,
    /// Last date, inclusive. Defaults to today.
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    fn bounds(&self) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or_else(today);
        let from = self
            .from
            .or_else(|| NaiveDate::from_ymd_opt(to.year(), 1, 1))
            .unwrap_or(to);
        (from, to)
    }
}

/// GET `/reports/balance-sheet`
async fn balance_sheet(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AsOfQuery>,
) -> Result<Json<BalanceSheet>, ApiError> {
    Ok(Json(state.ledger.balance_sheet(query.date()).await?))
}

/// GET `/reports/profit-and-loss`
async fn profit_and_loss(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<ProfitAndLoss>, ApiError> {
    let (from, to) = query.bounds();
    Ok(Json(state.ledger.profit_and_loss(from, to).await?))
}

/// GET `/reports/third-parties/clients`
async fn client_balances(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AsOfQuery>,
) -> Result<Json<Vec<ThirdPartyBalance>>, ApiError> {
    Ok(Json(state.ledger.client_balances(query.date()).await?))
}

/// GET `/reports/third-parties/suppliers-technicians`
async fn supplier_technician_balances(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AsOfQuery>,
) -> Result<Json<Vec<ThirdPartyBalance>>, ApiError> {
    Ok(Json(state.ledger.supplier_technician_balances(query.date()).await?))
}

/// GET `/reports/vat`
async fn vat_summary(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<VatSummary>, ApiError> {
    let (from, to) = query.bounds();
    Ok(Json(state.ledger.vat_summary(from, to).await?))
}

/// GET `/reports/irpf`
async fn irpf_summary(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<IrpfSummary>, ApiError> {
    let (from, to) = query.bounds();
    Ok(Json(state.ledger.irpf_summary(from, to).await?))
}

/// GET `/reports/corporate-tax`
async fn corporate_tax_summary(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<CorporateTaxSummary>, ApiError> {
    let (from, to) = query.bounds();
    Ok(Json(state.ledger.corporate_tax_summary(from, to).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_defaults_to_year_start() {
        let query = RangeQuery {
            from: None,
            to: NaiveDate::from_ymd_opt(2026, 5, 20),
        };
        assert_eq!(
            query.bounds(),
            (NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2026, 5, 20).unwrap())
        );
    }
}
