//! API route definitions.

use axum::Router;
use chrono::{NaiveDate, Utc};

use crate::AppState;

pub mod accounts;
pub mod bank;
pub mod health;
pub mod journal;
pub mod periods;
pub mod reports;
pub mod runs;


/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(accounts::routes())
        .merge(journal::routes())
        .merge(reports::routes())
        .merge(bank::routes())
        .merge(runs::routes())
        .merge(periods::routes())
}

/// Date used when a query omits one.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
