//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for every ledger operation under `/api/v1`
//! - The acting-user extractor
//! - [`ApiError`], the JSON rendering of ledger errors

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use partida_core::engine::Ledger;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger facade. Clones share the store and the event channel.
    pub ledger: Ledger,
}

impl AppState {
    /// Wraps a ledger.
    #[must_use]
    pub const fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
