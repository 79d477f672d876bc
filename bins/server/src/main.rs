//! Partida API Server
//!
//! Main entry point for the ledger service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use partida_api::{AppState, create_router};
use partida_core::engine::Ledger;
use partida_db::{PgLedgerStore, connect_pool};
use partida_shared::{AppConfig, config::LogConfig};

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "partida=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.log);

    let db = connect_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("failed to connect to database")?;
    info!(max_connections = config.database.max_connections, "Connected to database");

    let store = Arc::new(PgLedgerStore::new(db));
    let ledger = Ledger::new(store, config.posting.clone(), config.tax.clone());
    let seeded = ledger.seed_default_chart().await?;
    info!(seeded, "Chart of accounts ready");

    let app = create_router(AppState::new(ledger));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
