//! Database seeder for Partida development and testing.
//!
//! Seeds the default chart of accounts and two demo bank accounts.
//! Running it twice changes nothing.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use partida_core::bank::{NewBankAccount, normalize_iban};
use partida_core::engine::Ledger;
use partida_db::{PgLedgerStore, connect};
use partida_shared::{PostingAccounts, TaxRates};

/// Demo bank accounts: (bank, IBAN).
const DEMO_BANKS: [(&str, &str); 2] = [
    ("BBVA", "ES91 2100 0418 4502 0005 1332"),
    ("Santander", "ES60 0049 1500 0512 3456 7892"),
];

const DEMO_HOLDER: &str = "Partida Demo SL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    println!("Connecting to database...");
    let db = connect(&database_url).await.context("failed to connect to database")?;
    let ledger = Ledger::new(
        Arc::new(PgLedgerStore::new(db)),
        PostingAccounts::default(),
        TaxRates::default(),
    );

    println!("Seeding chart of accounts...");
    let inserted = ledger.seed_default_chart().await?;
    println!("  {inserted} accounts added");

    println!("Seeding demo bank accounts...");
    seed_demo_banks(&ledger).await?;

    println!("Seeding complete!");
    Ok(())
}

async fn seed_demo_banks(ledger: &Ledger) -> anyhow::Result<()> {
    let existing = ledger.list_bank_accounts().await?;
    for (bank, iban) in DEMO_BANKS {
        let normalized = normalize_iban(iban)?;
        if existing.iter().any(|b| b.iban == normalized) {
            println!("  {bank} already exists, skipping...");
            continue;
        }
        let created = ledger
            .create_bank_account(NewBankAccount {
                holder: DEMO_HOLDER.to_string(),
                bank: bank.to_string(),
                iban: iban.to_string(),
                account_code: None,
            })
            .await?;
        println!(
            "  {bank} -> {}",
            created.account_code.as_deref().unwrap_or("(no ledger account)")
        );
    }
    Ok(())
}
