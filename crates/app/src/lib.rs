//! Console front end and process wiring for the checkout simulator.

pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod prompt;
pub mod shell;
pub mod telemetry;

use std::sync::Arc;

use domain::CartSnapshot;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Repositories};

pub use config::{Config, LogFormat};
pub use console::{StdTerminal, Terminal};
pub use error::{AppError, Result};
pub use prompt::ConsolePrompt;
pub use shell::{Command, Shell, ShellExit};

const MAX_DB_CONNECTIONS: u32 = 5;

/// Opens the configured store and seeds the catalog.
///
/// With a `DATABASE_URL` the PostgreSQL store is migrated and seeded;
/// without one an in-memory store is used.
pub async fn open_store(config: &Config) -> Result<Repositories> {
    let products = catalog::seed_products();
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_DB_CONNECTIONS)
                .connect(url)
                .await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            store.seed_products(&products).await?;
            tracing::info!(products = products.len(), "using PostgreSQL store");
            Ok(Repositories::from_store(Arc::new(store)))
        }
        None => {
            let store = InMemoryStore::with_products(products).await;
            tracing::info!("using in-memory store");
            Ok(Repositories::from_store(Arc::new(store)))
        }
    }
}

/// Totals listener that logs every change at debug level.
pub fn log_totals(snapshot: &CartSnapshot) {
    tracing::debug!(
        items = snapshot.item_count(),
        subtotal = %snapshot.subtotal,
        discount = %snapshot.discount,
        total = %snapshot.total,
        "cart totals changed"
    );
}
