//! Household Ledger server entry point.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use household_ledger_core::{InMemoryLedgerStore, PerformanceService};
use household_ledger_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "info,household_ledger_core=debug,household_ledger_server=debug".into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Household Ledger Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/household-ledger.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        info!("Loading configuration from {}", config_path);
        ServerConfig::from_file(&config_path)?
    } else {
        info!("Using default configuration");
        ServerConfig::default()
    };

    // Portfolios, holdings and cash come from the persistence layer in production;
    // the standalone server serves them from memory.
    let store = match &config.seed_file {
        Some(path) => {
            info!("Seeding in-memory store from {}", path);
            InMemoryLedgerStore::from_json(&std::fs::read_to_string(path)?)?
        }
        None => InMemoryLedgerStore::new(),
    };
    info!(portfolios = store.len(), "store ready");

    let service =
        PerformanceService::with_default_providers(Arc::new(store), config.performance.clone());

    Server::new(config, service).start().await?;

    Ok(())
}
