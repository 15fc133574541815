//! Flowkeeper reconcile service
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - FLOWKEEPER_SEED_PATH: JSON seed for the in-memory store (default: empty store)
//! - FLOWKEEPER_RECONCILE_INTERVAL_SECS: Seconds between reconcile cycles (default: 60)
//! - FLOWKEEPER_REMOVE_STALE_ASSIGNMENTS: Delete unreachable trigger assignments (default: false)
//! - FLOWKEEPER_AVG_MODE: window | full-length (default: window)
//! - RUST_LOG: Log level (default: flowkeeper=info)

use std::sync::Arc;

use flowkeeper::catalog::Catalog;
use flowkeeper::storage::MemoryStore;
use flowkeeper::worker::ReconcileWorker;
use flowkeeper::CoreConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowkeeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env();

    tracing::info!("Flowkeeper configuration:");
    tracing::info!("  Reconcile interval: {} seconds", config.reconcile_interval_secs);
    tracing::info!("  Stale assignments: {:?}", config.stale_policy);
    tracing::info!(
        "  Store timeouts: read {:?}, write {:?}",
        config.read_timeout,
        config.write_timeout
    );

    let store = match &config.seed_path {
        Some(path) => MemoryStore::load_seed(path)?,
        None => {
            tracing::warn!("No FLOWKEEPER_SEED_PATH set, starting with an empty store");
            MemoryStore::new()
        }
    };

    let catalog = Arc::new(
        Catalog::from_config(Arc::new(store), &config).with_span(tracing::info_span!("catalog")),
    );

    tracing::info!("  Avg mode: {:?}", catalog.evaluator().avg_mode());

    let version = flowkeeper::version();
    tracing::info!(
        "Flowkeeper {}.{}.{} ({})",
        version.major,
        version.minor,
        version.patch,
        version.comment
    );

    let worker = Arc::new(ReconcileWorker::new(catalog, config.reconcile_interval()));
    let handle = Arc::clone(&worker).start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    worker.stop();
    handle.await?;

    Ok(())
}
