//! pricetag server entry point.
//!
//! Boots the HTTP API that resolves products by scan code. Logs are JSON
//! on stderr, filtered with `RUST_LOG`.

use std::sync::Arc;

use anyhow::{Context, Result};
use pricetag_client::{SessionClient, SessionConfig};
use pricetag_core::{AppConfig, ProductDb, product_cache};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod error;
mod freshness;
mod resolver;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use freshness::FreshnessGate;
use resolver::Resolver;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    let db = ProductDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening product database at {}", config.db_path.display()))?;
    let catalog = SessionClient::new(SessionConfig::from(&config)).context("building catalog client")?;
    let cache = Arc::new(product_cache());

    let resolver = Arc::new(Resolver::new(Arc::new(db), Arc::new(catalog), Arc::clone(&cache)));
    let gate = FreshnessGate::new(cache, config.tz()?, config.cutover()?, &config.volatile_path);
    let app = routes::router(AppState::new(resolver, config.evict_clears_index), gate);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        catalog = %config.catalog_base_url,
        timezone = %config.timezone,
        "Starting pricetag server"
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("pricetag server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
