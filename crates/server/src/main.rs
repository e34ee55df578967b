//! davatar server entry point.
//!
//! Serves domain avatars over HTTP. Logs are JSON on stderr; `RUST_LOG`
//! overrides the level picked from the `debug` setting.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use davatar_client::AvatarResolver;
use davatar_core::{AppConfig, AvatarCache, open_store};

mod error;
mod handler;
mod router;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let store = open_store(&config).await?;
    let resolver = AvatarResolver::from_config(&config)?;
    let cache = AvatarCache::new(store.clone(), Arc::new(resolver), config.ttl());
    let state = handler::AppState::new(cache, &config).context("invalid fallback_url")?;

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        backend = store.backend(),
        ttl_secs = config.ttl_secs,
        block_private_addresses = config.block_private_addresses,
        "Starting davatar server"
    );

    axum::serve(listener, router::build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("davatar server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
