//! Job Hunter storefront server
//!
//! Serves the storefront API, the admin dashboard API and the endpoints
//! the browser extension uses to activate and report usage.
//!
//! Usage:
//!   jobhunter-server --port 5000 --database jobhunter.db

use anyhow::{Context, Result};
use clap::Parser;
use jobhunter_server::{AppState, ServerConfig, build_router, shutdown_signal};
use jobhunter_store::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Job Hunter server starting...");

    let store = Store::open(&config.database)
        .with_context(|| format!("opening database {}", config.database.display()))?;
    let state = AppState::new(&config, store).context("initializing services")?;
    let app = build_router(Arc::new(state));

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Server stopped");
    Ok(())
}
