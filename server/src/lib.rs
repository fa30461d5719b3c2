//! HTTP API for the Job Hunter storefront: checkout, accounts, the
//! affiliate program, support tickets, chat and extension licensing.

pub mod auth;
pub mod captcha;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use state::{AppState, SharedState, StartupError};

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
};
use std::time::Duration;
use tokio::signal::{self, ctrl_c};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));
    match origin {
        None => layer.allow_origin(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                warn!(origin, "CORS_ORIGIN is not a valid header value, cross-origin requests disabled");
                layer
            }
        },
    }
}

/// Build the HTTP API router over shared application state.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(state.cors_origin.as_deref());
    Router::new()
        .merge(routes::health::routes())
        .merge(routes::accounts::routes())
        .merge(routes::catalog::routes())
        .merge(routes::content::routes())
        .merge(routes::checkout::routes())
        .merge(routes::extension::routes())
        .merge(routes::affiliate::routes())
        .merge(routes::invoices::routes())
        .merge(routes::tickets::routes())
        .merge(routes::chat::routes())
        .merge(routes::admin::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_requests,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
