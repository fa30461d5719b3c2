use crate::state::SharedState;
use axum::{Json, Router, routing::get};
use chrono::Utc;
use serde_json::{Value, json};

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

async fn ping() -> &'static str {
    "pong"
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/ping", get(ping))
}
