//! Admin dashboard: statistics, orders, customers, settings and the
//! customer dashboard switches.

use crate::auth::CurrentAdmin;
use crate::error::{ApiError, ApiResult};
use crate::routes::{NotesBody, optional_body, parse};
use crate::state::SharedState;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use chrono::Utc;
use jobhunter_commerce::DashboardStats;
use jobhunter_store::{Customer, DashboardFeature, OrderPage, Page, Setting};
use jobhunter_types::CustomerId;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
struct OrdersQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SettingBody {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureBody {
    is_enabled: bool,
    description: Option<String>,
}

fn is_secret(key: &str) -> bool {
    key.ends_with("_key") || key.ends_with("_secret")
}

/// Shows only the last four characters of a secret value.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("***{tail}")
}

async fn stats(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.analytics.dashboard_stats()?))
}

async fn orders(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let OrderPage { orders, total } = state.store.list_orders(Page::numbered(page, per_page))?;
    Ok(Json(json!({
        "orders": orders,
        "total": total,
        "page": page,
        "limit": per_page.clamp(1, 100),
    })))
}

async fn customers(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.store.list_customers()?))
}

async fn set_blocked(
    state: &SharedState,
    admin: &CurrentAdmin,
    id: &str,
    blocked: bool,
    body: &Bytes,
) -> ApiResult<Json<Customer>> {
    let id: CustomerId = parse(id, "customer id")?;
    let notes: NotesBody = optional_body(body)?;
    let reason = notes.reason.or(notes.notes);
    let customer = state
        .accounts
        .set_blocked(id, blocked, reason.as_deref(), Utc::now())?;
    info!(admin = %admin.admin.username, customer_id = %id, blocked, "customer block state set by admin");
    Ok(Json(customer))
}

async fn block_customer(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Customer>> {
    set_blocked(&state, &admin, &id, true, &body).await
}

async fn unblock_customer(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Customer>> {
    set_blocked(&state, &admin, &id, false, &body).await
}

async fn settings(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Vec<Setting>>> {
    let settings = state
        .store
        .list_settings()?
        .into_iter()
        .map(|mut setting| {
            if is_secret(&setting.key) && !setting.value.is_empty() {
                setting.value = mask(&setting.value);
            }
            setting
        })
        .collect();
    Ok(Json(settings))
}

async fn update_setting(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> ApiResult<Json<Value>> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ApiError::BadRequest("Setting key is required".to_string()));
    }
    state.store.set_setting(key, body.value.trim(), Utc::now())?;
    info!(admin = %admin.admin.username, key, "setting updated");
    Ok(Json(json!({ "success": true, "key": key })))
}

async fn dashboard_features(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<DashboardFeature>>> {
    Ok(Json(state.store.list_dashboard_features()?))
}

async fn admin_dashboard_features(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Vec<DashboardFeature>>> {
    Ok(Json(state.store.list_dashboard_features()?))
}

async fn update_dashboard_feature(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Path(name): Path<String>,
    Json(body): Json<FeatureBody>,
) -> ApiResult<Json<DashboardFeature>> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Feature name is required".to_string()));
    }
    Ok(Json(state.store.upsert_dashboard_feature(
        name,
        body.is_enabled,
        body.description.as_deref(),
        Utc::now(),
    )?))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/admin/stats", get(stats))
        .route("/api/admin/orders", get(orders))
        .route("/api/admin/customers", get(customers))
        .route("/api/admin/customers/{id}/block", post(block_customer))
        .route("/api/admin/customers/{id}/unblock", post(unblock_customer))
        .route("/api/settings", get(settings))
        .route("/api/settings/{key}", put(update_setting))
        .route("/api/dashboard-features", get(dashboard_features))
        .route("/api/admin/dashboard-features", get(admin_dashboard_features))
        .route(
            "/api/admin/dashboard-features/{name}",
            put(update_dashboard_feature),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_keep_only_their_tail() {
        assert!(is_secret("openai_api_key"));
        assert!(is_secret("stripe_webhook_secret"));
        assert!(!is_secret("openai_model"));
        assert_eq!(mask("sk-abcdef123456"), "***3456");
        assert_eq!(mask("ab"), "***ab");
    }
}
