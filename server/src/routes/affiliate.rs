//! The affiliate program: enrolment, dashboards and payouts.

use crate::auth::{CurrentAdmin, CurrentCustomer};
use crate::error::ApiResult;
use crate::routes::{NotesBody, optional_body, parse};
use crate::state::SharedState;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use jobhunter_commerce::{AffiliateDashboard, AffiliateOverview, PayoutRequest};
use jobhunter_store::{AffiliatePayout, Customer};
use jobhunter_types::{Money, PayoutId, PayoutStatus};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayoutBody {
    amount: Money,
    payment_method: String,
    payment_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApproveBody {
    transaction_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AutoApproveBody {
    threshold: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct PayoutFilter {
    status: Option<String>,
}

async fn join(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<Customer>> {
    Ok(Json(
        state
            .affiliate
            .enroll(current.customer.id, Utc::now())
            .await?,
    ))
}

async fn dashboard(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<AffiliateDashboard>> {
    Ok(Json(state.affiliate.dashboard(current.customer.id)?))
}

async fn my_payouts(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<Vec<AffiliatePayout>>> {
    Ok(Json(
        state
            .store
            .list_payouts_for_affiliate(current.customer.id, None)?,
    ))
}

async fn request_payout(
    State(state): State<SharedState>,
    current: CurrentCustomer,
    Json(body): Json<PayoutBody>,
) -> ApiResult<(StatusCode, Json<AffiliatePayout>)> {
    let payout = state.affiliate.request_payout(
        current.customer.id,
        &PayoutRequest {
            amount: body.amount,
            payment_method: body.payment_method,
            payment_email: body.payment_email,
        },
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(payout)))
}

async fn overview(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<AffiliateOverview>> {
    Ok(Json(state.affiliate.overview()?))
}

async fn list_payouts(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Query(filter): Query<PayoutFilter>,
) -> ApiResult<Json<Vec<AffiliatePayout>>> {
    let status: Option<PayoutStatus> = filter
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty() && *s != "all")
        .map(|s| parse(s, "payout status"))
        .transpose()?;
    Ok(Json(state.affiliate.list_payouts(status)?))
}

async fn approve_payout(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<AffiliatePayout>> {
    let id: PayoutId = parse(&id, "payout id")?;
    let body: ApproveBody = optional_body(&body)?;
    let payout = state
        .affiliate
        .approve_payout(id, body.transaction_id.as_deref(), Utc::now())
        .await?;
    info!(admin = %admin.admin.username, payout_id = %id, "payout approved");
    Ok(Json(payout))
}

async fn reject_payout(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let id: PayoutId = parse(&id, "payout id")?;
    let body: NotesBody = optional_body(&body)?;
    let notes = body.notes.or(body.reason);
    state
        .affiliate
        .reject_payout(id, notes.as_deref(), Utc::now())?;
    info!(admin = %admin.admin.username, payout_id = %id, "payout rejected");
    Ok(Json(json!({ "success": true })))
}

async fn auto_approve(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: AutoApproveBody = optional_body(&body)?;
    let approved = state.affiliate.auto_approve(body.threshold).await?;
    Ok(Json(json!({ "success": true, "approved": approved })))
}

async fn process_payouts(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Value>> {
    let created = state.affiliate.process_automatic_payouts(Utc::now())?;
    Ok(Json(json!({
        "success": true,
        "created": created.len(),
        "payouts": created,
    })))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/affiliate/join", post(join))
        .route("/api/affiliate/dashboard", get(dashboard))
        .route(
            "/api/affiliate/payouts",
            get(my_payouts).post(request_payout),
        )
        .route("/api/admin/affiliates", get(overview))
        .route("/api/admin/affiliates/auto-approve", post(auto_approve))
        .route("/api/admin/affiliates/process-payouts", post(process_payouts))
        .route("/api/admin/payouts", get(list_payouts))
        .route("/api/admin/payouts/{id}/approve", post(approve_payout))
        .route("/api/admin/payouts/{id}/reject", post(reject_payout))
}
