//! Pricing and coupons.

use crate::auth::CurrentAdmin;
use crate::error::{ApiError, ApiResult};
use crate::routes::parse;
use crate::state::SharedState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Utc};
use jobhunter_commerce::{CommerceError, CouponRejection, Pricing};
use jobhunter_store::{Coupon, NewCoupon};
use jobhunter_types::{CouponId, DiscountType, Money};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CouponCheckBody {
    code: String,
    order_amount: Money,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CouponBody {
    code: String,
    discount_type: DiscountType,
    discount_value: Money,
    usage_limit: Option<u32>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CouponActiveBody {
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingBody {
    price: Money,
    before_price: Option<Money>,
}

async fn pricing(State(state): State<SharedState>) -> ApiResult<Json<Pricing>> {
    Ok(Json(state.catalog.current_pricing(Utc::now())?))
}

async fn validate_coupon(
    State(state): State<SharedState>,
    Json(body): Json<CouponCheckBody>,
) -> ApiResult<Json<Value>> {
    let quote = state
        .catalog
        .quote(Some(&body.code), body.order_amount, Utc::now())?;
    let coupon = state
        .store
        .get_coupon_by_code(body.code.trim())?
        .ok_or(CommerceError::from(CouponRejection::Unknown))?;
    Ok(Json(json!({
        "valid": true,
        "discountAmount": quote.discount,
        "finalAmount": quote.final_amount,
        "coupon": {
            "code": coupon.code,
            "discountType": coupon.discount_type,
            "discountValue": coupon.discount_value,
        },
    })))
}

async fn list_coupons(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(state.catalog.list_coupons()?))
}

async fn create_coupon(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(body): Json<CouponBody>,
) -> ApiResult<(StatusCode, Json<Coupon>)> {
    let coupon = state.catalog.create_coupon(
        &NewCoupon {
            code: body.code.trim().to_string(),
            discount_type: body.discount_type,
            discount_value: body.discount_value,
            usage_limit: body.usage_limit,
            expires_at: body.expires_at,
        },
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

async fn set_coupon_active(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
    Json(body): Json<CouponActiveBody>,
) -> ApiResult<Json<Value>> {
    let id: CouponId = parse(&id, "coupon id")?;
    state.catalog.set_coupon_active(id, body.is_active)?;
    Ok(Json(json!({ "success": true, "isActive": body.is_active })))
}

async fn delete_coupon(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: CouponId = parse(&id, "coupon id")?;
    state.catalog.delete_coupon(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_pricing(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(body): Json<PricingBody>,
) -> ApiResult<Json<Pricing>> {
    if body.before_price.is_some_and(|before| before <= body.price) {
        return Err(ApiError::BadRequest(
            "Before price must be higher than the price".to_string(),
        ));
    }
    Ok(Json(state.catalog.update_pricing(
        body.price,
        body.before_price,
        Utc::now(),
    )?))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/products/pricing", get(pricing))
        .route("/api/validate-coupon", post(validate_coupon))
        .route("/api/coupons", get(list_coupons).post(create_coupon))
        .route(
            "/api/coupons/{id}",
            delete(delete_coupon).patch(set_coupon_active),
        )
        .route("/api/admin/pricing", put(update_pricing))
}
