//! Countdown banners, announcement badges and SEO metadata.

use crate::auth::CurrentAdmin;
use crate::error::{ApiError, ApiResult};
use crate::routes::parse;
use crate::state::SharedState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use jobhunter_store::{
    AnnouncementBadge, CountdownBanner, NewAnnouncementBadge, NewCountdownBanner, SeoSettings,
    Translations,
};
use jobhunter_types::{BadgeId, BannerId, Money};
use serde::Deserialize;
use serde_json::{Value, json};

fn enabled() -> bool {
    true
}

fn default_background() -> String {
    "gradient-primary".to_string()
}

fn default_text_color() -> String {
    "white".to_string()
}

fn default_priority() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BannerBody {
    #[serde(default = "enabled")]
    is_enabled: bool,
    title_en: String,
    subtitle_en: String,
    #[serde(default)]
    title_translations: Translations,
    #[serde(default)]
    subtitle_translations: Translations,
    target_price: Money,
    original_price: Option<Money>,
    end_date_time: DateTime<Utc>,
    #[serde(default = "default_background")]
    background_color: String,
    #[serde(default = "default_text_color")]
    text_color: String,
    #[serde(default = "default_priority")]
    priority: i64,
}

impl From<BannerBody> for NewCountdownBanner {
    fn from(body: BannerBody) -> Self {
        Self {
            is_enabled: body.is_enabled,
            title_en: body.title_en.trim().to_string(),
            subtitle_en: body.subtitle_en.trim().to_string(),
            title_translations: body.title_translations,
            subtitle_translations: body.subtitle_translations,
            target_price: body.target_price,
            original_price: body.original_price,
            end_date_time: body.end_date_time,
            background_color: body.background_color,
            text_color: body.text_color,
            priority: body.priority,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BadgeBody {
    #[serde(default = "enabled")]
    is_enabled: bool,
    text_en: String,
    #[serde(default)]
    text_translations: Translations,
    #[serde(default = "default_background")]
    background_color: String,
    #[serde(default = "default_text_color")]
    text_color: String,
    #[serde(default = "default_priority")]
    priority: i64,
}

impl From<BadgeBody> for NewAnnouncementBadge {
    fn from(body: BadgeBody) -> Self {
        Self {
            is_enabled: body.is_enabled,
            text_en: body.text_en.trim().to_string(),
            text_translations: body.text_translations,
            background_color: body.background_color,
            text_color: body.text_color,
            priority: body.priority,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncPriceBody {
    target_price: Option<Money>,
}

// ── Countdown banners ────────────────────────────────────────────

async fn active_banner(State(state): State<SharedState>) -> ApiResult<Json<CountdownBanner>> {
    state
        .content
        .active_banner(Utc::now())?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No active countdown banner found".to_string()))
}

async fn list_banners(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Vec<CountdownBanner>>> {
    Ok(Json(state.content.list_banners()?))
}

async fn create_banner(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(body): Json<BannerBody>,
) -> ApiResult<(StatusCode, Json<CountdownBanner>)> {
    let banner = state.content.create_banner(&body.into(), Utc::now())?;
    Ok((StatusCode::CREATED, Json(banner)))
}

async fn update_banner(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
    Json(body): Json<BannerBody>,
) -> ApiResult<Json<CountdownBanner>> {
    let id: BannerId = parse(&id, "banner id")?;
    Ok(Json(state.content.update_banner(id, &body.into(), Utc::now())?))
}

async fn delete_banner(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: BannerId = parse(&id, "banner id")?;
    state.content.delete_banner(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_banner_price(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(body): Json<SyncPriceBody>,
) -> ApiResult<Json<Value>> {
    let price = body
        .target_price
        .ok_or_else(|| ApiError::BadRequest("targetPrice is required".to_string()))?;
    let synced = state.content.sync_banner_price(price, Utc::now())?;
    Ok(Json(json!({
        "success": true,
        "message": "Banner price synced successfully",
        "targetPrice": price,
        "created": synced.created,
        "banner": synced.banner,
        "pricing": synced.pricing,
    })))
}

// ── Announcement badges ──────────────────────────────────────────

async fn active_badge(
    State(state): State<SharedState>,
) -> ApiResult<Json<Option<AnnouncementBadge>>> {
    Ok(Json(state.content.active_badge()?))
}

async fn list_badges(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Vec<AnnouncementBadge>>> {
    Ok(Json(state.content.list_badges()?))
}

async fn create_badge(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(body): Json<BadgeBody>,
) -> ApiResult<(StatusCode, Json<AnnouncementBadge>)> {
    let badge = state.content.create_badge(&body.into(), Utc::now())?;
    Ok((StatusCode::CREATED, Json(badge)))
}

async fn update_badge(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
    Json(body): Json<BadgeBody>,
) -> ApiResult<Json<AnnouncementBadge>> {
    let id: BadgeId = parse(&id, "badge id")?;
    Ok(Json(state.content.update_badge(id, &body.into(), Utc::now())?))
}

async fn delete_badge(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: BadgeId = parse(&id, "badge id")?;
    state.content.delete_badge(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── SEO ──────────────────────────────────────────────────────────

async fn seo_settings(State(state): State<SharedState>) -> ApiResult<Json<SeoSettings>> {
    Ok(Json(state.content.seo_settings()?))
}

async fn admin_seo_settings(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<SeoSettings>> {
    Ok(Json(state.content.seo_settings()?))
}

async fn update_seo_settings(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(changes): Json<Value>,
) -> ApiResult<Json<SeoSettings>> {
    Ok(Json(
        state.content.update_seo_settings(&changes, Utc::now())?,
    ))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/countdown-banner/active", get(active_banner))
        .route(
            "/api/admin/countdown-banners",
            get(list_banners).post(create_banner),
        )
        .route(
            "/api/admin/countdown-banners/{id}",
            put(update_banner).delete(delete_banner),
        )
        .route("/api/admin/sync-banner-price", post(sync_banner_price))
        .route("/api/announcement-badge/active", get(active_badge))
        .route(
            "/api/admin/announcement-badges",
            get(list_badges).post(create_badge),
        )
        .route(
            "/api/admin/announcement-badges/{id}",
            put(update_badge).delete(delete_badge),
        )
        .route("/api/seo-settings", get(seo_settings))
        .route(
            "/api/admin/seo-settings",
            get(admin_seo_settings)
                .put(update_seo_settings)
                .patch(update_seo_settings),
        )
}
