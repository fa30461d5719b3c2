//! Customer and admin sign-in, sessions, captchas and social login.

use crate::auth::{
    AUTH_SETTINGS_KEY, AuthSettings, CurrentAdmin, CurrentCustomer, issue_admin_session,
    issue_customer_session,
};
use crate::captcha::Challenge;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::ClientIp;
use crate::routes::parse;
use crate::state::{AppState, SharedState};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};
use chrono::Utc;
use jobhunter_commerce::{PurchaseStatus, Registration};
use jobhunter_store::{Customer, Invoice, Order};
use jobhunter_types::SocialProvider;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{info, warn};

/// Runs password hashing and verification on the blocking pool.
async fn off_runtime<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    email: String,
    password: String,
    name: Option<String>,
    #[serde(alias = "referredBy")]
    referral_code: Option<String>,
    #[serde(default)]
    marketing_opt_in: bool,
    captcha_id: Option<String>,
    captcha_answer: Option<String>,
    recaptcha_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    #[serde(alias = "username")]
    email: String,
    password: String,
    recaptcha_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

enum Audience {
    Customer,
    Admin,
}

/// Checks a reCAPTCHA token when the settings require one for this
/// audience. Returns whether a check was required.
async fn require_recaptcha(
    state: &AppState,
    audience: Audience,
    token: Option<&str>,
    ip: &str,
) -> ApiResult<bool> {
    let settings = AuthSettings::load(&state.store)?;
    let enforced = settings.recaptcha_enabled
        && match audience {
            Audience::Customer => settings.recaptcha_customer_enabled,
            Audience::Admin => settings.recaptcha_admin_enabled,
        };
    let Some(verifier) = state.recaptcha.as_ref().filter(|_| enforced) else {
        return Ok(false);
    };
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("reCAPTCHA verification required".to_string()))?;
    if !verifier.verify(token, Some(ip)).await? {
        return Err(ApiError::BadRequest("reCAPTCHA verification failed".to_string()));
    }
    Ok(true)
}

async fn captcha(State(state): State<SharedState>) -> Json<Challenge> {
    Json(state.captcha.issue(Instant::now()))
}

async fn register(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<RegisterBody>,
) -> ApiResult<Json<Value>> {
    let checked =
        require_recaptcha(&state, Audience::Customer, body.recaptcha_token.as_deref(), &ip).await?;
    if !checked {
        let (Some(id), Some(answer)) = (body.captcha_id.as_deref(), body.captcha_answer.as_deref())
        else {
            return Err(ApiError::BadRequest("Captcha answer is required".to_string()));
        };
        if !state.captcha.verify(id, answer, Instant::now()) {
            return Err(ApiError::BadRequest(
                "Incorrect captcha answer, please try again".to_string(),
            ));
        }
    }

    let now = Utc::now();
    let registration = Registration {
        email: body.email,
        password: body.password,
        name: body.name,
        referred_by: body.referral_code,
        marketing_opt_in: body.marketing_opt_in,
    };
    let accounts = state.accounts.clone();
    let customer = off_runtime(move || Ok(accounts.register(&registration, now)?)).await?;
    let session = issue_customer_session(&state.store, customer.id, now)?;
    info!(customer_id = %customer.id, ip = %ip, "customer registered");
    Ok(Json(json!({
        "success": true,
        "message": "Registration successful",
        "token": session.token,
        "user": customer,
    })))
}

async fn customer_login(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<Value>> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    require_recaptcha(&state, Audience::Customer, body.recaptcha_token.as_deref(), &ip).await?;
    let accounts = state.accounts.clone();
    let customer = off_runtime(move || Ok(accounts.login(&body.email, &body.password)?)).await?;
    let session = issue_customer_session(&state.store, customer.id, Utc::now())?;
    info!(customer_id = %customer.id, "customer signed in");
    Ok(Json(json!({
        "success": true,
        "role": "customer",
        "token": session.token,
        "user": customer,
    })))
}

async fn customer_logout(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<Value>> {
    state.store.delete_session(&current.token)?;
    Ok(Json(json!({ "success": true })))
}

async fn me(current: CurrentCustomer) -> Json<Customer> {
    Json(current.customer)
}

async fn my_orders(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.checkout.orders_for_customer(&current.customer)?))
}

async fn my_invoices(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<Vec<Invoice>>> {
    let customer = &current.customer;
    Ok(Json(
        state
            .invoices
            .list_for_customer(customer.id, &customer.email)?,
    ))
}

async fn purchase_status(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<PurchaseStatus>> {
    Ok(Json(state.checkout.purchase_status(&current.customer)?))
}

async fn admin_login(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<Value>> {
    require_recaptcha(&state, Audience::Admin, body.recaptcha_token.as_deref(), &ip).await?;
    let accounts = state.accounts.clone();
    let (login, password) = (body.email.clone(), body.password);
    let admin = match off_runtime(move || Ok(accounts.admin_login(&login, &password)?)).await {
        Ok(admin) => admin,
        Err(e) => {
            warn!(login = %body.email, ip = %ip, "admin sign-in refused");
            return Err(e);
        }
    };
    let session = issue_admin_session(&state.store, admin.id, Utc::now())?;
    info!(admin = %admin.username, ip = %ip, "admin signed in");
    Ok(Json(json!({
        "success": true,
        "role": "admin",
        "token": session.token,
        "user": admin,
    })))
}

async fn admin_logout(
    State(state): State<SharedState>,
    current: CurrentAdmin,
) -> ApiResult<Json<Value>> {
    state.store.delete_session(&current.token)?;
    Ok(Json(json!({ "success": true })))
}

/// Public view of the sign-in options: a provider is only offered when it
/// is both switched on and configured.
async fn public_auth_settings(State(state): State<SharedState>) -> ApiResult<Json<AuthSettings>> {
    let mut settings = AuthSettings::load(&state.store)?;
    settings.google_enabled &= state.oauth.contains_key(&SocialProvider::Google);
    settings.github_enabled &= state.oauth.contains_key(&SocialProvider::GitHub);
    settings.facebook_enabled &= state.oauth.contains_key(&SocialProvider::Facebook);
    settings.recaptcha_enabled &= state.recaptcha.is_some();
    Ok(Json(settings))
}

async fn admin_auth_settings(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<AuthSettings>> {
    Ok(Json(AuthSettings::load(&state.store)?))
}

async fn update_auth_settings(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(settings): Json<AuthSettings>,
) -> ApiResult<Json<AuthSettings>> {
    state
        .store
        .set_json_setting(AUTH_SETTINGS_KEY, &settings, Utc::now())?;
    Ok(Json(settings))
}

fn provider_for(state: &AppState, name: &str) -> ApiResult<SocialProvider> {
    let provider: SocialProvider = parse(name, "sign-in provider")
        .map_err(|_| ApiError::NotFound(format!("Unknown sign-in provider: {name}")))?;
    let enabled = AuthSettings::load(&state.store)?.provider_enabled(provider);
    if !enabled || !state.oauth.contains_key(&provider) {
        return Err(ApiError::NotFound(format!(
            "Sign-in with {provider} is not available"
        )));
    }
    Ok(provider)
}

async fn social_redirect(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Redirect> {
    let provider = provider_for(&state, &name)?;
    let client = state
        .oauth
        .get(&provider)
        .ok_or(ApiError::Unavailable("Social sign-in"))?;
    let token = state.oauth_states.issue(provider, Instant::now());
    Ok(Redirect::to(&client.authorize_url(&token)))
}

async fn social_sign_in(
    state: &AppState,
    provider: SocialProvider,
    query: &CallbackQuery,
) -> ApiResult<String> {
    if let Some(error) = &query.error {
        return Err(ApiError::BadRequest(format!("Provider refused sign-in: {error}")));
    }
    let (Some(code), Some(token)) = (query.code.as_deref(), query.state.as_deref()) else {
        return Err(ApiError::BadRequest("Missing code or state".to_string()));
    };
    if !state.oauth_states.take(token, provider, Instant::now()) {
        return Err(ApiError::BadRequest("Sign-in request expired".to_string()));
    }
    let client = state
        .oauth
        .get(&provider)
        .ok_or(ApiError::Unavailable("Social sign-in"))?;
    let access_token = client.exchange_code(code).await?;
    let profile = client.fetch_profile(&access_token).await?;

    let now = Utc::now();
    let customer = state.accounts.social_sign_in(&profile, now)?;
    let session = issue_customer_session(&state.store, customer.id, now)?;
    info!(customer_id = %customer.id, provider = %provider, "customer signed in with provider");
    Ok(session.token)
}

async fn social_callback(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Redirect> {
    let provider = provider_for(&state, &name)?;
    match social_sign_in(&state, provider, &query).await {
        Ok(token) => Ok(Redirect::to(
            &state.config.url(&format!("/login#token={token}")),
        )),
        Err(e) => {
            warn!(provider = %provider, error = %e, "social sign-in failed");
            Ok(Redirect::to(
                &state.config.url("/login?error=social_login_failed"),
            ))
        }
    }
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/captcha", get(captcha))
        .route("/api/customer/register", post(register))
        .route("/api/customer/login", post(customer_login))
        .route("/api/customer/logout", post(customer_logout))
        .route("/api/me", get(me))
        .route("/api/me/orders", get(my_orders))
        .route("/api/me/invoices", get(my_invoices))
        .route("/api/me/purchase-status", get(purchase_status))
        .route("/api/admin/login", post(admin_login))
        .route("/api/admin/logout", post(admin_logout))
        .route("/api/auth-settings", get(public_auth_settings))
        .route(
            "/api/admin/auth-settings",
            get(admin_auth_settings).put(update_auth_settings),
        )
        .route("/api/auth/{provider}", get(social_redirect))
        .route("/api/auth/{provider}/callback", get(social_callback))
}
