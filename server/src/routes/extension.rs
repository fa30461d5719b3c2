//! Endpoints called by the browser extension: activation, usage, trials,
//! premium devices and installation pings.

use crate::auth::{CurrentAdmin, CurrentCustomer, OptionalCustomer};
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::ClientIp;
use crate::routes::parse;
use crate::state::SharedState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use jobhunter_commerce::{InstallationPing, TrialStatus, UsageReport, ValidatedLicense};
use jobhunter_license::{ActivationCode, DeviceDecision, UsageDecision};
use jobhunter_store::Installation;
use jobhunter_types::{ActivationCodeId, InstallationId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateBody {
    activation_code: String,
    installation_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivateBody {
    activation_code: String,
    device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageBody {
    session_id: String,
    #[serde(default)]
    jobs_used: u32,
    platform: String,
    location: Option<String>,
    extension_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrialBody {
    extension_id: String,
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceBody {
    #[serde(default)]
    device_fingerprint: String,
    extension_id: Option<String>,
    reason: Option<String>,
}

impl DeviceBody {
    fn fingerprint(&self) -> ApiResult<&str> {
        let fingerprint = self.device_fingerprint.trim();
        if fingerprint.is_empty() {
            return Err(ApiError::BadRequest(
                "Device fingerprint required".to_string(),
            ));
        }
        Ok(fingerprint)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallationBody {
    installation_id: String,
    device_fingerprint: Option<String>,
    extension_version: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValidResponse {
    valid: bool,
    #[serde(flatten)]
    license: ValidatedLicense,
}

async fn validate(
    State(state): State<SharedState>,
    Json(body): Json<ValidateBody>,
) -> ApiResult<Json<ValidResponse>> {
    let installation: InstallationId = parse(&body.installation_id, "installation id")?;
    let license = state
        .licensing
        .validate(&body.activation_code, installation, Utc::now())?;
    Ok(Json(ValidResponse {
        valid: true,
        license,
    }))
}

async fn activate(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<ActivateBody>,
) -> ApiResult<Json<Value>> {
    let code = state.licensing.activate_device(
        &body.activation_code,
        &body.device_id,
        Some(&ip),
        Utc::now(),
    )?;
    Ok(Json(json!({
        "success": true,
        "message": "Extension activated successfully",
        "activatedAt": code.activated_at,
        "activationCount": code.activation_count,
        "maxActivations": code.max_activations,
    })))
}

async fn public_key(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let key = state
        .verifying_key
        .as_ref()
        .ok_or(ApiError::Unavailable("License signing"))?;
    Ok(Json(json!({
        "algorithm": "ed25519",
        "publicKey": hex::encode(key.to_bytes()),
    })))
}

async fn deprecated_activation_key() -> Response {
    (
        StatusCode::GONE,
        Json(json!({
            "valid": false,
            "message": "Activation system has been deprecated. Please contact support for assistance.",
        })),
    )
        .into_response()
}

async fn check_usage(
    State(state): State<SharedState>,
    current: CurrentCustomer,
) -> ApiResult<Json<UsageDecision>> {
    Ok(Json(state.licensing.check_usage(current.customer.id)?))
}

async fn record_usage(
    State(state): State<SharedState>,
    current: CurrentCustomer,
    Json(body): Json<UsageBody>,
) -> ApiResult<Json<UsageDecision>> {
    if body.session_id.trim().is_empty() || body.platform.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Session id and platform are required".to_string(),
        ));
    }
    let report = UsageReport {
        session_id: body.session_id,
        jobs_used: body.jobs_used,
        platform: body.platform,
        location: body.location,
        extension_version: body.extension_version,
    };
    Ok(Json(state.licensing.record_usage(
        current.customer.id,
        &report,
        Utc::now(),
    )?))
}

async fn use_trial(
    State(state): State<SharedState>,
    Json(body): Json<TrialBody>,
) -> ApiResult<Json<TrialStatus>> {
    Ok(Json(state.licensing.use_trial(
        &body.extension_id,
        &body.fingerprint,
        Utc::now(),
    )?))
}

async fn validate_device(
    State(state): State<SharedState>,
    current: CurrentCustomer,
    Json(body): Json<DeviceBody>,
) -> ApiResult<Response> {
    let fingerprint = body.fingerprint()?;
    let Some(extension_id) = body.extension_id.as_deref().filter(|id| !id.trim().is_empty())
    else {
        return Err(ApiError::BadRequest("Missing required parameters".to_string()));
    };
    let user_id = current.customer.id.to_string();
    let now = Utc::now();
    let decision = state
        .licensing
        .validate_premium_device(&user_id, fingerprint, extension_id, now)?;
    let response = match decision {
        DeviceDecision::AlreadyAuthorized => {
            let registered_at = state
                .store
                .get_active_premium_device(&user_id, fingerprint)?
                .map(|device| device.registered_at);
            Json(json!({
                "authorized": true,
                "message": "Device authorized",
                "registeredAt": registered_at,
            }))
            .into_response()
        }
        DeviceDecision::Register => Json(json!({
            "authorized": true,
            "message": "Device registered and authorized",
            "isNewRegistration": true,
        }))
        .into_response(),
        DeviceDecision::Denied {
            max_devices,
            current_devices,
        } => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "authorized": false,
                "message": state.licensing.device_denial_message(),
                "maxDevices": max_devices,
                "currentDevices": current_devices,
            })),
        )
            .into_response(),
    };
    Ok(response)
}

async fn device_heartbeat(
    State(state): State<SharedState>,
    current: CurrentCustomer,
    Json(body): Json<DeviceBody>,
) -> ApiResult<Json<Value>> {
    let fingerprint = body.fingerprint()?;
    let now = Utc::now();
    if !state.licensing.device_heartbeat(
        &current.customer.id.to_string(),
        fingerprint,
        now,
    )? {
        return Err(ApiError::NotFound(
            "Device not found or inactive".to_string(),
        ));
    }
    Ok(Json(json!({
        "success": true,
        "message": "Device heartbeat updated",
        "timestamp": now,
    })))
}

async fn deactivate_device(
    State(state): State<SharedState>,
    current: CurrentCustomer,
    Json(body): Json<DeviceBody>,
) -> ApiResult<Json<Value>> {
    let fingerprint = body.fingerprint()?;
    let reason = body.reason.as_deref().unwrap_or("user_request");
    let user_id = current.customer.id.to_string();
    if !state
        .licensing
        .deactivate_premium_device(&user_id, fingerprint, reason, Utc::now())?
    {
        return Err(ApiError::NotFound(
            "Device not found or inactive".to_string(),
        ));
    }
    info!(user_id = %user_id, reason, "premium device deactivated");
    Ok(Json(json!({
        "success": true,
        "message": "Device deactivated",
    })))
}

async fn register_installation(
    State(state): State<SharedState>,
    OptionalCustomer(customer): OptionalCustomer,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Json(body): Json<InstallationBody>,
) -> ApiResult<Json<Installation>> {
    let ping = InstallationPing {
        installation_id: parse(&body.installation_id, "installation id")?,
        customer_id: customer.map(|c| c.id),
        device_fingerprint: body.device_fingerprint,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: Some(ip),
        extension_version: body.extension_version,
    };
    Ok(Json(state.licensing.register_installation(&ping, Utc::now())?))
}

async fn revoke_code(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<ActivationCode>> {
    let id: ActivationCodeId = parse(&id, "activation code id")?;
    let code = state.licensing.revoke(id)?;
    info!(admin = %admin.admin.username, code_id = %id, "activation code revoked by admin");
    Ok(Json(code))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/activation/validate", post(validate))
        .route("/api/activation/activate", post(activate))
        .route("/api/activation/public-key", get(public_key))
        .route("/api/validate-activation-key", post(deprecated_activation_key))
        .route("/api/extension/check", get(check_usage))
        .route("/api/extension/usage", post(record_usage))
        .route("/api/extension/installations", post(register_installation))
        .route("/api/trial/use", post(use_trial))
        .route("/api/premium/validate-device", post(validate_device))
        .route("/api/premium/device-heartbeat", post(device_heartbeat))
        .route("/api/premium/deactivate-device", post(deactivate_device))
        .route(
            "/api/admin/activation-codes/{id}/revoke",
            post(revoke_code),
        )
}
