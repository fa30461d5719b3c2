//! Bearer sessions for customers and admins, and the sign-in settings
//! admins can change at runtime.

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jobhunter_commerce::Viewer;
use jobhunter_store::{AdminUser, Customer, Session, SessionSubject, Store};
use jobhunter_types::{CustomerId, SocialProvider, UserId};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

const CUSTOMER_SESSION_DAYS: i64 = 7;
const ADMIN_SESSION_HOURS: i64 = 24;
const ADMIN_IDLE_MINUTES: i64 = 30;
const OAUTH_STATE_LIFETIME: std::time::Duration = std::time::Duration::from_secs(10 * 60);
const MAX_PENDING_OAUTH_STATES: usize = 10_000;

/// Settings key under which [`AuthSettings`] is stored.
pub const AUTH_SETTINGS_KEY: &str = "auth_settings";

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn issue_session(
    store: &Store,
    subject: SessionSubject,
    lifetime: Duration,
    now: DateTime<Utc>,
) -> ApiResult<Session> {
    let session = Session {
        token: new_token(),
        subject,
        created_at: now,
        last_activity: now,
        expires_at: now + lifetime,
    };
    store.create_session(&session)?;
    Ok(session)
}

pub fn issue_customer_session(
    store: &Store,
    customer: CustomerId,
    now: DateTime<Utc>,
) -> ApiResult<Session> {
    issue_session(
        store,
        SessionSubject::Customer(customer),
        Duration::days(CUSTOMER_SESSION_DAYS),
        now,
    )
}

pub fn issue_admin_session(store: &Store, admin: UserId, now: DateTime<Utc>) -> ApiResult<Session> {
    issue_session(
        store,
        SessionSubject::Admin(admin),
        Duration::hours(ADMIN_SESSION_HOURS),
        now,
    )
}

/// The token of an `Authorization: Bearer` header.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn live_session(state: &SharedState, parts: &Parts, now: DateTime<Utc>) -> ApiResult<Session> {
    let token = bearer_token(parts)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;
    let session = state
        .store
        .get_session(token)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;
    if session.expires_at <= now {
        state.store.delete_session(&session.token)?;
        return Err(ApiError::Unauthorized("Invalid or expired session".to_string()));
    }
    Ok(session)
}

/// A signed-in customer. Blocked accounts are refused.
pub struct CurrentCustomer {
    pub customer: Customer,
    pub token: String,
}

impl FromRequestParts<SharedState> for CurrentCustomer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> ApiResult<Self> {
        let session = live_session(state, parts, Utc::now())?;
        let SessionSubject::Customer(id) = session.subject else {
            return Err(ApiError::Forbidden("Customer account required".to_string()));
        };
        let customer = state
            .store
            .get_customer(id)?
            .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
        if customer.is_blocked {
            return Err(ApiError::Forbidden("Account is blocked".to_string()));
        }
        Ok(Self {
            customer,
            token: session.token,
        })
    }
}

/// The customer if the request carries a valid customer session.
pub struct OptionalCustomer(pub Option<Customer>);

impl FromRequestParts<SharedState> for OptionalCustomer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> ApiResult<Self> {
        if bearer_token(parts).is_none() {
            return Ok(Self(None));
        }
        match CurrentCustomer::from_request_parts(parts, state).await {
            Ok(current) => Ok(Self(Some(current.customer))),
            Err(ApiError::Unauthorized(_) | ApiError::Forbidden(_)) => Ok(Self(None)),
            Err(e) => Err(e),
        }
    }
}

/// A signed-in admin. Sessions idle for more than 30 minutes are ended.
pub struct CurrentAdmin {
    pub admin: AdminUser,
    pub token: String,
}

impl FromRequestParts<SharedState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> ApiResult<Self> {
        let now = Utc::now();
        let session = live_session(state, parts, now)?;
        let SessionSubject::Admin(id) = session.subject else {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        };
        if now - session.last_activity > Duration::minutes(ADMIN_IDLE_MINUTES) {
            state.store.delete_session(&session.token)?;
            debug!(admin_id = %id, "admin session timed out");
            return Err(ApiError::Unauthorized(
                "Session expired due to inactivity".to_string(),
            ));
        }
        let admin = state
            .store
            .get_admin(id)?
            .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
        state.store.touch_session(&session.token, now)?;
        info!(
            admin = %admin.username,
            method = %parts.method,
            path = %parts.uri.path(),
            "admin request"
        );
        Ok(Self {
            admin,
            token: session.token,
        })
    }
}

/// Either kind of signed-in user.
pub enum Principal {
    Customer(Customer),
    Admin(AdminUser),
}

impl Principal {
    /// How ticket rules see this user.
    pub fn viewer(&self) -> Viewer {
        match self {
            Self::Customer(customer) => Viewer::Customer {
                email: customer.email.clone(),
                name: customer.name.clone(),
            },
            Self::Admin(admin) => Viewer::Staff {
                name: admin.username.clone(),
            },
        }
    }
}

impl FromRequestParts<SharedState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> ApiResult<Self> {
        let session = live_session(state, parts, Utc::now())?;
        match session.subject {
            SessionSubject::Customer(_) => Ok(Self::Customer(
                CurrentCustomer::from_request_parts(parts, state).await?.customer,
            )),
            SessionSubject::Admin(_) => Ok(Self::Admin(
                CurrentAdmin::from_request_parts(parts, state).await?.admin,
            )),
        }
    }
}

/// Which sign-in methods are offered. Secrets stay in the server
/// configuration; only switches and the public site key live here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    pub google_enabled: bool,
    pub facebook_enabled: bool,
    pub github_enabled: bool,
    pub recaptcha_enabled: bool,
    pub recaptcha_site_key: Option<String>,
    pub recaptcha_customer_enabled: bool,
    pub recaptcha_admin_enabled: bool,
}

impl AuthSettings {
    pub fn load(store: &Store) -> ApiResult<Self> {
        Ok(store
            .get_json_setting::<Self>(AUTH_SETTINGS_KEY)?
            .unwrap_or_default())
    }

    pub fn provider_enabled(&self, provider: SocialProvider) -> bool {
        match provider {
            SocialProvider::Google => self.google_enabled,
            SocialProvider::Facebook => self.facebook_enabled,
            SocialProvider::GitHub => self.github_enabled,
        }
    }
}

/// `state` values handed out with OAuth redirects.
pub struct OAuthStates {
    capacity: usize,
    pending: Mutex<HashMap<String, (SocialProvider, Instant)>>,
}

impl Default for OAuthStates {
    fn default() -> Self {
        Self::with_capacity(MAX_PENDING_OAUTH_STATES)
    }
}

impl OAuthStates {
    /// Keeps at most `capacity` states, dropping the oldest to make room.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, provider: SocialProvider, now: Instant) -> String {
        let state = new_token();
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|_, (_, issued)| now.duration_since(*issued) < OAUTH_STATE_LIFETIME);
            if pending.len() >= self.capacity {
                let oldest = pending
                    .iter()
                    .min_by_key(|(_, (_, issued))| *issued)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    pending.remove(&oldest);
                }
            }
            pending.insert(state.clone(), (provider, now));
        }
        state
    }

    /// Consumes `state`; true if it was issued for `provider` and is
    /// still fresh.
    pub fn take(&self, state: &str, provider: SocialProvider, now: Instant) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        pending.remove(state).is_some_and(|(issued_for, issued)| {
            issued_for == provider && now.duration_since(issued) < OAUTH_STATE_LIFETIME
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer  "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn oauth_state_is_single_use_and_provider_bound() {
        let states = OAuthStates::default();
        let now = Instant::now();

        let state = states.issue(SocialProvider::Google, now);
        assert!(!states.take(&state, SocialProvider::GitHub, now));
        // Consumed by the mismatched attempt.
        assert!(!states.take(&state, SocialProvider::Google, now));

        let state = states.issue(SocialProvider::Google, now);
        assert!(states.take(&state, SocialProvider::Google, now));

        let state = states.issue(SocialProvider::GitHub, now);
        assert!(!states.take(&state, SocialProvider::GitHub, now + OAUTH_STATE_LIFETIME));
    }

    #[test]
    fn oauth_states_stay_bounded() {
        let states = OAuthStates::with_capacity(4);
        let now = Instant::now();
        let first = states.issue(SocialProvider::Google, now);
        for i in 1..=20 {
            states.issue(SocialProvider::Google, now + std::time::Duration::from_millis(i));
        }
        assert_eq!(states.pending.lock().unwrap().len(), 4);
        assert!(!states.take(&first, SocialProvider::Google, now));
    }

    #[test]
    fn auth_settings_default_when_unset() {
        let store = Store::open_in_memory().unwrap();
        let settings = AuthSettings::load(&store).unwrap();
        assert_eq!(settings, AuthSettings::default());
        assert!(!settings.provider_enabled(SocialProvider::Google));
    }
}
