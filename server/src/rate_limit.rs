//! Fixed-window request limits per client address.

use crate::state::SharedState;
use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{Extensions, HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Most client keys a limiter tracks at once.
pub const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Tracks request counts per key in fixed windows.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    capacity: usize,
    hits: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_capacity(limit, window, MAX_TRACKED_CLIENTS)
    }

    /// A limiter tracking at most `capacity` keys. Unknown keys are refused
    /// while the table is full of live windows.
    pub fn with_capacity(limit: u32, window: Duration, capacity: usize) -> Self {
        Self {
            limit,
            window,
            capacity,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// General API traffic: 100 requests per 15 minutes.
    pub fn api() -> Self {
        Self::new(100, Duration::from_secs(15 * 60))
    }

    /// Login and registration: 5 attempts per 5 minutes.
    pub fn auth() -> Self {
        Self::new(5, Duration::from_secs(5 * 60))
    }

    /// Support chat: 10 messages per 15 minutes.
    pub fn chat() -> Self {
        Self::new(10, Duration::from_secs(15 * 60))
    }

    /// Counts a request. Returns the time until the window resets when the
    /// key is over its limit.
    pub fn check(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let Ok(mut hits) = self.hits.lock() else {
            // A poisoned map only loses counts; let the request through.
            return Ok(());
        };
        if hits.len() >= self.capacity && !hits.contains_key(key) {
            hits.retain(|_, (start, _)| now.duration_since(*start) < self.window);
            if hits.len() >= self.capacity {
                let oldest = hits.values().map(|(start, _)| *start).min().unwrap_or(now);
                return Err(self.window.saturating_sub(now.duration_since(oldest)));
            }
        }
        let entry = hits.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        if entry.1 >= self.limit {
            return Err(self.window.saturating_sub(now.duration_since(entry.0)));
        }
        entry.1 += 1;
        Ok(())
    }
}

/// The limiters the API applies.
pub struct RateLimits {
    pub api: RateLimiter,
    pub auth: RateLimiter,
    pub chat: RateLimiter,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            api: RateLimiter::api(),
            auth: RateLimiter::auth(),
            chat: RateLimiter::chat(),
        }
    }
}

const AUTH_PATHS: [&str; 3] = [
    "/api/customer/register",
    "/api/customer/login",
    "/api/admin/login",
];

/// Client address. Behind a trusted proxy this is the last
/// `X-Forwarded-For` hop, the one the proxy appended; anything before it
/// is client supplied. Otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| {
            headers
                .get_all("x-forwarded-for")
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(','))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .last()
                .map(str::to_string)
        })
        .flatten();
    forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// The caller's address, as [`client_ip`] sees it.
pub struct ClientIp(pub String);

impl FromRequestParts<SharedState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(
            &parts.headers,
            &parts.extensions,
            state.trust_proxy,
        )))
    }
}

fn too_many_requests(retry_after: Duration) -> Response {
    let secs = retry_after.as_secs().max(1);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests, please try again later.",
            "retryAfter": secs,
        })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}

/// Middleware applying the general limit to `/api` and the stricter
/// limits to authentication and chat.
pub async fn limit_requests(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    // Stripe retries webhooks on its own schedule.
    if !path.starts_with("/api/") || path == "/api/stripe/webhook" {
        return next.run(request).await;
    }

    let ip = client_ip(request.headers(), request.extensions(), state.trust_proxy);
    let now = Instant::now();
    let limits = &state.limits;
    let specific = if AUTH_PATHS.contains(&path) {
        Some(&limits.auth)
    } else if path == "/api/chat" {
        Some(&limits.chat)
    } else {
        None
    };

    let verdict = limits
        .api
        .check(&ip, now)
        .and_then(|()| specific.map_or(Ok(()), |limiter| limiter.check(&ip, now)));
    if let Err(retry_after) = verdict {
        warn!(ip = %ip, path = %path, "rate limit exceeded");
        return too_many_requests(retry_after);
    }
    next.run(request).await
}
