//! Stripe Checkout sessions and webhook verification.

use crate::error::{IntegrationError, IntegrationResult};
use crate::{ensure_success, http_client};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use jobhunter_types::{Currency, Money, OrderId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Stripe API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`).
    pub secret_key: String,
    /// Signing secret for webhook payloads (`whsec_...`).
    pub webhook_secret: Option<String>,
    /// Base URL for the API (e.g. `https://api.stripe.com`).
    pub api_base_url: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: None,
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }
}

/// What to charge for in a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub order_id: OrderId,
    pub product_name: String,
    pub product_description: Option<String>,
    pub amount: Money,
    pub currency: Currency,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Payment state of a checkout session as Stripe reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionStatus {
    pub id: String,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    /// Total in minor units.
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
}

impl CheckoutSessionStatus {
    /// The collected amount, or `None` while the session is unpaid.
    #[must_use]
    pub fn paid_amount(&self) -> Option<Money> {
        if self.payment_status != "paid" {
            return None;
        }
        self.amount_total.map(Money::from_cents)
    }
}

/// Something that can open a hosted payment page for an order and report
/// whether it was paid.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> IntegrationResult<CheckoutSession>;

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> IntegrationResult<CheckoutSessionStatus>;
}

/// A webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Id of the object the event is about (session or payment intent).
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }

    /// `metadata.order_id` of the object, if present and numeric.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        let raw = self.data.object.get("metadata")?.get("order_id")?;
        let id = match raw {
            serde_json::Value::String(s) => s.parse().ok()?,
            serde_json::Value::Number(n) => n.as_i64()?,
            _ => return None,
        };
        (id > 0).then(|| OrderId::from_raw(id))
    }

    /// The amount the event's object reports as collected. Checkout
    /// sessions count once `payment_status` is `paid`, payment intents once
    /// `status` is `succeeded`; anything else is `None`.
    #[must_use]
    pub fn paid_amount(&self) -> Option<Money> {
        let object = &self.data.object;
        let text = |key: &str| object.get(key).and_then(serde_json::Value::as_str);
        let cents = match text("object") {
            Some("checkout.session") if text("payment_status") == Some("paid") => {
                object.get("amount_total")
            }
            Some("payment_intent") if text("status") == Some("succeeded") => {
                object.get("amount_received")
            }
            _ => None,
        };
        cents.and_then(serde_json::Value::as_i64).map(Money::from_cents)
    }

    /// Lowercase currency of the event's object.
    #[must_use]
    pub fn currency(&self) -> Option<&str> {
        self.data.object.get("currency").and_then(|v| v.as_str())
    }
}

/// Stripe REST client.
pub struct StripeClient {
    config: StripeConfig,
    client: Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> IntegrationResult<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(IntegrationError::Config("Stripe secret key is empty".to_string()));
        }
        Ok(Self {
            config,
            client: http_client(Duration::from_secs(30))?,
        })
    }

    /// Verifies a webhook against the configured signing secret.
    pub fn verify_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> IntegrationResult<StripeEvent> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| IntegrationError::Config("webhook secret not configured".to_string()))?;
        verify_webhook(payload, signature_header, secret, now)
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> IntegrationResult<CheckoutSession> {
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                request.currency.as_str().to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount.cents().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.product_name.clone(),
            ),
            ("customer_email", request.customer_email.clone()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("metadata[order_id]", request.order_id.to_string()),
            (
                "payment_intent_data[metadata][order_id]",
                request.order_id.to_string(),
            ),
        ];
        if let Some(description) = &request.product_description {
            form.push((
                "line_items[0][price_data][product_data][description]",
                description.clone(),
            ));
        }

        debug!(order_id = %request.order_id, "creating Stripe checkout session");
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base_url))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| IntegrationError::network("checkout session request failed", e))?;
        let response = ensure_success("stripe", response).await?;
        response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse checkout session", e))
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> IntegrationResult<CheckoutSessionStatus> {
        debug!(session_id, "retrieving Stripe checkout session");
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.config.api_base_url,
                urlencoding::encode(session_id)
            ))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| IntegrationError::network("checkout session lookup failed", e))?;
        let response = ensure_success("stripe", response).await?;
        response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse checkout session", e))
    }
}

/// Computes the `v1` signature for `timestamp` and `payload`.
fn sign(payload: &[u8], secret: &str, timestamp: i64) -> IntegrationResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| IntegrationError::Config(format!("bad webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds a `Stripe-Signature` header value for a payload.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> IntegrationResult<String> {
    let mac = sign(payload, secret, timestamp)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verifies a `Stripe-Signature` header and parses the event.
///
/// The header carries `t=<unix seconds>` and one or more `v1=<hex>`
/// entries; any matching `v1` is accepted. Timestamps further than
/// [`WEBHOOK_TOLERANCE_SECS`] from `now` are refused.
pub fn verify_webhook(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> IntegrationResult<StripeEvent> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| IntegrationError::Signature("missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(IntegrationError::Signature("missing v1 signature".to_string()));
    }
    if now.timestamp().abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        return Err(IntegrationError::Signature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mac = sign(payload, secret, timestamp)?;
    let matched = candidates.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|sig| mac.clone().verify_slice(&sig).is_ok())
    });
    if !matched {
        return Err(IntegrationError::Signature("no matching signature".to_string()));
    }
    Ok(serde_json::from_slice(payload)?)
}
