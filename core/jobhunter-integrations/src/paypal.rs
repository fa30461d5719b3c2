//! PayPal Orders v2 client.
//!
//! Uses client-credentials OAuth; the access token is cached until shortly
//! before it expires.

use crate::error::{IntegrationError, IntegrationResult};
use crate::{ensure_success, http_client};
use jobhunter_types::{Currency, Money};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const PAYPAL_SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
pub const PAYPAL_LIVE_URL: &str = "https://api-m.paypal.com";

/// PayPal API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Sandbox or live API base URL.
    pub api_base_url: String,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base_url: PAYPAL_SANDBOX_URL.to_string(),
        }
    }
}

/// Order intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayPalIntent {
    #[default]
    Capture,
    Authorize,
}

/// A created order awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
    pub approve_url: Option<String>,
}

/// Result of capturing an approved order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPalCapture {
    pub order_id: String,
    pub status: String,
    pub capture_id: Option<String>,
    pub amount: Option<Money>,
    pub currency: Option<Currency>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
}

impl PayPalCapture {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
    payer: Option<Payer>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    amount: Option<Amount>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    value: String,
    currency_code: String,
}

#[derive(Debug, Deserialize)]
struct Payer {
    email_address: Option<String>,
    name: Option<PayerName>,
}

#[derive(Debug, Deserialize)]
struct PayerName {
    given_name: Option<String>,
    surname: Option<String>,
}

/// PayPal REST client.
pub struct PayPalClient {
    config: PayPalConfig,
    client: Client,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> IntegrationResult<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(IntegrationError::Config(
                "PayPal client id and secret are required".to_string(),
            ));
        }
        Ok(Self {
            config,
            client: http_client(Duration::from_secs(30))?,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Returns a valid access token, fetching a new one when needed.
    async fn access_token(&self) -> IntegrationResult<String> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("requesting PayPal access token");
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.api_base_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| IntegrationError::network("token request failed", e))?;
        let response = ensure_success("paypal", response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse token response", e))?;

        // Refresh a minute early.
        let lifetime = token.expires_in.unwrap_or(300).saturating_sub(60);
        *self.token.write().await = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(token.access_token)
    }

    /// Creates an order for `amount`.
    pub async fn create_order(
        &self,
        amount: Money,
        currency: &Currency,
        intent: PayPalIntent,
    ) -> IntegrationResult<PayPalOrder> {
        if !amount.is_positive() {
            return Err(IntegrationError::Config(
                "Invalid amount. Amount must be a positive number.".to_string(),
            ));
        }
        let token = self.access_token().await?;
        let body = json!({
            "intent": intent,
            "purchase_units": [{
                "amount": {
                    "currency_code": currency.upper(),
                    "value": amount.to_string(),
                }
            }]
        });
        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.config.api_base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| IntegrationError::network("create order failed", e))?;
        let response = ensure_success("paypal", response).await?;
        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse order", e))?;
        info!(paypal_order_id = %order.id, "created PayPal order");

        let approve_url = order
            .links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone());
        Ok(PayPalOrder {
            id: order.id,
            status: order.status,
            approve_url,
        })
    }

    /// Captures an approved order.
    pub async fn capture_order(&self, order_id: &str) -> IntegrationResult<PayPalCapture> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.config.api_base_url,
                urlencoding::encode(order_id)
            ))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| IntegrationError::network("capture failed", e))?;
        let response = ensure_success("paypal", response).await?;
        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse capture", e))?;

        let capture = order
            .purchase_units
            .iter()
            .filter_map(|u| u.payments.as_ref())
            .flat_map(|p| p.captures.iter())
            .next();
        let (amount, currency) = match capture.and_then(|c| c.amount.as_ref()) {
            Some(a) => (
                Money::parse(&a.value).ok(),
                Currency::parse(&a.currency_code).ok(),
            ),
            None => (None, None),
        };
        let payer_name = order.payer.as_ref().and_then(|p| p.name.as_ref()).map(|n| {
            [n.given_name.as_deref(), n.surname.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        });

        Ok(PayPalCapture {
            capture_id: capture.map(|c| c.id.clone()),
            order_id: order.id,
            status: order.status,
            amount,
            currency,
            payer_email: order.payer.as_ref().and_then(|p| p.email_address.clone()),
            payer_name: payer_name.filter(|n| !n.is_empty()),
        })
    }
}
