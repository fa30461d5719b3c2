//! Clients for the third-party services the Job Hunter backend talks to.
//!
//! Every client takes a config struct whose base URLs can be overridden, so
//! tests point them at a local mock server. Failures surface as
//! [`IntegrationError`].

pub mod error;
pub mod mail;
pub mod oauth;
pub mod openai;
pub mod paypal;
pub mod recaptcha;
pub mod stripe;

pub use error::{IntegrationError, IntegrationResult};
pub use mail::{Email, HttpMailer, HttpMailerConfig, LogMailer, Mailer};
pub use oauth::{OAuthConfig, OAuthProvider, SocialProfile};
pub use openai::{ChatClient, ChatConfig, ChatMessage, ChatRole};
pub use paypal::{PayPalCapture, PayPalClient, PayPalConfig, PayPalIntent, PayPalOrder};
pub use recaptcha::{RecaptchaConfig, RecaptchaVerifier};
pub use stripe::{
    CheckoutProvider, CheckoutSession, CheckoutSessionRequest, CheckoutSessionStatus,
    StripeClient, StripeConfig, StripeEvent,
};

use std::time::Duration;

/// Builds the shared HTTP client with a request timeout.
pub(crate) fn http_client(timeout: Duration) -> IntegrationResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| IntegrationError::Config(format!("failed to create HTTP client: {e}")))
}

/// Turns a non-success response into [`IntegrationError::Api`].
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> IntegrationResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
