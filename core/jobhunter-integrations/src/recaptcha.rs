//! Google reCAPTCHA server-side verification.

use crate::error::{IntegrationError, IntegrationResult};
use crate::{ensure_success, http_client};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecaptchaConfig {
    pub secret_key: String,
    /// Base URL of the verify endpoint host (e.g. `https://www.google.com`).
    pub api_base_url: String,
}

impl Default for RecaptchaConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            api_base_url: "https://www.google.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

pub struct RecaptchaVerifier {
    config: RecaptchaConfig,
    client: Client,
}

impl RecaptchaVerifier {
    pub fn new(config: RecaptchaConfig) -> IntegrationResult<Self> {
        if config.secret_key.is_empty() {
            return Err(IntegrationError::Config(
                "reCAPTCHA secret key is empty".to_string(),
            ));
        }
        Ok(Self {
            config,
            client: http_client(Duration::from_secs(10))?,
        })
    }

    /// Verifies a token from the browser widget. A refused token is
    /// `Ok(false)`; transport and API failures are errors.
    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> IntegrationResult<bool> {
        if token.trim().is_empty() {
            return Ok(false);
        }
        let mut form = vec![
            ("secret", self.config.secret_key.as_str()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }
        let response = self
            .client
            .post(format!("{}/recaptcha/api/siteverify", self.config.api_base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| IntegrationError::network("reCAPTCHA request failed", e))?;
        let response = ensure_success("recaptcha", response).await?;
        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse siteverify", e))?;
        if !body.success {
            tracing::debug!(errors = ?body.error_codes, "reCAPTCHA refused token");
        }
        Ok(body.success)
    }
}
