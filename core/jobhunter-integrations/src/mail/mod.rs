//! Outgoing email.
//!
//! [`Mailer`] is the seam business logic sends through. [`HttpMailer`]
//! posts to a transactional mail API; [`LogMailer`] only logs, for
//! development and for deployments without mail credentials.

pub mod templates;

use crate::error::{IntegrationError, IntegrationResult};
use crate::{ensure_success, http_client};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_FROM: &str = "noreply@ocusjobhunter.com";
pub const SUPPORT_FROM: &str = "support@ocusjobhunter.com";

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    /// Overrides the mailer's default sender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> IntegrationResult<()>;
}

/// Transactional mail API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpMailerConfig {
    pub api_key: String,
    pub from_address: String,
    /// Base URL of the mail API (e.g. `https://api.resend.com`).
    pub api_base_url: String,
}

impl Default for HttpMailerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_address: DEFAULT_FROM.to_string(),
            api_base_url: "https://api.resend.com".to_string(),
        }
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Sends mail through an HTTP API with a bearer key.
pub struct HttpMailer {
    config: HttpMailerConfig,
    client: Client,
}

impl HttpMailer {
    pub fn new(config: HttpMailerConfig) -> IntegrationResult<Self> {
        if config.api_key.is_empty() {
            return Err(IntegrationError::Config("mail API key is empty".to_string()));
        }
        Ok(Self {
            config,
            client: http_client(Duration::from_secs(15))?,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> IntegrationResult<()> {
        let request = SendRequest {
            from: email.from.as_deref().unwrap_or(&self.config.from_address),
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };
        let response = self
            .client
            .post(format!("{}/emails", self.config.api_base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| IntegrationError::network("mail request failed", e))?;
        ensure_success("mail", response).await?;
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> IntegrationResult<()> {
        info!(to = %email.to, subject = %email.subject, "email not sent (no mail transport configured)");
        Ok(())
    }
}

/// Escapes text for inclusion in HTML element content or attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
