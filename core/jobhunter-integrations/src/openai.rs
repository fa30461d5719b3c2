//! Support chat backed by the OpenAI chat completions API.

use crate::error::{IntegrationError, IntegrationResult};
use crate::http_client;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, warn};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Messages of history sent with each request.
pub const HISTORY_LIMIT: usize = 10;

const SYSTEM_PROMPT: &str = "You are the support assistant for OCUS Job Hunter, a Chrome \
extension that watches the OCUS photographer portal and accepts delivery photography missions \
automatically. New installs include 3 free jobs; an activation code from a purchase unlocks \
unlimited use on one installation. Answer questions about installation, activation, trial \
limits, payments and the affiliate program briefly and politely. For refunds or account \
problems, ask the customer to open a support ticket.";

const RATE_LIMITED_REPLY: &str =
    "I apologize, but we're currently experiencing high demand. Please try again in a few moments.";
const QUOTA_REPLY: &str =
    "Our AI service is temporarily unavailable due to quota limits. Please contact support.";
const BAD_KEY_REPLY: &str =
    "There's an issue with our AI service configuration. Please contact support.";

const FALLBACK_REPLIES: [&str; 3] = [
    "I apologize, but our AI chat service is temporarily unavailable. Please try again later or contact our support team for assistance.",
    "We're experiencing technical difficulties with our chat service. For immediate help, please reach out to our support team.",
    "Our AI assistant is currently offline. Please try again in a few minutes, or contact support if you need immediate assistance.",
];

/// Chat settings, usually read from the admin-editable settings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Base URL for the API (e.g. `https://api.openai.com`).
    pub api_base_url: String,
}

impl ChatConfig {
    /// Builds a config from raw setting values; unset or unparsable values
    /// fall back to the defaults. Fails if the key is missing or is not an
    /// OpenAI secret key.
    pub fn from_settings(
        api_key: Option<&str>,
        model: Option<&str>,
        max_tokens: Option<&str>,
        temperature: Option<&str>,
    ) -> IntegrationResult<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| IntegrationError::Config("OpenAI API key not configured".to_string()))?;
        if !api_key.starts_with("sk-") {
            return Err(IntegrationError::Config(
                "Invalid OpenAI API key format".to_string(),
            ));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            model: model
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
            max_tokens: max_tokens
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: temperature
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_TEMPERATURE),
            api_base_url: "https://api.openai.com".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    code: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// One of the canned replies used when the chat service is unavailable.
#[must_use]
pub fn fallback_reply() -> &'static str {
    FALLBACK_REPLIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_REPLIES[0])
}

/// Chat completions client.
pub struct ChatClient {
    config: ChatConfig,
    client: Client,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> IntegrationResult<Self> {
        Ok(Self {
            config,
            client: http_client(Duration::from_secs(30))?,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Answers the last message of `history`. Never fails: API errors turn
    /// into a reply telling the customer to try later or contact support.
    pub async fn reply(&self, history: &[ChatMessage]) -> String {
        match self.complete(history).await {
            Ok(text) => text,
            Err(IntegrationError::Api { status, body, .. }) => {
                let code = serde_json::from_str::<ApiErrorBody>(&body)
                    .ok()
                    .and_then(|b| b.error.code.or(b.error.kind));
                warn!(status, code = ?code, "chat completion refused");
                match code.as_deref() {
                    Some("rate_limit_exceeded") => RATE_LIMITED_REPLY.to_string(),
                    Some("insufficient_quota") => QUOTA_REPLY.to_string(),
                    Some("invalid_api_key") => BAD_KEY_REPLY.to_string(),
                    _ => fallback_reply().to_string(),
                }
            }
            Err(e) => {
                error!(error = %e, "chat completion failed");
                fallback_reply().to_string()
            }
        }
    }

    async fn complete(&self, history: &[ChatMessage]) -> IntegrationResult<String> {
        let start = history.len().saturating_sub(HISTORY_LIMIT);
        let mut messages = Vec::with_capacity(HISTORY_LIMIT + 1);
        messages.push(ChatMessage {
            role: ChatRole::System,
            content: SYSTEM_PROMPT.to_string(),
        });
        messages.extend(
            history[start..]
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .cloned(),
        );

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.api_base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| IntegrationError::network("chat request failed", e))?;
        let response = crate::ensure_success("openai", response).await?;
        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse completion", e))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                IntegrationError::UnexpectedResponse("no response content".to_string())
            })
    }
}
