//! Support chat backed by the OpenAI chat completions API.

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, SharedState};
use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use jobhunter_integrations::openai::{HISTORY_LIMIT, fallback_reply};
use jobhunter_integrations::{ChatClient, ChatConfig, ChatMessage, IntegrationResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

const MAX_MESSAGE_CHARS: usize = 4000;

/// A prior turn. The widget sends `{text, sender}`; `{content, role}` is
/// accepted too.
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(alias = "text")]
    content: String,
    #[serde(alias = "sender")]
    role: String,
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    message: String,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

/// Settings-table values win over the environment.
fn chat_config(state: &AppState) -> ApiResult<IntegrationResult<ChatConfig>> {
    let setting = |key: &str| state.store.get_setting(key);
    let api_key = setting("openai_api_key")?
        .filter(|k| !k.trim().is_empty())
        .or_else(|| state.chat.api_key.clone());
    let model = setting("openai_model")?;
    let max_tokens = setting("openai_max_tokens")?;
    let temperature = setting("openai_temperature")?;
    Ok(ChatConfig::from_settings(
        api_key.as_deref(),
        model.as_deref(),
        max_tokens.as_deref(),
        temperature.as_deref(),
    )
    .map(|mut config| {
        if let Some(url) = &state.chat.api_base_url {
            config.api_base_url.clone_from(url);
        }
        config
    }))
}

async fn chat(
    State(state): State<SharedState>,
    Json(body): Json<ChatBody>,
) -> ApiResult<Json<Value>> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest("Message is too long".to_string()));
    }

    let skip = body.history.len().saturating_sub(HISTORY_LIMIT);
    let mut history: Vec<ChatMessage> = body
        .history
        .into_iter()
        .skip(skip)
        .filter(|entry| !entry.content.trim().is_empty())
        .map(|entry| match entry.role.as_str() {
            "user" => ChatMessage::user(entry.content),
            _ => ChatMessage::assistant(entry.content),
        })
        .collect();
    history.push(ChatMessage::user(message));

    let response = match chat_config(&state)?.and_then(ChatClient::new) {
        Ok(client) => client.reply(&history).await,
        Err(e) => {
            warn!(error = %e, "chat is not configured");
            fallback_reply().to_string()
        }
    };
    Ok(Json(json!({
        "response": response,
        "timestamp": Utc::now(),
    })))
}

pub fn routes() -> Router<SharedState> {
    Router::new().route("/api/chat", post(chat))
}
