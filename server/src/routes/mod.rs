//! HTTP handlers, grouped by area. Each module contributes its routes to
//! [`crate::build_router`].

pub mod accounts;
pub mod admin;
pub mod affiliate;
pub mod catalog;
pub mod chat;
pub mod checkout;
pub mod content;
pub mod extension;
pub mod health;
pub mod invoices;
pub mod tickets;

use crate::error::ApiError;
use axum::body::Bytes;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;

/// Parses a path or body value, mapping failures to a 400 response.
pub(crate) fn parse<T: FromStr>(value: &str, what: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}")))
}

/// Decodes a JSON body that callers may leave out entirely.
pub(crate) fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

/// Optional free-text reason or note in a request body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NotesBody {
    pub reason: Option<String>,
    pub notes: Option<String>,
}
