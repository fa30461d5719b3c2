//! Error types for third-party integrations.

use thiserror::Error;

/// Result type for integration calls.
pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Errors raised by the service clients.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A webhook signature did not verify.
    #[error("invalid signature: {0}")]
    Signature(String),

    /// The client is missing credentials or was given bad ones.
    #[error("configuration error: {0}")]
    Config(String),

    /// A response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntegrationError {
    pub(crate) fn network(context: &str, err: reqwest::Error) -> Self {
        Self::Network(format!("{context}: {err}"))
    }

    pub(crate) fn decode(context: &str, err: reqwest::Error) -> Self {
        Self::UnexpectedResponse(format!("{context}: {err}"))
    }
}
