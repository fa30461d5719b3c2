//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jobhunter_commerce::CommerceError;
use jobhunter_integrations::IntegrationError;
use jobhunter_license::ActivationError;
use jobhunter_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by handlers, rendered as `{ "message": ... }`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The endpoint has been retired.
    #[error("{0}")]
    Gone(String),

    #[error("{0} is not configured")]
    Unavailable(&'static str),

    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<ActivationError> for ApiError {
    fn from(err: ActivationError) -> Self {
        Self::Commerce(err.into())
    }
}

fn commerce_status(err: &CommerceError) -> StatusCode {
    match err {
        CommerceError::Validation(_)
        | CommerceError::Coupon(_)
        | CommerceError::BelowMinimum(_)
        | CommerceError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
        CommerceError::Conflict(_) => StatusCode::CONFLICT,
        CommerceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        CommerceError::Blocked(_)
        | CommerceError::Forbidden
        | CommerceError::UsageDenied(_)
        | CommerceError::DownloadLimitReached => StatusCode::FORBIDDEN,
        CommerceError::Activation(ActivationError::NotFound) => StatusCode::NOT_FOUND,
        CommerceError::Activation(ActivationError::DailyLimitExceeded) => {
            StatusCode::TOO_MANY_REQUESTS
        }
        CommerceError::Activation(_) => StatusCode::FORBIDDEN,
        CommerceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CommerceError::Integration(_) => StatusCode::BAD_GATEWAY,
        CommerceError::License(_)
        | CommerceError::PasswordHash(_)
        | CommerceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Commerce(err) => commerce_status(err),
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Integration(_) => StatusCode::BAD_GATEWAY,
            Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the log.
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(status = status.as_u16(), error = %self, "request failed");
            match status {
                StatusCode::BAD_GATEWAY => "Payment or service provider error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
