//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Invalid certificate format.
    #[error("invalid license certificate format: {0}")]
    InvalidFormat(String),

    /// Ed25519 signature verification failed.
    #[error("license certificate signature invalid")]
    InvalidSignature,

    /// Claims JSON is malformed or missing required fields.
    #[error("invalid certificate claims: {0}")]
    InvalidClaims(String),

    /// Signing key material could not be loaded.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// Why an activation code was refused.
///
/// The display strings are shown to extension users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// No code with this value exists.
    #[error("Invalid activation code")]
    NotFound,

    /// An admin revoked the code.
    #[error("Activation code has been revoked")]
    Revoked,

    /// The code's expiry date has passed.
    #[error("Activation code has expired")]
    Expired,

    /// The code was deactivated.
    #[error("Activation code is inactive")]
    Inactive,

    /// The code is bound to a different installation.
    #[error("Activation code is already bound to another installation")]
    BoundElsewhere,

    /// The code has no activations left.
    #[error("Activation code has been used maximum number of times")]
    MaxActivations,

    /// Too many validations today.
    #[error("Daily validation limit exceeded")]
    DailyLimitExceeded,
}
