//! Error types for business operations.

use crate::pricing::CouponRejection;
use jobhunter_integrations::IntegrationError;
use jobhunter_license::{ActivationError, LicenseError};
use jobhunter_store::StoreError;
use jobhunter_types::Money;
use thiserror::Error;

/// Result type for commerce operations.
pub type CommerceResult<T> = Result<T, CommerceError>;

/// Errors raised by the commerce services.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Request data failed validation. The message is shown to the user.
    #[error("{0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The request conflicts with existing state.
    #[error("{0}")]
    Conflict(String),

    /// A coupon cannot be applied.
    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// Login failed. Deliberately does not say which half was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The account exists but has been blocked by an admin.
    #[error("Account blocked: {0}")]
    Blocked(String),

    /// The caller may not see or change this record.
    #[error("Access denied")]
    Forbidden,

    /// Payout request under the program minimum.
    #[error("Minimum payout amount is {0}")]
    BelowMinimum(Money),

    /// Payout request over the unclaimed commission balance.
    #[error("Insufficient commission balance ({available} available)")]
    InsufficientBalance { available: Money },

    /// An activation code was refused. The message is shown to the user.
    #[error(transparent)]
    Activation(#[from] ActivationError),

    /// The extension may not run another job.
    #[error("{0}")]
    UsageDenied(String),

    /// Certificate signing failed.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// Every download allowed for the order has been used.
    #[error("Download limit reached")]
    DownloadLimitReached,

    /// An integration the operation needs is not configured.
    #[error("{0} is not configured")]
    Unavailable(&'static str),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// A third-party service call failed.
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// Storage failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::Conflict(format!("{what} already exists")),
            other => Self::Store(other),
        }
    }
}
