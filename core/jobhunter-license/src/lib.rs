//! Licensing and activation for the Job Hunter extension.
//!
//! This module handles:
//! - Activation code generation and validation against an installation
//! - Trial gating for customers and anonymous installs
//! - Single-device binding for premium features
//! - Signed license certificates the extension can verify offline
//!
//! # Activation Code Format
//!
//! Codes look like `OCUS-<unix millis>-<8 uppercase hex>`. Validation is
//! pure: [`ActivationCode::validate_for_installation`] returns a
//! [`ValidationGrant`] describing the state to persist, and the caller
//! writes it back inside its own transaction.
//!
//! # Certificate Format
//!
//! Certificates are formatted as: `base64url(claims).base64url(signature)`
//! The claims are a JSON object signed with Ed25519 over the encoded
//! claims string.

mod activation;
mod certificate;
mod code;
mod device;
mod error;
mod trial;

pub use activation::{
    ActivationCode, DirectActivation, ValidationGrant, DAILY_VALIDATION_LIMIT,
    DEFAULT_MAX_ACTIVATIONS,
};
pub use certificate::{
    CertificateClaims, CertificateStatus, LicenseCertificate, CERTIFICATE_LIFETIME_SECS,
    GRACE_PERIOD_SECS,
};
pub use code::{
    generate_activation_code, generate_customer_key, generate_referral_code,
    generate_version_token, is_activation_code_format,
};
pub use device::{fingerprint_digest, DeviceDecision, DevicePolicy, PREMIUM_MAX_DEVICES};
pub use error::{ActivationError, LicenseError, LicenseResult};
pub use trial::{
    trial_key, CustomerUsage, TrialUsage, UsageDecision, DEFAULT_TRIAL_LIMIT,
};
