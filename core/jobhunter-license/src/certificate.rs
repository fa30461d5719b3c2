//! Signed license certificates.
//!
//! After an activation code validates, the server hands the extension a
//! certificate it can check offline with the embedded public key.
//!
//! Certificates use the format: `base64url(claims).base64url(signature)`
//!
//! The claims are a JSON object containing:
//! - `code`: the activation code
//! - `installationId`: the bound installation
//! - `customerId`: the owning customer, if known
//! - `iat` / `exp`: issued-at and expiry (seconds since epoch)
//!
//! The signature covers `claims_b64.as_bytes()` (the encoded string, not
//! the decoded JSON).

use crate::error::{LicenseError, LicenseResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use jobhunter_types::{CustomerId, InstallationId};
use serde::{Deserialize, Serialize};

/// Certificates are re-issued weekly (7 days).
pub const CERTIFICATE_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

/// Grace period after expiry in seconds (3 days).
pub const GRACE_PERIOD_SECS: i64 = 3 * 24 * 60 * 60;

/// The signed claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateClaims {
    pub code: String,
    pub installation_id: InstallationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<CustomerId>,
    pub iat: i64,
    pub exp: i64,
}

impl CertificateClaims {
    /// Claims valid for [`CERTIFICATE_LIFETIME_SECS`] from `now`.
    #[must_use]
    pub fn new(
        code: &str,
        installation_id: InstallationId,
        customer_id: Option<CustomerId>,
        now: DateTime<Utc>,
    ) -> Self {
        let iat = now.timestamp();
        Self {
            code: code.to_string(),
            installation_id,
            customer_id,
            iat,
            exp: iat + CERTIFICATE_LIFETIME_SECS,
        }
    }
}

/// The current status of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Within its lifetime.
    Valid,
    /// Past expiry but inside the grace period.
    Grace {
        /// Days remaining in grace period.
        days_remaining: u32,
    },
    /// Past the grace period; the extension must re-validate online.
    Expired,
}

impl CertificateStatus {
    /// Returns true if premium features may be used (Valid or Grace).
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Valid | Self::Grace { .. })
    }
}

/// A parsed and verified certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseCertificate {
    raw: String,
    claims: CertificateClaims,
}

impl LicenseCertificate {
    /// Signs `claims` and returns the certificate.
    pub fn issue(signing_key: &SigningKey, claims: CertificateClaims) -> LicenseResult<Self> {
        let json = serde_json::to_vec(&claims)?;
        let claims_b64 = URL_SAFE_NO_PAD.encode(json);
        let signature = signing_key.sign(claims_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        Ok(Self {
            raw: format!("{claims_b64}.{sig_b64}"),
            claims,
        })
    }

    /// Loads a signing key from a 64 character hex seed.
    pub fn signing_key_from_hex(seed_hex: &str) -> LicenseResult<SigningKey> {
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|e| LicenseError::InvalidSigningKey(format!("invalid hex: {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LicenseError::InvalidSigningKey("seed must be 32 bytes".to_string()))?;
        Ok(SigningKey::from_bytes(&seed))
    }

    /// Parses and verifies a certificate string against a public key.
    pub fn parse_with_key(token: &str, pub_key_bytes: &[u8; 32]) -> LicenseResult<Self> {
        let token = token.trim();

        let Some((claims_b64, signature_b64)) = token.split_once('.') else {
            return Err(LicenseError::InvalidFormat(
                "certificate must have exactly two parts separated by a dot".to_string(),
            ));
        };
        if signature_b64.contains('.') {
            return Err(LicenseError::InvalidFormat(
                "certificate must have exactly two parts separated by a dot".to_string(),
            ));
        }

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| LicenseError::InvalidFormat(format!("invalid signature base64: {e}")))?;

        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| LicenseError::InvalidFormat("invalid signature length".to_string()))?;

        let verifying_key = VerifyingKey::from_bytes(pub_key_bytes)
            .map_err(|_| LicenseError::InvalidFormat("invalid public key".to_string()))?;

        verifying_key
            .verify(claims_b64.as_bytes(), &signature)
            .map_err(|_| LicenseError::InvalidSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|e| LicenseError::InvalidFormat(format!("invalid claims base64: {e}")))?;

        let claims: CertificateClaims = serde_json::from_slice(&claims_json)
            .map_err(|e| LicenseError::InvalidClaims(format!("invalid claims JSON: {e}")))?;

        Ok(Self {
            raw: token.to_string(),
            claims,
        })
    }

    /// Returns the encoded certificate.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn claims(&self) -> &CertificateClaims {
        &self.claims
    }

    /// Expiry as a timestamp, if representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.claims.exp, 0)
    }

    /// Status at `now`, accounting for the grace period.
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> CertificateStatus {
        let now = now.timestamp();
        let exp = self.claims.exp;
        if now < exp {
            return CertificateStatus::Valid;
        }
        let secs_past_expiry = now - exp;
        if secs_past_expiry < GRACE_PERIOD_SECS {
            let days_remaining = ((GRACE_PERIOD_SECS - secs_past_expiry) / (24 * 60 * 60)) as u32;
            CertificateStatus::Grace { days_remaining }
        } else {
            CertificateStatus::Expired
        }
    }
}
