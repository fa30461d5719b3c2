//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::SigningKey;
use jobhunter_license::ActivationCode;
use jobhunter_types::ActivationCodeId;

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, [u8; 32]) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key.to_bytes())
}

/// Noon UTC on a fixed day, so day-boundary tests are deterministic.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
}

/// A fresh, unbound, single-activation code.
pub fn fresh_code() -> ActivationCode {
    ActivationCode {
        id: ActivationCodeId::from_raw(1),
        code: "OCUS-1741953600000-0A1B2C3D".to_string(),
        customer_id: None,
        order_id: None,
        installation_id: None,
        version_token: None,
        device_id: None,
        ip_address: None,
        is_active: true,
        is_revoked: false,
        activation_count: 0,
        max_activations: 1,
        daily_validation_count: 0,
        last_validation_at: None,
        activated_at: None,
        expires_at: None,
        created_at: noon() - chrono::Duration::days(1),
    }
}
