//! Device fingerprints and the single-device rule for premium features.
//!
//! The extension reports a handful of browser and hardware identifiers.
//! They are folded into a short stable digest so the raw values never need
//! to be stored.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Premium features are limited to one active device per user.
pub const PREMIUM_MAX_DEVICES: u32 = 1;

/// Hashes fingerprint components into a stable identifier.
///
/// Components are trimmed and joined with `|`; the first 16 bytes of the
/// SHA-256 digest are base64 encoded.
#[must_use]
pub fn fingerprint_digest<S: AsRef<str>>(components: &[S]) -> String {
    let combined = components
        .iter()
        .map(|c| c.as_ref().trim())
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    let hash = hasher.finalize();

    BASE64.encode(&hash[..16])
}

/// Outcome of a premium device check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum DeviceDecision {
    /// The device is already registered and active.
    AlreadyAuthorized,
    /// The device should be registered now.
    Register,
    /// Another device holds the premium slot.
    #[serde(rename_all = "camelCase")]
    Denied {
        max_devices: u32,
        current_devices: u32,
    },
}

impl DeviceDecision {
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// How many premium devices a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePolicy {
    pub max_devices: u32,
}

impl Default for DevicePolicy {
    fn default() -> Self {
        Self {
            max_devices: PREMIUM_MAX_DEVICES,
        }
    }
}

impl DevicePolicy {
    /// Decides whether a fingerprint may use premium features.
    ///
    /// `known` is true if the fingerprint is already an active device for
    /// the user; `active_devices` counts all of the user's active devices.
    #[must_use]
    pub fn decide(&self, known: bool, active_devices: u32) -> DeviceDecision {
        if known {
            DeviceDecision::AlreadyAuthorized
        } else if active_devices >= self.max_devices {
            DeviceDecision::Denied {
                max_devices: self.max_devices,
                current_devices: active_devices,
            }
        } else {
            DeviceDecision::Register
        }
    }

    /// Message shown when a device is refused.
    #[must_use]
    pub fn denial_message(&self) -> String {
        if self.max_devices == 1 {
            "Premium access limited to one device. Please deactivate your other device first."
                .to_string()
        } else {
            format!(
                "Premium access limited to {} devices. Please deactivate another device first.",
                self.max_devices
            )
        }
    }
}
