//! Activation code state and the rules for accepting it.

use crate::error::ActivationError;
use chrono::{DateTime, Utc};
use jobhunter_types::{ActivationCodeId, CustomerId, InstallationId, OrderId};
use serde::{Deserialize, Serialize};

/// Validations allowed per code per UTC calendar day.
pub const DAILY_VALIDATION_LIMIT: u32 = 100;

/// Activations granted to a freshly generated code.
pub const DEFAULT_MAX_ACTIVATIONS: u32 = 1;

/// An activation code as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationCode {
    pub id: ActivationCodeId,
    pub code: String,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub installation_id: Option<InstallationId>,
    pub version_token: Option<String>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub is_revoked: bool,
    pub activation_count: u32,
    pub max_activations: u32,
    pub daily_validation_count: u32,
    pub last_validation_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The state change produced by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationGrant {
    pub installation_id: InstallationId,
    /// True when this validation bound the code to the installation.
    pub newly_bound: bool,
    pub activation_count: u32,
    pub activated_at: DateTime<Utc>,
    pub daily_validation_count: u32,
    pub validated_at: DateTime<Utc>,
}

/// The state change produced by a direct device activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectActivation {
    pub device_id: String,
    pub ip_address: Option<String>,
    pub activation_count: u32,
    pub activated_at: DateTime<Utc>,
}

impl ActivationCode {
    /// Returns true if the expiry date is set and has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Returns the validation count for the day containing `now`.
    ///
    /// The stored counter only applies to the day of the last validation.
    #[must_use]
    pub fn validations_on(&self, now: DateTime<Utc>) -> u32 {
        match self.last_validation_at {
            Some(last) if last.date_naive() == now.date_naive() => self.daily_validation_count,
            _ => 0,
        }
    }

    /// Checks whether `installation` may use this code.
    ///
    /// Checks run in a fixed order so that the reported reason is stable:
    /// revoked, expired, inactive, bound elsewhere, activations exhausted,
    /// daily limit. An installation the code is already bound to does not
    /// consume another activation.
    pub fn validate_for_installation(
        &self,
        installation: InstallationId,
        now: DateTime<Utc>,
    ) -> Result<ValidationGrant, ActivationError> {
        if self.is_revoked {
            return Err(ActivationError::Revoked);
        }
        if self.is_expired(now) {
            return Err(ActivationError::Expired);
        }
        if !self.is_active {
            return Err(ActivationError::Inactive);
        }

        let bound_here = match self.installation_id {
            Some(bound) if bound != installation => return Err(ActivationError::BoundElsewhere),
            Some(_) => true,
            None => false,
        };

        if !bound_here && self.activation_count >= self.max_activations {
            return Err(ActivationError::MaxActivations);
        }

        let today = self.validations_on(now);
        if today >= DAILY_VALIDATION_LIMIT {
            return Err(ActivationError::DailyLimitExceeded);
        }

        Ok(ValidationGrant {
            installation_id: installation,
            newly_bound: !bound_here,
            activation_count: if bound_here {
                self.activation_count
            } else {
                self.activation_count + 1
            },
            activated_at: self.activated_at.unwrap_or(now),
            daily_validation_count: today + 1,
            validated_at: now,
        })
    }

    /// Applies a grant returned by [`Self::validate_for_installation`].
    pub fn apply_grant(&mut self, grant: &ValidationGrant) {
        self.installation_id = Some(grant.installation_id);
        self.activation_count = grant.activation_count;
        self.activated_at = Some(grant.activated_at);
        self.daily_validation_count = grant.daily_validation_count;
        self.last_validation_at = Some(grant.validated_at);
    }

    /// Activates the code for a device without installation binding.
    ///
    /// Used by older extension builds that only report a device id.
    pub fn activate_device(
        &self,
        device_id: &str,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DirectActivation, ActivationError> {
        if self.is_revoked {
            return Err(ActivationError::Revoked);
        }
        if !self.is_active {
            return Err(ActivationError::Inactive);
        }
        if self.is_expired(now) {
            return Err(ActivationError::Expired);
        }
        if self.activation_count >= self.max_activations {
            return Err(ActivationError::MaxActivations);
        }
        Ok(DirectActivation {
            device_id: device_id.to_string(),
            ip_address: ip_address.map(str::to_string),
            activation_count: self.activation_count + 1,
            activated_at: self.activated_at.unwrap_or(now),
        })
    }

    /// Marks the code revoked and inactive.
    pub fn revoke(&mut self) {
        self.is_revoked = true;
        self.is_active = false;
    }
}
