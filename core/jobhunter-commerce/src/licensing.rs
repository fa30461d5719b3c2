//! Extension licensing: activation code validation, trial counting and the
//! premium single-device rule.
//!
//! The rules themselves live in `jobhunter-license`; this service loads the
//! state, applies a rule and writes the result back.

use crate::error::{CommerceError, CommerceResult};
use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use jobhunter_license::{
    ActivationCode, ActivationError, CertificateClaims, DeviceDecision, DevicePolicy,
    LicenseCertificate, TrialUsage, UsageDecision, ValidationGrant,
};
use jobhunter_store::{Installation, Store, UsageLogEntry};
use jobhunter_types::{ActivationCodeId, CustomerId, InstallationId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A code accepted for an installation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedLicense {
    pub code: String,
    pub installation_id: InstallationId,
    pub customer_id: Option<CustomerId>,
    pub grant: ValidationGrant,
    /// Signed certificate for offline checks; absent when no signing key
    /// is configured.
    pub certificate: Option<String>,
    pub certificate_expires_at: Option<DateTime<Utc>>,
}

/// Trial counter state returned to the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialStatus {
    pub allowed: bool,
    pub usage_count: u32,
    pub remaining: u32,
    pub is_expired: bool,
}

/// A job run reported by a signed-in extension.
#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    pub session_id: String,
    pub jobs_used: u32,
    pub platform: String,
    pub location: Option<String>,
    pub extension_version: Option<String>,
}

/// An installation ping.
#[derive(Debug, Clone)]
pub struct InstallationPing {
    pub installation_id: InstallationId,
    pub customer_id: Option<CustomerId>,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub extension_version: Option<String>,
}

#[derive(Clone)]
pub struct LicensingService {
    store: Store,
    signing_key: Option<Arc<SigningKey>>,
    devices: DevicePolicy,
}

impl LicensingService {
    pub fn new(store: Store, signing_key: Option<Arc<SigningKey>>) -> Self {
        Self {
            store,
            signing_key,
            devices: DevicePolicy::default(),
        }
    }

    fn find_code(&self, code: &str) -> CommerceResult<ActivationCode> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CommerceError::Validation(
                "Activation code is required".to_string(),
            ));
        }
        self.store
            .get_activation_code(code)?
            .ok_or(CommerceError::Activation(ActivationError::NotFound))
    }

    // ── Activation codes ─────────────────────────────────────────

    /// Validates `code` for an installation, binding it on first use, and
    /// issues a fresh certificate.
    pub fn validate(
        &self,
        code: &str,
        installation_id: InstallationId,
        now: DateTime<Utc>,
    ) -> CommerceResult<ValidatedLicense> {
        let record = self.find_code(code)?;
        let grant = record.validate_for_installation(installation_id, now)?;
        if !self.store.apply_validation_grant(&record, &grant)? {
            warn!(code_id = %record.id, "activation code changed during validation");
            return Err(CommerceError::Conflict(
                "Activation code was used concurrently, please retry".to_string(),
            ));
        }

        if grant.newly_bound {
            info!(code_id = %record.id, installation_id = %installation_id, "activation code bound");
            if let Some(customer) = record.customer_id {
                self.store.set_extension_activated(customer, true, now)?;
            }
        }
        self.store.upsert_installation(
            &Installation {
                installation_id,
                customer_id: record.customer_id,
                device_fingerprint: None,
                user_agent: None,
                ip_address: None,
                extension_version: None,
                is_active: true,
                last_seen_at: now,
                created_at: now,
            },
            now,
        )?;

        let certificate = match self.signing_key.as_deref() {
            Some(key) => Some(LicenseCertificate::issue(
                key,
                CertificateClaims::new(&record.code, installation_id, record.customer_id, now),
            )?),
            None => None,
        };
        Ok(ValidatedLicense {
            code: record.code,
            installation_id,
            customer_id: record.customer_id,
            grant,
            certificate_expires_at: certificate.as_ref().and_then(LicenseCertificate::expires_at),
            certificate: certificate.map(|c| c.raw().to_string()),
        })
    }

    /// Activates `code` for a device id without installation binding.
    pub fn activate_device(
        &self,
        code: &str,
        device_id: &str,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> CommerceResult<ActivationCode> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(CommerceError::Validation("Device id is required".to_string()));
        }
        let mut record = self.find_code(code)?;
        let activation = record.activate_device(device_id, ip_address, now)?;
        if !self.store.apply_direct_activation(&record, &activation)? {
            return Err(CommerceError::Activation(ActivationError::MaxActivations));
        }
        if let Some(customer) = record.customer_id {
            self.store.set_extension_activated(customer, true, now)?;
        }
        info!(code_id = %record.id, "activation code activated for device");

        record.device_id = Some(activation.device_id);
        record.ip_address = activation.ip_address;
        record.activation_count = activation.activation_count;
        record.activated_at = Some(activation.activated_at);
        Ok(record)
    }

    pub fn revoke(&self, id: ActivationCodeId) -> CommerceResult<ActivationCode> {
        self.store.revoke_activation_code(id)?;
        info!(code_id = %id, "activation code revoked");
        self.store
            .get_activation_code_by_id(id)?
            .ok_or_else(|| CommerceError::NotFound(format!("activation code {id}")))
    }

    // ── Customer usage ───────────────────────────────────────────

    /// Whether the customer may run another job.
    pub fn check_usage(&self, customer: CustomerId) -> CommerceResult<UsageDecision> {
        Ok(match self.store.get_customer(customer)? {
            Some(customer) => customer.usage().evaluate(),
            None => UsageDecision::unknown_customer(),
        })
    }

    /// Records a job run. Refused runs are not recorded.
    pub fn record_usage(
        &self,
        customer: CustomerId,
        report: &UsageReport,
        now: DateTime<Utc>,
    ) -> CommerceResult<UsageDecision> {
        let decision = self.check_usage(customer)?;
        if !decision.can_use {
            return Err(CommerceError::UsageDenied(
                decision.reason.unwrap_or_else(|| "Usage not allowed".to_string()),
            ));
        }
        let was_trial = !decision.premium;
        if !self.store.record_extension_use(customer, was_trial, now)? {
            // Another request used the last trial job or the account changed.
            let current = self.check_usage(customer)?;
            return Err(CommerceError::UsageDenied(
                current.reason.unwrap_or_else(|| "Usage not allowed".to_string()),
            ));
        }
        self.store.record_usage_log(
            &UsageLogEntry {
                customer_id: customer,
                session_id: report.session_id.clone(),
                jobs_used: report.jobs_used.max(1),
                platform: report.platform.clone(),
                location: report.location.clone(),
                extension_version: report.extension_version.clone(),
                was_trial,
            },
            now,
        )?;
        debug!(customer_id = %customer, was_trial, "extension usage recorded");
        self.check_usage(customer)
    }

    // ── Anonymous trials ─────────────────────────────────────────

    /// Counts one trial use for an anonymous install.
    pub fn use_trial(
        &self,
        extension_id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<TrialStatus> {
        let (extension_id, fingerprint) = (extension_id.trim(), fingerprint.trim());
        if extension_id.is_empty() || fingerprint.is_empty() {
            return Err(CommerceError::Validation(
                "Extension id and fingerprint are required".to_string(),
            ));
        }
        let key = jobhunter_license::trial_key(extension_id, fingerprint);
        let mut trial = match self.store.get_trial_usage(&key)? {
            Some(trial) => trial,
            None => TrialUsage::start(extension_id, fingerprint, now),
        };
        let allowed = trial.record_use(now);
        self.store.save_trial_usage(&trial)?;
        if !allowed {
            debug!(trial_key = %key, "trial exhausted");
        }
        Ok(TrialStatus {
            allowed,
            usage_count: trial.usage_count,
            remaining: trial.remaining(),
            is_expired: trial.is_expired,
        })
    }

    // ── Premium devices ──────────────────────────────────────────

    /// Authorizes a device for premium features, registering it when the
    /// user has a free slot.
    pub fn validate_premium_device(
        &self,
        user_id: &str,
        fingerprint: &str,
        extension_id: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<DeviceDecision> {
        let (user_id, fingerprint) = (user_id.trim(), fingerprint.trim());
        if user_id.is_empty() || fingerprint.is_empty() || extension_id.trim().is_empty() {
            return Err(CommerceError::Validation(
                "User id, device fingerprint and extension id are required".to_string(),
            ));
        }
        let decision = self.store.claim_premium_device(
            user_id,
            fingerprint,
            extension_id.trim(),
            &self.devices,
            now,
        )?;
        match &decision {
            DeviceDecision::AlreadyAuthorized => {}
            DeviceDecision::Register => info!(user_id, "premium device registered"),
            DeviceDecision::Denied { current_devices, .. } => {
                warn!(user_id, current_devices, "premium device refused");
            }
        }
        Ok(decision)
    }

    /// Message for a refused device.
    #[must_use]
    pub fn device_denial_message(&self) -> String {
        self.devices.denial_message()
    }

    /// Records a heartbeat. Returns false if the device is not an active
    /// premium device.
    pub fn device_heartbeat(
        &self,
        user_id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<bool> {
        Ok(self
            .store
            .touch_premium_device(user_id.trim(), fingerprint.trim(), now)?)
    }

    pub fn deactivate_premium_device(
        &self,
        user_id: &str,
        fingerprint: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<bool> {
        Ok(self
            .store
            .deactivate_premium_device(user_id.trim(), fingerprint.trim(), reason, now)?)
    }

    // ── Installations ────────────────────────────────────────────

    pub fn register_installation(
        &self,
        ping: &InstallationPing,
        now: DateTime<Utc>,
    ) -> CommerceResult<Installation> {
        self.store.upsert_installation(
            &Installation {
                installation_id: ping.installation_id,
                customer_id: ping.customer_id,
                device_fingerprint: ping.device_fingerprint.clone(),
                user_agent: ping.user_agent.clone(),
                ip_address: ping.ip_address.clone(),
                extension_version: ping.extension_version.clone(),
                is_active: true,
                last_seen_at: now,
                created_at: now,
            },
            now,
        )?;
        self.store
            .get_installation(ping.installation_id)?
            .ok_or_else(|| CommerceError::NotFound("Installation".to_string()))
    }
}
