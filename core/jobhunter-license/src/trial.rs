//! Trial gating.
//!
//! Signed-in customers carry a trial counter on their account. Anonymous
//! installs are tracked by a trial key derived from the extension id and a
//! device fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Free jobs a customer may run before activating.
pub const DEFAULT_TRIAL_LIMIT: u32 = 3;

const TRIAL_EXHAUSTED: &str = "Trial limit exceeded. Please purchase activation code.";
const ACCOUNT_BLOCKED: &str = "Account blocked";

/// The fields of a customer account that decide extension access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerUsage {
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub extension_activated: bool,
    pub trial_jobs_used: u32,
    pub trial_limit: u32,
}

/// Whether a customer may run another job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDecision {
    pub can_use: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_blocked: Option<bool>,
    /// True when the account has a paid activation.
    pub premium: bool,
}

impl UsageDecision {
    /// Decision for a customer id that does not resolve to an account.
    #[must_use]
    pub fn unknown_customer() -> Self {
        Self {
            can_use: false,
            reason: Some("Customer not found".to_string()),
            trial_used: None,
            is_blocked: None,
            premium: false,
        }
    }
}

impl CustomerUsage {
    /// Evaluates access: blocked accounts are refused, activated accounts
    /// are unlimited, everyone else is capped at their trial limit.
    #[must_use]
    pub fn evaluate(&self) -> UsageDecision {
        if self.is_blocked {
            return UsageDecision {
                can_use: false,
                reason: Some(
                    self.blocked_reason
                        .clone()
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| ACCOUNT_BLOCKED.to_string()),
                ),
                trial_used: None,
                is_blocked: Some(true),
                premium: false,
            };
        }
        if self.extension_activated {
            return UsageDecision {
                can_use: true,
                reason: None,
                trial_used: None,
                is_blocked: None,
                premium: true,
            };
        }
        let exhausted = self.trial_jobs_used >= self.trial_limit;
        UsageDecision {
            can_use: !exhausted,
            reason: exhausted.then(|| TRIAL_EXHAUSTED.to_string()),
            trial_used: Some(self.trial_jobs_used),
            is_blocked: None,
            premium: false,
        }
    }

    /// Remaining free jobs, zero once exhausted.
    #[must_use]
    pub fn trial_remaining(&self) -> u32 {
        self.trial_limit.saturating_sub(self.trial_jobs_used)
    }
}

/// Derives the trial key for an anonymous install: hex SHA-256 of
/// `extension_id|fingerprint`.
#[must_use]
pub fn trial_key(extension_id: &str, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(extension_id.trim().as_bytes());
    hasher.update(b"|");
    hasher.update(fingerprint.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Trial usage for an anonymous install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialUsage {
    pub trial_key: String,
    pub extension_id: String,
    pub fingerprint: String,
    pub usage_count: u32,
    pub max_uses: u32,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TrialUsage {
    /// Starts a fresh trial.
    #[must_use]
    pub fn start(extension_id: &str, fingerprint: &str, now: DateTime<Utc>) -> Self {
        Self {
            trial_key: trial_key(extension_id, fingerprint),
            extension_id: extension_id.to_string(),
            fingerprint: fingerprint.to_string(),
            usage_count: 0,
            max_uses: DEFAULT_TRIAL_LIMIT,
            is_expired: false,
            created_at: now,
            last_used_at: None,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        if self.is_expired {
            0
        } else {
            self.max_uses.saturating_sub(self.usage_count)
        }
    }

    /// Counts one use. Returns false without changing anything if the
    /// trial is already used up; expires the trial on its last use.
    pub fn record_use(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired || self.usage_count >= self.max_uses {
            self.is_expired = true;
            return false;
        }
        self.usage_count += 1;
        self.last_used_at = Some(now);
        if self.usage_count >= self.max_uses {
            self.is_expired = true;
        }
        true
    }

    /// Ends the trial immediately.
    pub fn expire(&mut self) {
        self.is_expired = true;
    }
}
