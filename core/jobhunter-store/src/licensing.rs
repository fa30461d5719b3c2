//! Activation codes, extension installations, premium devices and trials.

use crate::{count_column, parse_optional_column, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_license::{
    ActivationCode, DeviceDecision, DevicePolicy, DirectActivation, TrialUsage, ValidationGrant,
};
use jobhunter_types::{ActivationCodeId, CustomerId, InstallationId, OrderId};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

/// Fields for a new activation code.
#[derive(Debug, Clone)]
pub struct NewActivationCode {
    pub code: String,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub installation_id: Option<InstallationId>,
    pub version_token: Option<String>,
    pub max_activations: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One installation of the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub installation_id: InstallationId,
    pub customer_id: Option<CustomerId>,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub extension_version: Option<String>,
    pub is_active: bool,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A device registered for premium features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumDevice {
    pub id: i64,
    pub user_id: String,
    pub device_fingerprint: String,
    pub extension_id: String,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub deactivation_reason: Option<String>,
}

/// One extension session reported by a signed-in customer.
#[derive(Debug, Clone)]
pub struct UsageLogEntry {
    pub customer_id: CustomerId,
    pub session_id: String,
    pub jobs_used: u32,
    pub platform: String,
    pub location: Option<String>,
    pub extension_version: Option<String>,
    pub was_trial: bool,
}

const CODE_COLUMNS: &str = "id, code, customer_id, order_id, installation_id, version_token, \
    device_id, ip_address, is_active, is_revoked, activation_count, max_activations, \
    daily_validation_count, last_validation_at, activated_at, expires_at, created_at";

fn code_from_row(row: &Row<'_>) -> rusqlite::Result<ActivationCode> {
    Ok(ActivationCode {
        id: ActivationCodeId::from_raw(row.get(0)?),
        code: row.get(1)?,
        customer_id: row.get::<_, Option<i64>>(2)?.map(CustomerId::from_raw),
        order_id: row.get::<_, Option<i64>>(3)?.map(OrderId::from_raw),
        installation_id: parse_optional_column(row, 4)?,
        version_token: row.get(5)?,
        device_id: row.get(6)?,
        ip_address: row.get(7)?,
        is_active: row.get(8)?,
        is_revoked: row.get(9)?,
        activation_count: count_column(row, 10)?,
        max_activations: count_column(row, 11)?,
        daily_validation_count: count_column(row, 12)?,
        last_validation_at: row.get(13)?,
        activated_at: row.get(14)?,
        expires_at: row.get(15)?,
        created_at: row.get(16)?,
    })
}

const INSTALLATION_COLUMNS: &str = "installation_id, customer_id, device_fingerprint, user_agent, \
    ip_address, extension_version, is_active, last_seen_at, created_at";

fn installation_from_row(row: &Row<'_>) -> rusqlite::Result<Installation> {
    Ok(Installation {
        installation_id: crate::parse_column(row, 0)?,
        customer_id: row.get::<_, Option<i64>>(1)?.map(CustomerId::from_raw),
        device_fingerprint: row.get(2)?,
        user_agent: row.get(3)?,
        ip_address: row.get(4)?,
        extension_version: row.get(5)?,
        is_active: row.get(6)?,
        last_seen_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const DEVICE_COLUMNS: &str = "id, user_id, device_fingerprint, extension_id, is_active, \
    registered_at, last_seen_at, deactivated_at, deactivation_reason";

fn insert_premium_device(
    conn: &Connection,
    user_id: &str,
    fingerprint: &str,
    extension_id: &str,
    now: DateTime<Utc>,
) -> StoreResult<PremiumDevice> {
    conn.execute(
        "INSERT INTO premium_devices (user_id, device_fingerprint, extension_id, is_active, \
         registered_at, last_seen_at) VALUES (?1, ?2, ?3, 1, ?4, ?4) \
         ON CONFLICT(device_fingerprint) DO UPDATE SET user_id = excluded.user_id, \
         extension_id = excluded.extension_id, is_active = 1, \
         registered_at = excluded.registered_at, last_seen_at = excluded.last_seen_at, \
         deactivated_at = NULL, deactivation_reason = NULL \
         WHERE premium_devices.is_active = 0",
        params![user_id, fingerprint, extension_id, now],
    )?;
    let device = conn
        .query_row(
            &format!(
                "SELECT {DEVICE_COLUMNS} FROM premium_devices \
                 WHERE device_fingerprint = ?1 AND user_id = ?2 AND is_active = 1"
            ),
            params![fingerprint, user_id],
            device_from_row,
        )
        .optional()?;
    device.ok_or_else(|| StoreError::Conflict("premium device".to_string()))
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<PremiumDevice> {
    Ok(PremiumDevice {
        id: row.get(0)?,
        user_id: row.get(1)?,
        device_fingerprint: row.get(2)?,
        extension_id: row.get(3)?,
        is_active: row.get(4)?,
        registered_at: row.get(5)?,
        last_seen_at: row.get(6)?,
        deactivated_at: row.get(7)?,
        deactivation_reason: row.get(8)?,
    })
}

fn trial_from_row(row: &Row<'_>) -> rusqlite::Result<TrialUsage> {
    Ok(TrialUsage {
        trial_key: row.get(0)?,
        extension_id: row.get(1)?,
        fingerprint: row.get(2)?,
        usage_count: count_column(row, 3)?,
        max_uses: count_column(row, 4)?,
        is_expired: row.get(5)?,
        created_at: row.get(6)?,
        last_used_at: row.get(7)?,
    })
}

/// Inserts a code on `conn`, which may be an open transaction.
pub(crate) fn insert_activation_code(
    conn: &Connection,
    new: &NewActivationCode,
    now: DateTime<Utc>,
) -> StoreResult<ActivationCode> {
    conn.execute(
        "INSERT INTO activation_codes (code, customer_id, order_id, installation_id, \
         version_token, max_activations, expires_at, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.code,
            new.customer_id.map(|id| id.get()),
            new.order_id.map(|id| id.get()),
            new.installation_id.map(|id| id.to_string()),
            new.version_token,
            i64::from(new.max_activations),
            new.expires_at,
            now,
        ],
    )
    .map_err(|e| StoreError::on_unique(e, "activation code"))?;
    let id = conn.last_insert_rowid();
    let code = conn.query_row(
        &format!("SELECT {CODE_COLUMNS} FROM activation_codes WHERE id = ?1"),
        params![id],
        code_from_row,
    )?;
    Ok(code)
}

impl Store {
    // ── Activation codes ─────────────────────────────────────────

    pub fn create_activation_code(
        &self,
        new: &NewActivationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<ActivationCode> {
        let conn = self.conn()?;
        insert_activation_code(&conn, new, now)
    }

    pub fn get_activation_code(&self, code: &str) -> StoreResult<Option<ActivationCode>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT {CODE_COLUMNS} FROM activation_codes WHERE code = ?1"),
                params![code.trim()],
                code_from_row,
            )
            .optional()?;
        Ok(found)
    }

    pub fn get_activation_code_by_id(
        &self,
        id: ActivationCodeId,
    ) -> StoreResult<Option<ActivationCode>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT {CODE_COLUMNS} FROM activation_codes WHERE id = ?1"),
                params![id.get()],
                code_from_row,
            )
            .optional()?;
        Ok(found)
    }

    /// The code bound to an installation, if any.
    pub fn get_activation_code_by_installation(
        &self,
        installation: InstallationId,
    ) -> StoreResult<Option<ActivationCode>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {CODE_COLUMNS} FROM activation_codes WHERE installation_id = ?1 \
                     ORDER BY id DESC LIMIT 1"
                ),
                params![installation.to_string()],
                code_from_row,
            )
            .optional()?;
        Ok(found)
    }

    pub fn list_activation_codes_for_customer(
        &self,
        customer: CustomerId,
    ) -> StoreResult<Vec<ActivationCode>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CODE_COLUMNS} FROM activation_codes WHERE customer_id = ?1 ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map(params![customer.get()], code_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Persists a successful validation.
    ///
    /// The update is guarded on the previous activation count so that two
    /// concurrent first validations cannot both bind the code.
    pub fn apply_validation_grant(
        &self,
        code: &ActivationCode,
        grant: &ValidationGrant,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE activation_codes SET installation_id = ?1, activation_count = ?2, \
             activated_at = ?3, daily_validation_count = ?4, last_validation_at = ?5 \
             WHERE id = ?6 AND activation_count = ?7 \
             AND (installation_id IS NULL OR installation_id = ?1) \
             AND daily_validation_count = ?8 AND last_validation_at IS ?9",
            params![
                grant.installation_id.to_string(),
                i64::from(grant.activation_count),
                grant.activated_at,
                i64::from(grant.daily_validation_count),
                grant.validated_at,
                code.id.get(),
                i64::from(code.activation_count),
                i64::from(code.daily_validation_count),
                code.last_validation_at,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Persists a direct device activation.
    pub fn apply_direct_activation(
        &self,
        code: &ActivationCode,
        activation: &DirectActivation,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE activation_codes SET device_id = ?1, ip_address = ?2, activation_count = ?3, \
             activated_at = ?4 WHERE id = ?5 AND activation_count = ?6",
            params![
                activation.device_id,
                activation.ip_address,
                i64::from(activation.activation_count),
                activation.activated_at,
                code.id.get(),
                i64::from(code.activation_count),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Revokes a code.
    pub fn revoke_activation_code(&self, id: ActivationCodeId) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE activation_codes SET is_revoked = 1, is_active = 0 WHERE id = ?1",
            params![id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("activation code {id}")));
        }
        Ok(())
    }

    // ── Installations ────────────────────────────────────────────

    /// Registers an installation or refreshes the one already known.
    pub fn upsert_installation(
        &self,
        installation: &Installation,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO extension_installations (installation_id, customer_id, \
             device_fingerprint, user_agent, ip_address, extension_version, is_active, \
             last_seen_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7) \
             ON CONFLICT(installation_id) DO UPDATE SET \
             customer_id = COALESCE(excluded.customer_id, extension_installations.customer_id), \
             device_fingerprint = COALESCE(excluded.device_fingerprint, \
                 extension_installations.device_fingerprint), \
             user_agent = COALESCE(excluded.user_agent, extension_installations.user_agent), \
             ip_address = COALESCE(excluded.ip_address, extension_installations.ip_address), \
             extension_version = COALESCE(excluded.extension_version, \
                 extension_installations.extension_version), \
             last_seen_at = excluded.last_seen_at",
            params![
                installation.installation_id.to_string(),
                installation.customer_id.map(|id| id.get()),
                installation.device_fingerprint,
                installation.user_agent,
                installation.ip_address,
                installation.extension_version,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_installation(&self, id: InstallationId) -> StoreResult<Option<Installation>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {INSTALLATION_COLUMNS} FROM extension_installations \
                     WHERE installation_id = ?1"
                ),
                params![id.to_string()],
                installation_from_row,
            )
            .optional()?;
        Ok(found)
    }

    pub fn touch_installation(&self, id: InstallationId, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE extension_installations SET last_seen_at = ?1 WHERE installation_id = ?2",
            params![now, id.to_string()],
        )?;
        Ok(())
    }

    pub fn list_installations_for_customer(
        &self,
        customer: CustomerId,
    ) -> StoreResult<Vec<Installation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTALLATION_COLUMNS} FROM extension_installations WHERE customer_id = ?1 \
             ORDER BY last_seen_at DESC"
        ))?;
        let rows = stmt.query_map(params![customer.get()], installation_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── Premium devices ──────────────────────────────────────────

    pub fn get_active_premium_device(
        &self,
        user_id: &str,
        fingerprint: &str,
    ) -> StoreResult<Option<PremiumDevice>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {DEVICE_COLUMNS} FROM premium_devices \
                     WHERE user_id = ?1 AND device_fingerprint = ?2 AND is_active = 1"
                ),
                params![user_id, fingerprint],
                device_from_row,
            )
            .optional()?;
        Ok(found)
    }

    pub fn list_active_premium_devices(&self, user_id: &str) -> StoreResult<Vec<PremiumDevice>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM premium_devices WHERE user_id = ?1 AND is_active = 1 \
             ORDER BY registered_at"
        ))?;
        let rows = stmt.query_map(params![user_id], device_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Registers a device for a user. A fingerprint previously registered
    /// and deactivated is re-activated for the new owner.
    pub fn register_premium_device(
        &self,
        user_id: &str,
        fingerprint: &str,
        extension_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PremiumDevice> {
        let conn = self.conn()?;
        insert_premium_device(&conn, user_id, fingerprint, extension_id, now)
    }

    /// Applies `policy` to a device and registers or refreshes it, reading
    /// the user's active devices and writing in one transaction.
    pub fn claim_premium_device(
        &self,
        user_id: &str,
        fingerprint: &str,
        extension_id: &str,
        policy: &DevicePolicy,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceDecision> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let known = tx
            .query_row(
                "SELECT 1 FROM premium_devices \
                 WHERE user_id = ?1 AND device_fingerprint = ?2 AND is_active = 1",
                params![user_id, fingerprint],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM premium_devices WHERE user_id = ?1 AND is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        let decision = policy.decide(known, u32::try_from(active).unwrap_or(u32::MAX));
        match decision {
            DeviceDecision::AlreadyAuthorized => {
                tx.execute(
                    "UPDATE premium_devices SET last_seen_at = ?1 \
                     WHERE user_id = ?2 AND device_fingerprint = ?3 AND is_active = 1",
                    params![now, user_id, fingerprint],
                )?;
            }
            DeviceDecision::Register => {
                insert_premium_device(&tx, user_id, fingerprint, extension_id, now)?;
            }
            DeviceDecision::Denied { .. } => {}
        }
        tx.commit()?;
        Ok(decision)
    }

    /// Deactivates a device. Returns false if it was not active.
    pub fn deactivate_premium_device(
        &self,
        user_id: &str,
        fingerprint: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE premium_devices SET is_active = 0, deactivated_at = ?1, \
             deactivation_reason = ?2 \
             WHERE user_id = ?3 AND device_fingerprint = ?4 AND is_active = 1",
            params![now, reason, user_id, fingerprint],
        )?;
        Ok(changed > 0)
    }

    /// Records a heartbeat. Returns false if the device is not active.
    pub fn touch_premium_device(
        &self,
        user_id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE premium_devices SET last_seen_at = ?1 \
             WHERE user_id = ?2 AND device_fingerprint = ?3 AND is_active = 1",
            params![now, user_id, fingerprint],
        )?;
        Ok(changed > 0)
    }

    // ── Anonymous trials ─────────────────────────────────────────

    pub fn get_trial_usage(&self, trial_key: &str) -> StoreResult<Option<TrialUsage>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT trial_key, extension_id, fingerprint, usage_count, max_uses, is_expired, \
                 created_at, last_used_at FROM trial_usage WHERE trial_key = ?1",
                params![trial_key],
                trial_from_row,
            )
            .optional()?;
        Ok(found)
    }

    /// Inserts or overwrites a trial record.
    pub fn save_trial_usage(&self, trial: &TrialUsage) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trial_usage (trial_key, extension_id, fingerprint, usage_count, \
             max_uses, is_expired, created_at, last_used_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(trial_key) DO UPDATE SET usage_count = excluded.usage_count, \
             max_uses = excluded.max_uses, is_expired = excluded.is_expired, \
             last_used_at = excluded.last_used_at",
            params![
                trial.trial_key,
                trial.extension_id,
                trial.fingerprint,
                i64::from(trial.usage_count),
                i64::from(trial.max_uses),
                trial.is_expired,
                trial.created_at,
                trial.last_used_at,
            ],
        )?;
        Ok(())
    }

    // ── Usage logs ───────────────────────────────────────────────

    pub fn record_usage_log(&self, entry: &UsageLogEntry, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO extension_usage_logs (customer_id, session_id, jobs_used, platform, \
             location, extension_version, was_trial, usage_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.customer_id.get(),
                entry.session_id,
                i64::from(entry.jobs_used),
                entry.platform,
                entry.location,
                entry.extension_version,
                entry.was_trial,
                now,
            ],
        )?;
        Ok(())
    }

    /// Jobs logged by a customer.
    pub fn count_usage_jobs(&self, customer: CustomerId) -> StoreResult<u64> {
        let conn = self.conn()?;
        let jobs: i64 = conn.query_row(
            "SELECT COALESCE(SUM(jobs_used), 0) FROM extension_usage_logs WHERE customer_id = ?1",
            params![customer.get()],
            |row| row.get(0),
        )?;
        Ok(jobs as u64)
    }
}
