//! Customer accounts.

use crate::{count_column, parse_column, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_license::CustomerUsage;
use jobhunter_types::{CustomerId, Money, Percent, SocialProvider, SubscriptionStatus};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

/// A customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub activation_key: Option<String>,
    pub extension_activated: bool,
    pub extension_usage_count: u32,
    pub extension_last_used: Option<DateTime<Utc>>,
    pub trial_jobs_used: u32,
    pub trial_limit: u32,
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub blocked_at: Option<DateTime<Utc>>,
    pub subscription_status: SubscriptionStatus,
    pub total_spent: Money,
    pub total_orders: u32,
    pub last_order_date: Option<DateTime<Utc>>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub github_id: Option<String>,
    pub avatar: Option<String>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    pub total_earnings: Money,
    pub commission_rate: Percent,
    pub preferred_language: String,
    pub marketing_opt_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// The fields that decide extension access.
    #[must_use]
    pub fn usage(&self) -> CustomerUsage {
        CustomerUsage {
            is_blocked: self.is_blocked,
            blocked_reason: self.blocked_reason.clone(),
            extension_activated: self.extension_activated,
            trial_jobs_used: self.trial_jobs_used,
            trial_limit: self.trial_limit,
        }
    }

    /// The provider id linked for `provider`, if any.
    #[must_use]
    pub fn social_id(&self, provider: SocialProvider) -> Option<&str> {
        match provider {
            SocialProvider::Google => self.google_id.as_deref(),
            SocialProvider::Facebook => self.facebook_id.as_deref(),
            SocialProvider::GitHub => self.github_id.as_deref(),
        }
    }
}

/// Fields for a new customer.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub activation_key: Option<String>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    pub social: Option<(SocialProvider, String)>,
    pub avatar: Option<String>,
    pub marketing_opt_in: bool,
}

const CUSTOMER_COLUMNS: &str = "id, email, name, password_hash, activation_key, \
    extension_activated, extension_usage_count, extension_last_used, trial_jobs_used, \
    trial_limit, is_blocked, blocked_reason, blocked_at, subscription_status, total_spent, \
    total_orders, last_order_date, google_id, facebook_id, github_id, avatar, referral_code, \
    referred_by, total_earnings, commission_rate, preferred_language, marketing_opt_in, \
    created_at, updated_at";

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: CustomerId::from_raw(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        activation_key: row.get(4)?,
        extension_activated: row.get(5)?,
        extension_usage_count: count_column(row, 6)?,
        extension_last_used: row.get(7)?,
        trial_jobs_used: count_column(row, 8)?,
        trial_limit: count_column(row, 9)?,
        is_blocked: row.get(10)?,
        blocked_reason: row.get(11)?,
        blocked_at: row.get(12)?,
        subscription_status: parse_column(row, 13)?,
        total_spent: Money::from_cents(row.get(14)?),
        total_orders: count_column(row, 15)?,
        last_order_date: row.get(16)?,
        google_id: row.get(17)?,
        facebook_id: row.get(18)?,
        github_id: row.get(19)?,
        avatar: row.get(20)?,
        referral_code: row.get(21)?,
        referred_by: row.get(22)?,
        total_earnings: Money::from_cents(row.get(23)?),
        commission_rate: Percent::from_basis_points(row.get(24)?),
        preferred_language: row.get(25)?,
        marketing_opt_in: row.get(26)?,
        created_at: row.get(27)?,
        updated_at: row.get(28)?,
    })
}

fn social_column(provider: SocialProvider) -> &'static str {
    match provider {
        SocialProvider::Google => "google_id",
        SocialProvider::Facebook => "facebook_id",
        SocialProvider::GitHub => "github_id",
    }
}

impl Store {
    /// Creates a customer. Fails with [`StoreError::Conflict`] if the email
    /// (or referral code, activation key, social id) is already taken.
    pub fn create_customer(&self, new: &NewCustomer, now: DateTime<Utc>) -> StoreResult<Customer> {
        let conn = self.conn()?;
        let (google, facebook, github) = match &new.social {
            Some((SocialProvider::Google, id)) => (Some(id.as_str()), None, None),
            Some((SocialProvider::Facebook, id)) => (None, Some(id.as_str()), None),
            Some((SocialProvider::GitHub, id)) => (None, None, Some(id.as_str())),
            None => (None, None, None),
        };
        conn.execute(
            "INSERT INTO customers (email, name, password_hash, activation_key, referral_code, \
             referred_by, google_id, facebook_id, github_id, avatar, marketing_opt_in, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                new.email.trim(),
                new.name.trim(),
                new.password_hash,
                new.activation_key,
                new.referral_code,
                new.referred_by,
                google,
                facebook,
                github,
                new.avatar,
                new.marketing_opt_in,
                now,
            ],
        )
        .map_err(|e| StoreError::on_unique(e, "customer"))?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_customer(CustomerId::from_raw(id))?
            .ok_or_else(|| StoreError::NotFound(format!("customer {id}")))
    }

    /// Loads a customer by id.
    pub fn get_customer(&self, id: CustomerId) -> StoreResult<Option<Customer>> {
        let conn = self.conn()?;
        let customer = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                params![id.get()],
                customer_from_row,
            )
            .optional()?;
        Ok(customer)
    }

    /// Loads a customer by id, failing if absent.
    pub fn require_customer(&self, id: CustomerId) -> StoreResult<Customer> {
        self.get_customer(id)?
            .ok_or_else(|| StoreError::NotFound(format!("customer {id}")))
    }

    /// Loads a customer by email (case-insensitive).
    pub fn get_customer_by_email(&self, email: &str) -> StoreResult<Option<Customer>> {
        let conn = self.conn()?;
        let customer = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = ?1"),
                params![email.trim()],
                customer_from_row,
            )
            .optional()?;
        Ok(customer)
    }

    /// Loads the affiliate owning a referral code.
    pub fn get_customer_by_referral_code(&self, code: &str) -> StoreResult<Option<Customer>> {
        let conn = self.conn()?;
        let customer = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE referral_code = ?1"),
                params![code.trim().to_ascii_uppercase()],
                customer_from_row,
            )
            .optional()?;
        Ok(customer)
    }

    /// Loads a customer by a linked social identity.
    pub fn get_customer_by_social(
        &self,
        provider: SocialProvider,
        provider_id: &str,
    ) -> StoreResult<Option<Customer>> {
        let conn = self.conn()?;
        let customer = conn
            .query_row(
                &format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE {} = ?1",
                    social_column(provider)
                ),
                params![provider_id],
                customer_from_row,
            )
            .optional()?;
        Ok(customer)
    }

    /// Links a social identity (and avatar, if the account has none).
    pub fn link_social_account(
        &self,
        id: CustomerId,
        provider: SocialProvider,
        provider_id: &str,
        avatar: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE customers SET {} = ?1, avatar = COALESCE(avatar, ?2), updated_at = ?3 \
                     WHERE id = ?4",
                    social_column(provider)
                ),
                params![provider_id, avatar, now, id.get()],
            )
            .map_err(|e| StoreError::on_unique(e, "social account"))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("customer {id}")));
        }
        Ok(())
    }

    /// Lists all customers, newest first.
    pub fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], customer_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_customers(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Blocks a customer, or unblocks when `reason` is `None` and `blocked` is false.
    pub fn set_customer_blocked(
        &self,
        id: CustomerId,
        blocked: bool,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = if blocked {
            conn.execute(
                "UPDATE customers SET is_blocked = 1, blocked_reason = ?1, blocked_at = ?2, \
                 updated_at = ?2 WHERE id = ?3",
                params![reason, now, id.get()],
            )?
        } else {
            conn.execute(
                "UPDATE customers SET is_blocked = 0, blocked_reason = NULL, blocked_at = NULL, \
                 updated_at = ?1 WHERE id = ?2",
                params![now, id.get()],
            )?
        };
        if changed == 0 {
            return Err(StoreError::NotFound(format!("customer {id}")));
        }
        Ok(())
    }

    /// Marks the paid extension as activated for a customer.
    pub fn set_extension_activated(
        &self,
        id: CustomerId,
        activated: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE customers SET extension_activated = ?1, \
             subscription_status = CASE WHEN ?1 THEN 'active' ELSE subscription_status END, \
             updated_at = ?2 WHERE id = ?3",
            params![activated, now, id.get()],
        )?;
        Ok(())
    }

    /// Counts one extension job; trial jobs also consume the trial counter.
    ///
    /// The count only happens while the customer is unblocked and, for a
    /// trial job, still under the trial limit; a premium job needs an
    /// activated extension. Returns false when nothing was counted.
    pub fn record_extension_use(
        &self,
        id: CustomerId,
        trial: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE customers SET extension_usage_count = extension_usage_count + 1, \
             trial_jobs_used = trial_jobs_used + ?1, extension_last_used = ?2, updated_at = ?2 \
             WHERE id = ?3 AND is_blocked = 0 AND CASE WHEN ?1 = 1 \
             THEN extension_activated = 0 AND trial_jobs_used < trial_limit \
             ELSE extension_activated = 1 END",
            params![i64::from(trial), now, id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Adds a completed purchase to the customer's totals.
    pub fn record_customer_purchase(
        &self,
        id: CustomerId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE customers SET total_spent = total_spent + ?1, total_orders = total_orders + 1, \
             last_order_date = ?2, updated_at = ?2 WHERE id = ?3",
            params![amount.cents(), now, id.get()],
        )?;
        Ok(())
    }

    /// Enrolls a customer as an affiliate.
    pub fn set_referral_code(
        &self,
        id: CustomerId,
        code: &str,
        rate: Percent,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE customers SET referral_code = ?1, commission_rate = ?2, updated_at = ?3 \
             WHERE id = ?4",
            params![code, rate.basis_points(), now, id.get()],
        )
        .map_err(|e| StoreError::on_unique(e, "referral code"))?;
        Ok(())
    }

    pub fn add_customer_earnings(&self, id: CustomerId, amount: Money) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE customers SET total_earnings = total_earnings + ?1 WHERE id = ?2",
            params![amount.cents(), id.get()],
        )?;
        Ok(())
    }

    /// Updates editable profile fields.
    pub fn update_customer_profile(
        &self,
        id: CustomerId,
        name: &str,
        preferred_language: &str,
        marketing_opt_in: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE customers SET name = ?1, preferred_language = ?2, marketing_opt_in = ?3, \
             updated_at = ?4 WHERE id = ?5",
            params![name, preferred_language, marketing_opt_in, now, id.get()],
        )?;
        Ok(())
    }

    pub fn update_customer_password(
        &self,
        id: CustomerId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE customers SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, now, id.get()],
        )?;
        Ok(())
    }

    /// Deletes a customer. Orders and invoices keep their copy of the
    /// contact details.
    pub fn delete_customer(&self, id: CustomerId) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM customers WHERE id = ?1", params![id.get()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("customer {id}")));
        }
        Ok(())
    }
}
