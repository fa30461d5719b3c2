//! Customer and admin authentication.
//!
//! Passwords are stored as Argon2id PHC strings. Session handling lives in
//! the HTTP layer; this module only decides who someone is.

use crate::error::{CommerceError, CommerceResult};
use crate::looks_like_email;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use jobhunter_integrations::SocialProfile;
use jobhunter_license::generate_customer_key;
use jobhunter_store::{AdminUser, Customer, NewCustomer, Store};
use jobhunter_types::CustomerId;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Shortest password accepted at registration, before the strength rules.
pub const MIN_PASSWORD_LEN: usize = 6;

const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";
const SEQUENTIAL_PREFIXES: [&str; 13] = [
    "012", "123", "234", "345", "456", "567", "678", "789", "890", "abc", "bcd", "cde", "def",
];
const COMMON_WORDS: [&str; 7] = ["password", "admin", "user", "login", "welcome", "123456", "qwerty"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthLevel {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub strength: StrengthLevel,
}

fn is_predictable(password: &str) -> bool {
    let mut chars = password.chars();
    let repeated = match chars.next() {
        Some(first) => password.chars().count() > 1 && chars.all(|c| c == first),
        None => false,
    };
    let lower = password.to_lowercase();
    repeated
        || SEQUENTIAL_PREFIXES.iter().any(|p| password.starts_with(p))
        || COMMON_WORDS.iter().any(|w| lower.contains(w))
}

/// Checks a password against the account password rules.
#[must_use]
pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let length = password.chars().count();
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARS.contains(c));

    let mut errors = Vec::new();
    if length < 8 {
        errors.push("Password must be at least 8 characters long".to_string());
    }
    if !has_upper {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !has_lower {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !has_digit {
        errors.push("Password must contain at least one number".to_string());
    }
    if !has_special {
        errors.push("Password must contain at least one special character".to_string());
    }
    if is_predictable(password) {
        errors.push("Password contains common patterns and is too predictable".to_string());
    }

    let score = [
        length >= 8,
        length >= 12,
        has_upper && has_lower,
        has_digit,
        has_special,
        length >= 16,
    ]
    .into_iter()
    .filter(|&met| met)
    .count();
    let strength = match score {
        5.. => StrengthLevel::Strong,
        3..=4 => StrengthLevel::Medium,
        _ => StrengthLevel::Weak,
    };

    PasswordStrength {
        is_valid: errors.is_empty(),
        errors,
        strength,
    }
}

fn hasher() -> CommerceResult<Argon2<'static>> {
    // 19 MiB, two passes, one lane.
    let params = Params::new(19 * 1024, 2, 1, None)
        .map_err(|e| CommerceError::PasswordHash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password into a PHC string with a random salt.
pub fn hash_password(password: &str) -> CommerceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CommerceError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC string. A malformed hash never
/// verifies.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        warn!("stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// A sign-up form.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    /// Referral code the visitor arrived with.
    pub referred_by: Option<String>,
    pub marketing_opt_in: bool,
}

fn name_from_email(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[derive(Clone)]
pub struct AccountService {
    store: Store,
}

impl AccountService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates a password account.
    pub fn register(&self, form: &Registration, now: DateTime<Utc>) -> CommerceResult<Customer> {
        let email = form.email.trim().to_lowercase();
        if !looks_like_email(&email) {
            return Err(CommerceError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if form.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CommerceError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        let strength = validate_password_strength(&form.password);
        if !strength.is_valid {
            return Err(CommerceError::Validation(strength.errors.join(". ")));
        }
        if self.store.get_customer_by_email(&email)?.is_some() {
            return Err(CommerceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let name = form
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| name_from_email(&email))
            .to_string();
        let customer = self.store.create_customer(
            &NewCustomer {
                email: email.clone(),
                name,
                password_hash: Some(hash_password(&form.password)?),
                activation_key: Some(generate_customer_key()),
                referred_by: self.known_referral(form.referred_by.as_deref())?,
                marketing_opt_in: form.marketing_opt_in,
                ..NewCustomer::default()
            },
            now,
        )?;
        info!(customer_id = %customer.id, "customer registered");
        Ok(customer)
    }

    /// Keeps a referral code only if it belongs to an affiliate.
    fn known_referral(&self, code: Option<&str>) -> CommerceResult<Option<String>> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        match self.store.get_customer_by_referral_code(code)? {
            Some(affiliate) => Ok(affiliate.referral_code),
            None => {
                debug!(referral_code = code, "ignoring unknown referral code at sign-up");
                Ok(None)
            }
        }
    }

    /// Checks email and password.
    pub fn login(&self, email: &str, password: &str) -> CommerceResult<Customer> {
        let customer = self
            .store
            .get_customer_by_email(&email.trim().to_lowercase())?
            .ok_or(CommerceError::InvalidCredentials)?;
        let Some(stored) = customer.password_hash.as_deref() else {
            debug!(customer_id = %customer.id, "password login on a social-only account");
            return Err(CommerceError::InvalidCredentials);
        };
        if !verify_password(password, stored) {
            return Err(CommerceError::InvalidCredentials);
        }
        Self::ensure_not_blocked(&customer)?;
        Ok(customer)
    }

    fn ensure_not_blocked(customer: &Customer) -> CommerceResult<()> {
        if customer.is_blocked {
            return Err(CommerceError::Blocked(
                customer
                    .blocked_reason
                    .clone()
                    .unwrap_or_else(|| "contact support".to_string()),
            ));
        }
        Ok(())
    }

    /// Signs in with a provider identity: an account already linked to it,
    /// else the account with the same email (which gets linked), else a
    /// new account.
    pub fn social_sign_in(
        &self,
        profile: &SocialProfile,
        now: DateTime<Utc>,
    ) -> CommerceResult<Customer> {
        if let Some(customer) = self
            .store
            .get_customer_by_social(profile.provider, &profile.provider_id)?
        {
            Self::ensure_not_blocked(&customer)?;
            return Ok(customer);
        }

        let email = profile
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| looks_like_email(e))
            .ok_or_else(|| {
                CommerceError::Validation(format!(
                    "Your {} account did not share an email address",
                    profile.provider
                ))
            })?;

        if let Some(existing) = self.store.get_customer_by_email(&email)? {
            Self::ensure_not_blocked(&existing)?;
            self.store.link_social_account(
                existing.id,
                profile.provider,
                &profile.provider_id,
                profile.avatar.as_deref(),
                now,
            )?;
            info!(customer_id = %existing.id, provider = %profile.provider, "linked social account");
            return Ok(self.store.require_customer(existing.id)?);
        }

        let name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| name_from_email(&email))
            .to_string();
        let customer = self.store.create_customer(
            &NewCustomer {
                email,
                name,
                activation_key: Some(generate_customer_key()),
                social: Some((profile.provider, profile.provider_id.clone())),
                avatar: profile.avatar.clone(),
                ..NewCustomer::default()
            },
            now,
        )?;
        info!(customer_id = %customer.id, provider = %profile.provider, "customer registered via social sign-in");
        Ok(customer)
    }

    /// Checks admin credentials (username or email).
    pub fn admin_login(&self, login: &str, password: &str) -> CommerceResult<AdminUser> {
        let admin = self
            .store
            .get_admin_by_login(login)?
            .ok_or(CommerceError::InvalidCredentials)?;
        if !verify_password(password, &admin.password_hash) {
            return Err(CommerceError::InvalidCredentials);
        }
        Ok(admin)
    }

    /// Creates the first admin account when none exists. Returns `None`
    /// if an admin is already present.
    pub fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<AdminUser>> {
        if self.store.count_admins()? > 0 {
            return Ok(None);
        }
        let strength = validate_password_strength(password);
        if !strength.is_valid {
            return Err(CommerceError::Validation(strength.errors.join(". ")));
        }
        let admin = self
            .store
            .create_admin(username, email, &hash_password(password)?, now)?;
        info!(admin_id = %admin.id, username = %admin.username, "created initial admin account");
        Ok(Some(admin))
    }

    pub fn set_blocked(
        &self,
        customer: CustomerId,
        blocked: bool,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> CommerceResult<Customer> {
        self.store.set_customer_blocked(customer, blocked, reason, now)?;
        info!(customer_id = %customer, blocked, "customer block state changed");
        Ok(self.store.require_customer(customer)?)
    }
}
