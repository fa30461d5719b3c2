//! Generators for activation codes, customer keys and referral codes.

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};

const ACTIVATION_PREFIX: &str = "OCUS";
const CUSTOMER_KEY_LEN: usize = 20;
const REFERRAL_CODE_LEN: usize = 8;

/// Generates an activation code: `OCUS-<unix millis>-<8 uppercase hex>`.
#[must_use]
pub fn generate_activation_code(now: DateTime<Utc>) -> String {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!(
        "{ACTIVATION_PREFIX}-{}-{}",
        now.timestamp_millis(),
        hex::encode_upper(suffix)
    )
}

/// Returns true if `code` has the shape produced by [`generate_activation_code`].
#[must_use]
pub fn is_activation_code_format(code: &str) -> bool {
    let mut parts = code.trim().split('-');
    let (Some(prefix), Some(millis), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == ACTIVATION_PREFIX
        && !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == 8
        && suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

/// Random token stored next to a code so a re-issued code can be told apart.
#[must_use]
pub fn generate_version_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generates a 20 character uppercase alphanumeric key for a customer.
#[must_use]
pub fn generate_customer_key() -> String {
    upper_alphanumeric(CUSTOMER_KEY_LEN)
}

/// Generates an 8 character uppercase referral code.
#[must_use]
pub fn generate_referral_code() -> String {
    upper_alphanumeric(REFERRAL_CODE_LEN)
}

fn upper_alphanumeric(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
