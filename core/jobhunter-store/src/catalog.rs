//! Product, coupons, key/value settings and dashboard feature flags.

use crate::{count_column, parse_column, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_types::{CouponId, Currency, DiscountType, Money, ProductId};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

const DEFAULT_PRODUCT_NAME: &str = "OCUS Job Hunter Chrome Extension";
const DEFAULT_PRODUCT_DESCRIPTION: &str =
    "Premium Chrome extension for photography job hunting on OCUS (Ubereats/Foodora deliveries)";
const DEFAULT_PRODUCT_FILE: &str = "ocus-extension.crx";
const DEFAULT_PRODUCT_PRICE: Money = Money::from_cents(50_000);

const DEFAULT_FEATURES: [(&str, &str); 3] = [
    (
        "affiliate_program",
        "Enable/disable affiliate program section in user dashboard",
    ),
    ("analytics", "Enable/disable analytics section in user dashboard"),
    ("billing", "Enable/disable billing section in user dashboard"),
];

/// The product for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub before_price: Option<Money>,
    pub currency: Currency,
    pub file_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A discount coupon.
///
/// `discount_value` is in hundredths: cents for fixed discounts, hundredths
/// of a percent for percentage discounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Money,
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Money,
    pub usage_limit: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A key/value setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// A customer dashboard section that admins can switch off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFeature {
    pub feature_name: String,
    pub is_enabled: bool,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: ProductId::from_raw(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        price: Money::from_cents(row.get(3)?),
        before_price: row.get::<_, Option<i64>>(4)?.map(Money::from_cents),
        currency: parse_column(row, 5)?,
        file_name: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, is_active, usage_limit, \
    usage_count, expires_at, created_at";

fn coupon_from_row(row: &Row<'_>) -> rusqlite::Result<Coupon> {
    Ok(Coupon {
        id: CouponId::from_raw(row.get(0)?),
        code: row.get(1)?,
        discount_type: parse_column(row, 2)?,
        discount_value: Money::from_cents(row.get(3)?),
        is_active: row.get(4)?,
        usage_limit: row
            .get::<_, Option<i64>>(5)?
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX)),
        usage_count: count_column(row, 6)?,
        expires_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<DashboardFeature> {
    Ok(DashboardFeature {
        feature_name: row.get(0)?,
        is_enabled: row.get(1)?,
        description: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Coupon codes are matched case-insensitively.
fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl Store {
    // ── Product ──────────────────────────────────────────────────

    /// Returns the active product, creating the default listing if none exists.
    pub fn active_product(&self, now: DateTime<Utc>) -> StoreResult<Product> {
        let conn = self.conn()?;
        let existing = conn
            .query_row(
                "SELECT id, name, description, price, before_price, currency, file_name, \
                 is_active, created_at FROM products WHERE is_active = 1 ORDER BY id LIMIT 1",
                [],
                product_from_row,
            )
            .optional()?;
        if let Some(product) = existing {
            return Ok(product);
        }
        conn.execute(
            "INSERT INTO products (name, description, price, currency, file_name, created_at) \
             VALUES (?1, ?2, ?3, 'eur', ?4, ?5)",
            params![
                DEFAULT_PRODUCT_NAME,
                DEFAULT_PRODUCT_DESCRIPTION,
                DEFAULT_PRODUCT_PRICE.cents(),
                DEFAULT_PRODUCT_FILE,
                now,
            ],
        )?;
        Ok(Product {
            id: ProductId::from_raw(conn.last_insert_rowid()),
            name: DEFAULT_PRODUCT_NAME.to_string(),
            description: DEFAULT_PRODUCT_DESCRIPTION.to_string(),
            price: DEFAULT_PRODUCT_PRICE,
            before_price: None,
            currency: Currency::parse("eur").map_err(|e| StoreError::InvalidData(e.to_string()))?,
            file_name: DEFAULT_PRODUCT_FILE.to_string(),
            is_active: true,
            created_at: now,
        })
    }

    /// Updates the price of the active product.
    pub fn update_product_pricing(
        &self,
        price: Money,
        before_price: Option<Money>,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let product = self.active_product(now)?;
        let conn = self.conn()?;
        conn.execute(
            "UPDATE products SET price = ?1, before_price = ?2 WHERE id = ?3",
            params![price.cents(), before_price.map(|p| p.cents()), product.id.get()],
        )?;
        Ok(Product {
            price,
            before_price,
            ..product
        })
    }

    // ── Coupons ──────────────────────────────────────────────────

    pub fn create_coupon(&self, new: &NewCoupon, now: DateTime<Utc>) -> StoreResult<Coupon> {
        let conn = self.conn()?;
        let code = normalize_code(&new.code);
        conn.execute(
            "INSERT INTO coupons (code, discount_type, discount_value, usage_limit, expires_at, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                code,
                new.discount_type.as_str(),
                new.discount_value.cents(),
                new.usage_limit.map(i64::from),
                new.expires_at,
                now,
            ],
        )
        .map_err(|e| StoreError::on_unique(e, "coupon"))?;
        Ok(Coupon {
            id: CouponId::from_raw(conn.last_insert_rowid()),
            code,
            discount_type: new.discount_type,
            discount_value: new.discount_value,
            is_active: true,
            usage_limit: new.usage_limit,
            usage_count: 0,
            expires_at: new.expires_at,
            created_at: now,
        })
    }

    pub fn get_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let conn = self.conn()?;
        let coupon = conn
            .query_row(
                &format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1"),
                params![normalize_code(code)],
                coupon_from_row,
            )
            .optional()?;
        Ok(coupon)
    }

    pub fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], coupon_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_coupon_active(&self, id: CouponId, active: bool) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE coupons SET is_active = ?1 WHERE id = ?2",
            params![active, id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("coupon {id}")));
        }
        Ok(())
    }

    pub fn delete_coupon(&self, id: CouponId) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM coupons WHERE id = ?1", params![id.get()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("coupon {id}")));
        }
        Ok(())
    }

    /// Counts one redemption of a coupon.
    pub fn increment_coupon_usage(&self, code: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE coupons SET usage_count = usage_count + 1 WHERE code = ?1",
            params![normalize_code(code)],
        )?;
        Ok(())
    }

    // ── Settings ─────────────────────────────────────────────────

    pub fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn list_settings(&self) -> StoreResult<Vec<Setting>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(Setting {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Reads a JSON-encoded setting.
    pub fn get_json_setting<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> StoreResult<Option<T>> {
        match self.get_setting(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Stores a setting as JSON.
    pub fn set_json_setting<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set_setting(key, &raw, now)
    }

    // ── Dashboard features ───────────────────────────────────────

    /// Inserts the default feature flags that are missing.
    pub fn seed_dashboard_features(&self, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        for (name, description) in DEFAULT_FEATURES {
            conn.execute(
                "INSERT OR IGNORE INTO dashboard_features (feature_name, is_enabled, description, \
                 updated_at) VALUES (?1, 1, ?2, ?3)",
                params![name, description, now],
            )?;
        }
        Ok(())
    }

    pub fn list_dashboard_features(&self) -> StoreResult<Vec<DashboardFeature>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT feature_name, is_enabled, description, updated_at FROM dashboard_features \
             ORDER BY feature_name",
        )?;
        let rows = stmt.query_map([], feature_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_dashboard_feature(&self, name: &str) -> StoreResult<Option<DashboardFeature>> {
        let conn = self.conn()?;
        let feature = conn
            .query_row(
                "SELECT feature_name, is_enabled, description, updated_at FROM dashboard_features \
                 WHERE feature_name = ?1",
                params![name],
                feature_from_row,
            )
            .optional()?;
        Ok(feature)
    }

    /// Creates or updates a feature flag.
    pub fn upsert_dashboard_feature(
        &self,
        name: &str,
        enabled: bool,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<DashboardFeature> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO dashboard_features (feature_name, is_enabled, description, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(feature_name) DO UPDATE SET is_enabled = excluded.is_enabled, \
             description = COALESCE(excluded.description, dashboard_features.description), \
             updated_at = excluded.updated_at",
            params![name, enabled, description, now],
        )?;
        let feature = conn.query_row(
            "SELECT feature_name, is_enabled, description, updated_at FROM dashboard_features \
             WHERE feature_name = ?1",
            params![name],
            feature_from_row,
        )?;
        Ok(feature)
    }
}
