//! Marketing content shown on the storefront: countdown banners,
//! announcement badges and the site-wide SEO metadata.

use crate::{Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_types::{BadgeId, BannerId, Money};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SEO_SETTINGS_KEY: &str = "seo_settings";

/// Per-language text keyed by language code.
pub type Translations = BTreeMap<String, String>;

/// A countdown banner advertising a limited-time price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownBanner {
    pub id: BannerId,
    pub is_enabled: bool,
    pub title_en: String,
    pub subtitle_en: String,
    pub title_translations: Translations,
    pub subtitle_translations: Translations,
    pub target_price: Money,
    pub original_price: Option<Money>,
    pub end_date_time: DateTime<Utc>,
    pub background_color: String,
    pub text_color: String,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable fields of a countdown banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCountdownBanner {
    pub is_enabled: bool,
    pub title_en: String,
    pub subtitle_en: String,
    pub title_translations: Translations,
    pub subtitle_translations: Translations,
    pub target_price: Money,
    pub original_price: Option<Money>,
    pub end_date_time: DateTime<Utc>,
    pub background_color: String,
    pub text_color: String,
    pub priority: i64,
}

/// A short badge shown next to the navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementBadge {
    pub id: BadgeId,
    pub is_enabled: bool,
    pub text_en: String,
    pub text_translations: Translations,
    pub background_color: String,
    pub text_color: String,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnnouncementBadge {
    pub is_enabled: bool,
    pub text_en: String,
    pub text_translations: Translations,
    pub background_color: String,
    pub text_color: String,
    pub priority: i64,
}

/// Site-wide meta tags and social previews.
///
/// Stored as one JSON document; fields missing from the stored copy take
/// their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeoSettings {
    pub site_title: String,
    pub site_description: String,
    pub site_keywords: Option<String>,
    pub site_author: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub og_image_alt: Option<String>,
    pub og_site_name: Option<String>,
    pub og_type: Option<String>,
    pub og_url: Option<String>,
    pub twitter_card: Option<String>,
    pub twitter_title: Option<String>,
    pub twitter_description: Option<String>,
    pub twitter_image: Option<String>,
    pub twitter_site: Option<String>,
    pub twitter_creator: Option<String>,
    pub meta_robots: Option<String>,
    pub canonical_url: Option<String>,
    pub theme_color: Option<String>,
    pub custom_logo: Option<String>,
    pub custom_favicon: Option<String>,
    pub custom_og_image: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for SeoSettings {
    fn default() -> Self {
        Self {
            site_title: "OCUS Job Hunter - Premium Chrome Extension".to_string(),
            site_description: "Boost your photography career with OCUS Job Hunter Chrome \
                Extension. Automated mission detection, smart acceptance, and unlimited job \
                opportunities for OCUS photographers."
                .to_string(),
            site_keywords: Some(
                "OCUS extension, photography jobs, Chrome extension, job hunter, photographer \
                 tools, mission automation"
                    .to_string(),
            ),
            site_author: Some("OCUS Job Hunter".to_string()),
            og_title: None,
            og_description: None,
            og_image: Some("/og-image.svg".to_string()),
            og_image_alt: None,
            og_site_name: Some("OCUS Job Hunter".to_string()),
            og_type: Some("website".to_string()),
            og_url: Some("https://jobhunter.one/".to_string()),
            twitter_card: Some("summary_large_image".to_string()),
            twitter_title: None,
            twitter_description: None,
            twitter_image: Some("/og-image.svg".to_string()),
            twitter_site: None,
            twitter_creator: None,
            meta_robots: Some("index, follow".to_string()),
            canonical_url: None,
            theme_color: Some("#2563eb".to_string()),
            custom_logo: None,
            custom_favicon: None,
            custom_og_image: None,
            updated_at: None,
        }
    }
}

fn translations_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Translations> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const BANNER_COLUMNS: &str = "id, is_enabled, title_en, subtitle_en, title_translations, \
    subtitle_translations, target_price, original_price, end_date_time, background_color, \
    text_color, priority, created_at, updated_at";

fn banner_from_row(row: &Row<'_>) -> rusqlite::Result<CountdownBanner> {
    Ok(CountdownBanner {
        id: BannerId::from_raw(row.get(0)?),
        is_enabled: row.get(1)?,
        title_en: row.get(2)?,
        subtitle_en: row.get(3)?,
        title_translations: translations_column(row, 4)?,
        subtitle_translations: translations_column(row, 5)?,
        target_price: Money::from_cents(row.get(6)?),
        original_price: row.get::<_, Option<i64>>(7)?.map(Money::from_cents),
        end_date_time: row.get(8)?,
        background_color: row.get(9)?,
        text_color: row.get(10)?,
        priority: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

const BADGE_COLUMNS: &str = "id, is_enabled, text_en, text_translations, background_color, \
    text_color, priority, created_at, updated_at";

fn badge_from_row(row: &Row<'_>) -> rusqlite::Result<AnnouncementBadge> {
    Ok(AnnouncementBadge {
        id: BadgeId::from_raw(row.get(0)?),
        is_enabled: row.get(1)?,
        text_en: row.get(2)?,
        text_translations: translations_column(row, 3)?,
        background_color: row.get(4)?,
        text_color: row.get(5)?,
        priority: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Store {
    // ── Countdown banners ────────────────────────────────────────

    pub fn create_countdown_banner(
        &self,
        new: &NewCountdownBanner,
        now: DateTime<Utc>,
    ) -> StoreResult<CountdownBanner> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO countdown_banners (is_enabled, title_en, subtitle_en, \
             title_translations, subtitle_translations, target_price, original_price, \
             end_date_time, background_color, text_color, priority, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                new.is_enabled,
                new.title_en,
                new.subtitle_en,
                serde_json::to_string(&new.title_translations)?,
                serde_json::to_string(&new.subtitle_translations)?,
                new.target_price.cents(),
                new.original_price.map(|p| p.cents()),
                new.end_date_time,
                new.background_color,
                new.text_color,
                new.priority,
                now,
            ],
        )?;
        let id = BannerId::from_raw(conn.last_insert_rowid());
        let banner = conn.query_row(
            &format!("SELECT {BANNER_COLUMNS} FROM countdown_banners WHERE id = ?1"),
            params![id.get()],
            banner_from_row,
        )?;
        Ok(banner)
    }

    pub fn get_countdown_banner(&self, id: BannerId) -> StoreResult<Option<CountdownBanner>> {
        let conn = self.conn()?;
        let banner = conn
            .query_row(
                &format!("SELECT {BANNER_COLUMNS} FROM countdown_banners WHERE id = ?1"),
                params![id.get()],
                banner_from_row,
            )
            .optional()?;
        Ok(banner)
    }

    /// Lists every banner, oldest first.
    pub fn list_countdown_banners(&self) -> StoreResult<Vec<CountdownBanner>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BANNER_COLUMNS} FROM countdown_banners ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], banner_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Replaces every editable field of a banner.
    pub fn update_countdown_banner(
        &self,
        id: BannerId,
        new: &NewCountdownBanner,
        now: DateTime<Utc>,
    ) -> StoreResult<CountdownBanner> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE countdown_banners SET is_enabled = ?1, title_en = ?2, subtitle_en = ?3, \
             title_translations = ?4, subtitle_translations = ?5, target_price = ?6, \
             original_price = ?7, end_date_time = ?8, background_color = ?9, text_color = ?10, \
             priority = ?11, updated_at = ?12 WHERE id = ?13",
            params![
                new.is_enabled,
                new.title_en,
                new.subtitle_en,
                serde_json::to_string(&new.title_translations)?,
                serde_json::to_string(&new.subtitle_translations)?,
                new.target_price.cents(),
                new.original_price.map(|p| p.cents()),
                new.end_date_time,
                new.background_color,
                new.text_color,
                new.priority,
                now,
                id.get(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("countdown banner {id}")));
        }
        let banner = conn.query_row(
            &format!("SELECT {BANNER_COLUMNS} FROM countdown_banners WHERE id = ?1"),
            params![id.get()],
            banner_from_row,
        )?;
        Ok(banner)
    }

    /// Sets the advertised price of one banner.
    pub fn set_banner_target_price(
        &self,
        id: BannerId,
        price: Money,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE countdown_banners SET target_price = ?1, updated_at = ?2 WHERE id = ?3",
            params![price.cents(), now, id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("countdown banner {id}")));
        }
        Ok(())
    }

    pub fn delete_countdown_banner(&self, id: BannerId) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM countdown_banners WHERE id = ?1",
            params![id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("countdown banner {id}")));
        }
        Ok(())
    }

    /// Returns the enabled banner with the highest priority, switching off
    /// enabled banners whose countdown has already ended.
    pub fn active_countdown_banner(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<CountdownBanner>> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE countdown_banners SET is_enabled = 0, updated_at = ?1 \
             WHERE is_enabled = 1 AND end_date_time <= ?1",
            params![now],
        )?;
        let banner = conn
            .query_row(
                &format!(
                    "SELECT {BANNER_COLUMNS} FROM countdown_banners WHERE is_enabled = 1 \
                     ORDER BY priority DESC, created_at, id LIMIT 1"
                ),
                [],
                banner_from_row,
            )
            .optional()?;
        Ok(banner)
    }

    // ── Announcement badges ──────────────────────────────────────

    pub fn create_announcement_badge(
        &self,
        new: &NewAnnouncementBadge,
        now: DateTime<Utc>,
    ) -> StoreResult<AnnouncementBadge> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO announcement_badges (is_enabled, text_en, text_translations, \
             background_color, text_color, priority, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                new.is_enabled,
                new.text_en,
                serde_json::to_string(&new.text_translations)?,
                new.background_color,
                new.text_color,
                new.priority,
                now,
            ],
        )?;
        Ok(AnnouncementBadge {
            id: BadgeId::from_raw(conn.last_insert_rowid()),
            is_enabled: new.is_enabled,
            text_en: new.text_en.clone(),
            text_translations: new.text_translations.clone(),
            background_color: new.background_color.clone(),
            text_color: new.text_color.clone(),
            priority: new.priority,
            created_at: now,
            updated_at: now,
        })
    }

    /// Lists every badge, newest first.
    pub fn list_announcement_badges(&self) -> StoreResult<Vec<AnnouncementBadge>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BADGE_COLUMNS} FROM announcement_badges ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], badge_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_announcement_badge(
        &self,
        id: BadgeId,
        new: &NewAnnouncementBadge,
        now: DateTime<Utc>,
    ) -> StoreResult<AnnouncementBadge> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE announcement_badges SET is_enabled = ?1, text_en = ?2, \
             text_translations = ?3, background_color = ?4, text_color = ?5, priority = ?6, \
             updated_at = ?7 WHERE id = ?8",
            params![
                new.is_enabled,
                new.text_en,
                serde_json::to_string(&new.text_translations)?,
                new.background_color,
                new.text_color,
                new.priority,
                now,
                id.get(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("announcement badge {id}")));
        }
        let badge = conn.query_row(
            &format!("SELECT {BADGE_COLUMNS} FROM announcement_badges WHERE id = ?1"),
            params![id.get()],
            badge_from_row,
        )?;
        Ok(badge)
    }

    pub fn delete_announcement_badge(&self, id: BadgeId) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM announcement_badges WHERE id = ?1",
            params![id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("announcement badge {id}")));
        }
        Ok(())
    }

    /// The enabled badge with the highest priority, newest first on ties.
    pub fn active_announcement_badge(&self) -> StoreResult<Option<AnnouncementBadge>> {
        let conn = self.conn()?;
        let badge = conn
            .query_row(
                &format!(
                    "SELECT {BADGE_COLUMNS} FROM announcement_badges WHERE is_enabled = 1 \
                     ORDER BY priority DESC, created_at DESC, id DESC LIMIT 1"
                ),
                [],
                badge_from_row,
            )
            .optional()?;
        Ok(badge)
    }

    // ── SEO ──────────────────────────────────────────────────────

    /// Returns the stored SEO settings, or the defaults if none were saved.
    pub fn seo_settings(&self) -> StoreResult<SeoSettings> {
        Ok(self
            .get_json_setting::<SeoSettings>(SEO_SETTINGS_KEY)?
            .unwrap_or_default())
    }

    pub fn save_seo_settings(
        &self,
        settings: &SeoSettings,
        now: DateTime<Utc>,
    ) -> StoreResult<SeoSettings> {
        let saved = SeoSettings {
            updated_at: Some(now),
            ..settings.clone()
        };
        self.set_json_setting(SEO_SETTINGS_KEY, &saved, now)?;
        Ok(saved)
    }
}
