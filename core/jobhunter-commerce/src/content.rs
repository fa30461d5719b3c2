//! Storefront marketing content: countdown banners, announcement badges
//! and SEO metadata.

use crate::error::{CommerceError, CommerceResult};
use crate::pricing::Pricing;
use chrono::{DateTime, Duration, Utc};
use jobhunter_store::{
    AnnouncementBadge, CountdownBanner, NewAnnouncementBadge, NewCountdownBanner, SeoSettings,
    Store, StoreError, Translations,
};
use jobhunter_types::{BadgeId, BannerId, Money};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

const SEO_TITLE_MAX: usize = 100;

/// Result of pushing a new price to the banner and the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerPriceSync {
    pub banner: CountdownBanner,
    pub pricing: Pricing,
    /// True when no banner existed and a default one was created.
    pub created: bool,
}

/// Banner used when a price is synced before any banner exists.
fn default_banner(price: Money, now: DateTime<Utc>) -> NewCountdownBanner {
    NewCountdownBanner {
        is_enabled: true,
        title_en: "Limited Time Offer!".to_string(),
        subtitle_en: "Get OCUS Job Hunter Extension at Special Price".to_string(),
        title_translations: Translations::new(),
        subtitle_translations: Translations::new(),
        target_price: price,
        original_price: Some(Money::from_cents(29_999)),
        end_date_time: now + Duration::days(7),
        background_color: "#FF6B35".to_string(),
        text_color: "#FFFFFF".to_string(),
        priority: 1,
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn validate_banner(banner: &NewCountdownBanner) -> CommerceResult<()> {
    if banner.title_en.trim().is_empty() || banner.subtitle_en.trim().is_empty() {
        return Err(CommerceError::Validation(
            "Title and subtitle are required".to_string(),
        ));
    }
    if !banner.target_price.is_positive() {
        return Err(CommerceError::Validation(
            "Target price must be greater than zero".to_string(),
        ));
    }
    if banner
        .original_price
        .is_some_and(|original| original < banner.target_price)
    {
        return Err(CommerceError::Validation(
            "Original price cannot be below the target price".to_string(),
        ));
    }
    if banner.background_color.trim().is_empty() || banner.text_color.trim().is_empty() {
        return Err(CommerceError::Validation("Colors are required".to_string()));
    }
    Ok(())
}

fn validate_badge(badge: &NewAnnouncementBadge) -> CommerceResult<()> {
    if badge.text_en.trim().is_empty() {
        return Err(CommerceError::Validation("Badge text is required".to_string()));
    }
    if badge.background_color.trim().is_empty() || badge.text_color.trim().is_empty() {
        return Err(CommerceError::Validation("Colors are required".to_string()));
    }
    Ok(())
}

fn validate_seo(settings: &SeoSettings) -> CommerceResult<()> {
    let title = settings.site_title.trim();
    if title.is_empty() || title.chars().count() > SEO_TITLE_MAX {
        return Err(CommerceError::Validation(format!(
            "Site title must be 1 to {SEO_TITLE_MAX} characters"
        )));
    }
    if settings.site_description.trim().is_empty() {
        return Err(CommerceError::Validation(
            "Site description is required".to_string(),
        ));
    }
    if settings
        .theme_color
        .as_deref()
        .is_some_and(|color| !is_hex_color(color))
    {
        return Err(CommerceError::Validation(
            "Theme color must look like #2563eb".to_string(),
        ));
    }
    Ok(())
}

/// Admin management and public lookups of storefront content.
#[derive(Clone)]
pub struct ContentService {
    store: Store,
}

impl ContentService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // ── Countdown banners ────────────────────────────────────────

    pub fn list_banners(&self) -> CommerceResult<Vec<CountdownBanner>> {
        Ok(self.store.list_countdown_banners()?)
    }

    pub fn create_banner(
        &self,
        banner: &NewCountdownBanner,
        now: DateTime<Utc>,
    ) -> CommerceResult<CountdownBanner> {
        validate_banner(banner)?;
        let created = self.store.create_countdown_banner(banner, now)?;
        info!(banner_id = %created.id, "created countdown banner");
        Ok(created)
    }

    pub fn update_banner(
        &self,
        id: BannerId,
        banner: &NewCountdownBanner,
        now: DateTime<Utc>,
    ) -> CommerceResult<CountdownBanner> {
        validate_banner(banner)?;
        Ok(self.store.update_countdown_banner(id, banner, now)?)
    }

    pub fn delete_banner(&self, id: BannerId) -> CommerceResult<()> {
        self.store.delete_countdown_banner(id)?;
        info!(banner_id = %id, "deleted countdown banner");
        Ok(())
    }

    /// The banner the storefront should show, if any.
    pub fn active_banner(&self, now: DateTime<Utc>) -> CommerceResult<Option<CountdownBanner>> {
        Ok(self.store.active_countdown_banner(now)?)
    }

    /// Sets the first banner's target price and the product price together,
    /// creating a default banner when there is none.
    pub fn sync_banner_price(
        &self,
        price: Money,
        now: DateTime<Utc>,
    ) -> CommerceResult<BannerPriceSync> {
        if !price.is_positive() {
            return Err(CommerceError::Validation(
                "Target price must be greater than zero".to_string(),
            ));
        }
        let first = self.store.list_countdown_banners()?.into_iter().next();
        let (banner, created) = match first {
            Some(banner) => {
                self.store.set_banner_target_price(banner.id, price, now)?;
                let banner = self
                    .store
                    .get_countdown_banner(banner.id)?
                    .ok_or_else(|| StoreError::NotFound(format!("countdown banner {}", banner.id)))?;
                (banner, false)
            }
            None => (
                self.store
                    .create_countdown_banner(&default_banner(price, now), now)?,
                true,
            ),
        };
        let before_price = self.store.active_product(now)?.before_price;
        let product = self.store.update_product_pricing(price, before_price, now)?;
        info!(banner_id = %banner.id, price = %price, created, "synced banner price");
        Ok(BannerPriceSync {
            banner,
            pricing: Pricing {
                name: product.name,
                price: product.price,
                before_price: product.before_price,
                currency: product.currency,
            },
            created,
        })
    }

    // ── Announcement badges ──────────────────────────────────────

    pub fn list_badges(&self) -> CommerceResult<Vec<AnnouncementBadge>> {
        Ok(self.store.list_announcement_badges()?)
    }

    pub fn create_badge(
        &self,
        badge: &NewAnnouncementBadge,
        now: DateTime<Utc>,
    ) -> CommerceResult<AnnouncementBadge> {
        validate_badge(badge)?;
        let created = self.store.create_announcement_badge(badge, now)?;
        info!(badge_id = %created.id, "created announcement badge");
        Ok(created)
    }

    pub fn update_badge(
        &self,
        id: BadgeId,
        badge: &NewAnnouncementBadge,
        now: DateTime<Utc>,
    ) -> CommerceResult<AnnouncementBadge> {
        validate_badge(badge)?;
        Ok(self.store.update_announcement_badge(id, badge, now)?)
    }

    pub fn delete_badge(&self, id: BadgeId) -> CommerceResult<()> {
        self.store.delete_announcement_badge(id)?;
        Ok(())
    }

    pub fn active_badge(&self) -> CommerceResult<Option<AnnouncementBadge>> {
        Ok(self.store.active_announcement_badge()?)
    }

    // ── SEO ──────────────────────────────────────────────────────

    pub fn seo_settings(&self) -> CommerceResult<SeoSettings> {
        Ok(self.store.seo_settings()?)
    }

    /// Applies a partial update: keys present in `changes` replace the
    /// stored values, `null` clears an optional field.
    pub fn update_seo_settings(
        &self,
        changes: &Value,
        now: DateTime<Utc>,
    ) -> CommerceResult<SeoSettings> {
        let Value::Object(changes) = changes else {
            return Err(CommerceError::Validation(
                "SEO settings must be a JSON object".to_string(),
            ));
        };
        let current = self.store.seo_settings()?;
        let mut merged = serde_json::to_value(&current).map_err(StoreError::from)?;
        if let Value::Object(fields) = &mut merged {
            for (key, value) in changes {
                if key != "updatedAt" {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
        let updated: SeoSettings = serde_json::from_value(merged)
            .map_err(|e| CommerceError::Validation(format!("Invalid SEO settings: {e}")))?;
        validate_seo(&updated)?;
        let saved = self.store.save_seo_settings(&updated, now)?;
        info!("updated SEO settings");
        Ok(saved)
    }
}
