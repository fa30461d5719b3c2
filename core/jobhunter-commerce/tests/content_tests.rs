mod common;

use chrono::Duration;
use common::{now, store};
use jobhunter_commerce::{CommerceError, ContentService};
use jobhunter_store::{NewAnnouncementBadge, NewCountdownBanner, Translations};
use jobhunter_types::Money;
use pretty_assertions::assert_eq;
use serde_json::json;

fn banner(target: i64) -> NewCountdownBanner {
    NewCountdownBanner {
        is_enabled: true,
        title_en: "Launch week".to_string(),
        subtitle_en: "Save on the extension".to_string(),
        title_translations: Translations::new(),
        subtitle_translations: Translations::new(),
        target_price: Money::from_cents(target),
        original_price: Some(Money::from_cents(29_999)),
        end_date_time: now() + Duration::days(5),
        background_color: "gradient-primary".to_string(),
        text_color: "white".to_string(),
        priority: 1,
    }
}

#[test]
fn sync_creates_a_default_banner_and_reprices_the_product() {
    let store = store();
    let content = ContentService::new(store.clone());

    let synced = content
        .sync_banner_price(Money::from_cents(14_900), now())
        .unwrap();

    assert!(synced.created);
    assert_eq!(synced.banner.title_en, "Limited Time Offer!");
    assert_eq!(synced.banner.target_price, Money::from_cents(14_900));
    assert_eq!(synced.banner.original_price, Some(Money::from_cents(29_999)));
    assert_eq!(synced.banner.end_date_time, now() + Duration::days(7));
    assert_eq!(synced.banner.background_color, "#FF6B35");
    assert_eq!(synced.pricing.price, Money::from_cents(14_900));
    assert_eq!(store.active_product(now()).unwrap().price, Money::from_cents(14_900));
}

#[test]
fn sync_updates_the_first_banner_and_keeps_the_before_price() {
    let store = store();
    let content = ContentService::new(store.clone());
    store
        .update_product_pricing(Money::from_cents(50_000), Some(Money::from_cents(60_000)), now())
        .unwrap();
    let first = content.create_banner(&banner(19_900), now()).unwrap();
    let second = content
        .create_banner(&banner(17_900), now() + Duration::minutes(1))
        .unwrap();

    let synced = content
        .sync_banner_price(Money::from_cents(24_900), now())
        .unwrap();

    assert!(!synced.created);
    assert_eq!(synced.banner.id, first.id);
    assert_eq!(synced.banner.target_price, Money::from_cents(24_900));
    assert_eq!(synced.pricing.before_price, Some(Money::from_cents(60_000)));
    let untouched = store.get_countdown_banner(second.id).unwrap().unwrap();
    assert_eq!(untouched.target_price, Money::from_cents(17_900));
    assert_eq!(content.list_banners().unwrap().len(), 2);
}

#[test]
fn sync_refuses_non_positive_prices() {
    let content = ContentService::new(store());
    let err = content.sync_banner_price(Money::ZERO, now()).unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)));
    assert!(content.list_banners().unwrap().is_empty());
}

#[test]
fn banner_validation() {
    let content = ContentService::new(store());

    let mut blank = banner(19_900);
    blank.title_en = "  ".to_string();
    assert!(matches!(
        content.create_banner(&blank, now()),
        Err(CommerceError::Validation(_))
    ));

    let mut inverted = banner(39_900);
    inverted.original_price = Some(Money::from_cents(29_999));
    assert!(matches!(
        content.create_banner(&inverted, now()),
        Err(CommerceError::Validation(_))
    ));

    let created = content.create_banner(&banner(19_900), now()).unwrap();
    content.delete_banner(created.id).unwrap();
    assert!(matches!(
        content.delete_banner(created.id),
        Err(CommerceError::NotFound(_))
    ));
}

#[test]
fn badge_text_is_required() {
    let content = ContentService::new(store());
    let badge = NewAnnouncementBadge {
        is_enabled: true,
        text_en: String::new(),
        text_translations: Translations::new(),
        background_color: "gradient-primary".to_string(),
        text_color: "white".to_string(),
        priority: 1,
    };
    assert!(matches!(
        content.create_badge(&badge, now()),
        Err(CommerceError::Validation(_))
    ));

    let badge = NewAnnouncementBadge {
        text_en: "New: Firefox support".to_string(),
        ..badge
    };
    let created = content.create_badge(&badge, now()).unwrap();
    assert_eq!(content.active_badge().unwrap(), Some(created));
}

#[test]
fn seo_partial_update_keeps_other_fields() {
    let content = ContentService::new(store());

    let updated = content
        .update_seo_settings(
            &json!({ "siteTitle": "Job Hunter", "ogImageAlt": "Extension screenshot" }),
            now(),
        )
        .unwrap();
    assert_eq!(updated.site_title, "Job Hunter");
    assert_eq!(updated.og_image_alt.as_deref(), Some("Extension screenshot"));
    assert_eq!(updated.meta_robots.as_deref(), Some("index, follow"));
    assert_eq!(updated.updated_at, Some(now()));

    let cleared = content
        .update_seo_settings(&json!({ "ogImageAlt": null }), now())
        .unwrap();
    assert_eq!(cleared.og_image_alt, None);
    assert_eq!(cleared.site_title, "Job Hunter");
    assert_eq!(content.seo_settings().unwrap(), cleared);
}

#[test]
fn seo_update_rejects_bad_values() {
    let content = ContentService::new(store());
    for changes in [
        json!({ "siteTitle": "" }),
        json!({ "siteTitle": null }),
        json!({ "themeColor": "blue" }),
        json!({ "siteTitle": "x".repeat(101) }),
        json!(["not", "an", "object"]),
    ] {
        assert!(
            matches!(
                content.update_seo_settings(&changes, now()),
                Err(CommerceError::Validation(_))
            ),
            "{changes}"
        );
    }
    assert_eq!(content.seo_settings().unwrap().updated_at, None);
}
