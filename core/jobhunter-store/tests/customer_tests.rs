mod common;

use common::{customer, now, store};
use jobhunter_store::{NewCustomer, Store, StoreError};
use jobhunter_types::{Money, Percent, SocialProvider, SubscriptionStatus};
use pretty_assertions::assert_eq;

#[test]
fn create_and_fetch_by_email_ignores_case() {
    let store = store();
    let created = customer(&store, "Ana@Example.com");

    let found = store.get_customer_by_email("ana@example.com").unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.trial_limit, 3);
    assert_eq!(found.subscription_status, SubscriptionStatus::Inactive);
    assert_eq!(found.commission_rate, Percent::from_basis_points(1000));
}

#[test]
fn duplicate_email_is_a_conflict() {
    let store = store();
    customer(&store, "dup@example.com");
    let err = store
        .create_customer(
            &NewCustomer {
                email: "DUP@example.com".to_string(),
                name: "Other".to_string(),
                ..NewCustomer::default()
            },
            now(),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn password_hash_is_never_serialized() {
    let store = store();
    let c = customer(&store, "hidden@example.com");
    let json = serde_json::to_value(&c).unwrap();
    assert!(json.get("passwordHash").is_none());
    assert_eq!(json["email"], "hidden@example.com");
}

#[test]
fn block_and_unblock_round_trip() {
    let store = store();
    let c = customer(&store, "blocked@example.com");

    store
        .set_customer_blocked(c.id, true, Some("chargeback"), now())
        .unwrap();
    let blocked = store.require_customer(c.id).unwrap();
    assert!(blocked.is_blocked);
    assert_eq!(blocked.blocked_reason.as_deref(), Some("chargeback"));
    assert!(!blocked.usage().evaluate().can_use);

    store.set_customer_blocked(c.id, false, None, now()).unwrap();
    let unblocked = store.require_customer(c.id).unwrap();
    assert!(!unblocked.is_blocked);
    assert_eq!(unblocked.blocked_reason, None);
    assert_eq!(unblocked.blocked_at, None);
}

#[test]
fn trial_uses_are_counted_until_activation() {
    let store = store();
    let c = customer(&store, "trial@example.com");

    for _ in 0..3 {
        assert!(store.record_extension_use(c.id, true, now()).unwrap());
    }
    assert!(!store.record_extension_use(c.id, true, now()).unwrap());
    let exhausted = store.require_customer(c.id).unwrap();
    assert_eq!(exhausted.trial_jobs_used, 3);
    assert!(!exhausted.usage().evaluate().can_use);
    // Premium jobs need an activated extension.
    assert!(!store.record_extension_use(c.id, false, now()).unwrap());

    store.set_extension_activated(c.id, true, now()).unwrap();
    let active = store.require_customer(c.id).unwrap();
    assert_eq!(active.subscription_status, SubscriptionStatus::Active);
    assert!(active.usage().evaluate().can_use);
    assert!(store.record_extension_use(c.id, false, now()).unwrap());
    assert_eq!(store.require_customer(c.id).unwrap().extension_usage_count, 4);
}

#[test]
fn concurrent_trial_jobs_stop_at_the_limit() {
    let store = store();
    let c = customer(&store, "race@example.com");
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || store.record_extension_use(c.id, true, now()).unwrap())
        })
        .collect();
    let counted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|counted| *counted)
        .count();
    assert_eq!(counted, 3);
    assert_eq!(store.require_customer(c.id).unwrap().trial_jobs_used, 3);
}

#[test]
fn social_account_links_and_resolves() {
    let store = store();
    let c = customer(&store, "social@example.com");
    store
        .link_social_account(c.id, SocialProvider::GitHub, "gh-42", Some("https://a/x.png"), now())
        .unwrap();

    let found = store
        .get_customer_by_social(SocialProvider::GitHub, "gh-42")
        .unwrap()
        .unwrap();
    assert_eq!(found.id, c.id);
    assert_eq!(found.social_id(SocialProvider::GitHub), Some("gh-42"));
    assert_eq!(found.avatar.as_deref(), Some("https://a/x.png"));
}

#[test]
fn purchases_accumulate_on_the_account() {
    let store = store();
    let c = customer(&store, "buyer@example.com");
    store
        .record_customer_purchase(c.id, Money::from_cents(50_000), now())
        .unwrap();
    store
        .record_customer_purchase(c.id, Money::from_cents(1_999), now())
        .unwrap();

    let c = store.require_customer(c.id).unwrap();
    assert_eq!(c.total_spent, Money::from_cents(51_999));
    assert_eq!(c.total_orders, 2);
    assert_eq!(c.last_order_date, Some(now()));
}

#[test]
fn referral_code_lookup_is_case_insensitive() {
    let store = store();
    let c = customer(&store, "aff@example.com");
    store
        .set_referral_code(c.id, "AB12CD34", Percent::from_basis_points(1500), now())
        .unwrap();

    let found = store.get_customer_by_referral_code("ab12cd34").unwrap().unwrap();
    assert_eq!(found.id, c.id);
    assert_eq!(found.commission_rate, Percent::from_basis_points(1500));
}

#[test]
fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobhunter.db");
    {
        let store = Store::open(&path).unwrap();
        customer(&store, "persist@example.com");
    }
    let reopened = Store::open(&path).unwrap();
    assert_eq!(reopened.count_customers().unwrap(), 1);
}

#[test]
fn deleting_missing_customer_is_not_found() {
    let store = store();
    let err = store
        .delete_customer(jobhunter_types::CustomerId::from_raw(99))
        .unwrap_err();
    assert!(err.is_not_found());
}
