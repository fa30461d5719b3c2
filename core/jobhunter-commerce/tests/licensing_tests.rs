mod common;

use chrono::Duration;
use common::{customer, now, store};
use ed25519_dalek::SigningKey;
use jobhunter_commerce::{
    CommerceError, InstallationPing, LicensingService, UsageReport,
};
use jobhunter_license::{ActivationError, CertificateStatus, DeviceDecision, LicenseCertificate};
use jobhunter_store::{NewActivationCode, Store};
use jobhunter_types::{CustomerId, InstallationId};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

fn issue_code(store: &Store, code: &str, customer: Option<CustomerId>) {
    store
        .create_activation_code(
            &NewActivationCode {
                code: code.to_string(),
                customer_id: customer,
                order_id: None,
                installation_id: None,
                version_token: None,
                max_activations: 1,
                expires_at: None,
            },
            now(),
        )
        .unwrap();
}

fn report() -> UsageReport {
    UsageReport {
        session_id: "sess-1".to_string(),
        jobs_used: 1,
        platform: "ocus".to_string(),
        ..UsageReport::default()
    }
}

#[test]
fn validation_binds_activates_customer_and_signs_certificate() {
    let store = store();
    let buyer = customer(&store, "buyer@example.com");
    issue_code(&store, "OCUS-1-AAAAAAAA", Some(buyer.id));
    let key = signing_key();
    let service = LicensingService::new(store.clone(), Some(Arc::new(key.clone())));
    let install = InstallationId::new();

    let license = service.validate("OCUS-1-AAAAAAAA", install, now()).unwrap();
    assert!(license.grant.newly_bound);
    assert_eq!(license.customer_id, Some(buyer.id));

    let raw = license.certificate.unwrap();
    let cert = LicenseCertificate::parse_with_key(&raw, key.verifying_key().as_bytes()).unwrap();
    assert_eq!(cert.claims().installation_id, install);
    assert_eq!(cert.status(now()), CertificateStatus::Valid);

    let buyer = store.require_customer(buyer.id).unwrap();
    assert!(buyer.extension_activated);
    assert!(store.get_installation(install).unwrap().is_some());
}

#[test]
fn bound_installation_keeps_validating() {
    let store = store();
    issue_code(&store, "OCUS-2-BBBBBBBB", None);
    let service = LicensingService::new(store, None);
    let install = InstallationId::new();

    service.validate("OCUS-2-BBBBBBBB", install, now()).unwrap();
    let again = service
        .validate("OCUS-2-BBBBBBBB", install, now() + Duration::hours(1))
        .unwrap();
    assert!(!again.grant.newly_bound);
    assert_eq!(again.grant.activation_count, 1);
    assert_eq!(again.grant.daily_validation_count, 2);
    assert!(again.certificate.is_none());

    let err = service
        .validate("OCUS-2-BBBBBBBB", InstallationId::new(), now())
        .unwrap_err();
    assert!(matches!(
        err,
        CommerceError::Activation(ActivationError::BoundElsewhere)
    ));
}

#[test]
fn unknown_and_revoked_codes_are_refused() {
    let store = store();
    issue_code(&store, "OCUS-3-CCCCCCCC", None);
    let service = LicensingService::new(store.clone(), None);

    let err = service
        .validate("OCUS-0-00000000", InstallationId::new(), now())
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid activation code");

    let id = store.get_activation_code("OCUS-3-CCCCCCCC").unwrap().unwrap().id;
    let revoked = service.revoke(id).unwrap();
    assert!(revoked.is_revoked);
    let err = service
        .validate("OCUS-3-CCCCCCCC", InstallationId::new(), now())
        .unwrap_err();
    assert_eq!(err.to_string(), "Activation code has been revoked");
}

#[test]
fn direct_activation_uses_the_only_slot() {
    let store = store();
    issue_code(&store, "OCUS-4-DDDDDDDD", None);
    let service = LicensingService::new(store, None);

    let code = service
        .activate_device("OCUS-4-DDDDDDDD", "device-a", Some("10.0.0.1"), now())
        .unwrap();
    assert_eq!(code.activation_count, 1);
    assert_eq!(code.device_id.as_deref(), Some("device-a"));

    let err = service
        .activate_device("OCUS-4-DDDDDDDD", "device-b", None, now())
        .unwrap_err();
    assert!(matches!(
        err,
        CommerceError::Activation(ActivationError::MaxActivations)
    ));
}

#[test]
fn trial_customers_are_cut_off_after_three_jobs() {
    let store = store();
    let user = customer(&store, "trial@example.com");
    let service = LicensingService::new(store, None);

    for used in 1..=3 {
        let decision = service.record_usage(user.id, &report(), now()).unwrap();
        assert_eq!(decision.trial_used, Some(used));
    }
    let decision = service.check_usage(user.id).unwrap();
    assert!(!decision.can_use);

    let err = service.record_usage(user.id, &report(), now()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Trial limit exceeded. Please purchase activation code."
    );
}

#[test]
fn parallel_jobs_cannot_overrun_the_trial() {
    let store = store();
    let user = customer(&store, "burst@example.com");
    let service = Arc::new(LicensingService::new(store.clone(), None));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.record_usage(user.id, &report(), now()).is_ok())
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 3);
    assert_eq!(store.require_customer(user.id).unwrap().trial_jobs_used, 3);
    assert_eq!(store.count_usage_jobs(user.id).unwrap(), 3);
}

#[test]
fn premium_customers_are_not_counted_against_the_trial() {
    let store = store();
    let user = customer(&store, "premium@example.com");
    store.set_extension_activated(user.id, true, now()).unwrap();
    let service = LicensingService::new(store.clone(), None);

    for _ in 0..5 {
        let decision = service.record_usage(user.id, &report(), now()).unwrap();
        assert!(decision.premium);
    }
    assert_eq!(store.require_customer(user.id).unwrap().trial_jobs_used, 0);
    assert_eq!(store.count_usage_jobs(user.id).unwrap(), 5);
}

#[test]
fn unknown_customer_cannot_use_the_extension() {
    let service = LicensingService::new(store(), None);
    let decision = service.check_usage(CustomerId::from_raw(999)).unwrap();
    assert!(!decision.can_use);
    assert_eq!(decision.reason.as_deref(), Some("Customer not found"));
}

#[test]
fn anonymous_trial_expires_on_third_use() {
    let service = LicensingService::new(store(), None);

    let first = service.use_trial("ext-1", "fp-1", now()).unwrap();
    assert!(first.allowed);
    assert_eq!(first.remaining, 2);
    service.use_trial("ext-1", "fp-1", now()).unwrap();
    let third = service.use_trial("ext-1", "fp-1", now()).unwrap();
    assert!(third.allowed);
    assert!(third.is_expired);

    let fourth = service.use_trial("ext-1", "fp-1", now()).unwrap();
    assert!(!fourth.allowed);
    assert_eq!(fourth.usage_count, 3);

    // A different fingerprint has its own trial.
    assert!(service.use_trial("ext-1", "fp-2", now()).unwrap().allowed);
}

#[test]
fn premium_access_is_limited_to_one_device() {
    let service = LicensingService::new(store(), None);

    assert_eq!(
        service
            .validate_premium_device("user-1", "fp-a", "ext", now())
            .unwrap(),
        DeviceDecision::Register
    );
    assert_eq!(
        service
            .validate_premium_device("user-1", "fp-a", "ext", now())
            .unwrap(),
        DeviceDecision::AlreadyAuthorized
    );
    assert_eq!(
        service
            .validate_premium_device("user-1", "fp-b", "ext", now())
            .unwrap(),
        DeviceDecision::Denied {
            max_devices: 1,
            current_devices: 1
        }
    );
    assert!(service.device_heartbeat("user-1", "fp-a", now()).unwrap());
    assert!(!service.device_heartbeat("user-1", "fp-b", now()).unwrap());

    assert!(service
        .deactivate_premium_device("user-1", "fp-a", "switched device", now())
        .unwrap());
    assert_eq!(
        service
            .validate_premium_device("user-1", "fp-b", "ext", now())
            .unwrap(),
        DeviceDecision::Register
    );
}

#[test]
fn installation_ping_is_upserted() {
    let store = store();
    let user = customer(&store, "install@example.com");
    let service = LicensingService::new(store, None);
    let id = InstallationId::new();

    service
        .register_installation(
            &InstallationPing {
                installation_id: id,
                customer_id: None,
                device_fingerprint: Some("fp".to_string()),
                user_agent: Some("Chrome".to_string()),
                ip_address: None,
                extension_version: Some("2.1.0".to_string()),
            },
            now(),
        )
        .unwrap();
    let updated = service
        .register_installation(
            &InstallationPing {
                installation_id: id,
                customer_id: Some(user.id),
                device_fingerprint: None,
                user_agent: None,
                ip_address: None,
                extension_version: Some("2.2.0".to_string()),
            },
            now() + Duration::minutes(5),
        )
        .unwrap();
    assert_eq!(updated.customer_id, Some(user.id));
    assert_eq!(updated.device_fingerprint.as_deref(), Some("fp"));
    assert_eq!(updated.extension_version.as_deref(), Some("2.2.0"));
}
