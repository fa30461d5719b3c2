mod common;

use chrono::Duration;
use common::{noon, test_keypair};
use jobhunter_license::{
    CertificateClaims, CertificateStatus, LicenseCertificate, LicenseError,
    CERTIFICATE_LIFETIME_SECS,
};
use jobhunter_types::{CustomerId, InstallationId};

fn claims() -> CertificateClaims {
    CertificateClaims::new(
        "OCUS-1-ABCDEF01",
        InstallationId::new(),
        Some(CustomerId::from_raw(4)),
        noon(),
    )
}

#[test]
fn issue_then_verify() {
    let (sk, pk) = test_keypair();
    let claims = claims();
    let cert = LicenseCertificate::issue(&sk, claims.clone()).unwrap();
    let parsed = LicenseCertificate::parse_with_key(cert.raw(), &pk).unwrap();
    assert_eq!(parsed.claims(), &claims);
    assert_eq!(claims.exp - claims.iat, CERTIFICATE_LIFETIME_SECS);
}

#[test]
fn tampered_claims_rejected() {
    let (sk, pk) = test_keypair();
    let cert = LicenseCertificate::issue(&sk, claims()).unwrap();
    let (_, sig) = cert.raw().split_once('.').unwrap();
    let forged = format!("eyJjb2RlIjoiWCJ9.{sig}");
    assert!(matches!(
        LicenseCertificate::parse_with_key(&forged, &pk),
        Err(LicenseError::InvalidSignature)
    ));
}

#[test]
fn malformed_tokens_rejected() {
    let (_, pk) = test_keypair();
    for token in ["", "no-dot", "a.b.c", "abc.!!!"] {
        assert!(LicenseCertificate::parse_with_key(token, &pk).is_err(), "{token}");
    }
}

#[test]
fn wrong_key_rejected() {
    let (sk, _) = test_keypair();
    let other = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
    let cert = LicenseCertificate::issue(&sk, claims()).unwrap();
    let result = LicenseCertificate::parse_with_key(cert.raw(), &other.verifying_key().to_bytes());
    assert!(matches!(result, Err(LicenseError::InvalidSignature)));
}

#[test]
fn status_moves_through_grace() {
    let (sk, _) = test_keypair();
    let cert = LicenseCertificate::issue(&sk, claims()).unwrap();

    assert_eq!(cert.status(noon() + Duration::days(6)), CertificateStatus::Valid);
    assert_eq!(
        cert.status(noon() + Duration::days(8)),
        CertificateStatus::Grace { days_remaining: 2 }
    );
    assert_eq!(cert.status(noon() + Duration::days(11)), CertificateStatus::Expired);
    assert!(!CertificateStatus::Expired.is_usable());
}

#[test]
fn signing_key_from_hex_seed() {
    let (sk, _) = test_keypair();
    let seed_hex = hex::encode(sk.to_bytes());
    let loaded = LicenseCertificate::signing_key_from_hex(&seed_hex).unwrap();
    assert_eq!(loaded.to_bytes(), sk.to_bytes());
    assert!(LicenseCertificate::signing_key_from_hex("abcd").is_err());
    assert!(LicenseCertificate::signing_key_from_hex("zz").is_err());
}
