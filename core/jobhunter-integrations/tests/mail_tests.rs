use jobhunter_integrations::mail::templates::{
    self, AffiliateWelcome, CommissionApproved, PayoutProcessed, PurchaseConfirmation,
    ReferralCommission,
};
use jobhunter_integrations::mail::{escape_html, SUPPORT_FROM};
use jobhunter_integrations::{Email, HttpMailer, HttpMailerConfig, IntegrationError, LogMailer, Mailer};
use jobhunter_types::{Currency, Money, OrderId, Percent};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn email() -> Email {
    Email {
        from: None,
        to: "buyer@example.com".to_string(),
        subject: "Hello".to_string(),
        html: "<p>Hi</p>".to_string(),
    }
}

// ── Transports ──────────────────────────────────────────────────

#[tokio::test]
async fn http_mailer_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_key"))
        .and(body_json(serde_json::json!({
            "from": "noreply@ocusjobhunter.com",
            "to": ["buyer@example.com"],
            "subject": "Hello",
            "html": "<p>Hi</p>"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "m1" })))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = HttpMailer::new(HttpMailerConfig {
        api_key: "re_key".to_string(),
        api_base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();
    mailer.send(&email()).await.unwrap();
}

#[tokio::test]
async fn http_mailer_uses_message_sender_override() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(wiremock::matchers::body_string_contains(SUPPORT_FROM))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = HttpMailer::new(HttpMailerConfig {
        api_key: "re_key".to_string(),
        api_base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();
    let mut message = email();
    message.from = Some(SUPPORT_FROM.to_string());
    mailer.send(&message).await.unwrap();
}

#[tokio::test]
async fn http_mailer_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid from"))
        .mount(&server)
        .await;

    let mailer = HttpMailer::new(HttpMailerConfig {
        api_key: "re_key".to_string(),
        api_base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();
    let err = mailer.send(&email()).await.unwrap_err();
    assert!(matches!(err, IntegrationError::Api { service: "mail", status: 422, .. }));
}

#[test]
fn http_mailer_requires_key() {
    assert!(HttpMailer::new(HttpMailerConfig::default()).is_err());
}

#[tokio::test]
async fn log_mailer_always_succeeds() {
    LogMailer.send(&email()).await.unwrap();
}

// ── Templates ───────────────────────────────────────────────────

#[test]
fn escapes_markup() {
    assert_eq!(
        escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
        "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
    );
}

#[test]
fn purchase_confirmation_includes_code_and_link() {
    let message = templates::purchase_confirmation(
        "buyer@example.com",
        &PurchaseConfirmation {
            customer_name: "<script>x</script>".to_string(),
            order_id: OrderId::from_raw(12),
            amount: Money::from_cents(2_999),
            currency: Currency::default(),
            download_url: "https://shop.test/api/download/tok?a=1&b=2".to_string(),
            max_downloads: 3,
            activation_code: Some("AB12-CD34-EF56-GH78".to_string()),
        },
    );
    assert_eq!(message.to, "buyer@example.com");
    assert!(message.subject.contains("START FREE"));
    assert!(message.html.contains("AB12-CD34-EF56-GH78"));
    assert!(message.html.contains("29.99 USD"));
    assert!(message.html.contains("#12"));
    assert!(message.html.contains("a=1&amp;b=2"));
    assert!(message.html.contains("&lt;script&gt;"));
    assert!(!message.html.contains("<script>"));
}

#[test]
fn purchase_confirmation_without_code_omits_activation_block() {
    let message = templates::purchase_confirmation(
        "buyer@example.com",
        &PurchaseConfirmation {
            customer_name: "Ana".to_string(),
            order_id: OrderId::from_raw(1),
            amount: Money::from_cents(500),
            currency: Currency::default(),
            download_url: "https://shop.test/d".to_string(),
            max_downloads: 3,
            activation_code: None,
        },
    );
    assert!(!message.html.contains("Your Activation Key"));
}

#[test]
fn referral_commission_mail() {
    let message = templates::referral_commission(
        "aff@example.com",
        &ReferralCommission {
            affiliate_name: "Aff".to_string(),
            referral_code: "REFABC".to_string(),
            customer_email: "buyer@example.com".to_string(),
            order_amount: Money::from_cents(2_999),
            commission: Money::from_cents(300),
            base_url: "https://shop.test/".to_string(),
        },
    );
    assert_eq!(message.subject, "New Referral Commission Earned!");
    assert_eq!(message.from.as_deref(), Some(SUPPORT_FROM));
    assert!(message.html.contains("3.00"));
    assert!(message.html.contains("https://shop.test/?ref=REFABC"));
    assert!(message.html.contains("https://shop.test/affiliate"));
}

#[test]
fn commission_approved_offers_payout_over_minimum() {
    let base = CommissionApproved {
        affiliate_name: "Aff".to_string(),
        order_id: OrderId::from_raw(3),
        commission: Money::from_cents(300),
        total_earnings: Money::from_cents(6_000),
        base_url: "https://shop.test".to_string(),
    };
    let over = templates::commission_approved("aff@example.com", &base);
    assert_eq!(over.subject, "Commission Approved - Ready for Payout!");
    assert!(over.html.contains("Request Payout Now"));

    let under = templates::commission_approved(
        "aff@example.com",
        &CommissionApproved {
            total_earnings: Money::from_cents(1_000),
            ..base
        },
    );
    assert!(!under.html.contains("Request Payout Now"));
}

#[test]
fn payout_processed_mail() {
    let message = templates::payout_processed(
        "aff@example.com",
        &PayoutProcessed {
            affiliate_name: "Aff".to_string(),
            amount: Money::from_cents(7_500),
            payment_method: "paypal".to_string(),
            transaction_id: Some("TX-1".to_string()),
            base_url: "https://shop.test".to_string(),
        },
    );
    assert_eq!(message.subject, "Payout Processed Successfully!");
    assert!(message.html.contains("75.00"));
    assert!(message.html.contains("TX-1"));
    assert!(message.html.contains("PayPal account"));
}

#[test]
fn affiliate_welcome_mail() {
    let message = templates::affiliate_welcome(
        "aff@example.com",
        &AffiliateWelcome {
            name: "Aff".to_string(),
            referral_code: "REFXYZ".to_string(),
            commission_rate: Percent::from_basis_points(1_000),
            base_url: "https://shop.test".to_string(),
        },
    );
    assert!(message.html.contains("REFXYZ"));
    assert!(message.html.contains("10.00%"));
}
