use chrono::{TimeZone, Utc};
use jobhunter_integrations::stripe::{signature_header, verify_webhook, WEBHOOK_TOLERANCE_SECS};
use jobhunter_integrations::{
    CheckoutProvider, CheckoutSessionRequest, IntegrationError, StripeClient, StripeConfig,
};
use jobhunter_types::{Currency, Money, OrderId};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "whsec_test_secret";

fn payload() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_123", "metadata": { "order_id": "42" } } }
    }))
    .unwrap()
}

fn ts() -> i64 {
    1_750_000_000
}

// ── Webhook verification ────────────────────────────────────────

#[test]
fn verifies_signed_payload() {
    let body = payload();
    let header_value = signature_header(&body, SECRET, ts()).unwrap();
    let now = Utc.timestamp_opt(ts() + 10, 0).unwrap();

    let event = verify_webhook(&body, &header_value, SECRET, now).unwrap();
    assert_eq!(event.id, "evt_1");
    assert_eq!(event.event_type, "checkout.session.completed");
    assert_eq!(event.object_id(), Some("cs_123"));
    assert_eq!(event.order_id(), Some(OrderId::from_raw(42)));
}

#[test]
fn rejects_tampered_payload() {
    let body = payload();
    let header_value = signature_header(&body, SECRET, ts()).unwrap();
    let mut tampered = body.clone();
    tampered.extend_from_slice(b" ");
    let now = Utc.timestamp_opt(ts(), 0).unwrap();

    let err = verify_webhook(&tampered, &header_value, SECRET, now).unwrap_err();
    assert!(matches!(err, IntegrationError::Signature(_)));
}

#[test]
fn rejects_wrong_secret() {
    let body = payload();
    let header_value = signature_header(&body, "whsec_other", ts()).unwrap();
    let now = Utc.timestamp_opt(ts(), 0).unwrap();
    assert!(verify_webhook(&body, &header_value, SECRET, now).is_err());
}

#[test]
fn rejects_stale_timestamp() {
    let body = payload();
    let header_value = signature_header(&body, SECRET, ts()).unwrap();
    let now = Utc.timestamp_opt(ts() + WEBHOOK_TOLERANCE_SECS + 1, 0).unwrap();

    let err = verify_webhook(&body, &header_value, SECRET, now).unwrap_err();
    assert!(err.to_string().contains("tolerance"));
}

#[test]
fn extreme_timestamps_are_refused_without_overflow() {
    let now = Utc.timestamp_opt(ts(), 0).unwrap();
    for t in [i64::MIN, i64::MAX] {
        let err = verify_webhook(b"{}", &format!("t={t},v1=00"), SECRET, now).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }
}

#[test]
fn accepts_any_matching_v1_entry() {
    let body = payload();
    let good = signature_header(&body, SECRET, ts()).unwrap();
    let good_sig = good.split_once("v1=").unwrap().1;
    let header_value = format!("t={},v1={},v1={good_sig}", ts(), "00".repeat(32));
    let now = Utc.timestamp_opt(ts(), 0).unwrap();

    assert!(verify_webhook(&body, &header_value, SECRET, now).is_ok());
}

#[test]
fn rejects_header_without_signature() {
    let now = Utc.timestamp_opt(ts(), 0).unwrap();
    let err = verify_webhook(&payload(), &format!("t={}", ts()), SECRET, now).unwrap_err();
    assert!(matches!(err, IntegrationError::Signature(_)));
    assert!(verify_webhook(&payload(), "v1=abcd", SECRET, now).is_err());
}

#[test]
fn client_without_webhook_secret_cannot_verify() {
    let client = StripeClient::new(StripeConfig {
        secret_key: "sk_test_1".to_string(),
        ..Default::default()
    })
    .unwrap();
    let body = payload();
    let header_value = signature_header(&body, SECRET, ts()).unwrap();
    let now = Utc.timestamp_opt(ts(), 0).unwrap();
    assert!(matches!(
        client.verify_event(&body, &header_value, now),
        Err(IntegrationError::Config(_))
    ));
}

#[test]
fn order_id_ignores_missing_or_invalid_metadata() {
    let event: jobhunter_integrations::StripeEvent = serde_json::from_value(serde_json::json!({
        "id": "evt_2",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_1", "metadata": { "order_id": "abc" } } }
    }))
    .unwrap();
    assert_eq!(event.order_id(), None);
    assert_eq!(event.object_id(), Some("pi_1"));
}

fn event(object: serde_json::Value) -> jobhunter_integrations::StripeEvent {
    serde_json::from_value(serde_json::json!({
        "id": "evt_3",
        "type": "checkout.session.completed",
        "data": { "object": object }
    }))
    .unwrap()
}

#[test]
fn paid_amount_requires_a_paid_object() {
    let paid = event(serde_json::json!({
        "id": "cs_1", "object": "checkout.session",
        "payment_status": "paid", "amount_total": 2999, "currency": "usd"
    }));
    assert_eq!(paid.paid_amount(), Some(Money::from_cents(2_999)));
    assert_eq!(paid.currency(), Some("usd"));

    let unpaid = event(serde_json::json!({
        "id": "cs_2", "object": "checkout.session",
        "payment_status": "unpaid", "amount_total": 2999
    }));
    assert_eq!(unpaid.paid_amount(), None);

    let intent = event(serde_json::json!({
        "id": "pi_1", "object": "payment_intent",
        "status": "succeeded", "amount_received": 4500
    }));
    assert_eq!(intent.paid_amount(), Some(Money::from_cents(4_500)));

    assert_eq!(event(serde_json::json!({ "id": "cs_3" })).paid_amount(), None);
}

// ── Client construction ─────────────────────────────────────────

#[test]
fn config_defaults_to_live_api() {
    let cfg = StripeConfig::default();
    assert_eq!(cfg.api_base_url, "https://api.stripe.com");
    assert!(cfg.webhook_secret.is_none());
}

#[test]
fn empty_secret_key_is_rejected() {
    assert!(matches!(
        StripeClient::new(StripeConfig::default()),
        Err(IntegrationError::Config(_))
    ));
}

// ── Checkout sessions ───────────────────────────────────────────

fn request() -> CheckoutSessionRequest {
    CheckoutSessionRequest {
        order_id: OrderId::from_raw(7),
        product_name: "OCUS Job Hunter".to_string(),
        product_description: Some("Chrome extension".to_string()),
        amount: Money::from_cents(2_999),
        currency: Currency::default(),
        customer_email: "buyer@example.com".to_string(),
        success_url: "https://shop.test/success".to_string(),
        cancel_url: "https://shop.test/cancel".to_string(),
    }
}

#[tokio::test]
async fn creates_checkout_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", "Bearer sk_test_1"))
        .and(body_string_contains("unit_amount%5D=2999"))
        .and(body_string_contains("metadata%5Border_id%5D=7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.com/pay/cs_test_1",
            "object": "checkout.session"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = StripeClient::new(StripeConfig {
        secret_key: "sk_test_1".to_string(),
        webhook_secret: None,
        api_base_url: server.uri(),
    })
    .unwrap();
    let session = client.create_checkout_session(&request()).await.unwrap();
    assert_eq!(session.id, "cs_test_1");
    assert_eq!(
        session.url.as_deref(),
        Some("https://checkout.stripe.com/pay/cs_test_1")
    );
}

#[tokio::test]
async fn checkout_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(402).set_body_string("card_declined"))
        .mount(&server)
        .await;

    let client = StripeClient::new(StripeConfig {
        secret_key: "sk_test_1".to_string(),
        webhook_secret: None,
        api_base_url: server.uri(),
    })
    .unwrap();
    match client.create_checkout_session(&request()).await {
        Err(IntegrationError::Api {
            service,
            status,
            body,
        }) => {
            assert_eq!(service, "stripe");
            assert_eq!(status, 402);
            assert_eq!(body, "card_declined");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn retrieves_session_payment_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_9"))
        .and(header("authorization", "Bearer sk_test_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_9",
            "object": "checkout.session",
            "payment_status": "unpaid",
            "amount_total": 2999,
            "currency": "usd"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = StripeClient::new(StripeConfig {
        secret_key: "sk_test_1".to_string(),
        webhook_secret: None,
        api_base_url: server.uri(),
    })
    .unwrap();
    let status = client.retrieve_checkout_session("cs_test_9").await.unwrap();
    assert_eq!(status.payment_status, "unpaid");
    assert_eq!(status.amount_total, Some(2_999));
    assert_eq!(status.paid_amount(), None);
}
