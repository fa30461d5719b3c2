mod common;

use common::{config, customer, now, request, BrokenMailer, Harness};
use jobhunter_commerce::{
    AffiliateService, CheckoutService, CommerceError, StripeCompletion, WebhookOutcome,
};
use jobhunter_integrations::{PayPalCapture, StripeEvent};
use jobhunter_store::NewCoupon;
use jobhunter_types::{Currency, DiscountType, Money, OrderStatus, PaymentMethod};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn event(kind: &str, object: serde_json::Value) -> StripeEvent {
    serde_json::from_value(json!({
        "id": "evt_test",
        "type": kind,
        "data": { "object": object },
    }))
    .unwrap()
}

#[tokio::test]
async fn stripe_checkout_creates_pending_order_and_session() {
    let h = Harness::new();

    let started = h
        .checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap();

    assert_eq!(started.session_id, "cs_test_1");
    assert_eq!(
        started.checkout_url.as_deref(),
        Some("https://checkout.stripe.test/cs_test_1")
    );
    let order = h.store.require_order(started.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, PaymentMethod::Stripe);
    assert_eq!(order.final_amount, Money::from_cents(50_000));
    assert_eq!(order.payment_intent_id.as_deref(), Some("cs_test_1"));
    assert_eq!(order.max_downloads, 3);
    assert_eq!(order.download_token.len(), 32);

    let sent = h.stripe.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].amount, Money::from_cents(50_000));
    assert_eq!(
        sent[0].success_url,
        format!(
            "https://shop.test/purchase-success?session_id={{CHECKOUT_SESSION_ID}}&order_id={}",
            order.id
        )
    );
    assert_eq!(sent[0].cancel_url, "https://shop.test/purchase-canceled");
}

#[tokio::test]
async fn coupon_is_applied_on_the_server() {
    let h = Harness::new();
    h.store
        .create_coupon(
            &NewCoupon {
                code: "SAVE10".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: Money::from_cents(1_000),
                usage_limit: None,
                expires_at: None,
            },
            now(),
        )
        .unwrap();
    let mut req = request("buyer@example.com");
    req.coupon_code = Some("save10".to_string());

    let started = h.checkout.start_stripe_checkout(&req, now()).await.unwrap();

    assert_eq!(started.quote.discount, Money::from_cents(5_000));
    let order = h.store.require_order(started.order_id).unwrap();
    assert_eq!(order.original_amount, Money::from_cents(50_000));
    assert_eq!(order.final_amount, Money::from_cents(45_000));
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
}

#[tokio::test]
async fn checkout_rejects_bad_input() {
    let h = Harness::new();

    let err = h
        .checkout
        .start_stripe_checkout(&request("not-an-email"), now())
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)));

    let mut nameless = request("buyer@example.com");
    nameless.customer_name = "  ".to_string();
    let err = h
        .checkout
        .start_stripe_checkout(&nameless, now())
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)));

    h.store
        .create_coupon(
            &NewCoupon {
                code: "FREE".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: Money::from_cents(100_000),
                usage_limit: None,
                expires_at: None,
            },
            now(),
        )
        .unwrap();
    let mut free = request("buyer@example.com");
    free.coupon_code = Some("FREE".to_string());
    let err = h.checkout.start_stripe_checkout(&free, now()).await.unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)));

    assert!(h.stripe.requests().is_empty());
}

#[tokio::test]
async fn stripe_checkout_needs_a_provider() {
    let h = Harness::new();
    let checkout = CheckoutService::new(h.store.clone(), config(), h.mailer.clone(), None);

    let err = checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::Unavailable("Stripe")));
}

#[tokio::test]
async fn completing_a_payment_fulfils_once() {
    let h = Harness::new();
    let started = h
        .checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap();

    let first = h.pay_and_complete(&started).await;
    assert!(!first.already_completed);
    assert_eq!(first.invoice_number.as_deref(), Some("INV-202506-0001"));

    let code = h
        .store
        .get_activation_code(&first.activation_code)
        .unwrap()
        .unwrap();
    assert_eq!(code.order_id, Some(started.order_id));
    assert_eq!(code.max_activations, 1);
    assert!(code.version_token.is_some());

    let order = h.store.require_order(started.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.activation_code.as_deref(), Some(first.activation_code.as_str()));

    let StripeCompletion::Completed(second) = h
        .checkout
        .complete_by_payment_intent(&started.session_id, now())
        .await
        .unwrap()
    else {
        panic!("completed order reported as pending");
    };
    assert!(second.already_completed);
    assert_eq!(second.activation_code, first.activation_code);
    assert_eq!(second.invoice_number, first.invoice_number);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "buyer@example.com");
    assert!(sent[0].html.contains(&first.activation_code));
}

#[tokio::test]
async fn unpaid_session_is_not_fulfilled() {
    let h = Harness::new();
    let started = h
        .checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap();

    let outcome = h
        .checkout
        .complete_by_payment_intent(&started.session_id, now())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        StripeCompletion::Pending {
            order_id: started.order_id,
            payment_status: "unpaid".to_string(),
        }
    );
    let order = h.store.require_order(started.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.activation_code, None);
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn short_payment_is_refused() {
    let h = Harness::new();
    let started = h
        .checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap();
    h.stripe.pay_amount(&started.session_id, Money::from_cents(100));

    let err = h
        .checkout
        .complete_by_payment_intent(&started.session_id, now())
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::Conflict(_)));
    assert!(!h.store.require_order(started.order_id).unwrap().is_completed());
}

#[tokio::test]
async fn unknown_payment_intent_is_not_found() {
    let h = Harness::new();
    let err = h
        .checkout
        .complete_by_payment_intent("pi_missing", now())
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)));
}

#[tokio::test]
async fn fulfilment_activates_the_matching_customer() {
    let h = Harness::new();
    let buyer = customer(&h.store, "buyer@example.com");
    let started = h
        .checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap();

    h.pay_and_complete(&started).await;

    let buyer = h.store.require_customer(buyer.id).unwrap();
    assert!(buyer.extension_activated);
    assert_eq!(buyer.total_spent, Money::from_cents(50_000));
    assert_eq!(buyer.total_orders, 1);
    let order = h.store.require_order(started.order_id).unwrap();
    assert_eq!(order.customer_id, Some(buyer.id));

    let status = h.checkout.purchase_status(&buyer).unwrap();
    assert!(status.has_purchased);
    assert_eq!(status.order_id, Some(order.id));
    assert_eq!(status.activation_code, order.activation_code);
}

#[tokio::test]
async fn referral_earns_the_affiliate_a_commission() {
    let h = Harness::new();
    let affiliate = customer(&h.store, "partner@example.com");
    let affiliate = h.affiliate().enroll(affiliate.id, now()).await.unwrap();
    let mut req = request("buyer@example.com");
    req.referral_code = affiliate.referral_code.clone();

    let started = h.checkout.start_stripe_checkout(&req, now()).await.unwrap();
    h.pay_and_complete(&started).await;

    let stats = h.affiliate().stats(affiliate.id).unwrap();
    assert_eq!(stats.total_referrals, 1);
    assert_eq!(stats.pending, Money::from_cents(5_000));
    assert!(h
        .mailer
        .subjects()
        .contains(&"New Referral Commission Earned!".to_string()));
}

#[tokio::test]
async fn mail_failure_does_not_undo_the_sale() {
    let h = Harness::new();
    let checkout = CheckoutService::new(
        h.store.clone(),
        config(),
        Arc::new(BrokenMailer),
        Some(h.stripe.clone()),
    );
    let started = checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap();

    h.stripe.pay(&started.session_id);

    let done = checkout
        .complete_by_payment_intent(&started.session_id, now())
        .await
        .unwrap();

    assert!(matches!(done, StripeCompletion::Completed(f) if !f.activation_code.is_empty()));
    assert!(h.store.require_order(started.order_id).unwrap().is_completed());
}

#[tokio::test]
async fn webhook_events_drive_order_state() {
    let h = Harness::new();
    let paid = h
        .checkout
        .start_stripe_checkout(&request("paid@example.com"), now())
        .await
        .unwrap();
    let failed = h
        .checkout
        .start_stripe_checkout(&request("failed@example.com"), now())
        .await
        .unwrap();

    let session = |payment_status: &str, amount_total: i64| {
        event(
            "checkout.session.completed",
            json!({
                "id": paid.session_id,
                "object": "checkout.session",
                "payment_status": payment_status,
                "amount_total": amount_total,
                "currency": "eur",
                "metadata": { "order_id": paid.order_id.get().to_string() },
            }),
        )
    };

    let outcome = h
        .checkout
        .handle_stripe_event(&session("unpaid", 50_000), now())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::AwaitingPayment(paid.order_id));

    let outcome = h
        .checkout
        .handle_stripe_event(&session("paid", 1), now())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::AmountMismatch(paid.order_id));
    assert!(!h.store.require_order(paid.order_id).unwrap().is_completed());

    let outcome = h
        .checkout
        .handle_stripe_event(&session("paid", 50_000), now())
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Fulfilled(f) if f.order_id == paid.order_id));

    let outcome = h
        .checkout
        .handle_stripe_event(
            &event("payment_intent.payment_failed", json!({ "id": failed.session_id })),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Failed(failed.order_id));
    assert_eq!(
        h.store.require_order(failed.order_id).unwrap().status,
        OrderStatus::Failed
    );

    let outcome = h
        .checkout
        .handle_stripe_event(
            &event("payment_intent.succeeded", json!({ "id": "pi_unknown" })),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Unmatched);

    let outcome = h
        .checkout
        .handle_stripe_event(&event("customer.created", json!({ "id": "cus_1" })), now())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

fn capture(order_id: &str, status: &str) -> PayPalCapture {
    PayPalCapture {
        order_id: order_id.to_string(),
        status: status.to_string(),
        capture_id: Some("CAP-1".to_string()),
        amount: Some(Money::from_cents(50_000)),
        currency: Some(Currency::parse("eur").unwrap()),
        payer_email: Some("payer@example.com".to_string()),
        payer_name: Some("Pat Payer".to_string()),
    }
}

#[tokio::test]
async fn paypal_capture_completes_the_prepared_order() {
    let h = Harness::new();
    let (order, _) = h
        .checkout
        .start_paypal_order(&request("buyer@example.com"), now())
        .unwrap();
    h.checkout.attach_paypal_order(order.id, "PP-ORDER-1").unwrap();

    let done = h
        .checkout
        .record_paypal_capture(&capture("PP-ORDER-1", "COMPLETED"), None, None, now())
        .await
        .unwrap();

    assert_eq!(done.order_id, order.id);
    let order = h.store.require_order(order.id).unwrap();
    assert_eq!(order.payment_method, PaymentMethod::PayPal);
    assert!(order.is_completed());
}

#[tokio::test]
async fn paypal_capture_without_an_order_creates_one() {
    let h = Harness::new();

    let done = h
        .checkout
        .record_paypal_capture(&capture("PP-NEW", "COMPLETED"), None, None, now())
        .await
        .unwrap();

    let order = h.store.require_order(done.order_id).unwrap();
    assert_eq!(order.customer_email, "payer@example.com");
    assert_eq!(order.customer_name, "Pat Payer");
    assert_eq!(order.paypal_order_id.as_deref(), Some("PP-NEW"));
    assert!(order.is_completed());

    let err = h
        .checkout
        .record_paypal_capture(&capture("PP-PENDING", "PENDING"), None, None, now())
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)));
}

#[tokio::test]
async fn downloads_are_limited_and_need_a_completed_order() {
    let h = Harness::new();
    let started = h
        .checkout
        .start_stripe_checkout(&request("buyer@example.com"), now())
        .await
        .unwrap();
    let token = h.store.require_order(started.order_id).unwrap().download_token;

    assert!(matches!(
        h.checkout.redeem_download(&token, now()),
        Err(CommerceError::Forbidden)
    ));

    h.pay_and_complete(&started).await;
    let remaining: Vec<u32> = (0..3)
        .map(|_| h.checkout.redeem_download(&token, now()).unwrap().downloads_remaining)
        .collect();
    assert_eq!(remaining, vec![2, 1, 0]);
    assert!(matches!(
        h.checkout.redeem_download(&token, now()),
        Err(CommerceError::DownloadLimitReached)
    ));
    assert!(matches!(
        h.checkout.redeem_download("nope", now()),
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn enrolled_affiliate_buying_with_own_code_gets_nothing() {
    let h = Harness::new();
    let buyer = customer(&h.store, "self@example.com");
    let buyer = AffiliateService::new(h.store.clone(), config(), h.mailer.clone())
        .enroll(buyer.id, now())
        .await
        .unwrap();
    let mut req = request("self@example.com");
    req.referral_code = buyer.referral_code.clone();

    let started = h.checkout.start_stripe_checkout(&req, now()).await.unwrap();
    h.pay_and_complete(&started).await;

    assert_eq!(h.affiliate().stats(buyer.id).unwrap().total_referrals, 0);
}
