//! Card and PayPal checkout, the Stripe webhook and download links.

use crate::auth::OptionalCustomer;
use crate::error::{ApiError, ApiResult};
use crate::routes::optional_body;
use crate::state::SharedState;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use chrono::Utc;
use jobhunter_commerce::{
    CheckoutRequest, CheckoutStarted, Fulfilment, StripeCompletion, WebhookOutcome,
};
use jobhunter_integrations::PayPalIntent;
use jobhunter_integrations::stripe::verify_webhook;
use jobhunter_store::Customer;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody {
    customer_email: Option<String>,
    customer_name: Option<String>,
    coupon_code: Option<String>,
    referral_code: Option<String>,
}

impl CheckoutBody {
    /// Signed-in buyers default to their account details.
    fn into_request(self, customer: Option<&Customer>) -> CheckoutRequest {
        CheckoutRequest {
            customer_email: self
                .customer_email
                .or_else(|| customer.map(|c| c.email.clone()))
                .unwrap_or_default(),
            customer_name: self
                .customer_name
                .or_else(|| customer.map(|c| c.name.clone()))
                .unwrap_or_default(),
            coupon_code: self.coupon_code,
            referral_code: self.referral_code,
            customer_id: customer.map(|c| c.id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteStripeBody {
    payment_intent_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CaptureBody {
    customer_email: Option<String>,
    customer_name: Option<String>,
}

async fn create_payment_intent(
    State(state): State<SharedState>,
    OptionalCustomer(customer): OptionalCustomer,
    Json(body): Json<CheckoutBody>,
) -> ApiResult<Json<CheckoutStarted>> {
    let request = body.into_request(customer.as_ref());
    Ok(Json(
        state
            .checkout
            .start_stripe_checkout(&request, Utc::now())
            .await?,
    ))
}

/// 200 with the fulfilment once Stripe reports the session paid, 202 while
/// it is still unpaid.
async fn complete_stripe_payment(
    State(state): State<SharedState>,
    Json(body): Json<CompleteStripeBody>,
) -> ApiResult<(StatusCode, Json<StripeCompletion>)> {
    if body.payment_intent_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Payment intent id is required".to_string(),
        ));
    }
    let completion = state
        .checkout
        .complete_by_payment_intent(&body.payment_intent_id, Utc::now())
        .await?;
    let status = match completion {
        StripeCompletion::Completed(_) => StatusCode::OK,
        StripeCompletion::Pending { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(completion)))
}

async fn create_paypal_order(
    State(state): State<SharedState>,
    OptionalCustomer(customer): OptionalCustomer,
    Json(body): Json<CheckoutBody>,
) -> ApiResult<Json<Value>> {
    let paypal = state.paypal.as_ref().ok_or(ApiError::Unavailable("PayPal"))?;
    let request = body.into_request(customer.as_ref());
    let (order, quote) = state.checkout.start_paypal_order(&request, Utc::now())?;
    let created = paypal
        .create_order(order.final_amount, &order.currency, PayPalIntent::Capture)
        .await?;
    state.checkout.attach_paypal_order(order.id, &created.id)?;
    info!(order_id = %order.id, paypal_order_id = %created.id, "PayPal order created");
    Ok(Json(json!({
        "id": created.id,
        "status": created.status,
        "approveUrl": created.approve_url,
        "orderId": order.id,
        "quote": quote,
    })))
}

async fn capture_paypal_order(
    State(state): State<SharedState>,
    Path(paypal_order_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Fulfilment>> {
    let paypal = state.paypal.as_ref().ok_or(ApiError::Unavailable("PayPal"))?;
    let extra: CaptureBody = optional_body(&body)?;
    let capture = paypal.capture_order(paypal_order_id.trim()).await?;
    Ok(Json(
        state
            .checkout
            .record_paypal_capture(
                &capture,
                extra.customer_email.as_deref(),
                extra.customer_name.as_deref(),
                Utc::now(),
            )
            .await?,
    ))
}

async fn stripe_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Bytes,
) -> ApiResult<Json<Value>> {
    let secret = state
        .stripe_webhook_secret
        .as_deref()
        .ok_or(ApiError::Unavailable("Stripe webhook"))?;
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;
    let now = Utc::now();
    let event = verify_webhook(&payload, signature, secret, now).map_err(|e| {
        warn!(error = %e, "rejected Stripe webhook");
        ApiError::BadRequest("Webhook signature verification failed".to_string())
    })?;

    match state.checkout.handle_stripe_event(&event, now).await? {
        WebhookOutcome::Fulfilled(fulfilment) => {
            info!(event_id = %event.id, order_id = %fulfilment.order_id, "webhook fulfilled order");
        }
        WebhookOutcome::Failed(order_id) => {
            info!(event_id = %event.id, order_id = %order_id, "webhook recorded failed payment");
        }
        WebhookOutcome::AwaitingPayment(order_id) => {
            info!(event_id = %event.id, order_id = %order_id, "webhook order awaiting payment");
        }
        WebhookOutcome::AmountMismatch(order_id) => {
            warn!(event_id = %event.id, order_id = %order_id, "webhook payment does not match order");
        }
        WebhookOutcome::Unmatched | WebhookOutcome::Ignored => {}
    }
    Ok(Json(json!({ "received": true })))
}

async fn download(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> ApiResult<Json<Value>> {
    let grant = state.checkout.redeem_download(&token, Utc::now())?;
    Ok(Json(json!({
        "orderId": grant.order_id,
        "fileName": grant.file_name,
        "downloadsRemaining": grant.downloads_remaining,
    })))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/create-payment-intent", post(create_payment_intent))
        .route("/api/complete-stripe-payment", post(complete_stripe_payment))
        .route("/api/paypal/order", post(create_paypal_order))
        .route("/api/paypal/order/{id}/capture", post(capture_paypal_order))
        .route("/api/stripe/webhook", post(stripe_webhook))
        .route("/api/download/{token}", get(download))
}
