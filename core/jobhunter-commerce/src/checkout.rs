//! Orders, payment completion and fulfilment.
//!
//! An order is created `pending` when checkout starts and becomes
//! `completed` exactly once, whichever of the Stripe webhook, the manual
//! completion call or a PayPal capture gets there first. Stripe orders are
//! only completed once Stripe reports the full amount as paid.
//!
//! Completion and the activation code are written in one transaction.
//! The side effects that follow (referral, invoice, confirmation email)
//! are logged when they fail and do not undo the sale.

use crate::affiliate::AffiliateService;
use crate::error::{CommerceError, CommerceResult};
use crate::invoices::InvoiceService;
use crate::pricing::{CatalogService, Quote};
use crate::{looks_like_email, CommerceConfig};
use chrono::{DateTime, Utc};
use jobhunter_integrations::mail::templates::{self, PurchaseConfirmation};
use jobhunter_integrations::{
    CheckoutProvider, CheckoutSessionRequest, Mailer, PayPalCapture, StripeEvent,
};
use jobhunter_license::{
    generate_activation_code, generate_version_token, DEFAULT_MAX_ACTIVATIONS,
};
use jobhunter_store::{Customer, NewActivationCode, NewOrder, Order, Store};
use jobhunter_types::{CustomerId, Money, OrderId, OrderStatus, PaymentMethod};
use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Smallest chargeable amount.
const MINIMUM_CHARGE: Money = Money::from_cents(1);

/// What a buyer submits to start checkout.
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    pub customer_email: String,
    pub customer_name: String,
    pub coupon_code: Option<String>,
    pub referral_code: Option<String>,
    pub customer_id: Option<CustomerId>,
}

/// A hosted checkout the buyer should be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStarted {
    pub session_id: String,
    pub checkout_url: Option<String>,
    pub order_id: OrderId,
    pub quote: Quote,
}

/// The result of completing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fulfilment {
    pub order_id: OrderId,
    pub activation_code: String,
    pub download_url: String,
    pub invoice_number: Option<String>,
    /// True when the order had already been completed earlier.
    pub already_completed: bool,
}

/// Result of asking for a Stripe order to be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StripeCompletion {
    Completed(Fulfilment),
    /// Stripe has not collected the payment yet; the webhook completes
    /// the order once it does.
    #[serde(rename_all = "camelCase")]
    Pending {
        order_id: OrderId,
        payment_status: String,
    },
}

/// What a Stripe webhook did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Fulfilled(Fulfilment),
    Failed(OrderId),
    /// The event's object is not paid yet.
    AwaitingPayment(OrderId),
    /// The paid amount or currency differs from the order.
    AmountMismatch(OrderId),
    /// The event refers to an order this shop does not know.
    Unmatched,
    /// The event type is not one the shop acts on.
    Ignored,
}

/// A permitted download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadGrant {
    pub order_id: OrderId,
    pub file_name: String,
    pub downloads_remaining: u32,
}

/// Purchase summary for a signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseStatus {
    pub has_purchased: bool,
    pub extension_activated: bool,
    pub order_id: Option<OrderId>,
    pub activation_code: Option<String>,
    pub purchased_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Store,
    config: CommerceConfig,
    catalog: CatalogService,
    affiliate: AffiliateService,
    invoices: InvoiceService,
    mailer: Arc<dyn Mailer>,
    stripe: Option<Arc<dyn CheckoutProvider>>,
}

fn download_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether `paid` (in `currency`, when reported) settles `order`.
fn paid_in_full(order: &Order, paid: Money, currency: Option<&str>) -> bool {
    let same_currency =
        currency.is_none_or(|c| c.eq_ignore_ascii_case(order.currency.as_str()));
    if paid == order.final_amount && same_currency {
        return true;
    }
    error!(
        order_id = %order.id,
        paid = %paid,
        expected = %order.final_amount,
        currency = ?currency,
        "payment does not match the order"
    );
    false
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CheckoutService {
    pub fn new(
        store: Store,
        config: CommerceConfig,
        mailer: Arc<dyn Mailer>,
        stripe: Option<Arc<dyn CheckoutProvider>>,
    ) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            affiliate: AffiliateService::new(store.clone(), config.clone(), Arc::clone(&mailer)),
            invoices: InvoiceService::new(store.clone(), config.clone()),
            store,
            config,
            mailer,
            stripe,
        }
    }

    fn validate(request: &CheckoutRequest) -> CommerceResult<()> {
        if !looks_like_email(&request.customer_email) {
            return Err(CommerceError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if request.customer_name.trim().is_empty() {
            return Err(CommerceError::Validation("Name is required".to_string()));
        }
        Ok(())
    }

    /// Validates the request, prices it against the active product and
    /// stores a pending order.
    fn create_pending_order(
        &self,
        request: &CheckoutRequest,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> CommerceResult<(Order, Quote)> {
        Self::validate(request)?;
        let product = self.store.active_product(now)?;
        let quote = self
            .catalog
            .quote(request.coupon_code.as_deref(), product.price, now)?;
        if quote.final_amount < MINIMUM_CHARGE {
            return Err(CommerceError::Validation(
                "Amount must be at least 0.01".to_string(),
            ));
        }
        let order = self.store.create_order(
            &NewOrder {
                customer_id: request.customer_id,
                customer_email: request.customer_email.trim().to_string(),
                customer_name: request.customer_name.trim().to_string(),
                original_amount: quote.original_amount,
                final_amount: quote.final_amount,
                discount_amount: quote.discount,
                coupon_code: trimmed(request.coupon_code.as_ref()).map(|c| c.to_ascii_uppercase()),
                referral_code: trimmed(request.referral_code.as_ref()),
                currency: product.currency,
                status: OrderStatus::Pending,
                payment_method,
                payment_intent_id: None,
                paypal_order_id: None,
                download_token: download_token(),
                max_downloads: self.config.max_downloads,
            },
            now,
        )?;
        info!(order_id = %order.id, amount = %order.final_amount, method = %payment_method, "created pending order");
        Ok((order, quote))
    }

    /// Opens a Stripe Checkout session for a new pending order.
    pub async fn start_stripe_checkout(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> CommerceResult<CheckoutStarted> {
        let stripe = self.stripe.as_ref().ok_or(CommerceError::Unavailable("Stripe"))?;
        let (order, quote) = self.create_pending_order(request, PaymentMethod::Stripe, now)?;
        let product = self.store.active_product(now)?;

        let session = stripe
            .create_checkout_session(&CheckoutSessionRequest {
                order_id: order.id,
                product_name: product.name,
                product_description: Some(product.description),
                amount: order.final_amount,
                currency: order.currency.clone(),
                customer_email: order.customer_email.clone(),
                success_url: self.config.url(&format!(
                    "/purchase-success?session_id={{CHECKOUT_SESSION_ID}}&order_id={}",
                    order.id
                )),
                cancel_url: self.config.url("/purchase-canceled"),
            })
            .await?;
        self.store.set_order_payment_intent(order.id, &session.id)?;
        info!(order_id = %order.id, session_id = %session.id, "stripe checkout started");

        Ok(CheckoutStarted {
            session_id: session.id,
            checkout_url: session.url,
            order_id: order.id,
            quote,
        })
    }

    /// Stores a pending PayPal order; the caller creates the PayPal side
    /// and attaches its id with [`attach_paypal_order`](Self::attach_paypal_order).
    pub fn start_paypal_order(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> CommerceResult<(Order, Quote)> {
        self.create_pending_order(request, PaymentMethod::PayPal, now)
    }

    pub fn attach_paypal_order(&self, order: OrderId, paypal_order_id: &str) -> CommerceResult<()> {
        Ok(self.store.set_order_paypal_id(order, paypal_order_id)?)
    }

    /// Completes the order paid through `payment_intent_id` (the Checkout
    /// session id) once Stripe confirms the payment. Repeated calls return
    /// the original fulfilment.
    pub async fn complete_by_payment_intent(
        &self,
        payment_intent_id: &str,
        now: DateTime<Utc>,
    ) -> CommerceResult<StripeCompletion> {
        let order = self
            .store
            .get_order_by_payment_intent(payment_intent_id.trim())?
            .ok_or_else(|| CommerceError::NotFound("Order".to_string()))?;
        if order.is_completed() {
            return self.existing_fulfilment(order.id).map(StripeCompletion::Completed);
        }
        let stripe = self.stripe.as_ref().ok_or(CommerceError::Unavailable("Stripe"))?;
        let session = stripe
            .retrieve_checkout_session(payment_intent_id.trim())
            .await?;
        let Some(paid) = session.paid_amount() else {
            info!(order_id = %order.id, payment_status = %session.payment_status, "checkout session not paid yet");
            return Ok(StripeCompletion::Pending {
                order_id: order.id,
                payment_status: session.payment_status,
            });
        };
        if !paid_in_full(&order, paid, session.currency.as_deref()) {
            return Err(CommerceError::Conflict(
                "Paid amount does not match the order".to_string(),
            ));
        }
        self.fulfil(order, now).await.map(StripeCompletion::Completed)
    }

    /// Completes the order behind a captured PayPal payment, creating the
    /// order first if the capture did not start from this shop's checkout.
    pub async fn record_paypal_capture(
        &self,
        capture: &PayPalCapture,
        fallback_email: Option<&str>,
        fallback_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> CommerceResult<Fulfilment> {
        if !capture.is_completed() {
            return Err(CommerceError::Validation(format!(
                "PayPal payment not completed (status {})",
                capture.status
            )));
        }
        if let Some(order) = self.store.get_order_by_paypal_order(&capture.order_id)? {
            return self.fulfil(order, now).await;
        }

        let amount = capture
            .amount
            .filter(|a| a.is_positive())
            .ok_or_else(|| CommerceError::Validation("Capture has no amount".to_string()))?;
        let email = capture
            .payer_email
            .as_deref()
            .or(fallback_email)
            .filter(|e| looks_like_email(e))
            .ok_or_else(|| CommerceError::Validation("Payer email is missing".to_string()))?;
        let name = capture
            .payer_name
            .as_deref()
            .or(fallback_name)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(email);
        let token = download_token();
        let order = self.store.create_order(
            &NewOrder {
                customer_id: None,
                customer_email: email.trim().to_string(),
                customer_name: name.trim().to_string(),
                original_amount: amount,
                final_amount: amount,
                discount_amount: Money::ZERO,
                coupon_code: None,
                referral_code: None,
                currency: capture.currency.clone().unwrap_or_default(),
                status: OrderStatus::Pending,
                payment_method: PaymentMethod::PayPal,
                payment_intent_id: None,
                paypal_order_id: Some(capture.order_id.clone()),
                download_token: token,
                max_downloads: self.config.max_downloads,
            },
            now,
        )?;
        info!(order_id = %order.id, paypal_order_id = %capture.order_id, "recorded PayPal order from capture");
        self.fulfil(order, now).await
    }

    /// Acts on a verified Stripe webhook event.
    pub async fn handle_stripe_event(
        &self,
        event: &StripeEvent,
        now: DateTime<Utc>,
    ) -> CommerceResult<WebhookOutcome> {
        match event.event_type.as_str() {
            "checkout.session.completed"
            | "checkout.session.async_payment_succeeded"
            | "payment_intent.succeeded" => {
                let Some(order) = self.order_for_event(event)? else {
                    warn!(event_id = %event.id, event_type = %event.event_type, "webhook for unknown order");
                    return Ok(WebhookOutcome::Unmatched);
                };
                let Some(paid) = event.paid_amount() else {
                    info!(event_id = %event.id, order_id = %order.id, "webhook object not paid yet");
                    return Ok(WebhookOutcome::AwaitingPayment(order.id));
                };
                if !paid_in_full(&order, paid, event.currency()) {
                    return Ok(WebhookOutcome::AmountMismatch(order.id));
                }
                Ok(WebhookOutcome::Fulfilled(self.fulfil(order, now).await?))
            }
            "payment_intent.payment_failed" => {
                let Some(order) = self.order_for_event(event)? else {
                    warn!(event_id = %event.id, "payment failure for unknown order");
                    return Ok(WebhookOutcome::Unmatched);
                };
                if order.is_completed() {
                    warn!(order_id = %order.id, "ignoring failure event for completed order");
                } else {
                    self.store.set_order_status(order.id, OrderStatus::Failed, now)?;
                    info!(order_id = %order.id, "order payment failed");
                }
                Ok(WebhookOutcome::Failed(order.id))
            }
            other => {
                debug!(event_type = other, "ignoring webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    fn order_for_event(&self, event: &StripeEvent) -> CommerceResult<Option<Order>> {
        if let Some(id) = event.order_id() {
            if let Some(order) = self.store.get_order(id)? {
                return Ok(Some(order));
            }
        }
        match event.object_id() {
            Some(object_id) => Ok(self.store.get_order_by_payment_intent(object_id)?),
            None => Ok(None),
        }
    }

    /// Completes an order and issues its activation code.
    pub async fn fulfil(&self, order: Order, now: DateTime<Utc>) -> CommerceResult<Fulfilment> {
        if order.status == OrderStatus::Refunded {
            return Err(CommerceError::Conflict("Order has been refunded".to_string()));
        }
        let customer = self.purchasing_customer(&order)?;
        let issued = self.store.complete_order_with_code(
            order.id,
            &NewActivationCode {
                code: generate_activation_code(now),
                customer_id: customer.as_ref().map(|c| c.id),
                order_id: Some(order.id),
                installation_id: None,
                version_token: Some(generate_version_token()),
                max_activations: DEFAULT_MAX_ACTIVATIONS,
                expires_at: None,
            },
            now,
        )?;
        let Some(code) = issued else {
            return self.existing_fulfilment(order.id);
        };

        let order = self.store.require_order(order.id)?;
        if let Some(code) = &order.coupon_code {
            if let Err(e) = self.store.increment_coupon_usage(code) {
                warn!(order_id = %order.id, error = %e, "failed to count coupon use");
            }
        }
        if let Some(customer) = &customer {
            if order.customer_id.is_none() {
                self.store.set_order_customer(order.id, customer.id)?;
            }
            self.store.set_extension_activated(customer.id, true, now)?;
            self.store
                .record_customer_purchase(customer.id, order.final_amount, now)?;
        }
        info!(order_id = %order.id, activation_code = %code.code, "order fulfilled");

        if let Some(referral) = &order.referral_code {
            if let Err(e) = self.affiliate.track_referral(referral, &order, now).await {
                error!(order_id = %order.id, error = %e, "failed to track referral");
            }
        }

        let invoice_number = match self.invoices.create_for_order(&order, now) {
            Ok(invoice) => Some(invoice.invoice_number),
            Err(e) => {
                error!(order_id = %order.id, error = %e, "failed to create invoice");
                None
            }
        };

        let download_url = self.download_url(&order);
        let email = templates::purchase_confirmation(
            &order.customer_email,
            &PurchaseConfirmation {
                customer_name: order.customer_name.clone(),
                order_id: order.id,
                amount: order.final_amount,
                currency: order.currency.clone(),
                download_url: download_url.clone(),
                max_downloads: order.max_downloads,
                activation_code: Some(code.code.clone()),
            },
        );
        if let Err(e) = self.mailer.send(&email).await {
            warn!(order_id = %order.id, error = %e, "failed to send purchase confirmation");
        }

        Ok(Fulfilment {
            order_id: order.id,
            activation_code: code.code,
            download_url,
            invoice_number,
            already_completed: false,
        })
    }

    fn existing_fulfilment(&self, id: OrderId) -> CommerceResult<Fulfilment> {
        let order = self.store.require_order(id)?;
        if order.status == OrderStatus::Refunded {
            return Err(CommerceError::Conflict("Order has been refunded".to_string()));
        }
        let activation_code = order.activation_code.clone().ok_or_else(|| {
            CommerceError::Conflict("Order fulfilment is still in progress".to_string())
        })?;
        let invoice_number = self
            .store
            .get_invoice_for_order(id)?
            .map(|invoice| invoice.invoice_number);
        Ok(Fulfilment {
            order_id: id,
            download_url: self.download_url(&order),
            activation_code,
            invoice_number,
            already_completed: true,
        })
    }

    fn purchasing_customer(&self, order: &Order) -> CommerceResult<Option<Customer>> {
        if let Some(id) = order.customer_id {
            match self.store.get_customer(id)? {
                Some(customer) => return Ok(Some(customer)),
                None => debug!(customer_id = %id, "order references a deleted customer"),
            }
        }
        Ok(self.store.get_customer_by_email(&order.customer_email)?)
    }

    fn download_url(&self, order: &Order) -> String {
        self.config.url(&format!("/api/download/{}", order.download_token))
    }

    /// Counts one download of a completed order.
    pub fn redeem_download(&self, token: &str, now: DateTime<Utc>) -> CommerceResult<DownloadGrant> {
        let order = self
            .store
            .get_order_by_download_token(token.trim())?
            .ok_or_else(|| CommerceError::NotFound("Download".to_string()))?;
        if !order.is_completed() {
            return Err(CommerceError::Forbidden);
        }
        if !self.store.consume_download(order.id)? {
            return Err(CommerceError::DownloadLimitReached);
        }
        let product = self.store.active_product(now)?;
        debug!(order_id = %order.id, "download redeemed");
        Ok(DownloadGrant {
            order_id: order.id,
            file_name: product.file_name,
            downloads_remaining: order.downloads_remaining().saturating_sub(1),
        })
    }

    pub fn get_order(&self, id: OrderId) -> CommerceResult<Order> {
        Ok(self.store.require_order(id)?)
    }

    pub fn orders_for_customer(&self, customer: &Customer) -> CommerceResult<Vec<Order>> {
        Ok(self
            .store
            .list_orders_for_customer(customer.id, &customer.email)?)
    }

    /// Whether a customer has bought the extension, with the code to use.
    pub fn purchase_status(&self, customer: &Customer) -> CommerceResult<PurchaseStatus> {
        let completed = self
            .orders_for_customer(customer)?
            .into_iter()
            .find(Order::is_completed);
        Ok(PurchaseStatus {
            has_purchased: completed.is_some(),
            extension_activated: customer.extension_activated,
            order_id: completed.as_ref().map(|o| o.id),
            activation_code: completed.as_ref().and_then(|o| o.activation_code.clone()),
            purchased_at: completed.and_then(|o| o.completed_at),
        })
    }
}
