//! Shared fixtures for commerce tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jobhunter_commerce::{
    AffiliateService, CheckoutRequest, CheckoutService, CheckoutStarted, CommerceConfig,
    Fulfilment, InvoiceService, StripeCompletion,
};
use jobhunter_integrations::{
    CheckoutProvider, CheckoutSession, CheckoutSessionRequest, CheckoutSessionStatus, Email,
    IntegrationError, IntegrationResult, Mailer,
};
use jobhunter_store::{Customer, NewCustomer, Store};
use jobhunter_types::Money;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn store() -> Store {
    Store::open_in_memory().unwrap()
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap()
}

pub fn config() -> CommerceConfig {
    CommerceConfig {
        base_url: "https://shop.test".to_string(),
        ..CommerceConfig::default()
    }
}

pub fn customer(store: &Store, email: &str) -> Customer {
    store
        .create_customer(
            &NewCustomer {
                email: email.to_string(),
                name: "Test Customer".to_string(),
                ..NewCustomer::default()
            },
            now(),
        )
        .unwrap()
}

pub fn request(email: &str) -> CheckoutRequest {
    CheckoutRequest {
        customer_email: email.to_string(),
        customer_name: "Jane Buyer".to_string(),
        ..CheckoutRequest::default()
    }
}

/// Collects sent mail instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.subject).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> IntegrationResult<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// A mailer whose every send fails.
pub struct BrokenMailer;

#[async_trait]
impl Mailer for BrokenMailer {
    async fn send(&self, _email: &Email) -> IntegrationResult<()> {
        Err(IntegrationError::Config("mail is down".to_string()))
    }
}

/// Hands out sequential session ids and remembers the requests. Sessions
/// stay unpaid until [`FakeCheckout::pay`] settles them.
#[derive(Default)]
pub struct FakeCheckout {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
    payments: Mutex<HashMap<String, Money>>,
}

impl FakeCheckout {
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn request_for(&self, session_id: &str) -> CheckoutSessionRequest {
        let index: usize = session_id.trim_start_matches("cs_test_").parse().unwrap();
        self.requests()[index - 1].clone()
    }

    /// Settles a session for the amount it was opened with.
    pub fn pay(&self, session_id: &str) {
        let amount = self.request_for(session_id).amount;
        self.pay_amount(session_id, amount);
    }

    pub fn pay_amount(&self, session_id: &str, amount: Money) {
        self.payments
            .lock()
            .unwrap()
            .insert(session_id.to_string(), amount);
    }
}

#[async_trait]
impl CheckoutProvider for FakeCheckout {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> IntegrationResult<CheckoutSession> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/{id}")),
            id,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> IntegrationResult<CheckoutSessionStatus> {
        let paid = self.payments.lock().unwrap().get(session_id).copied();
        let request = self.request_for(session_id);
        Ok(CheckoutSessionStatus {
            id: session_id.to_string(),
            payment_status: if paid.is_some() { "paid" } else { "unpaid" }.to_string(),
            amount_total: Some(paid.unwrap_or(request.amount).cents()),
            currency: Some(request.currency.as_str().to_string()),
        })
    }
}

/// Everything a checkout test needs, wired to in-memory fakes.
pub struct Harness {
    pub store: Store,
    pub mailer: Arc<RecordingMailer>,
    pub stripe: Arc<FakeCheckout>,
    pub checkout: CheckoutService,
}

impl Harness {
    pub fn new() -> Self {
        let store = store();
        let mailer = Arc::new(RecordingMailer::default());
        let stripe = Arc::new(FakeCheckout::default());
        let checkout = CheckoutService::new(
            store.clone(),
            config(),
            mailer.clone(),
            Some(stripe.clone() as Arc<dyn CheckoutProvider>),
        );
        Self {
            store,
            mailer,
            stripe,
            checkout,
        }
    }

    pub fn affiliate(&self) -> AffiliateService {
        AffiliateService::new(self.store.clone(), config(), self.mailer.clone())
    }

    pub fn invoices(&self) -> InvoiceService {
        InvoiceService::new(self.store.clone(), config())
    }

    /// Pays the session behind `started` and completes the order.
    pub async fn pay_and_complete(&self, started: &CheckoutStarted) -> Fulfilment {
        self.stripe.pay(&started.session_id);
        match self
            .checkout
            .complete_by_payment_intent(&started.session_id, now())
            .await
            .unwrap()
        {
            StripeCompletion::Completed(fulfilment) => fulfilment,
            other => panic!("expected a completed order, got {other:?}"),
        }
    }
}
