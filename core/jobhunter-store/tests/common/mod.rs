//! Shared fixtures for store tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use jobhunter_store::{Customer, NewCustomer, NewOrder, Order, Store};
use jobhunter_types::{Currency, Money, OrderStatus, PaymentMethod};

pub fn store() -> Store {
    Store::open_in_memory().unwrap()
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap()
}

pub fn customer(store: &Store, email: &str) -> Customer {
    store
        .create_customer(
            &NewCustomer {
                email: email.to_string(),
                name: "Test Customer".to_string(),
                password_hash: Some("$argon2id$stub".to_string()),
                ..NewCustomer::default()
            },
            now(),
        )
        .unwrap()
}

pub fn new_order(email: &str, amount: Money, token: &str) -> NewOrder {
    NewOrder {
        customer_id: None,
        customer_email: email.to_string(),
        customer_name: "Test Customer".to_string(),
        original_amount: amount,
        final_amount: amount,
        discount_amount: Money::ZERO,
        coupon_code: None,
        referral_code: None,
        currency: Currency::default(),
        status: OrderStatus::Pending,
        payment_method: PaymentMethod::Stripe,
        payment_intent_id: None,
        paypal_order_id: None,
        download_token: token.to_string(),
        max_downloads: 3,
    }
}

pub fn completed_order(store: &Store, email: &str, amount: Money, token: &str) -> Order {
    let mut new = new_order(email, amount, token);
    new.status = OrderStatus::Completed;
    store.create_order(&new, now()).unwrap()
}
