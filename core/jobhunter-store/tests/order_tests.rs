mod common;

use common::{completed_order, customer, new_order, now, store};
use jobhunter_store::{NewActivationCode, Page, StoreError};
use jobhunter_types::{Money, OrderId, OrderStatus};
use pretty_assertions::assert_eq;

#[test]
fn completing_is_reported_once() {
    let store = store();
    let order = store
        .create_order(&new_order("a@example.com", Money::from_cents(50_000), "tok-a"), now())
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.completed_at, None);

    assert!(store.set_order_status(order.id, OrderStatus::Completed, now()).unwrap());
    assert!(!store.set_order_status(order.id, OrderStatus::Completed, now()).unwrap());

    let order = store.require_order(order.id).unwrap();
    assert!(order.is_completed());
    assert_eq!(order.completed_at, Some(now()));
}

fn code_for(order: OrderId, code: &str) -> NewActivationCode {
    NewActivationCode {
        code: code.to_string(),
        customer_id: None,
        order_id: Some(order),
        installation_id: None,
        version_token: None,
        max_activations: 1,
        expires_at: None,
    }
}

#[test]
fn completion_and_code_are_written_together() {
    let store = store();
    let order = store
        .create_order(&new_order("d@example.com", Money::from_cents(500), "tok-d"), now())
        .unwrap();

    let issued = store
        .complete_order_with_code(order.id, &code_for(order.id, "OCUS-1-AAAA0001"), now())
        .unwrap()
        .unwrap();
    assert_eq!(issued.order_id, Some(order.id));

    let order = store.require_order(order.id).unwrap();
    assert!(order.is_completed());
    assert_eq!(order.activation_code.as_deref(), Some("OCUS-1-AAAA0001"));

    let again = store
        .complete_order_with_code(order.id, &code_for(order.id, "OCUS-1-AAAA0002"), now())
        .unwrap();
    assert!(again.is_none());
    assert!(store.get_activation_code("OCUS-1-AAAA0002").unwrap().is_none());
}

#[test]
fn failed_code_insert_leaves_the_order_pending() {
    let store = store();
    let order = store
        .create_order(&new_order("e@example.com", Money::from_cents(500), "tok-e"), now())
        .unwrap();
    store
        .create_activation_code(&code_for(order.id, "OCUS-1-TAKEN000"), now())
        .unwrap();

    let err = store
        .complete_order_with_code(order.id, &code_for(order.id, "OCUS-1-TAKEN000"), now())
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    let pending = store.require_order(order.id).unwrap();
    assert_eq!(pending.status, OrderStatus::Pending);
    assert_eq!(pending.activation_code, None);

    let retried = store
        .complete_order_with_code(order.id, &code_for(order.id, "OCUS-1-FRESH000"), now())
        .unwrap();
    assert!(retried.is_some());
    assert!(store.require_order(order.id).unwrap().is_completed());
}

#[test]
fn completion_of_missing_order_is_not_found() {
    let store = store();
    let err = store
        .complete_order_with_code(
            OrderId::from_raw(5),
            &code_for(OrderId::from_raw(5), "OCUS-1-NONE0000"),
            now(),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn status_change_on_missing_order_is_not_found() {
    let store = store();
    let err = store
        .set_order_status(OrderId::from_raw(7), OrderStatus::Failed, now())
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn lookup_by_payment_references() {
    let store = store();
    let order = store
        .create_order(&new_order("b@example.com", Money::from_cents(100), "tok-b"), now())
        .unwrap();
    store.set_order_payment_intent(order.id, "cs_test_123").unwrap();
    store.set_order_paypal_id(order.id, "PP-9").unwrap();

    assert_eq!(
        store.get_order_by_payment_intent("cs_test_123").unwrap().unwrap().id,
        order.id
    );
    assert_eq!(store.get_order_by_paypal_order("PP-9").unwrap().unwrap().id, order.id);
    assert_eq!(store.get_order_by_download_token("tok-b").unwrap().unwrap().id, order.id);
    assert!(store.get_order_by_payment_intent("cs_other").unwrap().is_none());
}

#[test]
fn downloads_stop_at_the_limit() {
    let store = store();
    let order = completed_order(&store, "c@example.com", Money::from_cents(100), "tok-c");
    for _ in 0..3 {
        assert!(store.consume_download(order.id).unwrap());
    }
    assert!(!store.consume_download(order.id).unwrap());
    assert_eq!(store.require_order(order.id).unwrap().downloads_remaining(), 0);
}

#[test]
fn customer_orders_match_by_account_or_email() {
    let store = store();
    let c = customer(&store, "owner@example.com");
    let by_email = completed_order(&store, "OWNER@example.com", Money::from_cents(100), "t1");
    let linked = completed_order(&store, "other@example.com", Money::from_cents(200), "t2");
    store.set_order_customer(linked.id, c.id).unwrap();
    completed_order(&store, "stranger@example.com", Money::from_cents(300), "t3");

    let mut ids: Vec<_> = store
        .list_orders_for_customer(c.id, &c.email)
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    ids.sort_by_key(|id| id.get());
    assert_eq!(ids, vec![by_email.id, linked.id]);
}

#[test]
fn sales_summary_counts_only_completed_revenue() {
    let store = store();
    completed_order(&store, "a@example.com", Money::from_cents(50_000), "t1");
    completed_order(&store, "b@example.com", Money::from_cents(25_000), "t2");
    store
        .create_order(&new_order("c@example.com", Money::from_cents(999), "t3"), now())
        .unwrap();

    let summary = store.sales_summary().unwrap();
    assert_eq!(summary.total_revenue, Money::from_cents(75_000));
    assert_eq!(summary.completed_orders, 2);
    assert_eq!(summary.pending_orders, 1);

    let page = store.list_orders(Page::numbered(1, 2)).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.orders.len(), 2);
}

#[test]
fn download_token_is_hidden_from_json() {
    let store = store();
    let order = completed_order(&store, "a@example.com", Money::from_cents(100), "secret-token");
    let json = serde_json::to_value(&order).unwrap();
    assert!(json.get("downloadToken").is_none());
    assert_eq!(json["finalAmount"], 1.0);
}
