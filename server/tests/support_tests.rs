mod common;

use common::{admin_token, register, spawn_test_server, spawn_with_config, test_config};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn ticket_thread_between_customer_and_staff() {
    let server = spawn_test_server().await;
    let (customer, _) = register(&server, "help@example.com").await;
    let admin = admin_token(&server).await;

    let resp = server
        .client
        .post(server.url("/api/tickets"))
        .bearer_auth(&customer)
        .json(&json!({
            "title": "Extension stops",
            "description": "It stops after two pages",
            "customerEmail": "someone-else@example.com",
            "category": "bug-report",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let ticket: Value = resp.json().await.unwrap();
    assert_eq!(ticket["customerEmail"], "help@example.com");
    assert_eq!(ticket["status"], "open");
    let id = ticket["id"].as_i64().unwrap();

    let resp = server
        .client
        .post(server.url(&format!("/api/tickets/{id}/messages")))
        .bearer_auth(&admin)
        .json(&json!({ "message": "Which browser are you using?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let thread: Value = server
        .client
        .get(server.url(&format!("/api/tickets/{id}")))
        .bearer_auth(&customer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(thread["status"], "in-progress");
    assert_eq!(thread["messages"].as_array().unwrap().len(), 1);
    assert_eq!(thread["messages"][0]["isFromCustomer"], false);

    let resp = server
        .client
        .put(server.url(&format!("/api/tickets/{id}/status")))
        .bearer_auth(&customer)
        .json(&json!({ "status": "resolved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = server
        .client
        .put(server.url(&format!("/api/tickets/{id}/status")))
        .bearer_auth(&customer)
        .json(&json!({ "status": "closed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server
        .client
        .post(server.url(&format!("/api/tickets/{id}/messages")))
        .bearer_auth(&customer)
        .json(&json!({ "message": "One more thing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn customers_only_see_their_own_tickets() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/tickets"))
        .json(&json!({
            "title": "Billing question",
            "description": "Was I charged twice?",
            "customerEmail": "guest@example.com",
            "customerName": "Guest",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let guest_ticket: Value = resp.json().await.unwrap();

    let (customer, _) = register(&server, "other@example.com").await;
    let mine: Vec<Value> = server
        .client
        .get(server.url("/api/tickets"))
        .bearer_auth(&customer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(mine.is_empty());

    let resp = server
        .client
        .get(server.url(&format!("/api/tickets/{}", guest_ticket["id"])))
        .bearer_auth(&customer)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let admin = admin_token(&server).await;
    let all: Vec<Value> = server
        .client
        .get(server.url("/api/tickets"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    let resp = server
        .client
        .delete(server.url(&format!("/api/tickets/{}", guest_ticket["id"])))
        .bearer_auth(&customer)
        .send()
        .await
        .unwrap();
    assert!(resp.status() == 401 || resp.status() == 403);
}

#[tokio::test]
async fn anonymous_ticket_needs_an_email() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/tickets"))
        .json(&json!({ "title": "Hi", "description": "Hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn invoices_require_sign_in() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .get(server.url("/api/invoices/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let admin = admin_token(&server).await;
    let resp = server
        .client
        .get(server.url("/api/invoices/1"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let invoices: Vec<Value> = server
        .client
        .get(server.url("/api/admin/invoices"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(invoices.is_empty());
}

#[tokio::test]
async fn chat_without_a_key_answers_with_a_fallback() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/chat"))
        .json(&json!({ "message": "How do I activate?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(!body["response"].as_str().unwrap().is_empty());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn chat_relays_the_completion() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Open the popup and paste your code." } }]
        })))
        .expect(1)
        .mount(&openai)
        .await;

    let mut config = test_config();
    config.openai_api_key = Some("sk-test-key".to_string());
    config.openai_api_url = Some(openai.uri());
    let server = spawn_with_config(config).await;

    let body: Value = server
        .client
        .post(server.url("/api/chat"))
        .json(&json!({
            "message": "How do I activate?",
            "history": [{ "text": "Hello", "sender": "user" }, { "text": "Hi!", "sender": "bot" }],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["response"], "Open the popup and paste your code.");
}

#[tokio::test]
async fn empty_chat_message_is_rejected() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/chat"))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
