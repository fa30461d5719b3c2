#![allow(dead_code)]

use jobhunter_server::{AppState, ServerConfig, build_router};
use jobhunter_store::Store;
use reqwest::Client;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

pub const ADMIN_USERNAME: &str = "root";
pub const ADMIN_EMAIL: &str = "root@jobhunter.test";
pub const ADMIN_PASSWORD: &str = "Solid#Oak72";
pub const CUSTOMER_PASSWORD: &str = "Ranger#Tea9";

pub struct TestServer {
    pub base: String,
    pub client: Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::minimal("http://localhost:5000");
    config.admin_username = Some(ADMIN_USERNAME.to_string());
    config.admin_email = Some(ADMIN_EMAIL.to_string());
    config.admin_password = Some(ADMIN_PASSWORD.to_string());
    config
}

/// Spin up the HTTP server on an OS-assigned port with an in-memory store.
pub async fn spawn_test_server() -> TestServer {
    spawn_with_config(test_config()).await
}

pub async fn spawn_with_config(config: ServerConfig) -> TestServer {
    spawn_with_store(config, Store::open_in_memory().unwrap()).await
}

pub async fn spawn_with_store(config: ServerConfig, store: Store) -> TestServer {
    let state = AppState::new(&config, store).unwrap();
    let app = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        client: Client::new(),
    }
}

/// Answers an arithmetic challenge such as `7 * 6 = ?`.
pub fn solve(question: &str) -> i64 {
    let parts: Vec<&str> = question.split_whitespace().collect();
    let a: i64 = parts[0].parse().unwrap();
    let b: i64 = parts[2].parse().unwrap();
    match parts[1] {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        op => panic!("unexpected operator {op}"),
    }
}

/// Registers a customer, returning `(token, user)`.
pub async fn register(server: &TestServer, email: &str) -> (String, Value) {
    let challenge: Value = server
        .client
        .get(server.url("/api/captcha"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let answer = solve(challenge["question"].as_str().unwrap());
    let resp = server
        .client
        .post(server.url("/api/customer/register"))
        .json(&json!({
            "email": email,
            "password": CUSTOMER_PASSWORD,
            "name": "Dana Test",
            "captchaId": challenge["id"],
            "captchaAnswer": answer.to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "registration failed");
    let body: Value = resp.json().await.unwrap();
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"].clone(),
    )
}

pub async fn admin_token(server: &TestServer) -> String {
    let resp = server
        .client
        .post(server.url("/api/admin/login"))
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "admin login failed");
    let body: Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}
