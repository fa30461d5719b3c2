mod common;

use common::{TestServer, admin_token, register, spawn_test_server};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

async fn get_json(server: &TestServer, path: &str) -> (u16, Value) {
    let resp = server.client.get(server.url(path)).send().await.unwrap();
    (resp.status().as_u16(), resp.json().await.unwrap())
}

async fn send_admin(
    server: &TestServer,
    method: reqwest::Method,
    path: &str,
    token: &str,
    body: &Value,
) -> (u16, Value) {
    let resp = server
        .client
        .request(method, server.url(path))
        .bearer_auth(token)
        .json(body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap();
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

fn banner_body(title: &str, enabled: bool) -> Value {
    json!({
        "isEnabled": enabled,
        "titleEn": title,
        "subtitleEn": "This week only",
        "titleTranslations": { "de": "Angebot" },
        "targetPrice": 199.0,
        "originalPrice": 299.99,
        "endDateTime": "2099-01-01T00:00:00Z",
        "priority": 2,
    })
}

#[tokio::test]
async fn countdown_banner_lifecycle() {
    let server = spawn_test_server().await;
    let token = admin_token(&server).await;

    let (status, body) = get_json(&server, "/api/countdown-banner/active").await;
    assert_eq!(status, 404);
    assert_eq!(body["message"], "No active countdown banner found");

    let (status, created) = send_admin(
        &server,
        reqwest::Method::POST,
        "/api/admin/countdown-banners",
        &token,
        &banner_body("Spring sale", true),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(created["backgroundColor"], "gradient-primary");
    let path = format!("/api/admin/countdown-banners/{}", created["id"]);

    let (status, active) = get_json(&server, "/api/countdown-banner/active").await;
    assert_eq!(status, 200);
    assert_eq!(active["titleEn"], "Spring sale");
    assert_eq!(active["titleTranslations"]["de"], "Angebot");
    assert_eq!(active["targetPrice"], 199.0);

    let (status, updated) = send_admin(
        &server,
        reqwest::Method::PUT,
        &path,
        &token,
        &banner_body("Paused", false),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(updated["isEnabled"], false);
    let (status, _) = get_json(&server, "/api/countdown-banner/active").await;
    assert_eq!(status, 404);

    let (status, _) = send_admin(&server, reqwest::Method::DELETE, &path, &token, &json!({})).await;
    assert_eq!(status, 204);
    let (status, _) = send_admin(&server, reqwest::Method::DELETE, &path, &token, &json!({})).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn content_admin_routes_need_an_admin() {
    let server = spawn_test_server().await;
    let (customer_token, _) = register(&server, "shopper@example.com").await;

    for path in [
        "/api/admin/countdown-banners",
        "/api/admin/announcement-badges",
        "/api/admin/seo-settings",
    ] {
        let resp = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 401, "{path}");
    }

    let (status, _) = send_admin(
        &server,
        reqwest::Method::POST,
        "/api/admin/sync-banner-price",
        &customer_token,
        &json!({ "targetPrice": 1.0 }),
    )
    .await;
    assert!(status == 401 || status == 403, "{status}");
}

#[tokio::test]
async fn price_sync_moves_banner_and_product_together() {
    let server = spawn_test_server().await;
    let token = admin_token(&server).await;

    let (status, body) = send_admin(
        &server,
        reqwest::Method::POST,
        "/api/admin/sync-banner-price",
        &token,
        &json!({}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "targetPrice is required");

    let (status, body) = send_admin(
        &server,
        reqwest::Method::POST,
        "/api/admin/sync-banner-price",
        &token,
        &json!({ "targetPrice": 149.0 }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["created"], true);
    assert_eq!(body["targetPrice"], 149.0);

    let (_, active) = get_json(&server, "/api/countdown-banner/active").await;
    assert_eq!(active["titleEn"], "Limited Time Offer!");
    assert_eq!(active["targetPrice"], 149.0);
    let (_, pricing) = get_json(&server, "/api/products/pricing").await;
    assert_eq!(pricing["price"], 149.0);
}

#[tokio::test]
async fn active_badge_is_null_until_one_is_enabled() {
    let server = spawn_test_server().await;
    let token = admin_token(&server).await;

    let (status, body) = get_json(&server, "/api/announcement-badge/active").await;
    assert_eq!(status, 200);
    assert_eq!(body, Value::Null);

    let (status, created) = send_admin(
        &server,
        reqwest::Method::POST,
        "/api/admin/announcement-badges",
        &token,
        &json!({ "textEn": "New release", "textTranslations": { "fr": "Nouveau" } }),
    )
    .await;
    assert_eq!(status, 201);

    let (_, active) = get_json(&server, "/api/announcement-badge/active").await;
    assert_eq!(active["id"], created["id"]);
    assert_eq!(active["textTranslations"]["fr"], "Nouveau");

    let (status, _) = send_admin(
        &server,
        reqwest::Method::POST,
        "/api/admin/announcement-badges",
        &token,
        &json!({ "textEn": "   " }),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn seo_settings_are_public_and_admin_editable() {
    let server = spawn_test_server().await;
    let token = admin_token(&server).await;

    let (status, defaults) = get_json(&server, "/api/seo-settings").await;
    assert_eq!(status, 200);
    assert_eq!(defaults["siteTitle"], "OCUS Job Hunter - Premium Chrome Extension");
    assert_eq!(defaults["themeColor"], "#2563eb");

    let (status, updated) = send_admin(
        &server,
        reqwest::Method::PUT,
        "/api/admin/seo-settings",
        &token,
        &json!({ "siteTitle": "Job Hunter", "twitterSite": "@jobhunter" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(updated["siteTitle"], "Job Hunter");

    let (status, _) = send_admin(
        &server,
        reqwest::Method::PATCH,
        "/api/admin/seo-settings",
        &token,
        &json!({ "themeColor": "not-a-color" }),
    )
    .await;
    assert_eq!(status, 400);

    let (_, public) = get_json(&server, "/api/seo-settings").await;
    assert_eq!(public["siteTitle"], "Job Hunter");
    assert_eq!(public["twitterSite"], "@jobhunter");
    assert_eq!(public["themeColor"], "#2563eb");
}
