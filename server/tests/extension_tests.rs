mod common;

use common::{TestServer, register, spawn_test_server, spawn_with_config, test_config};
use pretty_assertions::assert_eq;
use reqwest::Response;
use serde_json::{Value, json};

#[tokio::test]
async fn anonymous_trial_runs_out_after_three_uses() {
    let server = spawn_test_server().await;
    let body = json!({ "extensionId": "ext-1", "fingerprint": "fp-abc" });

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let resp = server
            .client
            .post(server.url("/api/trial/use"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        statuses.push(resp.json::<Value>().await.unwrap());
    }
    assert_eq!(statuses[0]["allowed"], true);
    assert_eq!(statuses[0]["remaining"], 2);
    assert_eq!(statuses[2]["allowed"], true);
    assert_eq!(statuses[2]["isExpired"], true);
    assert_eq!(statuses[3]["allowed"], false);
    assert_eq!(statuses[3]["usageCount"], 3);
}

#[tokio::test]
async fn trial_requires_both_identifiers() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/trial/use"))
        .json(&json!({ "extensionId": " ", "fingerprint": "fp" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

async fn post_device(server: &TestServer, path: &str, token: &str, body: Value) -> Response {
    server
        .client
        .post(server.url(path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn premium_slot_holds_a_single_device() {
    let server = spawn_test_server().await;
    let (token, _) = register(&server, "slot@example.com").await;
    let validate = |fingerprint: &str| {
        json!({
            "deviceFingerprint": fingerprint,
            "extensionId": "ext-1",
        })
    };
    let path = "/api/premium/validate-device";

    let first: Value = post_device(&server, path, &token, validate("laptop"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["authorized"], true);
    assert_eq!(first["isNewRegistration"], true);

    let again: Value = post_device(&server, path, &token, validate("laptop"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again["message"], "Device authorized");
    assert!(again["registeredAt"].is_string());

    let resp = post_device(&server, path, &token, validate("desktop")).await;
    assert_eq!(resp.status(), 403);
    let denied: Value = resp.json().await.unwrap();
    assert_eq!(denied["authorized"], false);
    assert_eq!(denied["maxDevices"], 1);
    assert_eq!(denied["currentDevices"], 1);

    let resp = post_device(
        &server,
        "/api/premium/deactivate-device",
        &token,
        json!({ "deviceFingerprint": "laptop" }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let moved: Value = post_device(&server, path, &token, validate("desktop"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(moved["authorized"], true);
}

#[tokio::test]
async fn device_routes_use_the_signed_in_customer() {
    let server = spawn_test_server().await;
    let body = json!({
        "userId": "someone-else",
        "deviceFingerprint": "laptop",
        "extensionId": "ext-1",
    });

    for path in [
        "/api/premium/validate-device",
        "/api/premium/device-heartbeat",
        "/api/premium/deactivate-device",
    ] {
        let resp = server
            .client
            .post(server.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401, "{path}");
    }

    // A body naming another user cannot touch the owner's device.
    let (owner, _) = register(&server, "owner@example.com").await;
    let (other, _) = register(&server, "other@example.com").await;
    let resp = post_device(&server, "/api/premium/validate-device", &owner, body.clone()).await;
    assert_eq!(resp.status(), 200);
    let resp = post_device(&server, "/api/premium/deactivate-device", &other, body).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn device_validation_requires_an_extension_id() {
    let server = spawn_test_server().await;
    let (token, _) = register(&server, "ext@example.com").await;
    let path = "/api/premium/validate-device";

    let resp = post_device(&server, path, &token, json!({ "deviceFingerprint": "laptop" })).await;
    assert_eq!(resp.status(), 400);
    let resp = post_device(
        &server,
        path,
        &token,
        json!({ "deviceFingerprint": "laptop", "extensionId": "  " }),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let resp = post_device(
        &server,
        "/api/premium/device-heartbeat",
        &token,
        json!({ "extensionId": "ext-1" }),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn heartbeat_needs_a_registered_device() {
    let server = spawn_test_server().await;
    let (token, _) = register(&server, "beat@example.com").await;
    let beat = json!({ "deviceFingerprint": "tablet" });

    let resp = post_device(&server, "/api/premium/device-heartbeat", &token, beat.clone()).await;
    assert_eq!(resp.status(), 404);

    post_device(
        &server,
        "/api/premium/validate-device",
        &token,
        json!({ "deviceFingerprint": "tablet", "extensionId": "e" }),
    )
    .await;
    let resp = post_device(&server, "/api/premium/device-heartbeat", &token, beat).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Device heartbeat updated");
}

#[tokio::test]
async fn legacy_activation_key_endpoint_is_gone() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/validate-activation-key"))
        .json(&json!({ "activationKey": "ABC" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 410);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn unknown_activation_code_is_not_found() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/activation/validate"))
        .json(&json!({
            "activationCode": "JH-NOPE-NOPE-NOPE",
            "installationId": "7f1c2a52-4b1e-4c43-9d0c-2a1f9f4a6b10",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = server
        .client
        .post(server.url("/api/activation/validate"))
        .json(&json!({ "activationCode": "JH-X", "installationId": "not-a-uuid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn public_key_is_published_when_signing_is_configured() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .get(server.url("/api/activation/public-key"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);

    let mut config = test_config();
    config.license_signing_key = Some("11".repeat(32));
    let server = spawn_with_config(config).await;
    let body: Value = server
        .client
        .get(server.url("/api/activation/public-key"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["algorithm"], "ed25519");
    assert_eq!(body["publicKey"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn signed_in_usage_counts_against_the_trial() {
    let server = spawn_test_server().await;
    let (token, _) = register(&server, "runner@example.com").await;

    let check: Value = server
        .client
        .get(server.url("/api/extension/check"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["canUse"], true);
    assert_eq!(check["trialUsed"], 0);

    for _ in 0..3 {
        let resp = server
            .client
            .post(server.url("/api/extension/usage"))
            .bearer_auth(&token)
            .json(&json!({ "sessionId": "s-1", "jobsUsed": 1, "platform": "linkedin" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = server
        .client
        .post(server.url("/api/extension/usage"))
        .bearer_auth(&token)
        .json(&json!({ "sessionId": "s-2", "platform": "linkedin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn installation_ping_is_recorded() {
    let server = spawn_test_server().await;
    let resp = server
        .client
        .post(server.url("/api/extension/installations"))
        .header("user-agent", "JobHunter/2.1")
        .json(&json!({
            "installationId": "7f1c2a52-4b1e-4c43-9d0c-2a1f9f4a6b10",
            "extensionVersion": "2.1.0",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["installationId"], "7f1c2a52-4b1e-4c43-9d0c-2a1f9f4a6b10");
    assert_eq!(body["userAgent"], "JobHunter/2.1");
    assert_eq!(body["isActive"], true);
}
