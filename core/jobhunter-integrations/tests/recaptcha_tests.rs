use jobhunter_integrations::{IntegrationError, RecaptchaConfig, RecaptchaVerifier};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn verifier(server: &MockServer) -> RecaptchaVerifier {
    RecaptchaVerifier::new(RecaptchaConfig {
        secret_key: "6Le-secret".to_string(),
        api_base_url: server.uri(),
    })
    .unwrap()
}

#[test]
fn empty_secret_is_rejected() {
    assert!(matches!(
        RecaptchaVerifier::new(RecaptchaConfig::default()),
        Err(IntegrationError::Config(_))
    ));
}

#[tokio::test]
async fn accepted_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/recaptcha/api/siteverify"))
        .and(body_string_contains("secret=6Le-secret"))
        .and(body_string_contains("response=tok"))
        .and(body_string_contains("remoteip=10.0.0.1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert!(verifier(&server).verify("tok", Some("10.0.0.1")).await.unwrap());
}

#[tokio::test]
async fn refused_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/recaptcha/api/siteverify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error-codes": ["invalid-input-response"]
        })))
        .mount(&server)
        .await;

    assert!(!verifier(&server).verify("bad", None).await.unwrap());
}

#[tokio::test]
async fn blank_token_is_refused_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(!verifier(&server).verify("  ", None).await.unwrap());
}

#[tokio::test]
async fn server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(verifier(&server).verify("tok", None).await.is_err());
}
