#![allow(clippy::unwrap_used)]
// Integration tests for `BackendClient` and the registration handshake using wiremock.

use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use additv_api::{
    BackendClient, Error, RegistrationRequest, TokenPair, TransportConfig, register,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, BackendClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = BackendClient::with_client(
        reqwest::Client::new(),
        base_url,
        SecretString::from("anon-key".to_string()),
    );
    client.set_tokens(TokenPair::new("access-1", "refresh-1"));
    (server, client)
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_current_user_sends_both_keys() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "sp-42" })))
        .mount(&server)
        .await;

    let user = client.current_user().await.unwrap();
    assert_eq!(user.id, "sp-42");
}

#[tokio::test]
async fn test_current_user_expired_token_does_not_refresh() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.current_user().await;
    assert!(
        matches!(result, Err(Error::SessionExpired)),
        "expected SessionExpired, got: {result:?}"
    );
}

#[tokio::test]
async fn test_refresh_rotates_pair_and_notifies_observers() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "user": { "id": "sp-42" }
        })))
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on_token_rotated(Arc::new(move |pair: &TokenPair| {
        sink.lock().unwrap().push((
            pair.access_token.expose_secret().to_owned(),
            pair.refresh_token.expose_secret().to_owned(),
        ));
    }));

    client.refresh_session().await.unwrap();

    let held = client.tokens().unwrap();
    assert_eq!(held.access_token.expose_secret(), "access-2");
    assert_eq!(held.refresh_token.expose_secret(), "refresh-2");
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("access-2".to_owned(), "refresh-2".to_owned())]
    );
}

#[tokio::test]
async fn test_refresh_rejected_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let result = client.refresh_session().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
    // The old pair stays in place when a refresh fails.
    assert_eq!(client.tokens().unwrap().access_token.expose_secret(), "access-1");
}

// ── REST tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_insert_posts_rows() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/printer_events"))
        .and(body_json(json!({ "printer_id": "p-1", "event": "Job_Started" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client
        .insert(
            "printer_events",
            &json!({ "printer_id": "p-1", "event": "Job_Started" }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_insert_refreshes_once_on_401() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/printer_telemetry"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/printer_telemetry"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client
        .insert("printer_telemetry", &json!([{ "telemetry": {} }]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_insert_server_error_is_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/printer_events"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let result = client.insert("printer_events", &json!({})).await;
    match result {
        Err(Error::Api { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_builds_eq_filter() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/jobs"))
        .and(query_param("id", "eq.17"))
        .and(body_json(json!({ "progress": 42.5 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update("jobs", &json!({ "progress": 42.5 }), &[("id", "17")])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invoke_no_content_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/get-next-job"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    assert!(client.invoke("get-next-job", None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invoke_returns_json_object() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/get-next-job"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "job_id": 7, "gcode_id": 3 })),
        )
        .mount(&server)
        .await;

    let value = client.invoke("get-next-job", None).await.unwrap().unwrap();
    assert_eq!(value["job_id"], 7);
}

#[tokio::test]
async fn test_requests_without_session_fail_fast() {
    let server = MockServer::start().await;
    let client = BackendClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("anon-key".to_string()),
    );

    let result = client.insert("printer_events", &json!({})).await;
    assert!(matches!(result, Err(Error::NoSession)));
}

// ── Registration tests ──────────────────────────────────────────────

#[tokio::test]
async fn test_register_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/register-printer"))
        .and(body_json(json!({
            "registration_token": "reg-123",
            "printer_name": "Prusa MK4"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "printer_id": "p-1",
            "service_principal_id": "sp-42",
            "access_key": "access-1",
            "refresh_key": "refresh-1",
            "anon_key": "anon-key"
        })))
        .mount(&server)
        .await;

    let base = Url::parse(&server.uri()).unwrap();
    let request = RegistrationRequest {
        registration_token: "reg-123",
        printer_name: "Prusa MK4",
    };
    let registration = register(&base, None, &request, &TransportConfig::default())
        .await
        .unwrap();

    assert_eq!(registration.printer_id, "p-1");
    assert_eq!(registration.service_principal_id, "sp-42");
    assert_eq!(registration.refresh_key.expose_secret(), "refresh-1");
}

#[tokio::test]
async fn test_register_incomplete_response_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/register-printer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "printer_id": "p-1",
            "service_principal_id": "sp-42",
            "access_key": "access-1",
            "refresh_key": "refresh-1"
        })))
        .mount(&server)
        .await;

    let base = Url::parse(&server.uri()).unwrap();
    let request = RegistrationRequest {
        registration_token: "reg-123",
        printer_name: "Prusa MK4",
    };
    let result = register(&base, None, &request, &TransportConfig::default()).await;

    match result {
        Err(Error::Registration { message }) => assert!(message.contains("anon_key")),
        other => panic!("expected Registration error, got: {other:?}"),
    }
}
