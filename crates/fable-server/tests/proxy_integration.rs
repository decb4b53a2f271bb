//! The proxy server in front of a mocked backend.

mod common;

use common::TestServer;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_forwarded_with_caller_context() {
    let server = TestServer::start().await.unwrap();
    Mock::given(method("POST"))
        .and(path("/api/admin/auth/login"))
        .and(header("x-forwarded-for", "203.0.113.5"))
        .and(header("user-agent", "AdminPanel/1.0"))
        .and(body_json(json!({
            "email": "mod@example.com",
            "password": "secret1",
            "ipAddress": "203.0.113.5",
            "userAgent": "AdminPanel/1.0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "admin-tok"})))
        .expect(1)
        .mount(&server.backend)
        .await;

    let resp = server
        .client
        .post(server.url("/api/admin/auth/login"))
        .header("x-forwarded-for", "203.0.113.5, 10.0.0.2")
        .header("user-agent", "AdminPanel/1.0")
        .json(&json!({"email": "mod@example.com", "password": "secret1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token"], "admin-tok");
}

#[tokio::test]
async fn test_peer_address_used_without_proxy_headers() {
    let server = TestServer::start().await.unwrap();
    Mock::given(method("POST"))
        .and(path("/api/admin/auth/register"))
        .and(header("x-forwarded-for", "127.0.0.1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "adm-1"})))
        .expect(1)
        .mount(&server.backend)
        .await;

    let resp = server
        .client
        .post(server.url("/api/admin/auth/register"))
        .json(&json!({"email": "new@example.com", "password": "secret1", "invitationToken": "inv"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_html_success_becomes_503() {
    let server = TestServer::start().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/admin/auth/invitation/validate/inv-42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>502 Bad Gateway</html>", "text/html"),
        )
        .mount(&server.backend)
        .await;

    let resp = server
        .client
        .get(server.url("/api/admin/auth/invitation/validate/inv-42"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Backend service unavailable"}));
}

#[tokio::test]
async fn test_moderation_without_auth_never_reaches_backend() {
    let server = TestServer::start().await.unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chapters": []})))
        .expect(0)
        .mount(&server.backend)
        .await;

    let resp = server
        .client
        .get(server.url("/api/admin/moderation/chapters"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "No valid authorization header"}));
}

#[tokio::test]
async fn test_moderation_query_and_bearer_forwarded() {
    let server = TestServer::start().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/admin/moderation/chapters"))
        .and(query_param("status", "flagged"))
        .and(query_param("page", "3"))
        .and(header("authorization", "Bearer mod-tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chapters": [{"id": "c9"}], "total": 1})))
        .expect(1)
        .mount(&server.backend)
        .await;

    let resp = server
        .client
        .get(server.url("/api/admin/moderation/chapters?status=flagged&page=3"))
        .bearer_auth("mod-tok")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["chapters"][0]["id"], "c9");
}

#[tokio::test]
async fn test_backend_rejection_relayed() {
    let server = TestServer::start().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/admin/auth/verify-admin"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Not an admin"})))
        .mount(&server.backend)
        .await;

    let resp = server
        .client
        .get(server.url("/api/admin/auth/verify-admin"))
        .bearer_auth("reader-tok")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Not an admin"}));
}

#[tokio::test]
async fn test_rejection_without_message_uses_fallback() {
    let server = TestServer::start().await.unwrap();
    Mock::given(method("POST"))
        .and(path("/api/admin/auth/login"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"code": 7})))
        .mount(&server.backend)
        .await;

    let resp = server
        .client
        .post(server.url("/api/admin/auth/login"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Request failed");
}
