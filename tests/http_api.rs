mod common;

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use authone_verifier::{app::build_router, services::oauth::Verifier, state::AppState};
use common::{CLIENT_ID, active_record, config};

fn router(server: &MockServer) -> axum::Router {
    let verifier = Verifier::with_memory_cache(config(server)).unwrap();
    build_router(AppState::new(Arc::new(verifier)))
}

fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut request = Request::builder().uri(uri);
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    request.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mount_introspection(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/oauth2/introspect"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn health_is_open() {
    let server = MockServer::start().await;

    let response = router(&server)
        .oneshot(get("/api/v1/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn me_returns_the_authenticated_context() {
    let server = MockServer::start().await;
    mount_introspection(
        &server,
        ResponseTemplate::new(200).set_body_json(active_record(CLIENT_ID, 600)),
    )
    .await;

    let response = router(&server)
        .oneshot(get("/api/v1/me", Some("bearer access-token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["subject"], "user-1");
    assert_eq!(body["client_id"], CLIENT_ID);
    assert_eq!(body["scopes"], json!(["openid", "offline"]));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let server = MockServer::start().await;

    let response = router(&server)
        .oneshot(get("/api/v1/me", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn inactive_token_is_unauthorized() {
    let server = MockServer::start().await;
    mount_introspection(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"active": false})),
    )
    .await;

    let response = router(&server)
        .oneshot(get("/api/v1/me", Some("Bearer revoked-token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_token_is_unauthorized() {
    let server = MockServer::start().await;
    mount_introspection(
        &server,
        ResponseTemplate::new(200).set_body_json(active_record("OTHER", 600)),
    )
    .await;

    let response = router(&server)
        .oneshot(get("/api/v1/me", Some("Bearer foreign-token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn authorization_server_outage_is_bad_gateway() {
    let server = MockServer::start().await;
    mount_introspection(&server, ResponseTemplate::new(500)).await;

    let response = router(&server)
        .oneshot(get("/api/v1/me", Some("Bearer access-token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"]["code"], "BAD_GATEWAY");
}

#[tokio::test]
async fn refused_client_credentials_are_bad_gateway() {
    let server = MockServer::start().await;
    mount_introspection(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
    )
    .await;

    let response = router(&server)
        .oneshot(get("/api/v1/me", Some("Bearer perfectly-good-token")))
        .await
        .unwrap();

    // The token was never judged; the server refused this client.
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response.headers().get("www-authenticate").is_none());
}
