//! HTTP surface driven through the axum router

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use coldflow_api_keys::api::create_router;
use coldflow_api_keys::domain::audit::AuditEventKind;

use common::{bearer, TestHarness};

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn owner_request(method: &str, uri: &str, owner: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-owner-id", owner)
        .header("x-owner-email", format!("{}@example.com", owner))
        .header("x-forwarded-for", "198.51.100.4");

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn get_with_auth(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn create_key(app: &Router, owner: &str, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(owner_request("POST", "/api/api-keys", owner, Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn test_health_endpoints() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(true));

    let response = app
        .clone()
        .oneshot(get_with_auth("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");

    let response = app.oneshot(get_with_auth("/live", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_then_authenticate() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(true));

    let created = create_key(&app, "user-1", serde_json::json!({"name": "deploy bot"})).await;
    let secret = created["api_key"].as_str().unwrap().to_string();
    assert_eq!(created["prefix"], &secret[..8]);
    assert!(created["scope_id"].is_null());

    let response = app
        .oneshot(get_with_auth("/v1/me", Some(&bearer(&secret))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let me = json_body(response).await;
    assert_eq!(me["id"], "user-1");
    assert_eq!(me["email"], "user-1@example.com");
    assert_eq!(me["kind"], "api_key");
    assert_eq!(me["key_id"], created["id"]);
}

#[tokio::test]
async fn test_credential_failures_are_indistinguishable() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(true));

    let unknown = format!("Bearer cfk_{}", "a".repeat(64));
    let cases = [
        None,
        Some("Token abc"),
        Some("Bearer "),
        Some("Bearer cfk_tooshort"),
        Some(unknown.as_str()),
    ];

    let mut bodies = Vec::new();
    for authorization in cases {
        let response = app
            .clone()
            .oneshot(get_with_auth("/v1/me", authorization))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        bodies.push(json_body(response).await);
    }

    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(bodies[0]["error"]["code"], "invalid_api_key");
    assert_eq!(
        h.audit.events_of(AuditEventKind::KeyAuthFailed).len(),
        cases.len()
    );
}

#[tokio::test]
async fn test_scope_check_denies_other_scope() {
    let h = TestHarness::new().await;
    let owner = h.add_owner("user-1").await;
    h.add_scope("scope-a", &owner).await;
    let app = create_router(h.app_state(true));

    let created = create_key(
        &app,
        "user-1",
        serde_json::json!({"name": "svc-key", "subAgencyId": "scope-a", "expiresInDays": 30}),
    )
    .await;
    assert_eq!(created["scope_id"], "scope-a");
    assert!(created["expires_at"].is_string());
    let auth = bearer(created["api_key"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(get_with_auth("/v1/scopes/scope-a", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["allowed"], true);

    let response = app
        .oneshot(get_with_auth("/v1/scopes/scope-b", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "scope_denied");
    assert_eq!(h.audit.events_of(AuditEventKind::ScopeDenied).len(), 1);
}

#[tokio::test]
async fn test_unscoped_key_denied_on_foreign_scope() {
    let h = TestHarness::new().await;
    let alice = h.add_owner("alice").await;
    h.add_owner("bob").await;
    h.add_scope("alice-scope", &alice).await;
    let app = create_router(h.app_state(true));

    let created = create_key(&app, "bob", serde_json::json!({"name": "bob-ci"})).await;
    assert!(created["scope_id"].is_null());
    let auth = bearer(created["api_key"].as_str().unwrap());

    let response = app
        .oneshot(get_with_auth("/v1/scopes/alice-scope", Some(&auth)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "scope_denied");

    let denied = h.audit.events_of(AuditEventKind::ScopeDenied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].user_id(), "bob");
    assert_eq!(denied[0].scope_id().map(|s| s.as_str()), Some("alice-scope"));
}

#[tokio::test]
async fn test_scoped_creation_requires_scope_rights() {
    let h = TestHarness::new().await;
    let owner = h.add_owner("user-1").await;
    h.add_scope("scope-a", &owner).await;
    let app = create_router(h.app_state(true));

    let response = app
        .oneshot(owner_request(
            "POST",
            "/api/api-keys",
            "user-2",
            Some(serde_json::json!({"name": "intruder", "scope_id": "scope-a"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_validation_errors() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(true));

    for body in [
        serde_json::json!({"name": "ab"}),
        serde_json::json!({"name": "x".repeat(51)}),
        serde_json::json!({"name": "valid", "expires_in_days": 0}),
        serde_json::json!({"name": "valid", "expires_in_days": 366}),
    ] {
        let response = app
            .clone()
            .oneshot(owner_request("POST", "/api/api-keys", "user-1", Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_creation_rate_limit_returns_retry_after() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(true));

    for i in 0..5 {
        create_key(&app, "user-1", serde_json::json!({"name": format!("key-{}", i)})).await;
    }

    let response = app
        .oneshot(owner_request(
            "POST",
            "/api/api-keys",
            "user-1",
            Some(serde_json::json!({"name": "one too many"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    let body = json_body(response).await;
    assert_eq!(body["error"]["retry_after_secs"], retry_after);
}

#[tokio::test]
async fn test_list_and_delete_own_keys() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(true));

    let first = create_key(&app, "user-1", serde_json::json!({"name": "first"})).await;
    create_key(&app, "user-1", serde_json::json!({"name": "second"})).await;
    create_key(&app, "user-2", serde_json::json!({"name": "theirs"})).await;

    let response = app
        .clone()
        .oneshot(owner_request("GET", "/api/api-keys", "user-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = json_body(response).await;
    assert_eq!(listing["total"], 2);
    for item in listing["api_keys"].as_array().unwrap() {
        assert_eq!(item["owner_id"], "user-1");
    }
    assert!(listing.to_string().find(first["api_key"].as_str().unwrap()).is_none());

    let uri = format!("/api/api-keys/{}", first["id"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(owner_request("DELETE", &uri, "user-2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(owner_request("DELETE", &uri, "user-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["deleted"], true);

    let response = app
        .oneshot(get_with_auth("/v1/me", Some(&bearer(first["api_key"].as_str().unwrap()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_owner_headers_ignored_unless_trusted() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(false));

    let response = app
        .oneshot(owner_request("GET", "/api/api-keys", "user-1", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "session_required");
}

#[tokio::test]
async fn test_audit_records_forwarded_client() {
    let h = TestHarness::new().await;
    let app = create_router(h.app_state(true));

    create_key(&app, "user-1", serde_json::json!({"name": "audited"})).await;

    let created = h.audit.events_of(AuditEventKind::KeyCreated);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].request().ip_address, "198.51.100.4");
    assert_eq!(created[0].user_id(), "user-1");
}
