mod common;

use axum::http::StatusCode;
use chrono::Utc;
use comunidad::{
    auth::{Claims, TokenError, TokenKeys},
    models::UserFlagsUpdate,
    repository::Repository,
};
use common::spawn_app;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn register_returns_token_that_opens_me() {
    let app = spawn_app();
    let (token, id) = app.register("ana@example.com", "ana").await;

    let res = app.get("/api/me", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    let me = res.json();
    assert_eq!(me["id"], id.to_string());
    assert_eq!(me["email"], "ana@example.com");
    assert_eq!(me["role_name"], "Usuario");
    assert!(me.get("password_hash").is_none(), "hash must never be serialized");
}

#[tokio::test]
async fn register_normalizes_email_and_rejects_duplicates() {
    let app = spawn_app();
    let res = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "  Ana@Example.COM ", "password": "secret123" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.json()["user"]["email"], "ana@example.com");

    let dup = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "ana@example.com", "password": "another1" }),
        )
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.json()["kind"], "conflict");
}

#[tokio::test]
async fn register_validates_input() {
    let app = spawn_app();
    let short = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "bo@example.com", "password": "123" }),
        )
        .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let bad_email = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "not-an-email", "password": "secret123" }),
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let malformed = app
        .send(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.json()["kind"], "validation");
}

#[tokio::test]
async fn referral_code_links_new_user_to_referrer() {
    let app = spawn_app();
    let (referrer_token, _) = app.register("ana@example.com", "ana").await;

    let res = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "email": "bo@example.com",
                "password": "secret123",
                "username": "beto",
                "referral_code": "ana"
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let summary = app.get("/api/referidos", Some(&referrer_token)).await.json();
    assert_eq!(summary["count"], 1);
    assert_eq!(summary["referrals"][0]["referred_username"], "beto");
}

#[tokio::test]
async fn unknown_referral_code_rejects_registration_without_creating_user() {
    let app = spawn_app();
    let res = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "bo@example.com", "password": "secret123", "referral_code": "ghost" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.repo.find_user_by_email("bo@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn newsletter_opt_in_subscribes_email() {
    let app = spawn_app();
    app.post(
        "/api/auth/register",
        None,
        json!({ "email": "news@example.com", "password": "secret123", "newsletter": true }),
    )
    .await;
    app.register("quiet@example.com", "quiet").await;

    let subscribed = app.newsletter.subscribed.lock().unwrap().clone();
    assert_eq!(subscribed, vec!["news@example.com".to_string()]);
}

#[tokio::test]
async fn login_accepts_email_or_username() {
    let app = spawn_app();
    app.register("ana@example.com", "ana").await;

    for identifier in ["ana@example.com", "ANA@example.com", "ana"] {
        let res = app
            .post(
                "/api/auth/login",
                None,
                json!({ "identifier": identifier, "password": "secret123" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login with {identifier}");
        assert!(res.json()["token"].as_str().is_some());
    }

    let user = app.repo.find_user_by_username("ana").await.unwrap().unwrap();
    assert!(user.last_login_at.is_some());
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_user_alike() {
    let app = spawn_app();
    app.register("ana@example.com", "ana").await;

    let wrong = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ana@example.com", "password": "nope-nope" }),
        )
        .await;
    let unknown = app
        .post(
            "/api/auth/login",
            None,
            json!({ "identifier": "ghost@example.com", "password": "secret123" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json()["error"], unknown.json()["error"]);
}

#[tokio::test]
async fn deactivated_account_cannot_log_in_or_use_old_token() {
    let app = spawn_app();
    let (token, id) = app.register("ana@example.com", "ana").await;
    app.repo
        .set_user_flags(
            id,
            UserFlagsUpdate {
                is_active: Some(false),
                is_subscribed: None,
            },
        )
        .await
        .unwrap();

    let login = app
        .post(
            "/api/auth/login",
            None,
            json!({ "identifier": "ana", "password": "secret123" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);

    let me = app.get("/api/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let app = spawn_app();

    let missing = app.get("/api/me", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json()["kind"], "unauthenticated");

    let garbage = app.get("/api/me", Some("not-a-jwt")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);

    let foreign = TokenKeys::new("some-other-secret", 1)
        .sign(&Claims {
            sub: Uuid::new_v4(),
            email: "x@example.com".to_string(),
            role: "admin".to_string(),
            iat: Utc::now().timestamp() as usize,
            exp: (Utc::now().timestamp() + 3600) as usize,
            jti: Uuid::new_v4(),
        })
        .unwrap();
    let res = app.get("/api/admin/stats", Some(&foreign)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = spawn_app();
    let (_, id) = app.register("ana@example.com", "ana").await;

    let keys = TokenKeys::from_config(&app.config);
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: id,
        email: "ana@example.com".to_string(),
        role: "Usuario".to_string(),
        iat: (now - 7200) as usize,
        exp: (now - 3600) as usize,
        jti: Uuid::new_v4(),
    };
    let token = keys.sign(&claims).unwrap();

    assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    let res = app.get("/api/me", Some(&token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_for_deleted_user_is_rejected() {
    let app = spawn_app();
    let keys = TokenKeys::from_config(&app.config);
    let now = Utc::now().timestamp();
    let token = keys
        .sign(&Claims {
            sub: Uuid::new_v4(),
            email: "ghost@example.com".to_string(),
            role: "Usuario".to_string(),
            iat: now as usize,
            exp: (now + 3600) as usize,
            jti: Uuid::new_v4(),
        })
        .unwrap();

    let res = app.get("/api/me", Some(&token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let app = spawn_app();
    let (token, _) = app.register("ana@example.com", "ana").await;

    let wrong = app
        .put(
            "/api/me/password",
            Some(&token),
            json!({ "current_password": "guess123", "new_password": "brandnew1" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = app
        .put(
            "/api/me/password",
            Some(&token),
            json!({ "current_password": "secret123", "new_password": "brandnew1" }),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);

    let login = app
        .post(
            "/api/auth/login",
            None,
            json!({ "identifier": "ana", "password": "brandnew1" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = spawn_app();
    let res = app.get("/api/health", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.header("x-request-id").is_some());

    let res = app
        .send(
            axum::http::Request::builder()
                .uri("/api/health")
                .header("x-request-id", "trace-me-42")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.header("x-request-id"), Some("trace-me-42"));
}
