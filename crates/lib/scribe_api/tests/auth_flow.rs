//! Registration, login, token lifecycle and password reset over HTTP.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{PASSWORD, app};

#[tokio::test]
async fn first_account_is_admin_and_later_ones_are_users() {
    let app = app();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    assert_eq!(alice["role"], "admin");
    assert_eq!(bob["role"], "user");
    assert!(alice.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_email_and_weak_password_are_rejected() {
    let app = app();
    app.register("alice").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "username": "alice2", "email": "ALICE@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already exists");

    let (status, _) = app
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "username": "carol", "email": "carol@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app();
    app.register("alice").await;
    let (status, body) = app
        .send(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "Wr0ngpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn me_requires_a_bearer_token() {
    let app = app();
    let (status, _) = app.send("GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send("GET", "/api/users/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_access_and_refresh_tokens() {
    let app = app();
    app.register("alice").await;
    let (access, refresh) = app.login("alice").await;

    let (status, me) = app.send("GET", "/api/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");

    let (status, _) = app.send("POST", "/api/users/logout", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", "/api/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send("POST", "/api/auth/refresh", None, Some(json!({ "refresh_token": refresh })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_mints_a_working_access_token() {
    let app = app();
    app.register("alice").await;
    let (access, refresh) = app.login("alice").await;

    let (status, body) = app
        .send("POST", "/api/auth/refresh", None, Some(json!({ "refresh_token": refresh })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    let fresh = body["access_token"].as_str().expect("access_token");
    assert_ne!(fresh, access);

    let (status, _) = app.send("GET", "/api/users/me", Some(fresh), None).await;
    assert_eq!(status, StatusCode::OK);

    // An access token is not accepted where a refresh token is expected.
    let (status, _) = app
        .send("POST", "/api/auth/refresh", None, Some(json!({ "refresh_token": access })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validate_echoes_claims() {
    let app = app();
    let alice = app.register("alice").await;
    let (access, refresh) = app.login("alice").await;

    let (status, body) = app
        .send("POST", "/api/auth/validate", None, Some(json!({ "token": access })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], alice["id"]);
    assert_eq!(body["role"], "admin");

    let (status, _) = app
        .send("POST", "/api/auth/validate", None, Some(json!({ "token": refresh })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_changes_only_given_fields() {
    let app = app();
    app.register("alice").await;
    let (access, _) = app.login("alice").await;

    let (status, body) = app
        .send(
            "PUT",
            "/api/users/profile",
            Some(&access),
            Some(json!({ "bio": "Writes about Rust" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], "Writes about Rust");
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = app();
    app.register("alice").await;
    let (old_access, _) = app.login("alice").await;

    // Unknown and known addresses get the same reply.
    let (status, unknown) = app
        .send(
            "POST",
            "/api/users/forgot-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, known) = app
        .send(
            "POST",
            "/api/users/forgot-password",
            None,
            Some(json!({ "email": "alice@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unknown, known);
    assert_eq!(app.mailer.sent().len(), 1);

    let token = app
        .mailer
        .last_reset_token("alice@example.com")
        .expect("reset mail");
    let (status, _) = app
        .send(
            "POST",
            "/api/users/reset-password",
            None,
            Some(json!({ "token": token, "new_password": "N3wPassword" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Sessions from before the reset are gone.
    let (status, _) = app.send("GET", "/api/users/me", Some(&old_access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "username": "alice", "password": "N3wPassword" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The token works once.
    let (status, _) = app
        .send(
            "POST",
            "/api/users/reset-password",
            None,
            Some(json!({ "token": token, "new_password": "An0therPass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_in_memory_store() {
    let app = app();
    let (status, body) = app.send("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store_connected"], true);
    assert_eq!(body["version"], scribe_core::version());
}
