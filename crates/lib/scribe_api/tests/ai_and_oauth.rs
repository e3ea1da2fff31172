//! AI passthrough limits and social login over HTTP.

mod common;

use axum::http::StatusCode;
use scribe_api::config::ApiConfig;
use scribe_api::state::{Backends, Integrations};
use scribe_api::{AppState, router};
use serde_json::{Value, json};

use common::{TestApp, app, app_with};

#[tokio::test]
async fn generate_and_suggest_return_model_output() {
    let app = app();
    let (_, alice) = app.signup("alice").await;

    let (status, body) = app
        .send("POST", "/api/ai/generate", Some(&alice), Some(json!({ "topic": "Ownership" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "canned");
    assert!(body["content"].as_str().expect("content").contains("Ownership"));

    let (status, body) = app
        .send("POST", "/api/ai/suggest", Some(&alice), Some(json!({ "content": "My draft" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["suggestions"].as_str().expect("suggestions").contains("My draft"));

    let (status, _) = app
        .send("POST", "/api/ai/generate", Some(&alice), Some(json!({ "topic": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suggestion_for_own_post_is_kept_on_the_post() {
    let app = app();
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;
    let (status, blog) = app
        .send(
            "POST",
            "/api/blogs",
            Some(&alice),
            Some(json!({ "title": "Draft", "content": "Rough first paragraph" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let blog_id = blog["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .send("POST", "/api/ai/suggest", Some(&bob), Some(json!({ "blog_id": blog_id })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("POST", "/api/ai/suggest", Some(&alice), Some(json!({ "blog_id": blog_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blog_id"], blog_id.as_str());
    let suggestion = body["suggestions"].as_str().expect("suggestions").to_string();
    assert!(suggestion.contains("Rough first paragraph"));

    let (_, stored) = app
        .send("GET", &format!("/api/blogs/{blog_id}"), Some(&bob), None)
        .await;
    assert_eq!(stored["ai_suggestion"], suggestion.as_str());
}

#[tokio::test]
async fn ai_requires_authentication() {
    let app = app();
    let (status, _) = app
        .send("POST", "/api/ai/generate", None, Some(json!({ "topic": "Rust" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ai_is_rate_limited_per_user() {
    let mut config = ApiConfig::for_secret("integration-test-secret");
    config.ai_rate_limit_per_minute = 2;
    let app = app_with(config);
    let (_, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;
    let topic = json!({ "topic": "Lifetimes" });

    for _ in 0..2 {
        let (status, _) = app
            .send("POST", "/api/ai/generate", Some(&alice), Some(topic.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app
        .send("POST", "/api/ai/generate", Some(&alice), Some(topic.clone()))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    let (status, _) = app
        .send("POST", "/api/ai/generate", Some(&bob), Some(topic))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ai_without_a_key_is_unavailable() {
    let state = AppState::new(
        ApiConfig::for_secret("integration-test-secret"),
        Backends::in_memory(),
        Integrations::default(),
    );
    let app = TestApp {
        router: router(state),
        mailer: Default::default(),
        images: Default::default(),
    };
    let (_, alice) = app.signup("alice").await;
    let (status, body) = app
        .send("POST", "/api/ai/generate", Some(&alice), Some(json!({ "topic": "Rust" })))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "unavailable");
}

async fn start(app: &TestApp) -> String {
    let (status, body) = app.send("GET", "/api/oauth/github/login", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let state = body["state"].as_str().expect("state").to_string();
    assert!(body["auth_url"].as_str().expect("auth_url").contains(&state));
    state
}

async fn callback(app: &TestApp, code: &str, state: &str) -> (StatusCode, Value) {
    app.send(
        "GET",
        &format!("/api/oauth/github/callback?code={code}&state={state}"),
        None,
        None,
    )
    .await
}

#[tokio::test]
async fn social_login_creates_account_once() {
    let app = app();
    let state = start(&app).await;
    let (status, body) = callback(&app, "code-new", &state).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_new_user"], true);
    assert_eq!(body["user"]["email"], "octo@example.com");
    let access = body["access_token"].as_str().expect("access_token").to_string();

    let (status, me) = app.send("GET", "/api/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "octo@example.com");

    // The state is single use.
    let (status, _) = callback(&app, "code-new", &state).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let state = start(&app).await;
    let (status, body) = callback(&app, "code-new", &state).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new_user"], false);
    assert_eq!(body["user"]["id"], me["id"]);
}

#[tokio::test]
async fn social_login_attaches_to_existing_email() {
    let app = app();
    let alice = app.register("alice").await;
    let state = start(&app).await;
    let (status, body) = callback(&app, "code-alice", &state).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new_user"], false);
    assert_eq!(body["user"]["id"], alice["id"]);

    let access = body["access_token"].as_str().expect("access_token");
    let (status, accounts) = app.send("GET", "/api/oauth/accounts", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accounts[0]["provider"], "github");
    assert_eq!(accounts[0]["provider_user_id"], "gh-2");
}

#[tokio::test]
async fn bad_state_unknown_provider_and_denied_consent() {
    let app = app();
    let (status, _) = callback(&app, "code-new", "forged-state").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send("GET", "/api/oauth/myspace/login", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            "GET",
            "/api/oauth/github/callback?error=access_denied",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // A code the provider rejects is an upstream failure.
    let state = start(&app).await;
    let (status, _) = callback(&app, "code-bogus", &state).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn linking_binds_identity_to_the_caller_once() {
    let app = app();
    let (alice_id, alice) = app.signup("alice").await;
    let (_, bob) = app.signup("bob").await;

    let state = start(&app).await;
    let (status, body) = app
        .send(
            "POST",
            "/api/oauth/github/link",
            Some(&alice),
            Some(json!({ "code": "code-link", "state": state })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["provider_user_id"], "gh-3");

    let state = start(&app).await;
    let (status, _) = app
        .send(
            "POST",
            "/api/oauth/github/link",
            Some(&bob),
            Some(json!({ "code": "code-link", "state": state })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Logging in with the linked identity lands on Alice.
    let state = start(&app).await;
    let (status, body) = callback(&app, "code-link", &state).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], alice_id.as_str());
}
