//! Shared harness: an in-memory router driven with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use scribe_api::config::ApiConfig;
use scribe_api::state::{Backends, Integrations};
use scribe_api::{AppState, router};
use scribe_core::ai::ContentGenerator;
use scribe_core::images::ImageStore;
use scribe_core::memory::{CannedGenerator, MemoryImageStore, MemoryMailer, StaticOAuthProvider};
use scribe_core::models::oauth::OAuthUserInfo;
use scribe_core::oauth::providers::OAuthProvider;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const PASSWORD: &str = "Passw0rd1";

const BOUNDARY: &str = "scribe-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub mailer: Arc<MemoryMailer>,
    pub images: Arc<MemoryImageStore>,
}

/// One part of a `multipart/form-data` body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        data: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
            Part::File {
                field,
                file_name,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn github_user(id: &str, email: &str) -> OAuthUserInfo {
    OAuthUserInfo {
        provider_user_id: id.to_string(),
        email: email.to_string(),
        name: format!("GitHub {id}"),
        picture: String::new(),
    }
}

pub fn app_with(config: ApiConfig) -> TestApp {
    let mailer = Arc::new(MemoryMailer::default());
    let github: Arc<dyn OAuthProvider> = Arc::new(
        StaticOAuthProvider::new("github")
            .with_user("code-new", github_user("gh-1", "octo@example.com"))
            .with_user("code-alice", github_user("gh-2", "alice@example.com"))
            .with_user("code-link", github_user("gh-3", "elsewhere@example.com")),
    );
    let ai: Arc<dyn ContentGenerator> = Arc::new(CannedGenerator);
    let images = Arc::new(MemoryImageStore::default());
    let image_store: Arc<dyn ImageStore> = images.clone();
    let integrations = Integrations {
        mailer: mailer.clone(),
        images: image_store,
        ai: Some(ai),
        oauth_providers: vec![github],
    };
    let state = AppState::new(config, Backends::in_memory(), integrations);
    TestApp {
        router: router(state),
        mailer,
        images,
    }
}

pub fn app() -> TestApp {
    app_with(ApiConfig::for_secret("integration-test-secret"))
}

impl TestApp {
    /// Send a request and return the status and the JSON body (`Null` when empty).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");
        self.dispatch(req).await
    }

    /// Send a `multipart/form-data` request.
    pub async fn send_multipart(
        &self,
        uri: &str,
        token: Option<&str>,
        parts: &[Part<'_>],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = builder
            .body(Body::from(multipart_body(parts)))
            .expect("build request");
        self.dispatch(req).await
    }

    async fn dispatch(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }

    pub async fn register(&self, username: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/api/users/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
        body
    }

    /// Log in and return `(access_token, refresh_token)`.
    pub async fn login(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .send(
                "POST",
                "/api/users/login",
                None,
                Some(json!({ "email_or_username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {username}: {body}");
        (
            body["access_token"].as_str().expect("access_token").to_string(),
            body["refresh_token"].as_str().expect("refresh_token").to_string(),
        )
    }

    /// Register then log in, returning the user id and access token.
    pub async fn signup(&self, username: &str) -> (String, String) {
        let user = self.register(username).await;
        let (access, _) = self.login(username).await;
        (user["id"].as_str().expect("id").to_string(), access)
    }
}
