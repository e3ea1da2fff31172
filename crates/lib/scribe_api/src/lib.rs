//! # scribe_api
//!
//! HTTP API library for Scribe.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use scribe_core::ai::ContentGenerator;
use scribe_core::auth::access::AccessControl;
use scribe_core::auth::accounts::AccountService;
use scribe_core::auth::jwt::TokenCodec;
use scribe_core::auth::tokens::TokenService;
use scribe_core::blogs::BlogService;
use scribe_core::comments::CommentService;
use scribe_core::images::{MAX_IMAGE_BYTES, MAX_IMAGES_PER_POST};
use scribe_core::oauth::OAuthService;
use scribe_core::oauth::state::OAuthStateStore;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::config::{ApiConfig, UPLOADS_ROUTE};
use crate::handlers::{admin, ai, blogs, comments, health, oauth, tokens, users};
use crate::middleware::rate_limit::RateLimiter;
use crate::state::{Backends, Integrations};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub accounts: AccountService,
    pub access: AccessControl,
    pub blogs: BlogService,
    pub comments: CommentService,
    pub oauth: OAuthService,
    pub oauth_states: Arc<OAuthStateStore>,
    /// `None` when no model API key is configured.
    pub ai: Option<Arc<dyn ContentGenerator>>,
    pub ai_limiter: RateLimiter,
    /// Postgres pool, when the stores are database backed.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(config: ApiConfig, backends: Backends, integrations: Integrations) -> Self {
        let tokens = TokenService::new(
            TokenCodec::new(config.jwt_secret.as_bytes()),
            backends.ledger.clone(),
            config.access_ttl,
            config.refresh_ttl,
        );
        let accounts = AccountService::new(
            backends.users.clone(),
            backends.roles.clone(),
            tokens.clone(),
            integrations.mailer,
        );
        let access = AccessControl::new(backends.users.clone(), backends.roles.clone());
        let blogs = BlogService::new(
            backends.blogs.clone(),
            backends.users.clone(),
            integrations.images,
        );
        let comments = CommentService::new(backends.comments.clone(), backends.blogs.clone());

        let oauth_states = Arc::new(OAuthStateStore::new());
        let oauth = integrations.oauth_providers.into_iter().fold(
            OAuthService::new(
                backends.oauth_links.clone(),
                backends.users.clone(),
                backends.roles.clone(),
                tokens,
                oauth_states.clone(),
            ),
            OAuthService::with_provider,
        );

        Self {
            ai_limiter: RateLimiter::per_minute(config.ai_rate_limit_per_minute),
            config: Arc::new(config),
            accounts,
            access,
            blogs,
            comments,
            oauth,
            oauth_states,
            ai: integrations.ai,
            pool: backends.pool,
        }
    }
}

impl AppState {
    /// Periodically evict stale OAuth states and closed rate-limit windows,
    /// and purge expired tokens from the ledger.
    pub fn spawn_maintenance(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let states = self.oauth_states.clone();
        let limiter = self.ai_limiter.clone();
        let tokens = self.accounts.tokens().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = states.cleanup();
                if evicted > 0 {
                    debug!(evicted, "expired oauth states evicted");
                }
                limiter.cleanup();
                match tokens.purge_expired().await {
                    Ok(purged) => debug!(purged, "expired tokens purged"),
                    Err(e) => warn!(error = %e, "token purge failed"),
                }
            }
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `scribe_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    scribe_core::migrate::migrate(pool).await
}

/// Room for the text fields of a multipart blog post.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/users/register", post(users::register_handler))
        .route("/api/users/login", post(users::login_handler))
        .route("/api/users/forgot-password", post(users::forgot_password_handler))
        .route("/api/users/reset-password", post(users::reset_password_handler))
        .route("/api/auth/refresh", post(tokens::refresh_handler))
        .route("/api/auth/validate", post(tokens::validate_handler))
        .route("/api/oauth/{provider}/login", get(oauth::login_handler))
        .route("/api/oauth/{provider}/callback", get(oauth::callback_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/api/users/logout", post(users::logout_handler))
        .route("/api/users/me", get(users::me_handler))
        .route("/api/users/profile", put(users::update_profile_handler))
        .route("/api/oauth/accounts", get(oauth::accounts_handler))
        .route("/api/oauth/{provider}/link", post(oauth::link_handler))
        .route(
            "/api/blogs",
            get(blogs::list_handler).post(blogs::create_handler).layer(
                DefaultBodyLimit::max(MAX_IMAGES_PER_POST * MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES),
            ),
        )
        .route("/api/blogs/search", get(blogs::search_handler))
        .route(
            "/api/blogs/{id}",
            get(blogs::get_handler)
                .put(blogs::update_handler)
                .delete(blogs::delete_handler),
        )
        .route("/api/blogs/{id}/like", post(blogs::like_handler))
        .route("/api/blogs/{id}/dislike", post(blogs::dislike_handler))
        .route("/api/blogs/{id}/share", post(blogs::share_handler))
        .route(
            "/api/blogs/{id}/comments",
            get(comments::thread_handler).post(comments::create_handler),
        )
        .route(
            "/api/comments/{id}",
            put(comments::update_handler).delete(comments::delete_handler),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Admin routes: token must carry the admin role.
    let admin = Router::new()
        .route("/api/admin/users/{user_id}/promote", post(admin::promote_handler))
        .route("/api/admin/users/{user_id}/demote", post(admin::demote_handler))
        .layer(from_fn(middleware::auth::require_admin))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // AI routes: authenticated and rate limited per user.
    let ai = Router::new()
        .route("/api/ai/generate", post(ai::generate_handler))
        .route("/api/ai/suggest", post(ai::suggest_handler))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::limit_ai,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .merge(ai)
        .nest_service(UPLOADS_ROUTE, uploads)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
