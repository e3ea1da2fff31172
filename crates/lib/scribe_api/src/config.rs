//! API server configuration.

use std::fmt;
use std::path::PathBuf;

use scribe_core::auth::jwt::{CodecError, resolve_secret_with};
use scribe_core::email::SmtpConfig;
use scribe_core::oauth::providers::{ProviderConfig, ProviderKind};
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/scribe";
const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Longest lifetime accepted for either token kind.
const MAX_TOKEN_TTL_SECS: i64 = 366 * 24 * 60 * 60;
const DEFAULT_RESET_URL: &str = "http://localhost:3000/reset-password";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_FROM: &str = "Scribe <no-reply@scribe.local>";
const DEFAULT_AI_RATE_LIMIT: u32 = 5;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
/// URL path uploaded images are served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no signing secret configured: set JWT_SECRET (or AUTH_SECRET), or SCRIBE_DEV_MODE=1 for an ephemeral one")]
    MissingSecret,

    #[error("invalid value for {var}: {message}")]
    Invalid { var: String, message: String },
}

impl From<CodecError> for ConfigError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::MissingSecret => ConfigError::MissingSecret,
            other => ConfigError::Invalid {
                var: "JWT_SECRET".into(),
                message: other.to_string(),
            },
        }
    }
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HMAC signing secret for access and refresh tokens.
    pub jwt_secret: String,
    pub dev_mode: bool,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
    /// `None` selects the logging mailer.
    pub smtp: Option<SmtpConfig>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    /// AI requests allowed per user per minute.
    pub ai_rate_limit_per_minute: u32,
    /// Providers with complete credentials, in `ProviderKind::ALL` order.
    pub oauth_providers: Vec<(ProviderKind, ProviderConfig)>,
    /// Directory blog image uploads are written to.
    pub upload_dir: PathBuf,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("dev_mode", &self.dev_mode)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("smtp", &self.smtp)
            .field("gemini_model", &self.gemini_model)
            .field("ai_enabled", &self.gemini_api_key.is_some())
            .field("ai_rate_limit_per_minute", &self.ai_rate_limit_per_minute)
            .field("oauth_providers", &self.oauth_providers)
            .field("upload_dir", &self.upload_dir)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match non_empty(lookup(var)) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            message: e.to_string(),
        }),
    }
}

fn positive_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: i64,
) -> Result<chrono::Duration, ConfigError> {
    let secs: i64 = parse_var(lookup, var, default)?;
    let invalid = |message: String| ConfigError::Invalid {
        var: var.to_string(),
        message,
    };
    if secs <= 0 {
        return Err(invalid("must be positive".into()));
    }
    if secs > MAX_TOKEN_TTL_SECS {
        return Err(invalid(format!("must be at most {MAX_TOKEN_TTL_SECS} seconds")));
    }
    chrono::Duration::try_seconds(secs).ok_or_else(|| invalid("out of range".into()))
}

fn is_truthy(value: Option<String>) -> bool {
    non_empty(value).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn provider_config(
    lookup: &impl Fn(&str) -> Option<String>,
    kind: ProviderKind,
) -> Option<ProviderConfig> {
    let prefix = kind.env_prefix();
    let var = |suffix: &str| non_empty(lookup(&format!("{prefix}_{suffix}")));
    Some(ProviderConfig {
        client_id: var("CLIENT_ID")?,
        client_secret: var("CLIENT_SECRET")?,
        redirect_url: var("REDIRECT_URL").or_else(|| var("REDIRECT_URI"))?,
    })
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                  | Default                                |
    /// |---------------------------|----------------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:8080`                       |
    /// | `DATABASE_URL`            | `postgres://localhost:5432/scribe`     |
    /// | `JWT_SECRET` / `AUTH_SECRET` | required unless `SCRIBE_DEV_MODE`   |
    /// | `ACCESS_TOKEN_TTL_SECS`   | `900`                                  |
    /// | `REFRESH_TOKEN_TTL_SECS`  | `604800`                               |
    /// | `SMTP_HOST` ...           | unset (log mailer)                     |
    /// | `GEMINI_API_KEY`          | unset (AI endpoints disabled)          |
    /// | `UPLOAD_DIR`              | `uploads`                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let dev_mode = is_truthy(lookup("SCRIBE_DEV_MODE"));
        let jwt_secret = resolve_secret_with(&lookup, dev_mode)?;

        let smtp = match non_empty(lookup("SMTP_HOST")) {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_var(&lookup, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
                username: non_empty(lookup("SMTP_USERNAME")),
                password: non_empty(lookup("SMTP_PASSWORD")),
                from: non_empty(lookup("SMTP_FROM")).unwrap_or_else(|| DEFAULT_SMTP_FROM.into()),
                reset_url_base: non_empty(lookup("RESET_URL_BASE"))
                    .unwrap_or_else(|| DEFAULT_RESET_URL.into()),
            }),
            None => None,
        };

        let oauth_providers = ProviderKind::ALL
            .into_iter()
            .filter_map(|kind| provider_config(&lookup, kind).map(|c| (kind, c)))
            .collect();

        Ok(Self {
            bind_addr: non_empty(lookup("BIND_ADDR")).unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            database_url: non_empty(lookup("DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            jwt_secret,
            dev_mode,
            access_ttl: positive_secs(&lookup, "ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            refresh_ttl: positive_secs(&lookup, "REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?,
            smtp,
            gemini_api_key: non_empty(lookup("GEMINI_API_KEY")),
            gemini_model: non_empty(lookup("GEMINI_MODEL")),
            ai_rate_limit_per_minute: parse_var(&lookup, "AI_RATE_LIMIT_PER_MINUTE", DEFAULT_AI_RATE_LIMIT)?,
            oauth_providers,
            upload_dir: non_empty(lookup("UPLOAD_DIR"))
                .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.into())
                .into(),
        })
    }

    /// Minimal configuration for tests and local tooling.
    pub fn for_secret(secret: &str) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            database_url: DEFAULT_DATABASE_URL.into(),
            jwt_secret: secret.to_string(),
            dev_mode: false,
            access_ttl: chrono::Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: chrono::Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            smtp: None,
            gemini_api_key: None,
            gemini_model: None,
            ai_rate_limit_per_minute: DEFAULT_AI_RATE_LIMIT,
            oauth_providers: Vec::new(),
            upload_dir: DEFAULT_UPLOAD_DIR.into(),
        }
    }
}
