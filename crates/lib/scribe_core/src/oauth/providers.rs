//! Google, GitHub and Facebook authorization-code flows over `reqwest`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::OAuthError;
use crate::models::oauth::OAuthUserInfo;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("scribe/", env!("CARGO_PKG_VERSION"));

/// A social login provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name as used in routes (`google`, `github`, `facebook`).
    fn name(&self) -> &str;

    /// URL the browser is sent to, carrying `state`.
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError>;

    /// Exchange an authorization code for the user's provider profile.
    async fn exchange_code(&self, code: &str) -> Result<OAuthUserInfo, OAuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    GitHub,
    Facebook,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Google, ProviderKind::GitHub, ProviderKind::Facebook];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::GitHub => "github",
            ProviderKind::Facebook => "facebook",
        }
    }

    /// Prefix of the provider's environment variables.
    pub fn env_prefix(self) -> &'static str {
        match self {
            ProviderKind::Google => "GOOGLE",
            ProviderKind::GitHub => "GITHUB",
            ProviderKind::Facebook => "FACEBOOK",
        }
    }

    fn authorize_endpoint(self) -> &'static str {
        match self {
            ProviderKind::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            ProviderKind::GitHub => "https://github.com/login/oauth/authorize",
            ProviderKind::Facebook => "https://www.facebook.com/v18.0/dialog/oauth",
        }
    }

    fn token_endpoint(self) -> &'static str {
        match self {
            ProviderKind::Google => "https://oauth2.googleapis.com/token",
            ProviderKind::GitHub => "https://github.com/login/oauth/access_token",
            ProviderKind::Facebook => "https://graph.facebook.com/v18.0/oauth/access_token",
        }
    }

    fn scopes(self) -> &'static str {
        match self {
            ProviderKind::Google => "openid email profile",
            ProviderKind::GitHub => "read:user user:email",
            ProviderKind::Facebook => "email,public_profile",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| OAuthError::UnsupportedProvider(s.to_string()))
    }
}

/// Client credentials registered with a provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

impl From<GoogleUser> for OAuthUserInfo {
    fn from(u: GoogleUser) -> Self {
        OAuthUserInfo {
            provider_user_id: u.id,
            email: u.email,
            name: u.name,
            picture: u.picture,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
}

impl GitHubUser {
    fn into_info(self, emails: &[GitHubEmail]) -> OAuthUserInfo {
        let email = self
            .email
            .filter(|e| !e.is_empty())
            .or_else(|| emails.iter().find(|e| e.primary).map(|e| e.email.clone()))
            .unwrap_or_default();
        OAuthUserInfo {
            provider_user_id: self.id.to_string(),
            email,
            name: self.name.filter(|n| !n.is_empty()).unwrap_or(self.login),
            picture: self.avatar_url.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: String,
}

impl From<FacebookUser> for OAuthUserInfo {
    fn from(u: FacebookUser) -> Self {
        OAuthUserInfo {
            provider_user_id: u.id,
            email: u.email,
            name: u.name,
            picture: u.picture.map(|p| p.data.url).unwrap_or_default(),
        }
    }
}

/// Authorization-code provider talking to the real provider endpoints.
#[derive(Debug, Clone)]
pub struct HttpOAuthProvider {
    kind: ProviderKind,
    config: ProviderConfig,
    http: reqwest::Client,
}

impl HttpOAuthProvider {
    pub fn new(kind: ProviderKind, config: ProviderConfig) -> Result<Self, OAuthError> {
        Url::parse(&config.redirect_url)
            .map_err(|e| OAuthError::Config(format!("{kind} redirect url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OAuthError::Config(format!("http client: {e}")))?;
        Ok(Self { kind, config, http })
    }

    async fn exchange_token(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];
        let resp = self
            .http
            .post(self.kind.token_endpoint())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::Provider(format!("{} token exchange failed: {e}", self.kind)))?;

        if !resp.status().is_success() {
            return Err(OAuthError::Provider(format!(
                "{} token exchange HTTP {}",
                self.kind,
                resp.status()
            )));
        }
        let token = resp.json::<TokenResponse>().await.map_err(|e| {
            OAuthError::Provider(format!("{} token response parse error: {e}", self.kind))
        })?;
        Ok(token.access_token)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| OAuthError::Provider(format!("{} profile request failed: {e}", self.kind)))?;
        if !resp.status().is_success() {
            return Err(OAuthError::Provider(format!(
                "{} profile HTTP {}",
                self.kind,
                resp.status()
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|e| OAuthError::Provider(format!("{} profile parse error: {e}", self.kind)))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthUserInfo, OAuthError> {
        match self.kind {
            ProviderKind::Google => Ok(self
                .get_json::<GoogleUser>("https://www.googleapis.com/oauth2/v2/userinfo", access_token)
                .await?
                .into()),
            ProviderKind::GitHub => {
                let user: GitHubUser = self
                    .get_json("https://api.github.com/user", access_token)
                    .await?;
                let emails = if user.email.as_deref().is_some_and(|e| !e.is_empty()) {
                    Vec::new()
                } else {
                    self.get_json::<Vec<GitHubEmail>>("https://api.github.com/user/emails", access_token)
                        .await
                        .unwrap_or_else(|e| {
                            debug!(error = %e, "github email lookup failed");
                            Vec::new()
                        })
                };
                Ok(user.into_info(&emails))
            }
            ProviderKind::Facebook => Ok(self
                .get_json::<FacebookUser>(
                    "https://graph.facebook.com/v18.0/me?fields=id,name,email,picture.type(large)",
                    access_token,
                )
                .await?
                .into()),
        }
    }
}

#[async_trait]
impl OAuthProvider for HttpOAuthProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            self.kind.authorize_endpoint(),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", self.kind.scopes()),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Config(format!("{} authorize url: {e}", self.kind)))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthUserInfo, OAuthError> {
        let access_token = self.exchange_token(code).await?;
        self.fetch_profile(&access_token).await
    }
}
