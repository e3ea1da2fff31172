//! Wiring of store backends and outbound integrations into [`AppState`].

use std::sync::Arc;

use scribe_core::ai::{AiError, ContentGenerator, GeminiClient};
use scribe_core::auth::directory::{RoleDirectory, UserDirectory};
use scribe_core::auth::ledger::{PgTokenLedger, TokenLedger};
use scribe_core::auth::queries::{PgRoleDirectory, PgUserDirectory};
use scribe_core::blogs::BlogStore;
use scribe_core::blogs::queries::PgBlogStore;
use scribe_core::comments::CommentStore;
use scribe_core::comments::queries::PgCommentStore;
use scribe_core::email::{LogMailer, MailError, Mailer, SmtpMailer};
use scribe_core::images::{ImageStore, LocalImageStore};
use scribe_core::memory::{
    MemoryBlogStore, MemoryCommentStore, MemoryImageStore, MemoryOAuthLinkStore,
    MemoryRoleDirectory, MemoryTokenLedger, MemoryUserDirectory,
};
use scribe_core::oauth::providers::{HttpOAuthProvider, OAuthProvider};
use scribe_core::oauth::queries::PgOAuthLinkStore;
use scribe_core::oauth::{OAuthError, OAuthLinkStore};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::config::{ApiConfig, UPLOADS_ROUTE};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("mailer: {0}")]
    Mail(#[from] MailError),

    #[error("oauth: {0}")]
    OAuth(#[from] OAuthError),

    #[error("ai: {0}")]
    Ai(#[from] AiError),

    #[error("upload directory {dir}: {source}")]
    UploadDir {
        dir: String,
        source: std::io::Error,
    },
}

/// One implementation per store seam.
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserDirectory>,
    pub roles: Arc<dyn RoleDirectory>,
    pub ledger: Arc<dyn TokenLedger>,
    pub blogs: Arc<dyn BlogStore>,
    pub comments: Arc<dyn CommentStore>,
    pub oauth_links: Arc<dyn OAuthLinkStore>,
    /// Present when backed by Postgres; used by the health check.
    pub pool: Option<PgPool>,
}

impl Backends {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserDirectory::new(pool.clone())),
            roles: Arc::new(PgRoleDirectory::new(pool.clone())),
            ledger: Arc::new(PgTokenLedger::new(pool.clone())),
            blogs: Arc::new(PgBlogStore::new(pool.clone())),
            comments: Arc::new(PgCommentStore::new(pool.clone())),
            oauth_links: Arc::new(PgOAuthLinkStore::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Process-local stores; everything is lost on exit.
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryUserDirectory::default()),
            roles: Arc::new(MemoryRoleDirectory::seeded()),
            ledger: Arc::new(MemoryTokenLedger::default()),
            blogs: Arc::new(MemoryBlogStore::default()),
            comments: Arc::new(MemoryCommentStore::default()),
            oauth_links: Arc::new(MemoryOAuthLinkStore::default()),
            pool: None,
        }
    }
}

/// Outbound services: mail, image storage, AI and social login providers.
#[derive(Clone)]
pub struct Integrations {
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageStore>,
    pub ai: Option<Arc<dyn ContentGenerator>>,
    pub oauth_providers: Vec<Arc<dyn OAuthProvider>>,
}

impl Default for Integrations {
    fn default() -> Self {
        Self {
            mailer: Arc::new(LogMailer),
            images: Arc::new(MemoryImageStore::default()),
            ai: None,
            oauth_providers: Vec::new(),
        }
    }
}

impl Integrations {
    /// Build the real integrations selected by `config`, creating the upload
    /// directory if needed.
    pub async fn from_config(config: &ApiConfig) -> Result<Self, StartupError> {
        let local = LocalImageStore::new(&config.upload_dir, UPLOADS_ROUTE);
        local
            .ensure_dir()
            .await
            .map_err(|source| StartupError::UploadDir {
                dir: config.upload_dir.display().to_string(),
                source,
            })?;
        info!(dir = %config.upload_dir.display(), "image uploads enabled");
        let images: Arc<dyn ImageStore> = Arc::new(local);

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "smtp mailer enabled");
                Arc::new(SmtpMailer::new(smtp)?)
            }
            None => {
                info!("SMTP_HOST not set, mail is logged instead of sent");
                Arc::new(LogMailer)
            }
        };

        let ai: Option<Arc<dyn ContentGenerator>> = match &config.gemini_api_key {
            Some(key) => {
                let client = GeminiClient::new(key.clone(), config.gemini_model.clone())?;
                info!(model = client.model(), "ai passthrough enabled");
                Some(Arc::new(client))
            }
            None => None,
        };

        let mut oauth_providers: Vec<Arc<dyn OAuthProvider>> = Vec::new();
        for (kind, provider) in &config.oauth_providers {
            oauth_providers.push(Arc::new(HttpOAuthProvider::new(*kind, provider.clone())?));
            info!(provider = %kind, "oauth provider enabled");
        }

        Ok(Self {
            mailer,
            images,
            ai,
            oauth_providers,
        })
    }
}
