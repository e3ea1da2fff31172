use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{StoreError, StoreResult};
use crate::models::oauth::{OAuthAccount, OAuthUserInfo};
use crate::oauth::OAuthError;
use crate::oauth::OAuthLinkStore;
use crate::oauth::providers::OAuthProvider;

#[derive(Debug, Default)]
pub struct MemoryOAuthLinkStore {
    links: RwLock<HashMap<(String, String), OAuthAccount>>,
}

#[async_trait]
impl OAuthLinkStore for MemoryOAuthLinkStore {
    async fn find(&self, provider: &str, provider_user_id: &str) -> StoreResult<Option<OAuthAccount>> {
        let key = (provider.to_string(), provider_user_id.to_string());
        Ok(self.links.read().await.get(&key).cloned())
    }

    async fn create(&self, account: OAuthAccount) -> StoreResult<OAuthAccount> {
        let key = (account.provider.clone(), account.provider_user_id.clone());
        let mut links = self.links.write().await;
        if links.contains_key(&key) {
            return Err(StoreError::Conflict("oauth_accounts_provider_user_key".into()));
        }
        links.insert(key, account.clone());
        Ok(account)
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OAuthAccount>> {
        let links = self.links.read().await;
        let mut found: Vec<OAuthAccount> = links
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|l| l.created_at);
        Ok(found)
    }

    async fn touch(&self, id: Uuid, info: &OAuthUserInfo) -> StoreResult<()> {
        let mut links = self.links.write().await;
        if let Some(link) = links.values_mut().find(|l| l.id == id) {
            link.email = info.email.clone();
            link.name = info.name.clone();
            link.picture = info.picture.clone();
            link.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// Provider answering code exchanges from a fixed table. Unknown codes fail
/// the way a provider rejecting the code would.
#[derive(Debug, Clone)]
pub struct StaticOAuthProvider {
    name: String,
    users: HashMap<String, OAuthUserInfo>,
}

impl StaticOAuthProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            users: HashMap::new(),
        }
    }

    pub fn with_user(mut self, code: &str, info: OAuthUserInfo) -> Self {
        self.users.insert(code.to_string(), info);
        self
    }
}

#[async_trait]
impl OAuthProvider for StaticOAuthProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(format!("https://{}.invalid/authorize?state={state}", self.name))
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthUserInfo, OAuthError> {
        self.users
            .get(code)
            .cloned()
            .ok_or_else(|| OAuthError::Provider(format!("{} rejected the code", self.name)))
    }
}
