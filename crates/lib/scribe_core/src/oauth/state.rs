//! CSRF `state` bookkeeping between authorize redirect and callback.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// TTL for pending state entries (10 minutes).
pub const STATE_TTL: Duration = Duration::from_secs(600);

/// Generate a cryptographic state parameter (CSRF token).
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Provider a pending authorization was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub provider: String,
    pub created_at: Instant,
}

impl PendingLogin {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            created_at: Instant::now(),
        }
    }
}

/// In-memory store of pending states, keyed by the state parameter.
#[derive(Debug, Default)]
pub struct OAuthStateStore {
    states: DashMap<String, PendingLogin>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: String, pending: PendingLogin) {
        self.states.insert(state, pending);
    }

    /// Remove and return a pending entry. `None` if unknown or expired, so
    /// every state is usable at most once.
    pub fn take(&self, state: &str) -> Option<PendingLogin> {
        let (_, pending) = self.states.remove(state)?;
        if pending.created_at.elapsed() > STATE_TTL {
            return None;
        }
        Some(pending)
    }

    /// Evict expired entries, returning how many were dropped.
    pub fn cleanup(&self) -> usize {
        let before = self.states.len();
        self.states
            .retain(|_, v| v.created_at.elapsed() <= STATE_TTL);
        before.saturating_sub(self.states.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_unique_and_url_safe() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn take_is_single_use() {
        let store = OAuthStateStore::new();
        store.insert("s1".into(), PendingLogin::new("github"));

        let pending = store.take("s1").unwrap();
        assert_eq!(pending.provider, "github");
        assert!(store.take("s1").is_none());
        assert!(store.take("unknown").is_none());
    }

    #[test]
    fn expired_state_is_rejected_and_cleaned() {
        let store = OAuthStateStore::new();
        let Some(old) = Instant::now().checked_sub(STATE_TTL + Duration::from_secs(1)) else {
            return;
        };
        let stale = PendingLogin {
            provider: "google".into(),
            created_at: old,
        };
        store.insert("old".into(), stale.clone());
        store.insert("fresh".into(), PendingLogin::new("google"));

        assert_eq!(store.cleanup(), 1);
        assert!(store.take("fresh").is_some());

        store.insert("old".into(), stale);
        assert!(store.take("old").is_none());
    }
}
