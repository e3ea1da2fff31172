use std::sync::Mutex;

use async_trait::async_trait;

use super::lock;
use crate::email::{MailError, Mailer};

/// A message captured by [`MemoryMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMail {
    PasswordReset { to: String, token: String },
    PasswordChanged { to: String },
}

impl SentMail {
    pub fn recipient(&self) -> &str {
        match self {
            SentMail::PasswordReset { to, .. } | SentMail::PasswordChanged { to } => to,
        }
    }
}

/// Mailer that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        lock(&self.outbox).clone()
    }

    /// Most recent reset token mailed to `to`.
    pub fn last_reset_token(&self, to: &str) -> Option<String> {
        lock(&self.outbox).iter().rev().find_map(|m| match m {
            SentMail::PasswordReset { to: addr, token } if addr == to => Some(token.clone()),
            _ => None,
        })
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailError> {
        lock(&self.outbox).push(SentMail::PasswordReset {
            to: to.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn send_password_changed(&self, to: &str) -> Result<(), MailError> {
        lock(&self.outbox).push(SentMail::PasswordChanged { to: to.to_string() });
        Ok(())
    }
}
