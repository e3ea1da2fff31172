//! Outbound account email: password-reset links and change notices.
//!
//! [`SmtpMailer`] delivers through an async `lettre` SMTP transport. When no
//! SMTP host is configured the server falls back to [`LogMailer`], which only
//! records that a message would have gone out.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

const RESET_SUBJECT: &str = "Reset your password";
const CHANGED_SUBJECT: &str = "Your password was changed";

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail configuration: {0}")]
    Config(String),

    #[error("invalid address: {0}")]
    Address(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),
}

/// Sends account-related mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Mail the raw reset token (as a link) to `to`.
    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailError>;

    /// Notify `to` that their password has just been changed.
    async fn send_password_changed(&self, to: &str) -> Result<(), MailError>;
}

/// Build the link mailed for a password reset.
pub fn reset_link(base: &str, token: &str) -> Result<String, MailError> {
    let mut url = Url::parse(base).map_err(|e| MailError::Config(format!("reset url: {e}")))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}

/// SMTP connection settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Base URL of the frontend reset page; the token is appended as `?token=`.
    pub reset_url_base: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("reset_url_base", &self.reset_url_base)
            .finish()
    }
}

pub struct SmtpMailer {
    from: Mailbox,
    reset_url_base: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl SmtpMailer {
    /// Build a STARTTLS transport for `config`.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| MailError::Config(format!("invalid from address: {e}")))?;
        Url::parse(&config.reset_url_base)
            .map_err(|e| MailError::Config(format!("reset url: {e}")))?;

        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Config(format!("SMTP TLS relay error: {e}")))?
            .port(config.port);
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            from,
            reset_url_base: config.reset_url_base.clone(),
            transport: builder.build(),
        })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let message = build_message(&self.from, to, subject, body)?;
        self.transport.send(message).await.map_err(|e| {
            error!(to, error = %e, "SMTP send failed");
            MailError::Smtp(e.to_string())
        })?;
        info!(to, subject, "email sent");
        Ok(())
    }
}

fn build_message(from: &Mailbox, to: &str, subject: &str, body: String) -> Result<Message, MailError> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| MailError::Address(format!("{to}: {e}")))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .body(body)
        .map_err(|e| MailError::Build(e.to_string()))
}

fn reset_body(link: &str) -> String {
    format!(
        "We received a request to reset your password.\n\n\
         Open the link below within one hour to choose a new one:\n\n{link}\n\n\
         If you did not ask for this, you can ignore this email."
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = reset_link(&self.reset_url_base, token)?;
        self.send(to, RESET_SUBJECT, reset_body(&link)).await
    }

    async fn send_password_changed(&self, to: &str) -> Result<(), MailError> {
        let body = "Your password was just changed and all sessions were signed out.\n\n\
                    If this was not you, reset your password immediately."
            .to_string();
        self.send(to, CHANGED_SUBJECT, body).await
    }
}

/// Mailer that only logs recipient and subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, _token: &str) -> Result<(), MailError> {
        info!(to, subject = RESET_SUBJECT, "mail delivery disabled, reset email not sent");
        Ok(())
    }

    async fn send_password_changed(&self, to: &str) -> Result<(), MailError> {
        info!(to, subject = CHANGED_SUBJECT, "mail delivery disabled, notice not sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_appends_encoded_token() {
        let link = reset_link("https://app.example.com/reset", "ab cd").unwrap();
        assert_eq!(link, "https://app.example.com/reset?token=ab+cd");

        let link = reset_link("https://app.example.com/reset?lang=en", "abc").unwrap();
        assert_eq!(link, "https://app.example.com/reset?lang=en&token=abc");
    }

    #[test]
    fn reset_link_rejects_relative_base() {
        assert!(matches!(reset_link("/reset", "abc"), Err(MailError::Config(_))));
    }

    #[test]
    fn message_requires_valid_recipient() {
        let from: Mailbox = "Scribe <noreply@example.com>".parse().unwrap();
        assert!(build_message(&from, "alice@example.com", "hi", "body".into()).is_ok());
        assert!(matches!(
            build_message(&from, "not an address", "hi", "body".into()),
            Err(MailError::Address(_))
        ));
    }

    #[test]
    fn reset_body_contains_link() {
        assert!(reset_body("https://x/reset?token=t").contains("https://x/reset?token=t"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        assert!(LogMailer.send_password_reset("a@b.com", "secret").await.is_ok());
        assert!(LogMailer.send_password_changed("a@b.com").await.is_ok());
    }
}
