//! Outgoing email.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[automock]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailerError>;
}

/// Writes emails to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, email: Email) -> Result<(), MailerError> {
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            "email dispatched"
        );

        Ok(())
    }
}
