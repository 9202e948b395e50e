//! Outbox errors.

use atelier::errors::{Categorised, ErrorKind};
use thiserror::Error;

use crate::domain::{
    carts::stores::CartStoreError,
    outbox::mailer::MailerError,
    payments::gateway::PaymentGatewayError,
};

#[derive(Debug, Error)]
pub enum OutboxServiceError {
    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}

impl Categorised for OutboxServiceError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Why a handler could not deliver an entry. Every variant is retried.
#[derive(Debug, Error)]
pub enum OutboxHandlerError {
    #[error("payload does not match topic")]
    Payload(#[from] serde_json::Error),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Gateway(#[from] PaymentGatewayError),

    #[error(transparent)]
    Cart(#[from] CartStoreError),

    #[error(transparent)]
    Mailer(#[from] MailerError),
}
