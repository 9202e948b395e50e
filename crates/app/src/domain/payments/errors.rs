//! Webhook errors.

use atelier::{
    errors::{Categorised, ErrorKind},
    webhooks::VerificationError,
};
use thiserror::Error;

use crate::domain::orders::OrdersServiceError;

#[derive(Debug, Error)]
pub enum WebhooksServiceError {
    #[error(transparent)]
    Unverified(#[from] VerificationError),

    #[error("signed payload is not a gateway event")]
    MalformedEvent(#[source] serde_json::Error),

    #[error("no order carries payment intent {0}")]
    UnknownIntent(String),

    #[error("order transition failed")]
    Transition(#[from] OrdersServiceError),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}

impl Categorised for WebhooksServiceError {
    /// Everything but a bad signature or payload is retryable by the gateway.
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Unverified(error) => error.kind(),
            Self::MalformedEvent(_) => ErrorKind::Validation,
            Self::UnknownIntent(_) | Self::Transition(_) | Self::Sql(_) => ErrorKind::Internal,
        }
    }
}
