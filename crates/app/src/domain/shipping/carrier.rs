//! Carrier capability.

use async_trait::async_trait;
use atelier::{
    errors::{Categorised, ErrorKind},
    shipping::{CarrierQuote, Package, PostalCode},
};
use mockall::automock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("carrier request failed")]
    Transport(#[source] reqwest::Error),

    #[error("carrier answered {status}")]
    Unavailable { status: u16 },

    #[error("carrier refused the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("carrier response could not be read")]
    Decode(#[source] reqwest::Error),
}

impl CarrierError {
    /// Timeouts, connection failures and 5xx answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_timeout() || error.is_connect(),
            Self::Unavailable { .. } => true,
            Self::Rejected { .. } | Self::Decode(_) => false,
        }
    }
}

impl Categorised for CarrierError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::GatewayUnreachable
    }
}

#[automock]
#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Raw quotes for sending `packages` from `origin` to `destination`.
    async fn quote(
        &self,
        origin: PostalCode,
        destination: PostalCode,
        packages: Vec<Package>,
    ) -> Result<Vec<CarrierQuote>, CarrierError>;
}
