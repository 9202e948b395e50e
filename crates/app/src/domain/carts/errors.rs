//! Carts service errors.

use std::time::Duration;

use atelier::{
    carts::{CartError, fingerprint::FingerprintError},
    errors::{Categorised, ErrorKind as Kind},
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::{carts::stores::CartStoreError, catalog::records::VariantUuid};

#[derive(Debug, Error)]
pub enum CartsServiceError {
    #[error("cart not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("cart already exists")]
    AlreadyExists,

    #[error("storage error")]
    Sql(#[source] Error),

    #[error("variant {0} does not exist")]
    UnknownVariant(VariantUuid),

    #[error("variant {0} is not for sale")]
    Unavailable(VariantUuid),

    #[error("only {available} units of variant {variant} in stock")]
    OutOfStock { variant: VariantUuid, available: i64 },

    #[error("cart is empty")]
    EmptyCart,

    #[error("too many cart changes; retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Contents(#[from] CartError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Store(#[from] CartStoreError),
}

impl From<Error> for CartsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

impl Categorised for CartsServiceError {
    fn kind(&self) -> Kind {
        match self {
            Self::NotFound | Self::InvalidReference | Self::UnknownVariant(_) => Kind::NotFound,
            Self::MissingRequiredData
            | Self::InvalidData
            | Self::AlreadyExists
            | Self::Unavailable(_)
            | Self::EmptyCart => Kind::Validation,
            Self::OutOfStock { .. } => Kind::OutOfStock,
            Self::RateLimited { .. } => Kind::RateLimited,
            Self::Contents(error) => error.kind(),
            Self::Fingerprint(error) => error.kind(),
            Self::Store(error) => error.kind(),
            Self::Sql(_) => Kind::Internal,
        }
    }
}
