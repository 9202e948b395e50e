//! Catalog service errors.

use atelier::{
    errors::{Categorised, ErrorKind as Kind},
    pricing::PriceError,
    shipping::ShippingError,
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogServiceError {
    #[error("product or variant already exists")]
    AlreadyExists,

    #[error("product or variant not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),

    #[error(transparent)]
    InvalidPrice(#[from] PriceError),

    #[error(transparent)]
    InvalidPackage(#[from] ShippingError),
}

impl From<Error> for CatalogServiceError {
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

impl Categorised for CatalogServiceError {
    fn kind(&self) -> Kind {
        match self {
            Self::NotFound | Self::InvalidReference => Kind::NotFound,
            Self::AlreadyExists
            | Self::MissingRequiredData
            | Self::InvalidData
            | Self::InvalidPrice(_) => Kind::Validation,
            Self::InvalidPackage(error) => error.kind(),
            Self::Sql(_) => Kind::Internal,
        }
    }
}
