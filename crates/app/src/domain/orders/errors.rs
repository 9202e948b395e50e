//! Orders service errors.

use atelier::{
    errors::{Categorised, ErrorKind as Kind},
    orders::{IllegalTransition, code::MalformedCode},
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::catalog::records::VariantUuid;

#[derive(Debug, Error)]
pub enum OrdersServiceError {
    #[error("order already exists")]
    AlreadyExists,

    #[error("order not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("order belongs to another buyer")]
    Forbidden,

    #[error("variant {0} has too little stock to confirm the order")]
    InsufficientStock(VariantUuid),

    #[error(transparent)]
    InvalidCode(#[from] MalformedCode),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for OrdersServiceError {
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

impl Categorised for OrdersServiceError {
    fn kind(&self) -> Kind {
        match self {
            Self::NotFound => Kind::NotFound,
            Self::AlreadyExists
            | Self::InvalidReference
            | Self::MissingRequiredData
            | Self::InvalidData => Kind::Validation,
            Self::IllegalTransition(error) => error.kind(),
            Self::Forbidden => Kind::Forbidden,
            Self::InsufficientStock(_) => Kind::OutOfStock,
            Self::InvalidCode(error) => error.kind(),
            Self::Sql(_) => Kind::Internal,
        }
    }
}
