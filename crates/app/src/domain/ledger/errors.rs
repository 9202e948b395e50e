//! Ledger service errors.

use atelier::errors::{Categorised, ErrorKind as Kind};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerServiceError {
    #[error("variant not found")]
    NotFound,

    #[error("adjustment must move stock")]
    ZeroDelta,

    #[error("stock would drop to {resulting}, below the {held} units held by pending orders")]
    BelowHeld { held: i64, resulting: i64 },

    #[error("related resource not found")]
    InvalidReference,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for LedgerServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

impl Categorised for LedgerServiceError {
    fn kind(&self) -> Kind {
        match self {
            Self::NotFound | Self::InvalidReference => Kind::NotFound,
            Self::ZeroDelta | Self::BelowHeld { .. } | Self::InvalidData => Kind::Validation,
            Self::Sql(_) => Kind::Internal,
        }
    }
}
