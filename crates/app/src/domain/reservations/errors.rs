//! Reservations service errors.

use atelier::{
    errors::{Categorised, ErrorKind as Kind},
    reservations::Shortage,
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::{catalog::records::VariantUuid, orders::OrdersServiceError};

#[derive(Debug, Error)]
pub enum ReservationsServiceError {
    #[error("order not found")]
    NotFound,

    #[error("variant {0} is not for sale")]
    UnknownVariant(VariantUuid),

    #[error(transparent)]
    OutOfStock(#[from] Shortage),

    #[error("hold expiry overflows")]
    Expiry(#[source] jiff::Error),

    #[error("related resource not found")]
    InvalidReference,

    #[error("invalid data")]
    InvalidData,

    #[error(transparent)]
    Transition(#[from] OrdersServiceError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for ReservationsServiceError {
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

impl Categorised for ReservationsServiceError {
    fn kind(&self) -> Kind {
        match self {
            Self::NotFound => Kind::NotFound,
            Self::UnknownVariant(_) | Self::InvalidReference | Self::InvalidData => {
                Kind::Validation
            }
            Self::OutOfStock(shortage) => shortage.kind(),
            Self::Transition(error) => error.kind(),
            Self::Expiry(_) | Self::Sql(_) => Kind::Internal,
        }
    }
}
