//! Coupons service errors.

use atelier::{
    coupons::{CouponRejection, DiscountError},
    errors::{Categorised, ErrorKind as Kind},
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CouponsServiceError {
    #[error("coupon code already exists")]
    AlreadyExists,

    #[error("coupon not found")]
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
    Rejected(#[from] CouponRejection),

    #[error(transparent)]
    InvalidDefinition(#[from] DiscountError),
}

impl From<Error> for CouponsServiceError {
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

impl Categorised for CouponsServiceError {
    fn kind(&self) -> Kind {
        match self {
            Self::NotFound => Kind::NotFound,
            Self::AlreadyExists
            | Self::InvalidReference
            | Self::MissingRequiredData
            | Self::InvalidData => Kind::Validation,
            Self::Rejected(rejection) => rejection.kind(),
            Self::InvalidDefinition(error) => error.kind(),
            Self::Sql(_) => Kind::Internal,
        }
    }
}
