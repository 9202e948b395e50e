//! Checkout service errors.

use atelier::{
    coupons::{CouponRejection, DiscountError},
    errors::{Categorised, ErrorKind as Kind},
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::{
    carts::CartsServiceError,
    catalog::records::VariantUuid,
    orders::records::AddressError,
    payments::gateway::PaymentGatewayError,
    reservations::ReservationsServiceError,
};

#[derive(Debug, Error)]
pub enum CheckoutServiceError {
    #[error("order already exists")]
    AlreadyExists,

    #[error("not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error(transparent)]
    Cart(#[from] CartsServiceError),

    #[error("variant {0} is no longer for sale")]
    Unavailable(VariantUuid),

    #[error("price of variant {0} changed since the cart was reviewed")]
    PriceChanged(VariantUuid),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("shipping option {0:?} is not offered for this address")]
    UnknownShippingOption(String),

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error(transparent)]
    Discount(#[from] DiscountError),

    #[error(transparent)]
    Reservation(#[from] ReservationsServiceError),

    #[error("payment gateway unreachable")]
    Gateway(#[from] PaymentGatewayError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for CheckoutServiceError {
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

impl Categorised for CheckoutServiceError {
    fn kind(&self) -> Kind {
        match self {
            Self::NotFound => Kind::NotFound,
            Self::AlreadyExists
            | Self::InvalidReference
            | Self::MissingRequiredData
            | Self::InvalidData
            | Self::Unavailable(_)
            | Self::InvalidAddress(_)
            | Self::UnknownShippingOption(_) => Kind::Validation,
            Self::Cart(error) => error.kind(),
            // The client's snapshot is stale; it must review the cart again.
            Self::PriceChanged(_) => Kind::CartTampered,
            Self::Coupon(rejection) => rejection.kind(),
            Self::Discount(_) | Self::Sql(_) => Kind::Internal,
            Self::Reservation(error) => error.kind(),
            Self::Gateway(error) => error.kind(),
        }
    }
}
