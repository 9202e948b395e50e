//! Error taxonomy
//!
//! Every error raised by the checkout pipeline belongs to exactly one [`ErrorKind`]. Transport
//! layers map kinds to responses in one place instead of matching on every concrete error.

use std::fmt;

/// Client-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad quantity, malformed postal code, unknown variant and friends.
    Validation,

    /// The requested resource does not exist.
    NotFound,

    /// A reservation could not be granted.
    OutOfStock,

    /// The client-held cart fingerprint does not match the stored cart.
    CartTampered,

    /// Too many cart mutations in the current window.
    RateLimited,

    /// The order state machine refused a transition.
    IllegalTransition,

    /// An outbound call to the payment gateway failed.
    GatewayUnreachable,

    /// A webhook signature was missing, wrong, or stale.
    WebhookUnverified,

    /// A webhook event was already processed.
    DuplicateEvent,

    /// The caller presented no valid credentials.
    Unauthorized,

    /// The caller is not allowed to perform the operation.
    Forbidden,

    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    /// Stable identifier used in logs and response bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::CartTampered => "CART_TAMPERED",
            Self::RateLimited => "RATE_LIMITED",
            Self::IllegalTransition => "ILLEGAL_TRANSITION",
            Self::GatewayUnreachable => "GATEWAY_UNREACHABLE",
            Self::WebhookUnverified => "WEBHOOK_UNVERIFIED",
            Self::DuplicateEvent => "DUPLICATE_EVENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can report their [`ErrorKind`].
pub trait Categorised {
    /// The category this error belongs to.
    fn kind(&self) -> ErrorKind;
}
