//! Error kind to HTTP status mapping.

use std::error::Error;

use atelier::errors::{Categorised, ErrorKind};
use salvo::prelude::StatusError;
use tracing::{error, warn};

/// Map a categorised service error to its fixed client response.
///
/// Internal errors are logged inside the request span, which carries the `x-request-id`, and
/// reach the client without detail.
pub(crate) fn into_status_error<E>(error: E) -> StatusError
where
    E: Categorised + Error,
{
    let kind = error.kind();

    let status = match kind {
        ErrorKind::Validation | ErrorKind::WebhookUnverified => StatusError::bad_request(),
        ErrorKind::NotFound => StatusError::not_found(),
        ErrorKind::OutOfStock | ErrorKind::IllegalTransition | ErrorKind::DuplicateEvent => {
            StatusError::conflict()
        }
        ErrorKind::CartTampered | ErrorKind::Forbidden => StatusError::forbidden(),
        ErrorKind::RateLimited => StatusError::too_many_requests(),
        ErrorKind::Unauthorized => StatusError::unauthorized(),
        ErrorKind::GatewayUnreachable => {
            warn!(kind = %kind, "payment gateway unreachable: {error}");

            StatusError::service_unavailable()
        }
        ErrorKind::Internal => {
            error!(kind = %kind, "request failed: {error}");

            return StatusError::internal_server_error();
        }
    };

    status.brief(format!("{kind}: {error}"))
}
