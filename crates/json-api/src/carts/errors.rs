//! Errors

use salvo::{
    http::{StatusError, header::RETRY_AFTER},
    prelude::Response,
};
use tracing::warn;

use atelier_app::domain::carts::CartsServiceError;

/// Map a cart failure to its response, telling rate-limited clients when to come back.
pub(crate) fn into_status_error(error: CartsServiceError, res: &mut Response) -> StatusError {
    if let CartsServiceError::RateLimited { retry_after } = &error {
        let seconds = retry_after.as_secs().max(1);

        if let Err(header_error) = res.add_header(RETRY_AFTER, seconds.to_string(), true) {
            warn!("failed to set retry-after header: {header_error}");
        }
    }

    crate::errors::into_status_error(error)
}
