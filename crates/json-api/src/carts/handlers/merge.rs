//! Merge Cart Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::prelude::*;

use crate::{
    carts::{errors::into_status_error, handlers::view::CartResponse},
    extensions::*,
    state::State,
};

/// Merge Cart Handler
///
/// Called at login with both the anonymous `cart_session` cookie and the buyer's bearer token.
/// The session cart is folded into the buyer's cart and emptied.
#[endpoint(
    tags("carts"),
    summary = "Merge Session Cart",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Merged cart"),
        (status_code = StatusCode::BAD_REQUEST, description = "No session cart to merge"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Not signed in"),
    ),
)]
#[tracing::instrument(name = "carts.merge", skip(depot, res), err)]
pub(crate) async fn handler(
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<CartResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;

    let user = visitor
        .user()
        .ok_or_else(|| StatusError::unauthorized().brief("UNAUTHORIZED: sign in to merge carts"))?;

    let session = visitor
        .session
        .clone()
        .ok_or_else(|| StatusError::bad_request().brief("VALIDATION: no cart_session cookie"))?;

    let view = state
        .carts
        .merge_session_into_user(session, user, Timestamp::now())
        .await
        .map_err(|error| into_status_error(error, res))?;

    tracing::info!(user_uuid = %user, lines = view.lines.len(), "merged session cart");

    Ok(Json(view.into()))
}
