//! Review Cart Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{oapi::extract::JsonBody, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    carts::{errors::into_status_error, handlers::view::CartResponse},
    extensions::*,
    state::State,
};

/// Review Cart Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ReviewCartRequest {
    /// Fingerprint from the last cart response
    pub fingerprint: String,
}

/// Review Cart Handler
///
/// Confirms the cart the client saw is the cart stored. A mismatch answers 403; the client must
/// reload the cart to obtain its current fingerprint.
#[endpoint(
    tags("carts"),
    summary = "Review Cart",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Cart confirmed"),
        (status_code = StatusCode::BAD_REQUEST, description = "Cart is empty"),
        (status_code = StatusCode::FORBIDDEN, description = "Fingerprint mismatch"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<ReviewCartRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<CartResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;

    let view = state
        .carts
        .review(
            visitor.owner.clone(),
            json.into_inner().fingerprint,
            Timestamp::now(),
        )
        .await
        .map_err(|error| into_status_error(error, res))?;

    Ok(Json(view.into()))
}
