//! Resolve Variant Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{
    oapi::extract::{PathParam, QueryParam},
    prelude::*,
};
use uuid::Uuid;

use crate::{
    catalog::handlers::get::VariantResponse, errors::into_status_error, extensions::*,
    state::State,
};

/// Resolve Variant Handler
///
/// Finds the active variant of a product by colour and size, ignoring case.
#[endpoint(
    tags("catalog"),
    summary = "Resolve Variant",
    responses(
        (status_code = StatusCode::OK, description = "Variant"),
        (status_code = StatusCode::NOT_FOUND, description = "No such variant"),
    ),
)]
pub(crate) async fn handler(
    product: PathParam<Uuid>,
    colour: QueryParam<String, true>,
    size: QueryParam<String, true>,
    depot: &mut Depot,
) -> Result<Json<VariantResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let product = product.into_inner();

    let variant = state
        .catalog
        .resolve_variant(product.into(), colour.into_inner(), size.into_inner())
        .await
        .map_err(into_status_error)?;

    let priced = state
        .catalog
        .get_variant(variant.uuid)
        .await
        .map_err(into_status_error)?;

    Ok(Json(VariantResponse::at(
        priced.variant,
        priced.pricing.product,
        Timestamp::now(),
    )))
}
