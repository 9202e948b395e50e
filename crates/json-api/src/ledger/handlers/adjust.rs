//! Stock Adjustment Handler

use std::sync::Arc;

use atelier_app::domain::ledger::records::StockAdjustment;
use jiff::Timestamp;
use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    catalog::stock::StockResponse, errors::into_status_error, extensions::*, state::State,
};

/// Stock Adjustment Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct StockAdjustmentRequest {
    /// Units to add, or remove when negative
    pub delta: i64,

    /// Why, for the ledger
    #[serde(default)]
    pub note: Option<String>,
}

/// Stock Adjustment Handler
///
/// Writes a `manual` ledger entry. Stock never drops below the units held by pending orders.
#[endpoint(
    tags("ledger"),
    summary = "Adjust Variant Stock",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::CREATED, description = "Adjustment recorded"),
        (status_code = StatusCode::BAD_REQUEST, description = "Zero delta, or stock would drop below held units"),
        (status_code = StatusCode::NOT_FOUND, description = "Variant not found"),
    ),
)]
#[tracing::instrument(
    name = "ledger.adjust",
    skip(variant, json, depot, res),
    fields(variant_uuid = tracing::field::Empty, delta = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    variant: PathParam<Uuid>,
    json: JsonBody<StockAdjustmentRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<StockResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let variant = variant.into_inner();
    let request = json.into_inner();

    let span = tracing::Span::current();

    span.record("variant_uuid", tracing::field::display(variant));
    span.record("delta", request.delta);

    let stock = state
        .ledger
        .adjust(
            StockAdjustment {
                variant: variant.into(),
                delta: request.delta,
                note: request.note.filter(|note| !note.trim().is_empty()),
            },
            Timestamp::now(),
        )
        .await
        .map_err(into_status_error)?;

    tracing::info!(variant_uuid = %variant, stock, "stock adjusted");

    res.status_code(StatusCode::CREATED);

    Ok(Json(StockResponse { variant, stock }))
}
