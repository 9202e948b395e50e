//! Variant Stock Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::into_status_error, extensions::*, state::State};

/// Stock Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct StockResponse {
    pub variant: Uuid,

    /// Authoritative units on hand, holds included
    pub stock: i64,
}

/// Variant Stock Handler
#[endpoint(
    tags("catalog"),
    summary = "Get Variant Stock",
    responses(
        (status_code = StatusCode::OK, description = "Stock"),
        (status_code = StatusCode::NOT_FOUND, description = "Variant not found"),
    ),
)]
pub(crate) async fn handler(
    variant: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<StockResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let variant = variant.into_inner();

    let stock = state
        .catalog
        .stock(variant.into())
        .await
        .map_err(into_status_error)?;

    Ok(Json(StockResponse { variant, stock }))
}
