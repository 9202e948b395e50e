//! View Cart Handler

use std::sync::Arc;

use atelier::carts::CartLine;
use atelier_app::domain::carts::records::CartView;
use jiff::Timestamp;
use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{carts::errors::into_status_error, extensions::*, state::State};

/// Cart Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CartResponse {
    /// The unique identifier of the cart
    pub uuid: Uuid,

    pub lines: Vec<CartLineResponse>,

    /// Sum of line totals in minor units
    pub items_total: u64,

    pub total_quantity: u32,

    pub content_hash: String,

    /// Present the fingerprint when reviewing the cart or starting checkout
    pub fingerprint: Option<String>,

    /// Some prices were refreshed from the catalog
    pub repriced: bool,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            uuid: view.uuid.into_uuid(),
            lines: view.lines.into_iter().map(CartLineResponse::from).collect(),
            items_total: view.items_total,
            total_quantity: view.total_quantity,
            content_hash: view.content_hash,
            fingerprint: view.fingerprint,
            repriced: view.repriced,
        }
    }
}

/// Cart Line Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CartLineResponse {
    /// The variant in the line, also the line key
    pub variant: Uuid,

    pub quantity: u32,
    pub size: String,
    pub colour: String,

    /// Unit price in minor units
    pub unit_price: u64,

    /// Line total in minor units
    pub total: u64,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            total: line.total(),
            variant: line.variant,
            quantity: line.quantity,
            size: line.size,
            colour: line.colour,
            unit_price: line.unit_price,
        }
    }
}

/// View Cart Handler
///
/// Returns the visitor's cart with prices recomputed from the catalog.
#[endpoint(
    tags("carts"),
    summary = "View Cart",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Cart"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
pub(crate) async fn handler(
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<CartResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;

    let view = state
        .carts
        .view(visitor.owner.clone(), Timestamp::now())
        .await
        .map_err(|error| into_status_error(error, res))?;

    Ok(Json(view.into()))
}
