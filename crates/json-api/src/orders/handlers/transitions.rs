//! Order Transition Handlers
//!
//! Every transition except `cancel` sits behind the operator guard in the router.

use std::sync::Arc;

use atelier_app::domain::orders::data::Requester;
use jiff::Timestamp;
use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    errors::into_status_error,
    extensions::*,
    orders::handlers::{OrderResponse, parse_code},
    state::State,
};

/// Ship Order Request
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub(crate) struct ShipOrderRequest {
    /// Carrier tracking code
    #[serde(default)]
    pub tracking_code: Option<String>,
}

/// Ship Order Handler
#[endpoint(
    tags("orders"),
    summary = "Ship Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order shipped"),
        (status_code = StatusCode::NOT_FOUND, description = "Order not found"),
        (status_code = StatusCode::CONFLICT, description = "Order is not paid"),
    ),
)]
#[tracing::instrument(name = "orders.ship", skip(code, json, depot), err)]
pub(crate) async fn ship(
    code: PathParam<String>,
    json: JsonBody<ShipOrderRequest>,
    depot: &mut Depot,
) -> Result<Json<OrderResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let code = parse_code(&code.into_inner())?;

    let tracking_code = json
        .into_inner()
        .tracking_code
        .map(|tracking| tracking.trim().to_string())
        .filter(|tracking| !tracking.is_empty());

    let order = state
        .orders
        .ship(code, tracking_code, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    tracing::info!(order_code = %order.code, "order shipped");

    Ok(Json(order.into()))
}

/// Arrive Order Handler
///
/// The carrier reported the parcel at the destination hub.
#[endpoint(
    tags("orders"),
    summary = "Mark Order In Transit",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order in transit"),
        (status_code = StatusCode::CONFLICT, description = "Order is not shipped"),
    ),
)]
pub(crate) async fn arrive(
    code: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<OrderResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let code = parse_code(&code.into_inner())?;

    let order = state
        .orders
        .mark_in_transit(code, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    Ok(Json(order.into()))
}

/// Deliver Order Handler
#[endpoint(
    tags("orders"),
    summary = "Mark Order Delivered",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order delivered"),
        (status_code = StatusCode::CONFLICT, description = "Order is not in transit"),
    ),
)]
pub(crate) async fn deliver(
    code: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<OrderResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let code = parse_code(&code.into_inner())?;

    let order = state
        .orders
        .mark_delivered(code, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    Ok(Json(order.into()))
}

/// Refund Order Handler
///
/// Restores stock and queues the gateway refund.
#[endpoint(
    tags("orders"),
    summary = "Refund Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order refunded"),
        (status_code = StatusCode::CONFLICT, description = "Order was never paid"),
    ),
)]
#[tracing::instrument(name = "orders.refund", skip(code, depot), err)]
pub(crate) async fn refund(
    code: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<OrderResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let code = parse_code(&code.into_inner())?;

    let order = state
        .orders
        .refund(code, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    tracing::info!(order_code = %order.code, "order refunded");

    Ok(Json(order.into()))
}

/// Cancel Order Handler
///
/// The operator may cancel any paid order. A signed-in buyer may cancel their own.
#[endpoint(
    tags("orders"),
    summary = "Cancel Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order cancelled"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Not signed in"),
        (status_code = StatusCode::FORBIDDEN, description = "Order belongs to another buyer"),
        (status_code = StatusCode::CONFLICT, description = "Order is not paid"),
    ),
)]
#[tracing::instrument(name = "orders.cancel", skip(code, depot), err)]
pub(crate) async fn cancel(
    code: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<OrderResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;
    let code = parse_code(&code.into_inner())?;

    let requester = if visitor.operator {
        Requester::Operator
    } else {
        let user = visitor.user().ok_or_else(|| {
            StatusError::unauthorized().brief("UNAUTHORIZED: sign in to cancel an order")
        })?;

        Requester::Buyer(user)
    };

    let order = state
        .orders
        .cancel(code, requester, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    tracing::info!(order_code = %order.code, actor = %requester.actor(), "order cancelled");

    Ok(Json(order.into()))
}
