//! Get Order Handler

use std::sync::Arc;

use atelier_app::domain::orders::records::{
    OrderItemRecord, OrderRecord, ShippingAddress, StatusLogRecord,
};
use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::into_status_error,
    extensions::*,
    orders::handlers::{OrderResponse, parse_code},
    session::Visitor,
    state::State,
};

/// Order Item Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderItemResponse {
    pub variant: Uuid,
    pub sku: String,
    pub product_name: String,
    pub size: String,
    pub colour: String,
    pub quantity: u32,

    /// Unit price frozen at checkout
    pub unit_price: u64,

    pub total: u64,
}

impl From<OrderItemRecord> for OrderItemResponse {
    fn from(item: OrderItemRecord) -> Self {
        Self {
            total: item.total(),
            variant: item.variant.into_uuid(),
            sku: item.sku,
            product_name: item.product_name,
            size: item.size,
            colour: item.colour,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// Address Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct AddressResponse {
    pub recipient: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl From<ShippingAddress> for AddressResponse {
    fn from(address: ShippingAddress) -> Self {
        Self {
            postal_code: address.postal_code.to_string(),
            recipient: address.recipient,
            street: address.street,
            number: address.number,
            complement: address.complement,
            district: address.district,
            city: address.city,
            state: address.state,
        }
    }
}

/// Status History Entry
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct StatusHistoryResponse {
    pub from: Option<String>,
    pub to: String,

    /// `system`, `gateway`, `operator` or `buyer`
    pub actor: String,

    pub note: Option<String>,
    pub at: String,
}

impl From<StatusLogRecord> for StatusHistoryResponse {
    fn from(entry: StatusLogRecord) -> Self {
        Self {
            from: entry.from.map(|status| status.code().to_string()),
            to: entry.to.code().to_string(),
            actor: entry.actor.to_string(),
            note: entry.note,
            at: entry.created_at.to_string(),
        }
    }
}

/// Order Details Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderDetailsResponse {
    pub order: OrderResponse,
    pub shipping_address: AddressResponse,
    pub items: Vec<OrderItemResponse>,
    pub history: Vec<StatusHistoryResponse>,
}

/// The operator sees every order; buyers see orders placed by their account or their cart.
pub(crate) fn can_view(visitor: &Visitor, order: &OrderRecord) -> bool {
    visitor.operator
        || visitor.user().is_some_and(|user| order.user == Some(user))
        || order.cart_owner == visitor.owner
}

/// Get Order Handler
///
/// Orders the visitor may not see answer 404, the same as unknown codes.
#[endpoint(
    tags("orders"),
    summary = "Get Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Order"),
        (status_code = StatusCode::NOT_FOUND, description = "Order not found"),
    ),
)]
pub(crate) async fn handler(
    code: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<OrderDetailsResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;
    let code = parse_code(&code.into_inner())?;

    let details = state
        .orders
        .get_order(code.clone())
        .await
        .map_err(into_status_error)?;

    if !can_view(visitor, &details.order) {
        return Err(StatusError::not_found().brief("NOT_FOUND: order not found"));
    }

    let history = state
        .orders
        .history(code)
        .await
        .map_err(into_status_error)?;

    Ok(Json(OrderDetailsResponse {
        shipping_address: details.order.shipping_address.clone().into(),
        order: details.order.into(),
        items: details.items.into_iter().map(Into::into).collect(),
        history: history.into_iter().map(Into::into).collect(),
    }))
}
