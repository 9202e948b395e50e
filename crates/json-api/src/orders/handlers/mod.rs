//! Order Handlers

pub(crate) mod get;
pub(crate) mod transitions;

use atelier::orders::OrderCode;
use atelier_app::domain::orders::records::OrderRecord;
use salvo::{oapi::ToSchema, prelude::StatusError};
use serde::{Deserialize, Serialize};

use crate::{checkout::intent::TotalsResponse, errors::into_status_error};

/// Order Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderResponse {
    pub code: String,

    /// Status code: `P`, `PA`, `PF`, `E`, `T`, `C`, `X` or `D`
    pub status: String,

    pub status_label: String,
    pub totals: TotalsResponse,
    pub currency: String,
    pub shipping_label: String,
    pub tracking_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<OrderRecord> for OrderResponse {
    fn from(order: OrderRecord) -> Self {
        Self {
            code: order.code.to_string(),
            status: order.status.code().to_string(),
            status_label: order.status.label().to_string(),
            totals: order.totals.into(),
            currency: order.currency,
            shipping_label: order.shipping_label,
            tracking_code: order.tracking_code,
            created_at: order.created_at.to_string(),
            updated_at: order.updated_at.to_string(),
        }
    }
}

pub(crate) fn parse_code(code: &str) -> Result<OrderCode, StatusError> {
    code.parse().map_err(into_status_error)
}
