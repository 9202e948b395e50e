//! Shipping Quotes Handler

use std::sync::Arc;

use atelier::shipping::{PostalCode, QuoteOutcome, QuoteWarning, ShippingOption};
use jiff::Timestamp;
use salvo::{oapi::extract::JsonBody, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{errors::into_status_error, extensions::*, state::State};

/// Shipping Quotes Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ShippingQuotesRequest {
    /// Destination postal code, with or without the hyphen
    pub postal_code: String,
}

/// Shipping Quotes Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ShippingQuotesResponse {
    /// Options, cheapest first
    pub options: Vec<ShippingOptionResponse>,

    /// Why no options are offered: `carrier_unavailable`, `carrier_rejected` or `no_options`
    pub warning: Option<String>,
}

/// Shipping Option Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ShippingOptionResponse {
    /// Pass this id to checkout
    pub id: String,
    pub label: String,

    /// Price in minor units
    pub price: u64,

    /// Estimated business days
    pub delivery_days: Option<u32>,
}

impl From<ShippingOption> for ShippingOptionResponse {
    fn from(option: ShippingOption) -> Self {
        Self {
            id: option.id,
            label: option.label,
            price: option.price,
            delivery_days: option.delivery_days,
        }
    }
}

fn warning_label(warning: QuoteWarning) -> &'static str {
    match warning {
        QuoteWarning::CarrierUnavailable => "carrier_unavailable",
        QuoteWarning::CarrierRejected => "carrier_rejected",
        QuoteWarning::NoOptions => "no_options",
    }
}

impl From<QuoteOutcome> for ShippingQuotesResponse {
    fn from(outcome: QuoteOutcome) -> Self {
        Self {
            options: outcome.options.into_iter().map(Into::into).collect(),
            warning: outcome.warning.map(|warning| warning_label(warning).to_string()),
        }
    }
}

/// Shipping Quotes Handler
///
/// A carrier outage answers 200 with no options and a warning.
#[endpoint(
    tags("carts"),
    summary = "Quote Shipping for Cart",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Options, possibly empty with a warning"),
        (status_code = StatusCode::BAD_REQUEST, description = "Malformed postal code or empty cart"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<ShippingQuotesRequest>,
    depot: &mut Depot,
) -> Result<Json<ShippingQuotesResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;

    let postal_code: PostalCode = json
        .into_inner()
        .postal_code
        .parse()
        .map_err(into_status_error)?;

    let outcome = state
        .checkout
        .shipping_options(visitor.owner.clone(), postal_code, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    Ok(Json(outcome.into()))
}
