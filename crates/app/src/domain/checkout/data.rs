//! Checkout Data

use atelier::{orders::OrderCode, pricing::OrderTotals};

use crate::domain::{carts::records::CartOwner, orders::records::ShippingAddress};

/// What the buyer submits from the payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub owner: CartOwner,

    /// Signature from the last cart review.
    pub fingerprint: String,

    /// Receipt address. Registered buyers fall back to their account email.
    pub email: Option<String>,

    pub address: ShippingAddress,

    /// Option id from the quote the buyer picked.
    pub shipping_option: String,

    pub coupon: Option<String>,
}

/// Handle for the browser to confirm payment with the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutIntent {
    pub order_code: OrderCode,
    pub intent_id: String,
    pub client_secret: String,
    pub totals: OrderTotals,
}
