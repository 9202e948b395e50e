//! Order Data

use atelier::{orders::OrderCode, pricing::OrderTotals};

use crate::domain::{
    carts::records::CartOwner,
    catalog::records::VariantUuid,
    coupons::records::CouponUuid,
    orders::records::{Actor, OrderUuid, ShippingAddress},
    users::records::UserUuid,
};

/// New Order
///
/// Orders are always created in pending payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub uuid: OrderUuid,
    pub code: OrderCode,
    pub user: Option<UserUuid>,
    pub cart_owner: CartOwner,
    pub cart_hash: String,
    pub totals: OrderTotals,
    pub currency: String,
    pub shipping_option_id: String,
    pub shipping_label: String,
    pub shipping_address: ShippingAddress,
    pub coupon: Option<CouponUuid>,
    pub email: Option<String>,
}

/// New Order Item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub variant: VariantUuid,
    pub sku: String,
    pub product_name: String,
    pub size: String,
    pub colour: String,
    pub quantity: u32,
    pub unit_price: u64,
}

/// Who asked to cancel an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    Operator,
    /// Buyers may only cancel their own orders.
    Buyer(UserUuid),
}

impl Requester {
    #[must_use]
    pub fn actor(self) -> Actor {
        match self {
            Self::Operator => Actor::Operator,
            Self::Buyer(_) => Actor::Buyer,
        }
    }
}
