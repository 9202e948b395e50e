//! Outbox message payloads, one per topic.

use atelier::orders::{OrderCode, OrderStatus};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::domain::{
    carts::records::CartOwner, orders::records::OrderUuid, users::records::UserUuid,
};

/// A payload stored under a fixed topic.
pub trait OutboxMessage: Serialize + DeserializeOwned {
    const TOPIC: &'static str;
}

/// An order changed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order: OrderUuid,
    pub code: OrderCode,
    pub user: Option<UserUuid>,
    pub email: Option<String>,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub tracking_code: Option<String>,
}

impl OutboxMessage for StatusChanged {
    const TOPIC: &'static str = "order.status_changed";
}

/// Captured money must be returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequested {
    pub order: OrderUuid,
    pub code: OrderCode,
    pub payment_intent_id: String,
    pub amount: u64,
}

impl OutboxMessage for RefundRequested {
    const TOPIC: &'static str = "payment.refund_requested";
}

/// Payment was captured; the source cart can go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutCompleted {
    pub order: OrderUuid,
    pub owner: CartOwner,
    pub cart_hash: String,
}

impl OutboxMessage for CheckoutCompleted {
    const TOPIC: &'static str = "cart.checkout_completed";
}
