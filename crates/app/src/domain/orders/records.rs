//! Order Records

use std::{fmt, str::FromStr};

use atelier::{
    orders::{OrderCode, OrderStatus, TransitionPlan},
    pricing::OrderTotals,
    shipping::PostalCode,
};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{
        carts::records::CartOwner, catalog::records::VariantUuid,
        coupons::records::CouponUuid, users::records::UserUuid,
    },
    uuids::TypedUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<OrderRecord>;

/// Order Item UUID
pub type OrderItemUuid = TypedUuid<OrderItemRecord>;

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: PostalCode,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address field {0} is required")]
    Missing(&'static str),

    #[error("state must be a two-letter code, got {0:?}")]
    InvalidState(String),
}

impl ShippingAddress {
    /// Check required fields. The postal code is already validated by its type.
    ///
    /// # Errors
    ///
    /// Returns the first [`AddressError`] found.
    pub fn validate(&self) -> Result<(), AddressError> {
        for (field, value) in [
            ("recipient", &self.recipient),
            ("street", &self.street),
            ("number", &self.number),
            ("district", &self.district),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                return Err(AddressError::Missing(field));
            }
        }

        let state = self.state.trim();

        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AddressError::InvalidState(self.state.clone()));
        }

        Ok(())
    }
}

/// Who caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    Gateway,
    Operator,
    Buyer,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown actor {0:?}")]
pub struct UnknownActor(pub String);

impl Actor {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Gateway => "gateway",
            Self::Operator => "operator",
            Self::Buyer => "buyer",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Actor {
    type Err = UnknownActor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "gateway" => Ok(Self::Gateway),
            "operator" => Ok(Self::Operator),
            "buyer" => Ok(Self::Buyer),
            other => Err(UnknownActor(other.to_string())),
        }
    }
}

/// Order Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub uuid: OrderUuid,
    pub code: OrderCode,
    pub user: Option<UserUuid>,
    pub cart_owner: CartOwner,
    pub cart_hash: String,
    pub status: OrderStatus,
    pub totals: OrderTotals,
    pub currency: String,
    pub shipping_option_id: String,
    pub shipping_label: String,
    pub shipping_address: ShippingAddress,
    pub coupon: Option<CouponUuid>,
    pub payment_intent_id: Option<String>,
    pub email: Option<String>,
    pub tracking_code: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Order Item Record
///
/// Frozen at checkout; later catalog changes never touch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRecord {
    pub uuid: OrderItemUuid,
    pub order: OrderUuid,
    pub variant: VariantUuid,
    pub sku: String,
    pub product_name: String,
    pub size: String,
    pub colour: String,
    pub quantity: u32,
    pub unit_price: u64,
}

impl OrderItemRecord {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

/// An order with its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
}

/// One row of an order's status history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLogRecord {
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub actor: Actor,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

/// Result of a transition applied by the order machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTransition {
    pub order: OrderRecord,
    pub plan: TransitionPlan,
}
