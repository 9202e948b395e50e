//! Order status

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created at checkout, awaiting the gateway.
    #[serde(rename = "P")]
    PendingPayment,

    /// Payment captured; stock deducted.
    #[serde(rename = "PA")]
    Paid,

    /// The gateway reported a failed payment.
    #[serde(rename = "PF")]
    PaymentFailed,

    /// Handed to the carrier.
    #[serde(rename = "E")]
    Shipped,

    /// Arrived at the destination hub.
    #[serde(rename = "T")]
    InTransit,

    /// Delivered to the buyer.
    #[serde(rename = "C")]
    Completed,

    /// Cancelled, either by timeout or by an operator.
    #[serde(rename = "X")]
    Cancelled,

    /// Refunded after payment.
    #[serde(rename = "D")]
    Refunded,
}

/// Raised when a stored status code is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown order status {0:?}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::PendingPayment,
        Self::Paid,
        Self::PaymentFailed,
        Self::Shipped,
        Self::InTransit,
        Self::Completed,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Short code stored in the database.
    pub const fn code(self) -> &'static str {
        match self {
            Self::PendingPayment => "P",
            Self::Paid => "PA",
            Self::PaymentFailed => "PF",
            Self::Shipped => "E",
            Self::InTransit => "T",
            Self::Completed => "C",
            Self::Cancelled => "X",
            Self::Refunded => "D",
        }
    }

    /// Human label used in notifications.
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingPayment => "awaiting payment",
            Self::Paid => "paid",
            Self::PaymentFailed => "payment failed",
            Self::Shipped => "shipped",
            Self::InTransit => "in transit",
            Self::Completed => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether payment has been captured and not given back.
    pub const fn is_paid(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Shipped | Self::InTransit | Self::Completed
        )
    }

    /// Whether the order has left the fulfilment flow. Only a refund can leave `Completed`.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PaymentFailed | Self::Completed | Self::Cancelled | Self::Refunded
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
