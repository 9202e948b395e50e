//! Order transitions
//!
//! The single table of legal status changes. Each legal change comes with a [`TransitionPlan`]
//! describing its side effects on reservations, stock, coupons and payments. The application
//! layer applies a plan inside one database transaction.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    errors::{Categorised, ErrorKind},
    ledger::StockReason,
    orders::OrderStatus,
};

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderTransition {
    /// The gateway captured payment.
    Capture,

    /// The gateway reported a failed payment.
    Fail,

    /// The reservation sweeper found an expired hold.
    Timeout,

    /// Operator handed the parcel to the carrier.
    Ship,

    /// The carrier reported arrival at the destination hub.
    Arrive,

    /// The parcel reached the buyer.
    Deliver,

    /// Operator cancelled a paid order.
    Cancel,

    /// Operator refunded a paid order.
    Refund,
}

impl OrderTransition {
    /// Stable identifier used in routes and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Fail => "fail",
            Self::Timeout => "timeout",
            Self::Ship => "ship",
            Self::Arrive => "arrive",
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
            Self::Refund => "refund",
        }
    }

    /// Whether operators may request this transition directly.
    pub const fn is_operator(self) -> bool {
        matches!(
            self,
            Self::Ship | Self::Arrive | Self::Deliver | Self::Cancel | Self::Refund
        )
    }
}

impl fmt::Display for OrderTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a transition name is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown order transition {0:?}")]
pub struct UnknownTransition(pub String);

impl Categorised for UnknownTransition {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NotFound
    }
}

impl FromStr for OrderTransition {
    type Err = UnknownTransition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Capture,
            Self::Fail,
            Self::Timeout,
            Self::Ship,
            Self::Arrive,
            Self::Deliver,
            Self::Cancel,
            Self::Refund,
        ]
        .into_iter()
        .find(|transition| transition.as_str() == s)
        .ok_or_else(|| UnknownTransition(s.to_string()))
    }
}

/// The state machine refused a transition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot {transition} an order in status {from}")]
pub struct IllegalTransition {
    /// Status the order was in.
    pub from: OrderStatus,

    /// Transition that was requested.
    pub transition: OrderTransition,
}

impl Categorised for IllegalTransition {
    fn kind(&self) -> ErrorKind {
        ErrorKind::IllegalTransition
    }
}

/// What happens to an order's reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationEffect {
    /// `PENDING` holds become `CONFIRMED`.
    Confirm,

    /// Holds become `RELEASED`.
    Release,

    /// `PENDING` holds become `EXPIRED`.
    Expire,
}

/// Side effects of one legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Status before.
    pub from: OrderStatus,

    /// Status after.
    pub to: OrderStatus,

    /// Requested transition.
    pub transition: OrderTransition,

    /// Reservation change, if any.
    pub reservations: Option<ReservationEffect>,

    /// Stock movement per order line, if any. The reason decides the sign.
    pub stock: Option<StockReason>,

    /// The coupon use consumed at checkout is given back.
    pub release_coupon: bool,

    /// Captured money must be returned through the gateway.
    pub refund_payment: bool,

    /// The source cart can be cleared.
    pub complete_cart: bool,
}

impl TransitionPlan {
    const fn status_only(from: OrderStatus, to: OrderStatus, transition: OrderTransition) -> Self {
        Self {
            from,
            to,
            transition,
            reservations: None,
            stock: None,
            release_coupon: false,
            refund_payment: false,
            complete_cart: false,
        }
    }
}

/// Look up the plan for a transition from `from`.
///
/// # Errors
///
/// Returns [`IllegalTransition`] for any pair not in the table.
pub fn transition(from: OrderStatus, transition: OrderTransition) -> Result<TransitionPlan, IllegalTransition> {
    use OrderStatus as S;
    use OrderTransition as T;

    let plan = match (from, transition) {
        (S::PendingPayment, T::Capture) => TransitionPlan {
            reservations: Some(ReservationEffect::Confirm),
            stock: Some(StockReason::Paid),
            complete_cart: true,
            ..TransitionPlan::status_only(from, S::Paid, transition)
        },
        (S::PendingPayment, T::Fail) => TransitionPlan {
            reservations: Some(ReservationEffect::Release),
            release_coupon: true,
            ..TransitionPlan::status_only(from, S::PaymentFailed, transition)
        },
        (S::PendingPayment, T::Timeout) => TransitionPlan {
            reservations: Some(ReservationEffect::Expire),
            release_coupon: true,
            ..TransitionPlan::status_only(from, S::Cancelled, transition)
        },
        (S::Paid, T::Ship) => TransitionPlan::status_only(from, S::Shipped, transition),
        (S::Shipped, T::Arrive) => TransitionPlan::status_only(from, S::InTransit, transition),
        (S::InTransit, T::Deliver) => TransitionPlan::status_only(from, S::Completed, transition),
        (S::Paid, T::Cancel) => TransitionPlan {
            reservations: Some(ReservationEffect::Release),
            stock: Some(StockReason::Cancelled),
            refund_payment: true,
            ..TransitionPlan::status_only(from, S::Cancelled, transition)
        },
        (S::Paid | S::Shipped | S::InTransit | S::Completed, T::Refund) => TransitionPlan {
            reservations: Some(ReservationEffect::Release),
            stock: Some(StockReason::Refunded),
            refund_payment: true,
            ..TransitionPlan::status_only(from, S::Refunded, transition)
        },
        _ => return Err(IllegalTransition { from, transition }),
    };

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn capture_confirms_and_decrements() -> TestResult {
        let plan = transition(OrderStatus::PendingPayment, OrderTransition::Capture)?;

        assert_eq!(plan.to, OrderStatus::Paid);
        assert_eq!(plan.reservations, Some(ReservationEffect::Confirm));
        assert_eq!(plan.stock, Some(StockReason::Paid));
        assert!(plan.complete_cart, "capture clears the cart");
        assert!(!plan.refund_payment, "capture keeps the money");

        Ok(())
    }

    #[test]
    fn timeout_expires_without_touching_stock() -> TestResult {
        let plan = transition(OrderStatus::PendingPayment, OrderTransition::Timeout)?;

        assert_eq!(plan.to, OrderStatus::Cancelled);
        assert_eq!(plan.reservations, Some(ReservationEffect::Expire));
        assert_eq!(plan.stock, None);
        assert!(plan.release_coupon, "coupon use is given back");

        Ok(())
    }

    #[test]
    fn cancel_and_refund_restore_stock() -> TestResult {
        let cancel = transition(OrderStatus::Paid, OrderTransition::Cancel)?;

        assert_eq!(cancel.stock, Some(StockReason::Cancelled));
        assert!(cancel.refund_payment, "cancelling paid orders refunds");

        for from in [
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::InTransit,
            OrderStatus::Completed,
        ] {
            let refund = transition(from, OrderTransition::Refund)?;

            assert_eq!(refund.to, OrderStatus::Refunded);
            assert_eq!(refund.stock, Some(StockReason::Refunded));
        }

        Ok(())
    }

    #[test]
    fn shipping_path_changes_status_only() -> TestResult {
        let ship = transition(OrderStatus::Paid, OrderTransition::Ship)?;
        let arrive = transition(OrderStatus::Shipped, OrderTransition::Arrive)?;
        let deliver = transition(OrderStatus::InTransit, OrderTransition::Deliver)?;

        assert_eq!(
            (ship.to, arrive.to, deliver.to),
            (OrderStatus::Shipped, OrderStatus::InTransit, OrderStatus::Completed)
        );
        assert!(ship.stock.is_none() && ship.reservations.is_none(), "ship is status only");

        Ok(())
    }

    #[test]
    fn dead_end_statuses_refuse_everything() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal() && *s != OrderStatus::Completed) {
            for step in [
                OrderTransition::Capture,
                OrderTransition::Fail,
                OrderTransition::Timeout,
                OrderTransition::Ship,
                OrderTransition::Cancel,
                OrderTransition::Refund,
            ] {
                assert_eq!(
                    transition(from, step),
                    Err(IllegalTransition {
                        from,
                        transition: step
                    })
                );
            }
        }
    }

    #[test]
    fn shipped_orders_cannot_be_cancelled() {
        assert!(transition(OrderStatus::Shipped, OrderTransition::Cancel).is_err());
        assert!(transition(OrderStatus::PendingPayment, OrderTransition::Ship).is_err());
    }

    #[test]
    fn transition_names_parse() -> TestResult {
        assert_eq!("refund".parse::<OrderTransition>()?, OrderTransition::Refund);
        assert!("explode".parse::<OrderTransition>().is_err());

        Ok(())
    }
}
