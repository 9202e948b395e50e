//! Reservations
//!
//! Time-bounded holds on variant stock. A hold is active while it is `PENDING` and not past its
//! expiry; active holds reduce the stock available to new holds. Confirmed holds have already been
//! deducted from stock and do not count again.

use std::{fmt, str::FromStr};

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::{Categorised, ErrorKind};

/// Default hold lifetime.
pub const DEFAULT_TTL: SignedDuration = SignedDuration::from_secs(15 * 60);

/// Lifecycle of a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    /// Holding stock for a pending order.
    Pending,

    /// Payment captured; stock deducted.
    Confirmed,

    /// Given back without deducting stock, or restored after a paid order was undone.
    Released,

    /// Timed out before payment.
    Expired,
}

/// Raised when a stored state is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown reservation state {0:?}")]
pub struct UnknownState(pub String);

impl ReservationState {
    /// Stable identifier stored in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Released => "RELEASED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Whether a hold may move from `self` to `next`.
    pub const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Confirmed | Self::Released | Self::Expired
            ) | (Self::Confirmed, Self::Released)
        )
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "RELEASED" => Ok(Self::Released),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// A hold could not be granted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("variant {variant} has {available} units free, {requested} requested")]
pub struct Shortage {
    /// Variant short of stock.
    pub variant: Uuid,

    /// Units asked for.
    pub requested: u32,

    /// Units free at the time of the check.
    pub available: i64,
}

impl Categorised for Shortage {
    fn kind(&self) -> ErrorKind {
        ErrorKind::OutOfStock
    }
}

/// Stock not covered by active holds.
pub fn free_stock(stock: i64, held: i64) -> i64 {
    stock.saturating_sub(held).max(0)
}

/// Check that `requested` units can be held.
///
/// # Errors
///
/// Returns a [`Shortage`] when `stock - held < requested`.
pub fn check_hold(variant: Uuid, stock: i64, held: i64, requested: u32) -> Result<(), Shortage> {
    let available = free_stock(stock, held);

    if available < i64::from(requested) {
        return Err(Shortage {
            variant,
            requested,
            available,
        });
    }

    Ok(())
}

/// Expiry for a hold granted at `now`.
///
/// # Errors
///
/// Returns a [`jiff::Error`] if the result overflows the supported range.
pub fn expires_at(now: Timestamp, ttl: SignedDuration) -> Result<Timestamp, jiff::Error> {
    now.checked_add(ttl)
}

/// Whether a hold with this expiry has lapsed at `now`.
pub fn is_expired(expires_at: Timestamp, now: Timestamp) -> bool {
    now > expires_at
}
