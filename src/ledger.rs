//! Stock ledger
//!
//! Every change to a variant's stock is written as a ledger row. Replaying the rows from the
//! initial stock must land on the stored stock; [`reconcile`] checks exactly that.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    /// Units sold on capture.
    Paid,

    /// Units returned when a paid order is cancelled.
    Cancelled,

    /// Units returned when an order is refunded.
    Refunded,

    /// Operator correction.
    Manual,
}

/// Raised when a stored reason is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown stock reason {0:?}")]
pub struct UnknownReason(pub String);

impl StockReason {
    /// Stable identifier stored in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Manual => "manual",
        }
    }

    /// Signed delta for `quantity` units moved for an order.
    ///
    /// Manual adjustments carry their own sign and are returned unchanged.
    pub fn delta(self, quantity: i64) -> i64 {
        match self {
            Self::Paid => -quantity,
            Self::Cancelled | Self::Refunded | Self::Manual => quantity,
        }
    }
}

impl fmt::Display for StockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockReason {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            "manual" => Ok(Self::Manual),
            other => Err(UnknownReason(other.to_string())),
        }
    }
}

/// One ledger row. Rows are never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    /// Variant whose stock moved.
    pub variant: Uuid,

    /// Signed change in units.
    pub delta: i64,

    /// Why it moved.
    pub reason: StockReason,

    /// Triggering order, if any.
    pub order_code: Option<String>,

    /// Free-form operator note.
    pub note: Option<String>,

    /// When the row was written.
    pub created_at: Timestamp,
}

/// Result of replaying a variant's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Variant audited.
    pub variant: Uuid,

    /// Stock the variant was created with.
    pub initial: i64,

    /// Sum of ledger deltas.
    pub movements: i64,

    /// `initial + movements`.
    pub expected: i64,

    /// Stock currently stored.
    pub actual: i64,
}

impl Reconciliation {
    /// `actual - expected`; zero when the ledger balances.
    pub fn divergence(&self) -> i64 {
        self.actual - self.expected
    }

    /// Whether stored stock matches the ledger.
    pub fn is_balanced(&self) -> bool {
        self.divergence() == 0
    }
}

/// Replay ledger deltas for one variant.
pub fn reconcile(
    variant: Uuid,
    initial: i64,
    deltas: impl IntoIterator<Item = i64>,
    actual: i64,
) -> Reconciliation {
    let movements = deltas.into_iter().fold(0_i64, i64::saturating_add);

    Reconciliation {
        variant,
        initial,
        movements,
        expected: initial.saturating_add(movements),
        actual,
    }
}
