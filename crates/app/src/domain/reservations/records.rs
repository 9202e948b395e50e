//! Reservation Records

use atelier::reservations::ReservationState;
use jiff::Timestamp;

use crate::{
    domain::{catalog::records::VariantUuid, orders::records::OrderUuid},
    uuids::TypedUuid,
};

/// Reservation UUID
pub type ReservationUuid = TypedUuid<ReservationRecord>;

/// Reservation Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRecord {
    pub uuid: ReservationUuid,
    pub variant: VariantUuid,
    pub order: OrderUuid,
    pub quantity: u32,
    pub state: ReservationState,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ReservationRecord {
    /// Whether this hold still reduces free stock at `now`.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.state == ReservationState::Pending
            && !atelier::reservations::is_expired(self.expires_at, now)
    }
}

/// Outcome of one sweeper pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orders moved from pending payment to cancelled.
    pub timed_out: Vec<String>,

    /// Lapsed holds whose order had already left pending payment.
    pub orphans_expired: u64,
}
