//! Reservations service.

use async_trait::async_trait;
use atelier::orders::OrderCode;
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::{
        orders::repository::PgOrdersRepository,
        reservations::{
            errors::ReservationsServiceError,
            holds::Holds,
            records::{ReservationRecord, SweepReport},
            repository::PgReservationsRepository,
        },
    },
};

/// Orders timed out per sweeper transaction.
const SWEEP_BATCH: u32 = 200;

#[derive(Debug, Clone)]
pub struct PgReservationsService {
    db: Db,
    repository: PgReservationsRepository,
    orders: PgOrdersRepository,
    holds: Holds,
}

impl PgReservationsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgReservationsRepository::new(),
            orders: PgOrdersRepository::new(),
            holds: Holds::new(),
        }
    }
}

#[async_trait]
impl ReservationsService for PgReservationsService {
    #[tracing::instrument(skip(self), err)]
    async fn sweep_expired(&self, now: Timestamp) -> Result<SweepReport, ReservationsServiceError> {
        let mut report = SweepReport::default();

        loop {
            let mut tx = self.db.begin().await?;

            let orders = self.repository.expired_pending_orders(&mut tx, now, SWEEP_BATCH).await?;
            let batch = orders.len();
            let codes = self.holds.time_out(&mut tx, &orders, now).await?;

            tx.commit().await?;

            report.timed_out.extend(codes);

            if batch < SWEEP_BATCH as usize {
                break;
            }
        }

        let mut tx = self.db.begin().await?;

        report.orphans_expired = self.repository.expire_orphans(&mut tx, now).await?;

        tx.commit().await?;

        if !report.timed_out.is_empty() || report.orphans_expired > 0 {
            tracing::info!(
                timed_out = report.timed_out.len(),
                orphans = report.orphans_expired,
                "expired reservations swept"
            );
        }

        Ok(report)
    }

    async fn list_for_order(&self, code: OrderCode) -> Result<Vec<ReservationRecord>, ReservationsServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.orders.get_order_by_code(&mut tx, &code).await?;
        let holds = self.repository.list_for_order(&mut tx, order.uuid).await?;

        tx.commit().await?;

        Ok(holds)
    }
}

#[automock]
#[async_trait]
pub trait ReservationsService: Send + Sync {
    /// Time out pending orders whose holds lapsed before `now`, then expire any lapsed holds left
    /// on orders that already moved on.
    async fn sweep_expired(&self, now: Timestamp) -> Result<SweepReport, ReservationsServiceError>;

    /// Holds taken for an order.
    async fn list_for_order(&self, code: OrderCode) -> Result<Vec<ReservationRecord>, ReservationsServiceError>;
}
