//! Stock holds taken at checkout entry.

use std::collections::BTreeMap;

use atelier::{
    orders::OrderTransition,
    reservations::{check_hold, expires_at},
};
use jiff::{SignedDuration, Timestamp};
use rustc_hash::FxHashMap;
use sqlx::{Postgres, Transaction};

use crate::domain::{
    catalog::{records::VariantUuid, repository::PgCatalogRepository},
    orders::{
        machine::{OrderMachine, TransitionRequest},
        records::{Actor, OrderUuid},
    },
    reservations::{
        errors::ReservationsServiceError, records::ReservationRecord,
        repository::PgReservationsRepository,
    },
};

pub(crate) const EXPIRY_NOTE: &str = "reservation expired";

#[derive(Debug, Clone, Default)]
pub(crate) struct Holds {
    catalog: PgCatalogRepository,
    reservations: PgReservationsRepository,
    machine: OrderMachine,
}

impl Holds {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold `lines` for `order` until `now + ttl`.
    ///
    /// Variant rows stay locked until the caller's transaction ends, so two checkouts can never
    /// both count the same free unit.
    pub(crate) async fn reserve_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        lines: &[(VariantUuid, u32)],
        now: Timestamp,
        ttl: SignedDuration,
    ) -> Result<Vec<ReservationRecord>, ReservationsServiceError> {
        let expires = expires_at(now, ttl).map_err(ReservationsServiceError::Expiry)?;

        let mut wanted: BTreeMap<VariantUuid, u32> = BTreeMap::new();

        for &(variant, quantity) in lines {
            let total = wanted.entry(variant).or_default();
            *total = total.saturating_add(quantity);
        }

        let variants: Vec<VariantUuid> = wanted.keys().copied().collect();
        let stock: FxHashMap<VariantUuid, i64> = self
            .catalog
            .lock_variants(tx, &variants)
            .await?
            .into_iter()
            .collect();

        let mut holds = Vec::with_capacity(wanted.len());

        for (variant, quantity) in wanted {
            let Some(&on_hand) = stock.get(&variant) else {
                return Err(ReservationsServiceError::UnknownVariant(variant));
            };

            let held = self.reservations.active_holds(tx, variant, now).await?;

            check_hold(variant.into_uuid(), on_hand, held, quantity)?;

            holds.push(
                self.reservations
                    .insert_hold(tx, order, variant, quantity, now, expires)
                    .await?,
            );
        }

        tracing::debug!(%order, holds = holds.len(), %expires, "stock held");

        Ok(holds)
    }

    /// Time out pending orders with lapsed holds on `variants`. Orders locked by another
    /// transaction are left for the sweeper.
    pub(crate) async fn sweep_for_variants(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variants: &[VariantUuid],
        now: Timestamp,
    ) -> Result<Vec<String>, ReservationsServiceError> {
        let orders = self
            .reservations
            .expired_pending_orders_for_variants(tx, variants, now)
            .await?;

        self.time_out(tx, &orders, now).await
    }

    pub(crate) async fn time_out(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        orders: &[OrderUuid],
        now: Timestamp,
    ) -> Result<Vec<String>, ReservationsServiceError> {
        let request =
            TransitionRequest::new(OrderTransition::Timeout, Actor::System, now).with_note(EXPIRY_NOTE);

        let mut codes = Vec::with_capacity(orders.len());

        for &order in orders {
            let applied = self.machine.apply(tx, order, &request).await?;

            codes.push(applied.order.code.to_string());
        }

        Ok(codes)
    }
}
