//! Order state machine.
//!
//! [`OrderMachine::apply`] is the only code that writes `orders.status`. It runs inside the
//! caller's transaction so the reservation, stock, ledger, coupon and outbox effects commit or
//! roll back together with the status change.

use atelier::{
    ledger::StockReason,
    orders::{OrderTransition, ReservationEffect, transition},
    reservations::ReservationState,
};
use jiff::Timestamp;
use sqlx::{Postgres, Transaction};

use crate::domain::{
    catalog::{records::VariantUuid, repository::PgCatalogRepository},
    coupons::repository::PgCouponsRepository,
    ledger::repository::{NewStockEntry, PgLedgerRepository},
    orders::{
        errors::OrdersServiceError,
        records::{Actor, AppliedTransition, OrderItemRecord, OrderRecord, OrderUuid},
        repository::PgOrdersRepository,
    },
    outbox::{
        messages::{CheckoutCompleted, RefundRequested, StatusChanged},
        repository::PgOutboxRepository,
    },
    reservations::repository::PgReservationsRepository,
};

/// One requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransitionRequest<'a> {
    pub(crate) transition: OrderTransition,
    pub(crate) actor: Actor,
    pub(crate) note: Option<&'a str>,
    pub(crate) tracking_code: Option<&'a str>,
    pub(crate) now: Timestamp,
}

impl<'a> TransitionRequest<'a> {
    pub(crate) fn new(transition: OrderTransition, actor: Actor, now: Timestamp) -> Self {
        Self {
            transition,
            actor,
            note: None,
            tracking_code: None,
            now,
        }
    }

    pub(crate) fn with_note(mut self, note: &'a str) -> Self {
        self.note = Some(note);
        self
    }

    pub(crate) fn with_tracking_code(mut self, tracking_code: Option<&'a str>) -> Self {
        self.tracking_code = tracking_code;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct OrderMachine {
    orders: PgOrdersRepository,
    catalog: PgCatalogRepository,
    reservations: PgReservationsRepository,
    ledger: PgLedgerRepository,
    coupons: PgCouponsRepository,
    outbox: PgOutboxRepository,
}

impl OrderMachine {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lock `order`, check the transition against its current status and apply every effect.
    ///
    /// An illegal transition returns before anything is written.
    pub(crate) async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        request: &TransitionRequest<'_>,
    ) -> Result<AppliedTransition, OrdersServiceError> {
        let current = self.orders.lock_order(tx, order).await?;
        let plan = transition(current.status, request.transition)?;
        let now = request.now;

        let items = self.orders.list_items(tx, order).await?;

        if let Some(effect) = plan.reservations {
            let (from, to): (&[ReservationState], ReservationState) = match effect {
                ReservationEffect::Confirm => (&[ReservationState::Pending], ReservationState::Confirmed),
                ReservationEffect::Release => (
                    &[ReservationState::Pending, ReservationState::Confirmed],
                    ReservationState::Released,
                ),
                ReservationEffect::Expire => (&[ReservationState::Pending], ReservationState::Expired),
            };

            self.reservations
                .transition_for_order(tx, order, from, to, now)
                .await?;
        }

        if let Some(reason) = plan.stock {
            self.move_stock(tx, &current, &items, reason, now).await?;
        }

        if plan.release_coupon && self.coupons.release_use(tx, order).await? {
            tracing::debug!(order = %current.code, "coupon use given back");
        }

        let updated = self
            .orders
            .update_status(tx, order, plan.to, request.tracking_code, now)
            .await?;

        self.orders
            .append_status_log(tx, order, Some(plan.from), plan.to, request.actor, request.note, now)
            .await?;

        self.outbox
            .enqueue(
                tx,
                &StatusChanged {
                    order,
                    code: updated.code.clone(),
                    user: updated.user,
                    email: updated.email.clone(),
                    from: plan.from,
                    to: plan.to,
                    tracking_code: updated.tracking_code.clone(),
                },
                now,
            )
            .await?;

        if plan.refund_payment {
            self.request_refund(tx, &updated, now).await?;
        }

        if plan.complete_cart {
            self.outbox
                .enqueue(
                    tx,
                    &CheckoutCompleted {
                        order,
                        owner: updated.cart_owner.clone(),
                        cart_hash: updated.cart_hash.clone(),
                    },
                    now,
                )
                .await?;
        }

        tracing::info!(
            order = %updated.code,
            from = %plan.from.code(),
            to = %plan.to.code(),
            actor = %request.actor,
            "order transitioned"
        );

        Ok(AppliedTransition {
            order: updated,
            plan,
        })
    }

    /// Queue a full refund of `order`'s captured payment. Returns `false` when the order never
    /// got an intent.
    pub(crate) async fn request_refund(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &OrderRecord,
        now: Timestamp,
    ) -> Result<bool, OrdersServiceError> {
        let Some(intent) = &order.payment_intent_id else {
            tracing::warn!(order = %order.code, "refund requested for an order without intent");

            return Ok(false);
        };

        self.outbox
            .enqueue(
                tx,
                &RefundRequested {
                    order: order.uuid,
                    code: order.code.clone(),
                    payment_intent_id: intent.clone(),
                    amount: order.totals.grand,
                },
                now,
            )
            .await?;

        tracing::info!(order = %order.code, intent = %intent, "refund queued");

        Ok(true)
    }

    async fn move_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &OrderRecord,
        items: &[OrderItemRecord],
        reason: StockReason,
        now: Timestamp,
    ) -> Result<(), OrdersServiceError> {
        let variants: Vec<VariantUuid> = items.iter().map(|item| item.variant).collect();

        self.catalog.lock_variants(tx, &variants).await?;

        for item in items {
            let delta = reason.delta(i64::from(item.quantity));

            self.catalog
                .apply_stock_delta(tx, item.variant, delta)
                .await
                .map_err(|error| match OrdersServiceError::from(error) {
                    OrdersServiceError::InvalidData => OrdersServiceError::InsufficientStock(item.variant),
                    other => other,
                })?;

            self.ledger
                .append_entry(tx, &NewStockEntry {
                    variant: item.variant,
                    delta,
                    reason,
                    order: Some(order.uuid),
                    note: None,
                    now,
                })
                .await?;
        }

        Ok(())
    }
}
