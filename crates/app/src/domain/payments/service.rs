//! Webhook dispatch.

use async_trait::async_trait;
use atelier::{
    orders::{OrderStatus, OrderTransition},
    webhooks::{EventKind, GatewayEvent, WebhookVerifier},
};
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::{
        orders::{
            machine::{OrderMachine, TransitionRequest},
            records::Actor,
            repository::PgOrdersRepository,
        },
        payments::{
            errors::WebhooksServiceError, records::WebhookOutcome,
            repository::PgPaymentsRepository,
        },
        reservations::repository::PgReservationsRepository,
    },
};

const LATE_CAPTURE_NOTE: &str = "payment captured after the reservation expired";

#[derive(Debug)]
pub struct PgWebhooksService {
    db: Db,
    verifier: WebhookVerifier,
    repository: PgPaymentsRepository,
    orders: PgOrdersRepository,
    reservations: PgReservationsRepository,
    machine: OrderMachine,
}

impl PgWebhooksService {
    #[must_use]
    pub fn new(db: Db, verifier: WebhookVerifier) -> Self {
        Self {
            db,
            verifier,
            repository: PgPaymentsRepository::new(),
            orders: PgOrdersRepository::new(),
            reservations: PgReservationsRepository::new(),
            machine: OrderMachine::new(),
        }
    }
}

#[async_trait]
impl WebhooksService for PgWebhooksService {
    #[tracing::instrument(skip(self, payload, signature), err)]
    async fn handle(
        &self,
        payload: Vec<u8>,
        signature: String,
        now: Timestamp,
    ) -> Result<WebhookOutcome, WebhooksServiceError> {
        self.verifier.verify(&payload, &signature, now)?;

        let event = GatewayEvent::parse(&payload).map_err(WebhooksServiceError::MalformedEvent)?;
        let kind = event.kind();

        tracing::Span::current().record("event", event.id.as_str());

        if kind == EventKind::Other {
            tracing::debug!(event = %event.id, event_type = %event.event_type, "event acknowledged");

            return Ok(WebhookOutcome::Ignored);
        }

        let mut tx = self.db.begin().await?;

        if !self
            .repository
            .record_event(&mut tx, &event.id, &event.event_type, now)
            .await?
        {
            tracing::info!(event = %event.id, "duplicate event acknowledged");

            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(order) = self
            .orders
            .lock_order_by_intent(&mut tx, event.intent_id())
            .await?
        else {
            return Err(WebhooksServiceError::UnknownIntent(event.intent_id().to_string()));
        };

        let outcome = match (kind, order.status) {
            (EventKind::Succeeded, OrderStatus::PendingPayment) => {
                if self.reservations.has_lapsed_holds(&mut tx, order.uuid, now).await? {
                    let request = TransitionRequest::new(OrderTransition::Timeout, Actor::Gateway, now)
                        .with_note(LATE_CAPTURE_NOTE);
                    let applied = self.machine.apply(&mut tx, order.uuid, &request).await?;

                    self.machine.request_refund(&mut tx, &applied.order, now).await?;

                    WebhookOutcome::Compensated
                } else {
                    let request = TransitionRequest::new(OrderTransition::Capture, Actor::Gateway, now);

                    self.machine.apply(&mut tx, order.uuid, &request).await?;

                    WebhookOutcome::Applied
                }
            }
            (EventKind::Succeeded, OrderStatus::Cancelled | OrderStatus::PaymentFailed) => {
                self.machine.request_refund(&mut tx, &order, now).await?;

                WebhookOutcome::Compensated
            }
            (EventKind::Failed, OrderStatus::PendingPayment) => {
                let request = TransitionRequest::new(OrderTransition::Fail, Actor::Gateway, now);

                self.machine.apply(&mut tx, order.uuid, &request).await?;

                WebhookOutcome::Applied
            }
            _ => WebhookOutcome::Ignored,
        };

        tx.commit().await?;

        tracing::info!(
            event = %event.id,
            order = %order.code,
            status = %order.status.code(),
            %outcome,
            "webhook processed"
        );

        Ok(outcome)
    }
}

#[automock]
#[async_trait]
pub trait WebhooksService: Send + Sync {
    /// Verify and apply one gateway event.
    ///
    /// Nothing is written unless the signature verifies, and a failed dispatch rolls back the
    /// dedup row so the gateway's retry is processed afresh.
    async fn handle(
        &self,
        payload: Vec<u8>,
        signature: String,
        now: Timestamp,
    ) -> Result<WebhookOutcome, WebhooksServiceError>;
}

#[cfg(test)]
mod tests {
    use atelier::{
        ledger::StockReason,
        reservations::{DEFAULT_TTL, ReservationState},
        webhooks::VerificationError,
    };
    use jiff::SignedDuration;
    use testresult::TestResult;

    use crate::{
        domain::{
            catalog::CatalogService, ledger::LedgerService, orders::OrdersService,
            reservations::ReservationsService,
        },
        test::{
            TestContext,
            helpers::{count_rows, place_order, seed_variant, signed_event},
        },
    };

    use super::*;

    #[tokio::test]
    async fn captured_payment_marks_order_paid_and_deducts_stock() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-S1", 3).await?;
        let order = place_order(&ctx, None, &[(variant.uuid, 2)], now).await?;
        let intent = order.payment_intent_id.clone().ok_or("intent set")?;

        let (payload, signature) = signed_event("evt_s1", "payment_intent.succeeded", &intent, now)?;
        let outcome = ctx.webhooks.handle(payload, signature, now).await?;

        assert_eq!(outcome, WebhookOutcome::Applied);

        let details = ctx.orders.get_order(order.code.clone()).await?;

        assert_eq!(details.order.status, OrderStatus::Paid);
        assert_eq!(ctx.catalog.stock(variant.uuid).await?, 1);

        let history = ctx.ledger.history(variant.uuid).await?;

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].delta, -2);
        assert_eq!(history[0].reason, StockReason::Paid);
        assert_eq!(history[0].order_code.as_deref(), Some(order.code.as_str()));

        let holds = ctx.reservations.list_for_order(order.code).await?;

        assert!(holds.iter().all(|hold| hold.state == ReservationState::Confirmed));

        Ok(())
    }

    #[tokio::test]
    async fn failed_payment_releases_holds_without_stock_movement() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-S3", 5).await?;
        let order = place_order(&ctx, None, &[(variant.uuid, 1)], now).await?;
        let intent = order.payment_intent_id.clone().ok_or("intent set")?;

        let (payload, signature) = signed_event("evt_s3", "payment_intent.payment_failed", &intent, now)?;
        let outcome = ctx.webhooks.handle(payload, signature, now).await?;

        assert_eq!(outcome, WebhookOutcome::Applied);

        let details = ctx.orders.get_order(order.code.clone()).await?;

        assert_eq!(details.order.status, OrderStatus::PaymentFailed);
        assert_eq!(ctx.catalog.stock(variant.uuid).await?, 5);
        assert!(ctx.ledger.history(variant.uuid).await?.is_empty());

        let holds = ctx.reservations.list_for_order(order.code).await?;

        assert!(holds.iter().all(|hold| hold.state == ReservationState::Released));

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_event_changes_nothing() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-S5", 3).await?;
        let order = place_order(&ctx, None, &[(variant.uuid, 1)], now).await?;
        let intent = order.payment_intent_id.clone().ok_or("intent set")?;

        let (payload, signature) = signed_event("evt_s5", "payment_intent.succeeded", &intent, now)?;

        let first = ctx.webhooks.handle(payload.clone(), signature.clone(), now).await?;
        let events_after_first = count_rows(&ctx, "processed_webhook_events").await?;
        let outbox_after_first = count_rows(&ctx, "outbox_entries").await?;

        let second = ctx.webhooks.handle(payload, signature, now).await?;

        assert_eq!(first, WebhookOutcome::Applied);
        assert_eq!(second, WebhookOutcome::Duplicate);
        assert_eq!(count_rows(&ctx, "processed_webhook_events").await?, events_after_first);
        assert_eq!(count_rows(&ctx, "outbox_entries").await?, outbox_after_first);
        assert_eq!(ctx.catalog.stock(variant.uuid).await?, 2);
        assert_eq!(ctx.ledger.history(variant.uuid).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn stale_signature_is_rejected_without_side_effects() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-OLD", 3).await?;
        let order = place_order(&ctx, None, &[(variant.uuid, 1)], now).await?;
        let intent = order.payment_intent_id.clone().ok_or("intent set")?;

        let signed_at = now.checked_sub(SignedDuration::from_secs(301))?;
        let (payload, signature) = signed_event("evt_old", "payment_intent.succeeded", &intent, signed_at)?;

        let result = ctx.webhooks.handle(payload, signature, now).await;

        assert!(
            matches!(
                result,
                Err(WebhooksServiceError::Unverified(VerificationError::Stale { .. }))
            ),
            "expected Stale, got {result:?}"
        );
        assert_eq!(count_rows(&ctx, "processed_webhook_events").await?, 0);

        let details = ctx.orders.get_order(order.code).await?;

        assert_eq!(details.order.status, OrderStatus::PendingPayment);

        Ok(())
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let (_, signature) = signed_event("evt_t", "payment_intent.succeeded", "pi_real", now)?;
        let (forged, _) = signed_event("evt_t", "payment_intent.succeeded", "pi_forged", now)?;

        let result = ctx.webhooks.handle(forged, signature, now).await;

        assert!(
            matches!(result, Err(WebhooksServiceError::Unverified(VerificationError::Mismatch))),
            "expected Mismatch, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_intent_is_retryable_and_not_deduplicated() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let (payload, signature) = signed_event("evt_unknown", "payment_intent.succeeded", "pi_missing", now)?;

        let result = ctx.webhooks.handle(payload, signature, now).await;

        assert!(
            matches!(result, Err(WebhooksServiceError::UnknownIntent(ref id)) if id == "pi_missing"),
            "expected UnknownIntent, got {result:?}"
        );
        assert_eq!(count_rows(&ctx, "processed_webhook_events").await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn other_events_are_acknowledged_without_writes() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let (payload, signature) = signed_event("evt_other", "charge.updated", "ch_1", now)?;

        let outcome = ctx.webhooks.handle(payload, signature, now).await?;

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(count_rows(&ctx, "processed_webhook_events").await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn capture_after_hold_expiry_is_refunded() -> TestResult {
        let ctx = TestContext::new().await;
        let granted = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-LATE", 2).await?;
        let order = place_order(&ctx, None, &[(variant.uuid, 1)], granted).await?;
        let intent = order.payment_intent_id.clone().ok_or("intent set")?;

        let late = granted
            .checked_add(DEFAULT_TTL)?
            .checked_add(SignedDuration::from_secs(30))?;
        let (payload, signature) = signed_event("evt_late", "payment_intent.succeeded", &intent, late)?;

        let outcome = ctx.webhooks.handle(payload, signature, late).await?;

        assert_eq!(outcome, WebhookOutcome::Compensated);

        let details = ctx.orders.get_order(order.code).await?;

        assert_eq!(details.order.status, OrderStatus::Cancelled);
        assert_eq!(ctx.catalog.stock(variant.uuid).await?, 2);

        let refunds: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_entries WHERE topic = 'payment.refund_requested'",
        )
        .fetch_one(ctx.db.pool())
        .await?;

        assert_eq!(refunds, 1);

        Ok(())
    }
}
