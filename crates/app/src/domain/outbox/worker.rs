//! Outbox drain.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use rustc_hash::FxHashMap;

use crate::{
    database::Db,
    domain::outbox::{
        errors::OutboxServiceError,
        handlers::OutboxHandler,
        records::{DrainReport, OutboxEntry},
        repository::PgOutboxRepository,
    },
};

const MAX_RETRY_DELAY: SignedDuration = SignedDuration::from_hours(1);

/// How long a claimed entry stays hidden from other drains. An entry whose worker died mid-delivery
/// is picked up again once this runs out.
pub const CLAIM_LEASE: SignedDuration = SignedDuration::from_mins(5);

/// Delay before the next attempt after `attempts` failures: `2^attempts` seconds, capped at an
/// hour.
#[must_use]
pub fn retry_delay(attempts: u32) -> SignedDuration {
    let seconds = 1_i64.checked_shl(attempts.min(31)).unwrap_or(i64::MAX);

    SignedDuration::from_secs(seconds).min(MAX_RETRY_DELAY)
}

/// Claims due entries and hands each to the handler registered for its topic.
pub struct OutboxWorker {
    db: Db,
    repository: PgOutboxRepository,
    handlers: FxHashMap<&'static str, Arc<dyn OutboxHandler>>,
    batch_size: u32,
    max_attempts: u32,
}

impl OutboxWorker {
    #[must_use]
    pub fn new(db: Db, batch_size: u32, max_attempts: u32) -> Self {
        Self {
            db,
            repository: PgOutboxRepository::new(),
            handlers: FxHashMap::default(),
            batch_size,
            max_attempts,
        }
    }

    /// Register `handler` for `topic`, replacing any previous one.
    #[must_use]
    pub fn with_handler(mut self, topic: &'static str, handler: Arc<dyn OutboxHandler>) -> Self {
        self.handlers.insert(topic, handler);
        self
    }
}

impl OutboxWorker {
    async fn claim(&self, now: Timestamp) -> Result<Vec<OutboxEntry>, OutboxServiceError> {
        let lease_until = now.saturating_add(CLAIM_LEASE).unwrap_or(now);
        let mut tx = self.db.begin().await?;

        let entries = self
            .repository
            .claim_due(&mut tx, now, self.batch_size, lease_until)
            .await?;

        tx.commit().await?;

        Ok(entries)
    }

    /// Deliver one claimed entry and record the outcome in its own transaction.
    async fn deliver(
        &self,
        entry: &OutboxEntry,
        now: Timestamp,
        report: &mut DrainReport,
    ) -> Result<(), OutboxServiceError> {
        let attempts = entry.attempts.saturating_add(1);

        let outcome = match self.handlers.get(entry.topic.as_str()) {
            Some(handler) => handler
                .handle(entry, now)
                .await
                .map_err(|error| (error.to_string(), attempts >= self.max_attempts)),
            None => Err((format!("no handler for topic {}", entry.topic), true)),
        };

        let mut tx = self.db.begin().await?;

        match outcome {
            Ok(()) => {
                self.repository.mark_processed(&mut tx, entry.uuid, now).await?;
                report.processed += 1;
            }
            Err((error, true)) => {
                tracing::warn!(
                    entry = %entry.uuid,
                    topic = %entry.topic,
                    attempts,
                    %error,
                    "outbox entry failed permanently"
                );

                self.repository
                    .mark_failed(&mut tx, entry.uuid, attempts, now, &error)
                    .await?;
                report.failed += 1;
            }
            Err((error, false)) => {
                let available_at = now.saturating_add(retry_delay(attempts)).unwrap_or(now);

                tracing::warn!(
                    entry = %entry.uuid,
                    topic = %entry.topic,
                    attempts,
                    %error,
                    %available_at,
                    "outbox delivery failed; rescheduled"
                );

                self.repository
                    .reschedule(&mut tx, entry.uuid, attempts, available_at, &error)
                    .await?;
                report.retried += 1;
            }
        }

        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl OutboxService for OutboxWorker {
    #[tracing::instrument(skip(self))]
    async fn drain_once(&self, now: Timestamp) -> Result<DrainReport, OutboxServiceError> {
        let mut report = DrainReport::default();

        for entry in self.claim(now).await? {
            self.deliver(&entry, now, &mut report).await?;
        }

        if !report.is_empty() {
            tracing::info!(
                processed = report.processed,
                retried = report.retried,
                failed = report.failed,
                "outbox drained"
            );
        }

        Ok(report)
    }
}

#[automock]
#[async_trait]
pub trait OutboxService: Send + Sync {
    /// Deliver every entry due at `now`, up to one batch.
    async fn drain_once(&self, now: Timestamp) -> Result<DrainReport, OutboxServiceError>;
}

#[cfg(test)]
mod tests {
    use atelier::orders::OrderStatus;
    use testresult::TestResult;

    use crate::{
        domain::{
            orders::records::OrderUuid,
            outbox::{
                OutboxHandlerError,
                handlers::MockOutboxHandler,
                messages::{OutboxMessage, StatusChanged},
            },
        },
        test::TestContext,
    };

    use super::*;

    async fn enqueue_status_change(ctx: &TestContext, now: Timestamp) -> TestResult {
        let mut tx = ctx.db.begin().await?;

        PgOutboxRepository::new()
            .enqueue(
                &mut tx,
                &StatusChanged {
                    order: OrderUuid::new(),
                    code: "ABCD2345".parse()?,
                    user: None,
                    email: None,
                    from: OrderStatus::Paid,
                    to: OrderStatus::Shipped,
                    tracking_code: None,
                },
                now,
            )
            .await?;

        tx.commit().await?;

        Ok(())
    }

    #[test]
    fn retry_delay_doubles_then_caps_at_an_hour() {
        assert_eq!(retry_delay(0), SignedDuration::from_secs(1));
        assert_eq!(retry_delay(1), SignedDuration::from_secs(2));
        assert_eq!(retry_delay(5), SignedDuration::from_secs(32));
        assert_eq!(retry_delay(12), SignedDuration::from_hours(1));
        assert_eq!(retry_delay(u32::MAX), SignedDuration::from_hours(1));
    }

    #[tokio::test]
    async fn delivered_entries_are_not_claimed_again() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        enqueue_status_change(&ctx, now).await?;

        let mut handler = MockOutboxHandler::new();

        handler.expect_handle().once().returning(|_, _| Ok(()));

        let worker = OutboxWorker::new(ctx.db.clone(), 10, 3)
            .with_handler(StatusChanged::TOPIC, Arc::new(handler));

        let first = worker.drain_once(now).await?;
        let second = worker.drain_once(now).await?;

        assert_eq!(first.processed, 1);
        assert!(second.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn failures_back_off_then_park_the_entry() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        enqueue_status_change(&ctx, now).await?;

        let mut handler = MockOutboxHandler::new();

        handler.expect_handle().times(2).returning(|_, _| {
            Err(OutboxHandlerError::Payload(serde_json::Error::io(std::io::Error::other("down"))))
        });

        let worker = OutboxWorker::new(ctx.db.clone(), 10, 2)
            .with_handler(StatusChanged::TOPIC, Arc::new(handler));

        let first = worker.drain_once(now).await?;

        assert_eq!(first.retried, 1);

        let too_early = worker.drain_once(now).await?;

        assert!(too_early.is_empty(), "entry waits for its backoff");

        let later = now.checked_add(SignedDuration::from_secs(5))?;
        let second = worker.drain_once(later).await?;

        assert_eq!(second.failed, 1);

        let parked = worker.drain_once(later.checked_add(SignedDuration::from_hours(2))?).await?;

        assert!(parked.is_empty(), "failed entries stay for inspection");

        Ok(())
    }

    /// Locks its own entry row without waiting, which fails while a claim transaction is open.
    struct LockingHandler {
        db: Db,
    }

    #[async_trait]
    impl OutboxHandler for LockingHandler {
        async fn handle(&self, entry: &OutboxEntry, _now: Timestamp) -> Result<(), OutboxHandlerError> {
            let mut tx = self.db.begin().await?;

            sqlx::query("SELECT uuid FROM outbox_entries WHERE uuid = $1 FOR UPDATE NOWAIT")
                .bind(entry.uuid.into_uuid())
                .execute(&mut *tx)
                .await?;

            tx.rollback().await?;

            Ok(())
        }
    }

    #[tokio::test]
    async fn no_row_lock_is_held_during_delivery() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        enqueue_status_change(&ctx, now).await?;

        let worker = OutboxWorker::new(ctx.db.clone(), 10, 1).with_handler(
            StatusChanged::TOPIC,
            Arc::new(LockingHandler { db: ctx.db.clone() }),
        );

        let report = worker.drain_once(now).await?;

        assert_eq!(report.processed, 1, "handler could not lock its entry: {report:?}");

        Ok(())
    }

    #[tokio::test]
    async fn abandoned_claims_return_after_the_lease() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let repository = PgOutboxRepository::new();

        enqueue_status_change(&ctx, now).await?;

        let lease_until = now.checked_add(CLAIM_LEASE)?;
        let mut tx = ctx.db.begin().await?;
        let claimed = repository.claim_due(&mut tx, now, 10, lease_until).await?;

        tx.commit().await?;

        assert_eq!(claimed.len(), 1);

        let mut handler = MockOutboxHandler::new();

        handler.expect_handle().once().returning(|_, _| Ok(()));

        let worker = OutboxWorker::new(ctx.db.clone(), 10, 3)
            .with_handler(StatusChanged::TOPIC, Arc::new(handler));

        assert!(worker.drain_once(now).await?.is_empty(), "entry is still leased");

        let report = worker.drain_once(lease_until).await?;

        assert_eq!(report.processed, 1);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_topics_fail_without_retry() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        enqueue_status_change(&ctx, now).await?;

        let worker = OutboxWorker::new(ctx.db.clone(), 10, 5);

        let report = worker.drain_once(now).await?;

        assert_eq!(report.failed, 1);

        Ok(())
    }
}
