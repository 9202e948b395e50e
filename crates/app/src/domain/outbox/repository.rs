//! Outbox Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::{
    database::{count_to_i32, try_get_u32},
    domain::{
        orders::records::OrderUuid,
        outbox::{
            messages::OutboxMessage,
            records::{OutboxEntry, OutboxEntryUuid},
        },
        users::records::UserUuid,
    },
};

const ENQUEUE_SQL: &str = include_str!("sql/enqueue.sql");
const CLAIM_DUE_SQL: &str = include_str!("sql/claim_due.sql");
const MARK_PROCESSED_SQL: &str = include_str!("sql/mark_processed.sql");
const RESCHEDULE_SQL: &str = include_str!("sql/reschedule.sql");
const MARK_FAILED_SQL: &str = include_str!("sql/mark_failed.sql");
const INSERT_NOTIFICATION_SQL: &str = include_str!("sql/insert_notification.sql");

/// In-app notification for a buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewNotification<'a> {
    pub(crate) uuid: Uuid,
    pub(crate) user: Option<UserUuid>,
    pub(crate) order: OrderUuid,
    pub(crate) kind: &'a str,
    pub(crate) title: &'a str,
    pub(crate) body: &'a str,
    pub(crate) now: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOutboxRepository;

impl PgOutboxRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Append `message` under its topic, due immediately.
    pub(crate) async fn enqueue<M: OutboxMessage + Sync>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message: &M,
        now: Timestamp,
    ) -> Result<OutboxEntryUuid, sqlx::Error> {
        let uuid = OutboxEntryUuid::new();
        let payload = serde_json::to_value(message).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        query(ENQUEUE_SQL)
            .bind(uuid.into_uuid())
            .bind(M::TOPIC)
            .bind(payload)
            .bind(SqlxTimestamp::from(now))
            .execute(&mut **tx)
            .await?;

        Ok(uuid)
    }

    /// Lease up to `limit` due entries until `lease_until`. Rows locked by another worker are
    /// skipped, and leased rows stay invisible to other claims until the lease runs out.
    pub(crate) async fn claim_due(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        now: Timestamp,
        limit: u32,
        lease_until: Timestamp,
    ) -> Result<Vec<OutboxEntry>, sqlx::Error> {
        query_as::<Postgres, OutboxEntry>(CLAIM_DUE_SQL)
            .bind(SqlxTimestamp::from(now))
            .bind(i64::from(limit))
            .bind(SqlxTimestamp::from(lease_until))
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn mark_processed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: OutboxEntryUuid,
        now: Timestamp,
    ) -> Result<(), sqlx::Error> {
        query(MARK_PROCESSED_SQL)
            .bind(entry.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn reschedule(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: OutboxEntryUuid,
        attempts: u32,
        available_at: Timestamp,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        query(RESCHEDULE_SQL)
            .bind(entry.into_uuid())
            .bind(count_to_i32(attempts, "attempts")?)
            .bind(SqlxTimestamp::from(available_at))
            .bind(error)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Park an entry for operator inspection. It is never claimed again.
    pub(crate) async fn mark_failed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: OutboxEntryUuid,
        attempts: u32,
        now: Timestamp,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        query(MARK_FAILED_SQL)
            .bind(entry.into_uuid())
            .bind(count_to_i32(attempts, "attempts")?)
            .bind(SqlxTimestamp::from(now))
            .bind(error)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Insert a notification. Re-inserting the same uuid is a no-op.
    pub(crate) async fn insert_notification(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        notification: &NewNotification<'_>,
    ) -> Result<(), sqlx::Error> {
        query(INSERT_NOTIFICATION_SQL)
            .bind(notification.uuid)
            .bind(notification.user.map(UserUuid::into_uuid))
            .bind(notification.order.into_uuid())
            .bind(notification.kind)
            .bind(notification.title)
            .bind(notification.body)
            .bind(SqlxTimestamp::from(notification.now))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

impl<'r> FromRow<'r, PgRow> for OutboxEntry {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: OutboxEntryUuid::from_uuid(row.try_get("uuid")?),
            topic: row.try_get("topic")?,
            payload: row.try_get("payload")?,
            attempts: try_get_u32(row, "attempts")?,
            available_at: row.try_get::<SqlxTimestamp, _>("available_at")?.to_jiff(),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
