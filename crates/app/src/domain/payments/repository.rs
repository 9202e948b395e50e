//! Payments Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{Postgres, Transaction, query};

const RECORD_EVENT_SQL: &str = include_str!("sql/record_event.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgPaymentsRepository;

impl PgPaymentsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Remember a processed event id. Returns `false` when it was already recorded.
    ///
    /// A concurrent delivery of the same id blocks on the unique index until the first
    /// transaction ends.
    pub(crate) async fn record_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event_id: &str,
        event_type: &str,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = query(RECORD_EVENT_SQL)
            .bind(event_id)
            .bind(event_type)
            .bind(SqlxTimestamp::from(now))
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
