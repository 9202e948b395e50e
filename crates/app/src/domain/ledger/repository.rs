//! Ledger Repository

use atelier::ledger::{StockEntry, StockReason};
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use rustc_hash::FxHashMap;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{catalog::records::VariantUuid, orders::records::OrderUuid};

const APPEND_ENTRY_SQL: &str = include_str!("sql/append_entry.sql");
const VARIANT_HISTORY_SQL: &str = include_str!("sql/variant_history.sql");
const SUM_DELTAS_SQL: &str = include_str!("sql/sum_deltas.sql");

/// A ledger row waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewStockEntry<'a> {
    pub(crate) variant: VariantUuid,
    pub(crate) delta: i64,
    pub(crate) reason: StockReason,
    pub(crate) order: Option<OrderUuid>,
    pub(crate) note: Option<&'a str>,
    pub(crate) now: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgLedgerRepository;

impl PgLedgerRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn append_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &NewStockEntry<'_>,
    ) -> Result<(), sqlx::Error> {
        query(APPEND_ENTRY_SQL)
            .bind(Uuid::now_v7())
            .bind(entry.variant.into_uuid())
            .bind(entry.delta)
            .bind(entry.reason.as_str())
            .bind(entry.order.map(OrderUuid::into_uuid))
            .bind(entry.note)
            .bind(SqlxTimestamp::from(entry.now))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn variant_history(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variant: VariantUuid,
    ) -> Result<Vec<StockEntry>, sqlx::Error> {
        let rows: Vec<LedgerRow> = query_as(VARIANT_HISTORY_SQL)
            .bind(variant.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    /// Sum of deltas per variant. Variants without rows are absent.
    pub(crate) async fn sum_deltas(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<FxHashMap<VariantUuid, i64>, sqlx::Error> {
        let rows: Vec<(Uuid, i64)> = query_as(SUM_DELTAS_SQL).fetch_all(&mut **tx).await?;

        Ok(rows
            .into_iter()
            .map(|(uuid, movements)| (VariantUuid::from_uuid(uuid), movements))
            .collect())
    }
}

struct LedgerRow(StockEntry);

impl<'r> FromRow<'r, PgRow> for LedgerRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let reason: String = row.try_get("reason")?;

        Ok(Self(StockEntry {
            variant: row.try_get("variant_uuid")?,
            delta: row.try_get("delta")?,
            reason: reason.parse().map_err(|e| sqlx::Error::ColumnDecode {
                index: "reason".to_string(),
                source: Box::new(e),
            })?,
            order_code: row.try_get("order_code")?,
            note: row.try_get("note")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        }))
    }
}
