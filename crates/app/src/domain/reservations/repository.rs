//! Reservations Repository

use atelier::reservations::ReservationState;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};
use uuid::Uuid;

use crate::{
    database::{count_to_i32, try_get_u32},
    domain::{
        catalog::records::VariantUuid,
        orders::records::OrderUuid,
        reservations::records::{ReservationRecord, ReservationUuid},
    },
};

const ACTIVE_HOLDS_SQL: &str = include_str!("sql/active_holds.sql");
const INSERT_HOLD_SQL: &str = include_str!("sql/insert_hold.sql");
const LIST_FOR_ORDER_SQL: &str = include_str!("sql/list_for_order.sql");
const TRANSITION_FOR_ORDER_SQL: &str = include_str!("sql/transition_for_order.sql");
const HAS_LAPSED_HOLDS_SQL: &str = include_str!("sql/has_lapsed_holds.sql");
const EXPIRED_PENDING_ORDERS_SQL: &str = include_str!("sql/expired_pending_orders.sql");
const EXPIRED_PENDING_ORDERS_FOR_VARIANTS_SQL: &str =
    include_str!("sql/expired_pending_orders_for_variants.sql");
const EXPIRE_ORPHANS_SQL: &str = include_str!("sql/expire_orphans.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgReservationsRepository;

impl PgReservationsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Units held by `PENDING` reservations that have not lapsed at `now`.
    pub(crate) async fn active_holds(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variant: VariantUuid,
        now: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        query_scalar::<Postgres, i64>(ACTIVE_HOLDS_SQL)
            .bind(variant.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn insert_hold(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        variant: VariantUuid,
        quantity: u32,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Result<ReservationRecord, sqlx::Error> {
        query_as::<Postgres, ReservationRecord>(INSERT_HOLD_SQL)
            .bind(ReservationUuid::new().into_uuid())
            .bind(variant.into_uuid())
            .bind(order.into_uuid())
            .bind(count_to_i32(quantity, "quantity")?)
            .bind(SqlxTimestamp::from(now))
            .bind(SqlxTimestamp::from(expires_at))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_for_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<Vec<ReservationRecord>, sqlx::Error> {
        query_as::<Postgres, ReservationRecord>(LIST_FOR_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    /// Move every hold of `order` currently in one of `from` to `to`. Returns the rows touched.
    pub(crate) async fn transition_for_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        from: &[ReservationState],
        to: ReservationState,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let from: Vec<&str> = from
            .iter()
            .filter(|state| state.can_become(to))
            .map(|state| state.as_str())
            .collect();

        let result = query(TRANSITION_FOR_ORDER_SQL)
            .bind(order.into_uuid())
            .bind(from)
            .bind(to.as_str())
            .bind(SqlxTimestamp::from(now))
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    /// Whether `order` still has `PENDING` holds that lapsed before `now`.
    pub(crate) async fn has_lapsed_holds(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        query_scalar::<Postgres, bool>(HAS_LAPSED_HOLDS_SQL)
            .bind(order.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await
    }

    /// Lock up to `limit` pending-payment orders owning lapsed holds. Rows locked elsewhere are
    /// skipped.
    pub(crate) async fn expired_pending_orders(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<OrderUuid>, sqlx::Error> {
        let rows: Vec<Uuid> = query_scalar(EXPIRED_PENDING_ORDERS_SQL)
            .bind(SqlxTimestamp::from(now))
            .bind(i64::from(limit))
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows.into_iter().map(OrderUuid::from_uuid).collect())
    }

    /// Same as [`Self::expired_pending_orders`], restricted to holds on `variants`.
    pub(crate) async fn expired_pending_orders_for_variants(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variants: &[VariantUuid],
        now: Timestamp,
    ) -> Result<Vec<OrderUuid>, sqlx::Error> {
        let uuids: Vec<Uuid> = variants.iter().map(|v| v.into_uuid()).collect();

        let rows: Vec<Uuid> = query_scalar(EXPIRED_PENDING_ORDERS_FOR_VARIANTS_SQL)
            .bind(SqlxTimestamp::from(now))
            .bind(uuids)
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows.into_iter().map(OrderUuid::from_uuid).collect())
    }

    /// Expire lapsed `PENDING` holds whose order already left pending payment.
    pub(crate) async fn expire_orphans(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = query(EXPIRE_ORPHANS_SQL)
            .bind(SqlxTimestamp::from(now))
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}

impl<'r> FromRow<'r, PgRow> for ReservationRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let state: String = row.try_get("state")?;

        Ok(Self {
            uuid: ReservationUuid::from_uuid(row.try_get("uuid")?),
            variant: VariantUuid::from_uuid(row.try_get("variant_uuid")?),
            order: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            quantity: try_get_u32(row, "quantity")?,
            state: state.parse().map_err(|e| sqlx::Error::ColumnDecode {
                index: "state".to_string(),
                source: Box::new(e),
            })?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            expires_at: row.try_get::<SqlxTimestamp, _>("expires_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
