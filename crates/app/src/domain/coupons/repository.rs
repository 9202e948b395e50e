//! Coupons Repository

use atelier::coupons::{Coupon, CouponKind};
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as, query_scalar};
use uuid::Uuid;

use crate::{
    database::{amount_to_i64, count_to_i32, try_get_u32},
    domain::{
        coupons::{
            data::NewCoupon,
            records::{CouponRecord, CouponUuid},
        },
        orders::records::OrderUuid,
        users::records::UserUuid,
    },
};

const CREATE_COUPON_SQL: &str = include_str!("sql/create_coupon.sql");
const GET_COUPON_BY_CODE_SQL: &str = include_str!("sql/get_coupon_by_code.sql");
const LOCK_COUPON_BY_CODE_SQL: &str = include_str!("sql/lock_coupon_by_code.sql");
const USED_BY_USER_SQL: &str = include_str!("sql/used_by_user.sql");
const CONSUME_USE_SQL: &str = include_str!("sql/consume_use.sql");
const RELEASE_USE_SQL: &str = include_str!("sql/release_use.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCouponsRepository;

impl PgCouponsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: &NewCoupon,
        code: &str,
    ) -> Result<CouponRecord, sqlx::Error> {
        let (basis_points, amount, buy_quantity, get_quantity) = bind_kind(&coupon.kind)?;

        query_as::<Postgres, CouponRecord>(CREATE_COUPON_SQL)
            .bind(coupon.uuid.into_uuid())
            .bind(code)
            .bind(coupon.kind.as_str())
            .bind(basis_points)
            .bind(amount)
            .bind(buy_quantity)
            .bind(get_quantity)
            .bind(coupon.starts_at.map(SqlxTimestamp::from))
            .bind(coupon.ends_at.map(SqlxTimestamp::from))
            .bind(
                coupon
                    .max_uses
                    .map(|uses| count_to_i32(uses, "max_uses"))
                    .transpose()?,
            )
            .bind(coupon.single_use_per_user)
            .bind(coupon.first_purchase_only)
            .bind(coupon.user.map(UserUuid::into_uuid))
            .bind(
                coupon
                    .min_order_value
                    .map(|value| amount_to_i64(value, "min_order_value"))
                    .transpose()?,
            )
            .bind(
                coupon
                    .max_discount
                    .map(|value| amount_to_i64(value, "max_discount"))
                    .transpose()?,
            )
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_coupon_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<CouponRecord, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(GET_COUPON_BY_CODE_SQL)
            .bind(code)
            .fetch_one(&mut **tx)
            .await
    }

    /// Lock a coupon row so its use count cannot move until the transaction ends.
    pub(crate) async fn lock_coupon_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<CouponRecord>, sqlx::Error> {
        query_as::<Postgres, CouponRecord>(LOCK_COUPON_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn used_by_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        user: UserUuid,
    ) -> Result<bool, sqlx::Error> {
        query_scalar::<Postgres, bool>(USED_BY_USER_SQL)
            .bind(coupon.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Record one use for `order` and bump the running count.
    pub(crate) async fn consume_use(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        order: OrderUuid,
        user: Option<UserUuid>,
        now: Timestamp,
    ) -> Result<u32, sqlx::Error> {
        let uses: i32 = query_scalar::<Postgres, i32>(CONSUME_USE_SQL)
            .bind(coupon.into_uuid())
            .bind(order.into_uuid())
            .bind(user.map(UserUuid::into_uuid))
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await?;

        u32::try_from(uses).map_err(|e| sqlx::Error::ColumnDecode {
            index: "uses".to_string(),
            source: Box::new(e),
        })
    }

    /// Give back the use consumed by `order`, if any. Returns whether one was released.
    pub(crate) async fn release_use(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<bool, sqlx::Error> {
        let released: Option<Uuid> = query_scalar::<Postgres, Uuid>(RELEASE_USE_SQL)
            .bind(order.into_uuid())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(released.is_some())
    }
}

type KindColumns = (Option<i32>, Option<i64>, Option<i32>, Option<i32>);

fn bind_kind(kind: &CouponKind) -> Result<KindColumns, sqlx::Error> {
    Ok(match *kind {
        CouponKind::Percentage { basis_points } => (
            Some(count_to_i32(basis_points, "basis_points")?),
            None,
            None,
            None,
        ),
        CouponKind::Fixed { amount } => (None, Some(amount_to_i64(amount, "amount")?), None, None),
        CouponKind::FreeShipping => (None, None, None, None),
        CouponKind::BuyGet { buy, get } => (
            None,
            None,
            Some(count_to_i32(buy, "buy_quantity")?),
            Some(count_to_i32(get, "get_quantity")?),
        ),
    })
}

fn decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

fn try_get_kind(row: &PgRow) -> Result<CouponKind, sqlx::Error> {
    let kind: String = row.try_get("kind")?;

    match kind.as_str() {
        "percentage" => Ok(CouponKind::Percentage {
            basis_points: try_get_u32(row, "basis_points")?,
        }),
        "fixed" => {
            let amount: i64 = row.try_get("amount")?;

            Ok(CouponKind::Fixed {
                amount: u64::try_from(amount)
                    .map_err(|e| decode_error("amount", e.to_string()))?,
            })
        }
        "free_shipping" => Ok(CouponKind::FreeShipping),
        "buy_get" => Ok(CouponKind::BuyGet {
            buy: try_get_u32(row, "buy_quantity")?,
            get: try_get_u32(row, "get_quantity")?,
        }),
        other => Err(decode_error("kind", format!("unknown coupon kind {other:?}"))),
    }
}

fn try_get_optional_amount(row: &PgRow, column: &str) -> Result<Option<u64>, sqlx::Error> {
    let value: Option<i64> = row.try_get(column)?;

    value
        .map(|v| u64::try_from(v).map_err(|e| decode_error(column, e.to_string())))
        .transpose()
}

impl<'r> FromRow<'r, PgRow> for CouponRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let max_uses: Option<i32> = row.try_get("max_uses")?;
        let user: Option<Uuid> = row.try_get("user_uuid")?;

        let coupon = Coupon {
            code: row.try_get("code")?,
            kind: try_get_kind(row)?,
            active: row.try_get("active")?,
            starts_at: row
                .try_get::<Option<SqlxTimestamp>, _>("starts_at")?
                .map(SqlxTimestamp::to_jiff),
            ends_at: row
                .try_get::<Option<SqlxTimestamp>, _>("ends_at")?
                .map(SqlxTimestamp::to_jiff),
            max_uses: max_uses
                .map(|v| u32::try_from(v).map_err(|e| decode_error("max_uses", e.to_string())))
                .transpose()?,
            uses: try_get_u32(row, "uses")?,
            single_use_per_user: row.try_get("single_use_per_user")?,
            first_purchase_only: row.try_get("first_purchase_only")?,
            user,
            min_order_value: try_get_optional_amount(row, "min_order_value")?,
            max_discount: try_get_optional_amount(row, "max_discount")?,
        };

        Ok(Self {
            uuid: CouponUuid::from_uuid(row.try_get("uuid")?),
            coupon,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
