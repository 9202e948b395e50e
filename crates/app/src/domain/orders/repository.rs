//! Orders Repository

use atelier::{
    orders::{OrderCode, OrderStatus},
    pricing::OrderTotals,
};
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{
    FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar,
    types::Json,
};
use uuid::Uuid;

use crate::{
    database::{amount_to_i64, count_to_i32, try_get_amount, try_get_u32},
    domain::{
        carts::records::CartOwner,
        catalog::records::VariantUuid,
        coupons::records::CouponUuid,
        orders::{
            data::{NewOrder, NewOrderItem},
            records::{
                Actor, OrderItemRecord, OrderItemUuid, OrderRecord, OrderUuid, ShippingAddress,
                StatusLogRecord,
            },
        },
        users::records::UserUuid,
    },
};

const INSERT_ORDER_SQL: &str = include_str!("sql/insert_order.sql");
const INSERT_ITEM_SQL: &str = include_str!("sql/insert_item.sql");
const LOCK_ORDER_SQL: &str = include_str!("sql/lock_order.sql");
const LOCK_ORDER_BY_INTENT_SQL: &str = include_str!("sql/lock_order_by_intent.sql");
const GET_ORDER_BY_CODE_SQL: &str = include_str!("sql/get_order_by_code.sql");
const LIST_ORDERS_FOR_USER_SQL: &str = include_str!("sql/list_orders_for_user.sql");
const LIST_ITEMS_SQL: &str = include_str!("sql/list_items.sql");
const UPDATE_STATUS_SQL: &str = include_str!("sql/update_status.sql");
const SET_PAYMENT_INTENT_SQL: &str = include_str!("sql/set_payment_intent.sql");
const DELETE_DRAFT_ORDER_SQL: &str = include_str!("sql/delete_draft_order.sql");
const APPEND_STATUS_LOG_SQL: &str = include_str!("sql/append_status_log.sql");
const HISTORY_SQL: &str = include_str!("sql/history.sql");
const HAS_PAID_ORDER_SQL: &str = include_str!("sql/has_paid_order.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrdersRepository;

impl PgOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn insert_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder,
        now: Timestamp,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(INSERT_ORDER_SQL)
            .bind(order.uuid.into_uuid())
            .bind(order.code.as_str())
            .bind(order.user.map(UserUuid::into_uuid))
            .bind(Json(&order.cart_owner))
            .bind(&order.cart_hash)
            .bind(amount_to_i64(order.totals.items, "items_total")?)
            .bind(amount_to_i64(order.totals.shipping, "shipping_total")?)
            .bind(amount_to_i64(order.totals.discount, "discount_total")?)
            .bind(amount_to_i64(order.totals.grand, "grand_total")?)
            .bind(&order.currency)
            .bind(&order.shipping_option_id)
            .bind(&order.shipping_label)
            .bind(order.shipping_address.postal_code.digits())
            .bind(Json(&order.shipping_address))
            .bind(order.coupon.map(CouponUuid::into_uuid))
            .bind(order.email.as_deref())
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn insert_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        item: &NewOrderItem,
    ) -> Result<OrderItemRecord, sqlx::Error> {
        query_as::<Postgres, OrderItemRecord>(INSERT_ITEM_SQL)
            .bind(OrderItemUuid::new().into_uuid())
            .bind(order.into_uuid())
            .bind(item.variant.into_uuid())
            .bind(&item.sku)
            .bind(&item.product_name)
            .bind(&item.size)
            .bind(&item.colour)
            .bind(count_to_i32(item.quantity, "quantity")?)
            .bind(amount_to_i64(item.unit_price, "unit_price")?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn lock_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(LOCK_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn lock_order_by_intent(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        intent: &str,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(LOCK_ORDER_BY_INTENT_SQL)
            .bind(intent)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn get_order_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &OrderCode,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(GET_ORDER_BY_CODE_SQL)
            .bind(code.as_str())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_orders_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(LIST_ORDERS_FOR_USER_SQL)
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn list_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<Vec<OrderItemRecord>, sqlx::Error> {
        query_as::<Postgres, OrderItemRecord>(LIST_ITEMS_SQL)
            .bind(order.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    /// Write the new status. A `None` tracking code keeps the stored one.
    pub(crate) async fn update_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        status: OrderStatus,
        tracking_code: Option<&str>,
        now: Timestamp,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(UPDATE_STATUS_SQL)
            .bind(order.into_uuid())
            .bind(status.code())
            .bind(tracking_code)
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await
    }

    /// Attach the gateway intent. Only pending orders accept one.
    pub(crate) async fn set_payment_intent(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        intent: &str,
        now: Timestamp,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(SET_PAYMENT_INTENT_SQL)
            .bind(order.into_uuid())
            .bind(intent)
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await
    }

    /// Remove a pending order that never got an intent. Items, holds and coupon uses cascade.
    pub(crate) async fn delete_draft_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<bool, sqlx::Error> {
        let result = query(DELETE_DRAFT_ORDER_SQL)
            .bind(order.into_uuid())
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn append_status_log(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        from: Option<OrderStatus>,
        to: OrderStatus,
        actor: Actor,
        note: Option<&str>,
        now: Timestamp,
    ) -> Result<(), sqlx::Error> {
        query(APPEND_STATUS_LOG_SQL)
            .bind(Uuid::now_v7())
            .bind(order.into_uuid())
            .bind(from.map(OrderStatus::code))
            .bind(to.code())
            .bind(actor.as_str())
            .bind(note)
            .bind(SqlxTimestamp::from(now))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn history(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<Vec<StatusLogRecord>, sqlx::Error> {
        query_as::<Postgres, StatusLogRecord>(HISTORY_SQL)
            .bind(order.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn has_paid_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<bool, sqlx::Error> {
        let paid: Vec<&str> = OrderStatus::ALL
            .into_iter()
            .filter(|status| status.is_paid())
            .map(OrderStatus::code)
            .collect();

        query_scalar::<Postgres, bool>(HAS_PAID_ORDER_SQL)
            .bind(user.into_uuid())
            .bind(paid)
            .fetch_one(&mut **tx)
            .await
    }
}

fn decode_error(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

fn try_get_status(row: &PgRow, column: &str) -> Result<OrderStatus, sqlx::Error> {
    let status: String = row.try_get(column)?;

    status.parse().map_err(|e| decode_error(column, e))
}

impl<'r> FromRow<'r, PgRow> for OrderRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let code: String = row.try_get("code")?;
        let user: Option<Uuid> = row.try_get("user_uuid")?;
        let coupon: Option<Uuid> = row.try_get("coupon_uuid")?;

        Ok(Self {
            uuid: OrderUuid::from_uuid(row.try_get("uuid")?),
            code: code.parse().map_err(|e| decode_error("code", e))?,
            user: user.map(UserUuid::from_uuid),
            cart_owner: row.try_get::<Json<CartOwner>, _>("cart_owner")?.0,
            cart_hash: row.try_get("cart_hash")?,
            status: try_get_status(row, "status")?,
            totals: OrderTotals {
                items: try_get_amount(row, "items_total")?,
                shipping: try_get_amount(row, "shipping_total")?,
                discount: try_get_amount(row, "discount_total")?,
                grand: try_get_amount(row, "grand_total")?,
            },
            currency: row.try_get("currency")?,
            shipping_option_id: row.try_get("shipping_option_id")?,
            shipping_label: row.try_get("shipping_label")?,
            shipping_address: row
                .try_get::<Json<ShippingAddress>, _>("shipping_address")?
                .0,
            coupon: coupon.map(CouponUuid::from_uuid),
            payment_intent_id: row.try_get("payment_intent_id")?,
            email: row.try_get("email")?,
            tracking_code: row.try_get("tracking_code")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderItemRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: OrderItemUuid::from_uuid(row.try_get("uuid")?),
            order: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            variant: VariantUuid::from_uuid(row.try_get("variant_uuid")?),
            sku: row.try_get("sku")?,
            product_name: row.try_get("product_name")?,
            size: row.try_get("size")?,
            colour: row.try_get("colour")?,
            quantity: try_get_u32(row, "quantity")?,
            unit_price: try_get_amount(row, "unit_price")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for StatusLogRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let from: Option<String> = row.try_get("from_status")?;
        let actor: String = row.try_get("actor")?;

        Ok(Self {
            from: from
                .map(|status| status.parse().map_err(|e| decode_error("from_status", e)))
                .transpose()?,
            to: try_get_status(row, "to_status")?,
            actor: actor.parse().map_err(|e| decode_error("actor", e))?,
            note: row.try_get("note")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
