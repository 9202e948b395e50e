//! Carts Repository

use atelier::carts::{CartLine, fingerprint::CartProtection};
use sqlx::{Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::{
    database::{amount_to_i64, count_to_i32, try_get_amount, try_get_u32},
    domain::{carts::records::CartUuid, users::records::UserUuid},
};

const GET_USER_CART_SQL: &str = include_str!("sql/get_user_cart.sql");
const LIST_CART_LINES_SQL: &str = include_str!("sql/list_cart_lines.sql");
const DELETE_USER_CART_LINES_SQL: &str = include_str!("sql/delete_user_cart_lines.sql");
const UPSERT_USER_CART_SQL: &str = include_str!("sql/upsert_user_cart.sql");
const INSERT_CART_LINES_SQL: &str = include_str!("sql/insert_cart_lines.sql");
const DELETE_USER_CART_SQL: &str = include_str!("sql/delete_user_cart.sql");

/// Cart header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CartRow {
    pub(crate) uuid: CartUuid,
    pub(crate) protection: Option<CartProtection>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartsRepository;

impl PgCartsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_user_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Option<CartRow>, sqlx::Error> {
        let row = query(GET_USER_CART_SQL)
            .bind(user.into_uuid())
            .fetch_optional(&mut **tx)
            .await?;

        row.map(|row| cart_row(&row)).transpose()
    }

    pub(crate) async fn list_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
    ) -> Result<Vec<CartLine>, sqlx::Error> {
        query_as::<Postgres, CartLineRow>(LIST_CART_LINES_SQL)
            .bind(cart.into_uuid())
            .fetch_all(&mut **tx)
            .await
            .map(|rows| rows.into_iter().map(|row| row.0).collect())
    }

    /// Replace the user's cart, lines included.
    pub(crate) async fn replace_user_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        cart: CartUuid,
        protection: Option<&CartProtection>,
        lines: &[CartLine],
    ) -> Result<(), sqlx::Error> {
        let protection = protection
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        query(DELETE_USER_CART_LINES_SQL)
            .bind(user.into_uuid())
            .execute(&mut **tx)
            .await?;

        query(UPSERT_USER_CART_SQL)
            .bind(cart.into_uuid())
            .bind(user.into_uuid())
            .bind(protection)
            .execute(&mut **tx)
            .await?;

        if lines.is_empty() {
            return Ok(());
        }

        let mut variants = Vec::with_capacity(lines.len());
        let mut positions = Vec::with_capacity(lines.len());
        let mut quantities = Vec::with_capacity(lines.len());
        let mut sizes = Vec::with_capacity(lines.len());
        let mut colours = Vec::with_capacity(lines.len());
        let mut prices = Vec::with_capacity(lines.len());

        for (position, line) in (0_u32..).zip(lines) {
            variants.push(line.variant);
            positions.push(count_to_i32(position, "position")?);
            quantities.push(count_to_i32(line.quantity, "quantity")?);
            sizes.push(line.size.clone());
            colours.push(line.colour.clone());
            prices.push(amount_to_i64(line.unit_price, "unit_price")?);
        }

        query(INSERT_CART_LINES_SQL)
            .bind(cart.into_uuid())
            .bind(variants)
            .bind(positions)
            .bind(quantities)
            .bind(sizes)
            .bind(colours)
            .bind(prices)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn delete_user_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_USER_CART_SQL)
            .bind(user.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

fn cart_row(row: &PgRow) -> Result<CartRow, sqlx::Error> {
    let protection = row
        .try_get::<Option<serde_json::Value>, _>("protection")?
        .map(serde_json::from_value::<CartProtection>)
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "protection".to_string(),
            source: Box::new(e),
        })?;

    Ok(CartRow {
        uuid: CartUuid::from_uuid(row.try_get::<Uuid, _>("uuid")?),
        protection,
    })
}

struct CartLineRow(CartLine);

impl<'r> sqlx::FromRow<'r, PgRow> for CartLineRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self(CartLine {
            variant: row.try_get("variant_uuid")?,
            quantity: try_get_u32(row, "quantity")?,
            size: row.try_get("size")?,
            colour: row.try_get("colour")?,
            unit_price: try_get_amount(row, "unit_price")?,
        }))
    }
}
