//! Catalog Repository

use atelier::pricing::{PriceSchedule, SaleWindow, VariantPricing};
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as, query_scalar};
use uuid::Uuid;

use crate::{
    database::{amount_to_i64, count_to_i32, try_get_amount, try_get_optional_u32},
    domain::catalog::{
        data::{NewProduct, NewVariant, ProductFilter},
        records::{PricedVariant, ProductRecord, ProductUuid, VariantRecord, VariantUuid},
    },
};

const LIST_PRODUCTS_SQL: &str = include_str!("sql/list_products.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const LIST_PRODUCT_VARIANTS_SQL: &str = include_str!("sql/list_product_variants.sql");
const RESOLVE_VARIANT_SQL: &str = include_str!("sql/resolve_variant.sql");
const GET_PRICED_VARIANTS_SQL: &str = include_str!("sql/get_priced_variants.sql");
const VARIANT_STOCK_SQL: &str = include_str!("sql/variant_stock.sql");
const GET_PRODUCT_SKU_SQL: &str = include_str!("sql/get_product_sku.sql");
const CREATE_PRODUCT_SQL: &str = include_str!("sql/create_product.sql");
const CREATE_VARIANT_SQL: &str = include_str!("sql/create_variant.sql");
const LOCK_VARIANTS_SQL: &str = include_str!("sql/lock_variants.sql");
const APPLY_STOCK_DELTA_SQL: &str = include_str!("sql/apply_stock_delta.sql");
const LIST_STOCK_LEVELS_SQL: &str = include_str!("sql/list_stock_levels.sql");

/// Stored and initial stock of one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StockLevel {
    pub(crate) variant: VariantUuid,
    pub(crate) sku: String,
    pub(crate) initial: i64,
    pub(crate) stock: i64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCatalogRepository;

impl PgCatalogRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn list_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        filter: &ProductFilter,
        now: Timestamp,
    ) -> Result<Vec<ProductRecord>, sqlx::Error> {
        let colours: Vec<String> = filter.colours.iter().map(|c| c.to_lowercase()).collect();
        let sizes: Vec<String> = filter.sizes.iter().map(|s| s.to_lowercase()).collect();
        let min_price = filter
            .min_price
            .map(|price| amount_to_i64(price, "min_price"))
            .transpose()?;
        let max_price = filter
            .max_price
            .map(|price| amount_to_i64(price, "max_price"))
            .transpose()?;

        query_as::<Postgres, ProductRecord>(LIST_PRODUCTS_SQL)
            .bind(filter.category.as_deref())
            .bind(colours)
            .bind(sizes)
            .bind(min_price)
            .bind(max_price)
            .bind(SqlxTimestamp::from(now))
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn get_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<ProductRecord, sqlx::Error> {
        query_as::<Postgres, ProductRecord>(GET_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_product_variants(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<Vec<VariantRecord>, sqlx::Error> {
        query_as::<Postgres, VariantRecord>(LIST_PRODUCT_VARIANTS_SQL)
            .bind(product.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn resolve_variant(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        colour: &str,
        size: &str,
    ) -> Result<VariantRecord, sqlx::Error> {
        query_as::<Postgres, VariantRecord>(RESOLVE_VARIANT_SQL)
            .bind(product.into_uuid())
            .bind(colour)
            .bind(size)
            .fetch_one(&mut **tx)
            .await
    }

    /// Priced variants ordered by uuid. Unknown ids are skipped.
    pub(crate) async fn get_priced_variants(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variants: &[VariantUuid],
    ) -> Result<Vec<PricedVariant>, sqlx::Error> {
        let uuids: Vec<Uuid> = variants.iter().map(|v| v.into_uuid()).collect();

        query_as::<Postgres, PricedVariant>(GET_PRICED_VARIANTS_SQL)
            .bind(uuids)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn variant_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variant: VariantUuid,
    ) -> Result<i64, sqlx::Error> {
        query_scalar::<Postgres, i64>(VARIANT_STOCK_SQL)
            .bind(variant.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_product_sku(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<String, sqlx::Error> {
        query_scalar::<Postgres, String>(GET_PRODUCT_SKU_SQL)
            .bind(product.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn create_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &NewProduct,
    ) -> Result<ProductRecord, sqlx::Error> {
        let (sale_price, sale_starts_at, sale_ends_at) = bind_sale(product.sale.as_ref())?;

        query_as::<Postgres, ProductRecord>(CREATE_PRODUCT_SQL)
            .bind(product.uuid.into_uuid())
            .bind(&product.name)
            .bind(&product.slug)
            .bind(&product.sku)
            .bind(&product.description)
            .bind(&product.category)
            .bind(amount_to_i64(product.base_price, "base_price")?)
            .bind(sale_price)
            .bind(sale_starts_at)
            .bind(sale_ends_at)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn create_variant(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variant: &NewVariant,
        sku: &str,
    ) -> Result<VariantRecord, sqlx::Error> {
        let (sale_price, sale_starts_at, sale_ends_at) = bind_sale(variant.sale.as_ref())?;
        let dimension = |value: Option<u32>, column: &str| {
            value.map(|v| count_to_i32(v, column)).transpose()
        };

        query_as::<Postgres, VariantRecord>(CREATE_VARIANT_SQL)
            .bind(variant.uuid.into_uuid())
            .bind(variant.product.into_uuid())
            .bind(sku)
            .bind(&variant.colour)
            .bind(&variant.colour_code)
            .bind(&variant.size)
            .bind(i64::from(variant.stock))
            .bind(amount_to_i64(variant.surcharge, "surcharge")?)
            .bind(sale_price)
            .bind(sale_starts_at)
            .bind(sale_ends_at)
            .bind(dimension(variant.weight_grams, "weight_grams")?)
            .bind(dimension(variant.width_cm, "width_cm")?)
            .bind(dimension(variant.height_cm, "height_cm")?)
            .bind(dimension(variant.length_cm, "length_cm")?)
            .fetch_one(&mut **tx)
            .await
    }

    /// Lock variant rows in uuid order and return their stock.
    ///
    /// Every writer locks in the same order, so concurrent checkouts cannot deadlock on
    /// overlapping carts.
    pub(crate) async fn lock_variants(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variants: &[VariantUuid],
    ) -> Result<Vec<(VariantUuid, i64)>, sqlx::Error> {
        let mut uuids: Vec<Uuid> = variants.iter().map(|v| v.into_uuid()).collect();

        uuids.sort_unstable();
        uuids.dedup();

        let rows: Vec<(Uuid, i64)> = query_as(LOCK_VARIANTS_SQL)
            .bind(uuids)
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(uuid, stock)| (VariantUuid::from_uuid(uuid), stock))
            .collect())
    }

    /// Add `delta` to the stored stock. The `stock >= 0` check rejects underflow.
    pub(crate) async fn apply_stock_delta(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        variant: VariantUuid,
        delta: i64,
    ) -> Result<i64, sqlx::Error> {
        query_scalar::<Postgres, i64>(APPLY_STOCK_DELTA_SQL)
            .bind(variant.into_uuid())
            .bind(delta)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_stock_levels(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<StockLevel>, sqlx::Error> {
        let rows: Vec<(Uuid, String, i64, i64)> = query_as(LIST_STOCK_LEVELS_SQL)
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(uuid, sku, initial, stock)| StockLevel {
                variant: VariantUuid::from_uuid(uuid),
                sku,
                initial,
                stock,
            })
            .collect())
    }
}

type SaleColumns = (Option<i64>, Option<SqlxTimestamp>, Option<SqlxTimestamp>);

fn bind_sale(sale: Option<&SaleWindow>) -> Result<SaleColumns, sqlx::Error> {
    let Some(sale) = sale else {
        return Ok((None, None, None));
    };

    Ok((
        Some(amount_to_i64(sale.price, "sale_price")?),
        Some(SqlxTimestamp::from(sale.starts_at)),
        Some(SqlxTimestamp::from(sale.ends_at)),
    ))
}

fn try_get_sale(row: &PgRow, prefix: &str) -> Result<Option<SaleWindow>, sqlx::Error> {
    let price: Option<i64> = row.try_get(format!("{prefix}sale_price").as_str())?;
    let starts_at: Option<SqlxTimestamp> =
        row.try_get(format!("{prefix}sale_starts_at").as_str())?;
    let ends_at: Option<SqlxTimestamp> = row.try_get(format!("{prefix}sale_ends_at").as_str())?;

    let (Some(price), Some(starts_at), Some(ends_at)) = (price, starts_at, ends_at) else {
        return Ok(None);
    };

    let price = u64::try_from(price).map_err(|e| sqlx::Error::ColumnDecode {
        index: format!("{prefix}sale_price"),
        source: Box::new(e),
    })?;

    Ok(Some(SaleWindow {
        price,
        starts_at: starts_at.to_jiff(),
        ends_at: ends_at.to_jiff(),
    }))
}

impl<'r> FromRow<'r, PgRow> for ProductRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            sku: row.try_get("sku")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            pricing: PriceSchedule {
                base: try_get_amount(row, "base_price")?,
                sale: try_get_sale(row, "")?,
            },
            active: row.try_get("active")?,
            stock: row.try_get("stock")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for VariantRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: VariantUuid::from_uuid(row.try_get("uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            sku: row.try_get("sku")?,
            colour: row.try_get("colour")?,
            colour_code: row.try_get("colour_code")?,
            size: row.try_get("size")?,
            stock: row.try_get("stock")?,
            initial_stock: row.try_get("initial_stock")?,
            surcharge: try_get_amount(row, "surcharge")?,
            sale: try_get_sale(row, "")?,
            weight_grams: try_get_optional_u32(row, "weight_grams")?,
            width_cm: try_get_optional_u32(row, "width_cm")?,
            height_cm: try_get_optional_u32(row, "height_cm")?,
            length_cm: try_get_optional_u32(row, "length_cm")?,
            active: row.try_get("active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for PricedVariant {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let variant = VariantRecord::from_row(row)?;

        let pricing = VariantPricing {
            product: PriceSchedule {
                base: try_get_amount(row, "product_base_price")?,
                sale: try_get_sale(row, "product_")?,
            },
            surcharge: variant.surcharge,
            variant_sale: variant.sale,
        };

        Ok(Self {
            variant,
            product_name: row.try_get("product_name")?,
            product_active: row.try_get("product_active")?,
            pricing,
        })
    }
}
