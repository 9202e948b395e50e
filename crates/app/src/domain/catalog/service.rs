//! Catalog service.

use async_trait::async_trait;
use atelier::{pricing::validate_price, shipping::validate_dimensions};
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::catalog::{
        data::{NewProduct, NewVariant, ProductFilter, variant_sku},
        errors::CatalogServiceError,
        records::{
            PricedVariant, ProductDetails, ProductRecord, ProductUuid, VariantRecord, VariantUuid,
        },
        repository::PgCatalogRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgCatalogService {
    db: Db,
    repository: PgCatalogRepository,
}

impl PgCatalogService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCatalogRepository::new(),
        }
    }
}

#[async_trait]
impl CatalogService for PgCatalogService {
    async fn list_products(
        &self,
        filter: ProductFilter,
        now: Timestamp,
    ) -> Result<Vec<ProductRecord>, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let products = self.repository.list_products(&mut tx, &filter, now).await?;

        tx.commit().await?;

        Ok(products)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<ProductDetails, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.repository.get_product(&mut tx, product).await?;
        let variants = self.repository.list_product_variants(&mut tx, product).await?;

        tx.commit().await?;

        Ok(ProductDetails {
            product: record,
            variants,
        })
    }

    async fn resolve_variant(
        &self,
        product: ProductUuid,
        colour: String,
        size: String,
    ) -> Result<VariantRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let variant = self
            .repository
            .resolve_variant(&mut tx, product, &colour, &size)
            .await?;

        tx.commit().await?;

        Ok(variant)
    }

    async fn get_variant(&self, variant: VariantUuid) -> Result<PricedVariant, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let found = self
            .repository
            .get_priced_variants(&mut tx, &[variant])
            .await?
            .into_iter()
            .next()
            .ok_or(CatalogServiceError::NotFound)?;

        tx.commit().await?;

        Ok(found)
    }

    async fn get_variants(
        &self,
        variants: Vec<VariantUuid>,
    ) -> Result<Vec<PricedVariant>, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let found = self.repository.get_priced_variants(&mut tx, &variants).await?;

        tx.commit().await?;

        Ok(found)
    }

    async fn stock(&self, variant: VariantUuid) -> Result<i64, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let stock = self.repository.variant_stock(&mut tx, variant).await?;

        tx.commit().await?;

        Ok(stock)
    }

    #[tracing::instrument(skip(self, product), fields(product = %product.uuid, sku = %product.sku))]
    async fn create_product(&self, product: NewProduct) -> Result<ProductRecord, CatalogServiceError> {
        validate_price(product.base_price)?;

        if let Some(sale) = &product.sale {
            sale.validate(product.base_price)?;
        }

        let mut tx = self.db.begin().await?;

        let created = self.repository.create_product(&mut tx, &product).await?;

        tx.commit().await?;

        tracing::info!("product created");

        Ok(created)
    }

    #[tracing::instrument(skip(self, variant), fields(variant = %variant.uuid, product = %variant.product))]
    async fn create_variant(&self, variant: NewVariant) -> Result<VariantRecord, CatalogServiceError> {
        let package = atelier::shipping::Package::with_defaults(
            variant.weight_grams,
            variant.width_cm,
            variant.height_cm,
            variant.length_cm,
            0,
            1,
        );

        validate_dimensions(
            package.weight_grams,
            package.width_cm,
            package.height_cm,
            package.length_cm,
        )?;

        let mut tx = self.db.begin().await?;

        let product = self.repository.get_product(&mut tx, variant.product).await?;

        if let Some(sale) = &variant.sale {
            sale.validate(product.pricing.base.saturating_add(variant.surcharge))?;
        }

        let sku = match variant.sku.as_deref().map(str::trim) {
            Some(sku) if !sku.is_empty() => sku.to_uppercase(),
            _ => {
                let product_sku = self.repository.get_product_sku(&mut tx, variant.product).await?;

                variant_sku(&product_sku, &variant.colour, &variant.size)
            }
        };

        let created = self.repository.create_variant(&mut tx, &variant, &sku).await?;

        tx.commit().await?;

        tracing::info!(sku = %created.sku, stock = created.stock, "variant created");

        Ok(created)
    }
}

#[automock]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Active products matching `filter`, priced at `now`.
    async fn list_products(
        &self,
        filter: ProductFilter,
        now: Timestamp,
    ) -> Result<Vec<ProductRecord>, CatalogServiceError>;

    /// A product and all of its variants.
    async fn get_product(&self, product: ProductUuid) -> Result<ProductDetails, CatalogServiceError>;

    /// The active variant of `product` with the given colour and size, compared case-insensitively.
    async fn resolve_variant(
        &self,
        product: ProductUuid,
        colour: String,
        size: String,
    ) -> Result<VariantRecord, CatalogServiceError>;

    /// A single variant with its product pricing.
    async fn get_variant(&self, variant: VariantUuid) -> Result<PricedVariant, CatalogServiceError>;

    /// Several variants with their product pricing. Unknown ids are skipped.
    async fn get_variants(
        &self,
        variants: Vec<VariantUuid>,
    ) -> Result<Vec<PricedVariant>, CatalogServiceError>;

    /// Authoritative stock of a variant.
    async fn stock(&self, variant: VariantUuid) -> Result<i64, CatalogServiceError>;

    /// Create a product.
    async fn create_product(&self, product: NewProduct) -> Result<ProductRecord, CatalogServiceError>;

    /// Create a variant, recording its initial stock.
    async fn create_variant(&self, variant: NewVariant) -> Result<VariantRecord, CatalogServiceError>;
}
