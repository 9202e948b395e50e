//! Get Product Handler

use std::sync::Arc;

use atelier::pricing::{PriceSchedule, VariantPricing};
use atelier_app::domain::catalog::records::{ProductDetails, ProductRecord, VariantRecord};
use jiff::Timestamp;
use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::into_status_error, extensions::*, state::State};

/// Product Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ProductResponse {
    /// The unique identifier of the product
    pub uuid: Uuid,

    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub category: String,

    /// Regular price in minor units
    pub base_price: u64,

    /// Price right now, sale applied
    pub price: u64,

    pub on_sale: bool,

    /// Units across all variants
    pub stock: i64,
}

impl ProductResponse {
    pub(crate) fn at(product: ProductRecord, now: Timestamp) -> Self {
        Self {
            uuid: product.uuid.into_uuid(),
            base_price: product.pricing.base,
            price: product.pricing.current(now),
            on_sale: product.pricing.on_sale(now),
            name: product.name,
            slug: product.slug,
            sku: product.sku,
            description: product.description,
            category: product.category,
            stock: product.stock,
        }
    }
}

/// Variant Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct VariantResponse {
    /// The unique identifier of the variant; add this to the cart
    pub uuid: Uuid,

    pub sku: String,
    pub colour: String,

    /// Hex swatch, e.g. `#1F3A93`
    pub colour_code: String,

    pub size: String,

    /// Unit price right now
    pub price: u64,

    pub on_sale: bool,
    pub stock: i64,
    pub active: bool,
}

impl VariantResponse {
    pub(crate) fn at(variant: VariantRecord, product: PriceSchedule, now: Timestamp) -> Self {
        let pricing = VariantPricing {
            product,
            surcharge: variant.surcharge,
            variant_sale: variant.sale,
        };

        Self {
            uuid: variant.uuid.into_uuid(),
            price: pricing.unit_price(now),
            on_sale: pricing.on_sale(now),
            sku: variant.sku,
            colour: variant.colour,
            colour_code: variant.colour_code,
            size: variant.size,
            stock: variant.stock,
            active: variant.active,
        }
    }
}

/// Product Details Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ProductDetailsResponse {
    pub product: ProductResponse,
    pub variants: Vec<VariantResponse>,
}

impl ProductDetailsResponse {
    fn at(details: ProductDetails, now: Timestamp) -> Self {
        let schedule = details.product.pricing;

        Self {
            product: ProductResponse::at(details.product, now),
            variants: details
                .variants
                .into_iter()
                .map(|variant| VariantResponse::at(variant, schedule, now))
                .collect(),
        }
    }
}

/// Get Product Handler
///
/// Returns a product with all of its variants.
#[endpoint(
    tags("catalog"),
    summary = "Get Product",
    responses(
        (status_code = StatusCode::OK, description = "Product"),
        (status_code = StatusCode::NOT_FOUND, description = "Product not found"),
    ),
)]
pub(crate) async fn handler(
    product: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<ProductDetailsResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let details = state
        .catalog
        .get_product(product.into_inner().into())
        .await
        .map_err(into_status_error)?;

    Ok(Json(ProductDetailsResponse::at(details, Timestamp::now())))
}

#[cfg(test)]
mod tests {
    use atelier_app::domain::catalog::{
        CatalogServiceError, MockCatalogService,
        records::ProductUuid,
    };
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use crate::{
        catalog::handlers::tests::{make_product, make_variant},
        test_helpers::{catalog_service, session_visitor},
    };

    use super::*;

    fn make_service(catalog: MockCatalogService) -> Service {
        catalog_service(
            catalog,
            session_visitor(),
            Router::with_path("products/{product}").get(handler),
        )
    }

    #[tokio::test]
    async fn returns_product_with_priced_variants() -> TestResult {
        let mut catalog = MockCatalogService::new();
        let uuid = ProductUuid::new();

        let details = ProductDetails {
            product: make_product(uuid, 5_990),
            variants: vec![
                make_variant(uuid, "Azul", "M", 0),
                make_variant(uuid, "Azul", "GG", 500),
            ],
        };

        catalog
            .expect_get_product()
            .once()
            .withf(move |product| *product == uuid)
            .return_once(move |_| Ok(details));

        let mut res = TestClient::get(format!("http://example.com/products/{uuid}"))
            .send(&make_service(catalog))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: ProductDetailsResponse = res.take_json().await?;
        let prices: Vec<u64> = body.variants.iter().map(|variant| variant.price).collect();

        assert_eq!(body.product.price, 5_990);
        assert_eq!(prices, [5_990, 6_490]);

        Ok(())
    }

    #[tokio::test]
    async fn missing_product_returns_404() -> TestResult {
        let mut catalog = MockCatalogService::new();
        let uuid = Uuid::now_v7();

        catalog
            .expect_get_product()
            .once()
            .return_once(|_| Err(CatalogServiceError::NotFound));

        let res = TestClient::get(format!("http://example.com/products/{uuid}"))
            .send(&make_service(catalog))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

        Ok(())
    }
}
