//! Product Index Handler

use std::sync::Arc;

use atelier_app::domain::catalog::data::ProductFilter;
use jiff::Timestamp;
use salvo::{
    oapi::{ToSchema, extract::QueryParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::handlers::get::ProductResponse, errors::into_status_error, extensions::*,
    state::State,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ProductsResponse {
    /// The list of products
    pub products: Vec<ProductResponse>,
}

/// Product Index Handler
///
/// Lists active products. `colour` and `size` may repeat; a product matches when any of its
/// active variants does. Price bounds apply to the current price.
#[endpoint(
    tags("catalog"),
    summary = "List Products",
    parameters(
        ("colour" = Option<Vec<String>>, Query, description = "Variant colour, repeatable"),
        ("size" = Option<Vec<String>>, Query, description = "Variant size, repeatable"),
    ),
    responses(
        (status_code = StatusCode::OK, description = "Products"),
        (status_code = StatusCode::BAD_REQUEST, description = "Malformed filter"),
    ),
)]
pub(crate) async fn handler(
    category: QueryParam<String, false>,
    min_price: QueryParam<u64, false>,
    max_price: QueryParam<u64, false>,
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<ProductsResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let filter = ProductFilter {
        category: category.into_inner().filter(|category| !category.trim().is_empty()),
        colours: req.query::<Vec<String>>("colour").unwrap_or_default(),
        sizes: req.query::<Vec<String>>("size").unwrap_or_default(),
        min_price: min_price.into_inner(),
        max_price: max_price.into_inner(),
    };

    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
        && min > max
    {
        return Err(StatusError::bad_request().brief("VALIDATION: min_price exceeds max_price"));
    }

    let now = Timestamp::now();

    let products = state
        .catalog
        .list_products(filter, now)
        .await
        .map_err(into_status_error)?;

    Ok(Json(ProductsResponse {
        products: products
            .into_iter()
            .map(|product| ProductResponse::at(product, now))
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use atelier_app::domain::catalog::{MockCatalogService, records::ProductUuid};
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use crate::{
        catalog::handlers::tests::make_product,
        test_helpers::{catalog_service, session_visitor},
    };

    use super::*;

    fn make_service(catalog: MockCatalogService) -> Service {
        catalog_service(
            catalog,
            session_visitor(),
            Router::with_path("products").get(handler),
        )
    }

    #[tokio::test]
    async fn forwards_filters() -> TestResult {
        let mut catalog = MockCatalogService::new();

        catalog
            .expect_list_products()
            .once()
            .withf(|filter, _| {
                *filter
                    == ProductFilter {
                        category: Some("camisetas".to_string()),
                        colours: vec!["Azul".to_string(), "Preto".to_string()],
                        sizes: vec!["M".to_string()],
                        min_price: Some(1_000),
                        max_price: Some(9_000),
                    }
            })
            .return_once(|_, _| Ok(vec![make_product(ProductUuid::new(), 5_990)]));

        let mut res = TestClient::get(
            "http://example.com/products?category=camisetas&colour=Azul&colour=Preto&size=M&min_price=1000&max_price=9000",
        )
        .send(&make_service(catalog))
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: ProductsResponse = res.take_json().await?;

        assert_eq!(body.products.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn no_filters_match_everything() -> TestResult {
        let mut catalog = MockCatalogService::new();

        catalog
            .expect_list_products()
            .once()
            .withf(|filter, _| *filter == ProductFilter::default())
            .return_once(|_, _| Ok(Vec::new()));

        let res = TestClient::get("http://example.com/products")
            .send(&make_service(catalog))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }

    #[tokio::test]
    async fn inverted_price_bounds_return_400() -> TestResult {
        let mut catalog = MockCatalogService::new();

        catalog.expect_list_products().never();

        let res = TestClient::get("http://example.com/products?min_price=9000&max_price=1000")
            .send(&make_service(catalog))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
