use std::{fs, path::PathBuf};

use atelier::pricing::SaleWindow;
use atelier_app::domain::catalog::{
    CatalogService, PgCatalogService,
    data::{NewProduct, NewVariant},
    records::{ProductUuid, VariantUuid},
};
use clap::Args;
use serde::Deserialize;

#[derive(Debug, Args)]
pub(crate) struct SeedCatalogArgs {
    /// YAML file listing products with nested variants
    #[arg(long)]
    file: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
struct ProductEntry {
    name: String,
    slug: String,
    sku: String,
    #[serde(default)]
    description: String,
    category: String,
    base_price: u64,
    #[serde(default)]
    sale: Option<SaleWindow>,
    #[serde(default)]
    variants: Vec<VariantEntry>,
}

#[derive(Debug, Deserialize)]
struct VariantEntry {
    #[serde(default)]
    sku: Option<String>,
    colour: String,
    colour_code: String,
    size: String,
    stock: u32,
    #[serde(default)]
    surcharge: u64,
    #[serde(default)]
    sale: Option<SaleWindow>,
    #[serde(default)]
    weight_grams: Option<u32>,
    #[serde(default)]
    width_cm: Option<u32>,
    #[serde(default)]
    height_cm: Option<u32>,
    #[serde(default)]
    length_cm: Option<u32>,
}

impl ProductEntry {
    fn split(self) -> (NewProduct, Vec<VariantEntry>) {
        let product = NewProduct {
            uuid: ProductUuid::new(),
            name: self.name,
            slug: self.slug,
            sku: self.sku,
            description: self.description,
            category: self.category,
            base_price: self.base_price,
            sale: self.sale,
        };

        (product, self.variants)
    }
}

impl VariantEntry {
    fn into_new_variant(self, product: ProductUuid) -> NewVariant {
        NewVariant {
            uuid: VariantUuid::new(),
            product,
            sku: self.sku,
            colour: self.colour,
            colour_code: self.colour_code,
            size: self.size,
            stock: self.stock,
            surcharge: self.surcharge,
            sale: self.sale,
            weight_grams: self.weight_grams,
            width_cm: self.width_cm,
            height_cm: self.height_cm,
            length_cm: self.length_cm,
        }
    }
}

pub(crate) async fn run(args: SeedCatalogArgs) -> Result<(), String> {
    let contents = fs::read_to_string(&args.file)
        .map_err(|error| format!("failed to read {}: {error}", args.file.display()))?;

    let file: CatalogFile = serde_norway::from_str(&contents)
        .map_err(|error| format!("failed to parse {}: {error}", args.file.display()))?;

    let db = super::super::connect(&args.database_url).await?;
    let catalog = PgCatalogService::new(db);

    let mut variants_created = 0usize;
    let products_created = file.products.len();

    for entry in file.products {
        let (new_product, variants) = entry.split();
        let sku = new_product.sku.clone();

        let product = catalog
            .create_product(new_product)
            .await
            .map_err(|error| format!("failed to create product {sku}: {error}"))?;

        for variant in variants {
            let created = catalog
                .create_variant(variant.into_new_variant(product.uuid))
                .await
                .map_err(|error| format!("failed to create variant of {sku}: {error}"))?;

            println!("variant: {} ({})", created.sku, created.uuid);
            variants_created += 1;
        }
    }

    println!("products_created: {products_created}");
    println!("variants_created: {variants_created}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn catalog_file_parses_nested_variants_with_defaults() -> TestResult {
        let file: CatalogFile = serde_norway::from_str(
            "products:\n  - name: Camiseta Básica\n    slug: camiseta-basica\n    sku: CAM-001\n    category: camisetas\n    base_price: 5990\n    variants:\n      - colour: Azul\n        colour_code: '#1F3A93'\n        size: M\n        stock: 10\n",
        )?;

        let [product] = file.products.as_slice() else {
            panic!("expected one product");
        };

        assert_eq!(product.base_price, 5_990);
        assert_eq!(product.variants.len(), 1);
        assert_eq!(product.variants[0].surcharge, 0);
        assert!(product.variants[0].sku.is_none());

        Ok(())
    }
}
