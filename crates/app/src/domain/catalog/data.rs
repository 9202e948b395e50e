//! Catalog Data

use atelier::pricing::SaleWindow;

use crate::domain::catalog::records::{ProductUuid, VariantUuid};

/// New Product Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub category: String,
    pub base_price: u64,
    pub sale: Option<SaleWindow>,
}

/// New Variant Data
///
/// A missing SKU is generated from the product SKU, colour and size.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub uuid: VariantUuid,
    pub product: ProductUuid,
    pub sku: Option<String>,
    pub colour: String,
    pub colour_code: String,
    pub size: String,
    pub stock: u32,
    pub surcharge: u64,
    pub sale: Option<SaleWindow>,
    pub weight_grams: Option<u32>,
    pub width_cm: Option<u32>,
    pub height_cm: Option<u32>,
    pub length_cm: Option<u32>,
}

/// Listing filters. Empty sets and `None` bounds match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub colours: Vec<String>,
    pub sizes: Vec<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
}

/// `{product sku}-{first three letters of the colour}-{size}`, uppercased.
pub fn variant_sku(product_sku: &str, colour: &str, size: &str) -> String {
    let colour: String = colour
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(3)
        .collect();

    format!("{product_sku}-{colour}-{}", size.trim()).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_uses_colour_prefix_and_size() {
        assert_eq!(variant_sku("CAM-001", "Azul Marinho", "m"), "CAM-001-AZU-M");
        assert_eq!(variant_sku("cal-9", "Ro", "42"), "CAL-9-RO-42");
    }

    #[test]
    fn sku_handles_multibyte_colours() {
        assert_eq!(variant_sku("X", "Âmbar", "P"), "X-ÂMB-P");
    }
}
