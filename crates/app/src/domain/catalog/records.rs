//! Catalog Records

use atelier::{
    pricing::{PriceSchedule, SaleWindow, VariantPricing},
    shipping::Package,
};
use jiff::Timestamp;

use crate::uuids::TypedUuid;

/// Product UUID
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Variant UUID
pub type VariantUuid = TypedUuid<VariantRecord>;

/// Product Record
///
/// `stock` is derived from the product's variants and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub uuid: ProductUuid,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub category: String,
    pub pricing: PriceSchedule,
    pub active: bool,
    pub stock: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Variant Record
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub uuid: VariantUuid,
    pub product_uuid: ProductUuid,
    pub sku: String,
    pub colour: String,
    pub colour_code: String,
    pub size: String,
    pub stock: i64,
    pub initial_stock: i64,
    pub surcharge: u64,
    pub sale: Option<SaleWindow>,
    pub weight_grams: Option<u32>,
    pub width_cm: Option<u32>,
    pub height_cm: Option<u32>,
    pub length_cm: Option<u32>,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VariantRecord {
    /// Shipping package for `quantity` units, falling back to the store defaults.
    pub fn package(&self, insurance_value: u64, quantity: u32) -> Package {
        Package::with_defaults(
            self.weight_grams,
            self.width_cm,
            self.height_cm,
            self.length_cm,
            insurance_value,
            quantity,
        )
    }
}

/// A product with all of its variants.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetails {
    pub product: ProductRecord,
    pub variants: Vec<VariantRecord>,
}

/// A variant joined with the product fields needed to sell it.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedVariant {
    pub variant: VariantRecord,
    pub product_name: String,
    pub product_active: bool,
    pub pricing: VariantPricing,
}

impl PricedVariant {
    pub fn unit_price(&self, now: Timestamp) -> u64 {
        self.pricing.unit_price(now)
    }

    /// Both the variant and its product are active.
    pub fn is_purchasable(&self) -> bool {
        self.variant.active && self.product_active
    }
}
