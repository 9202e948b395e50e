//! Pricing
//!
//! Unit prices come from a product's base price, an optional product sale window, a per-variant
//! surcharge and an optional variant sale window. Order totals are derived from line snapshots.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{Categorised, ErrorKind};

/// Smallest accepted price, one centavo.
pub const MIN_PRICE: u64 = 1;

/// Largest accepted price in minor units.
pub const MAX_PRICE: u64 = 10_000_000;

/// Errors raised while validating catalog prices.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// A price fell outside `MIN_PRICE..=MAX_PRICE`.
    #[error("price {0} is outside {MIN_PRICE}..={MAX_PRICE}")]
    OutOfRange(u64),

    /// A sale price is not below the price it discounts.
    #[error("sale price {sale} must be below {regular}")]
    SaleNotCheaper {
        /// Sale price.
        sale: u64,
        /// Price being discounted.
        regular: u64,
    },

    /// A sale window ends before it starts.
    #[error("sale window ends before it starts")]
    InvertedWindow,
}

impl Categorised for PriceError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Check a price against the accepted range.
///
/// # Errors
///
/// Returns [`PriceError::OutOfRange`] for prices outside `MIN_PRICE..=MAX_PRICE`.
pub fn validate_price(price: u64) -> Result<u64, PriceError> {
    if (MIN_PRICE..=MAX_PRICE).contains(&price) {
        Ok(price)
    } else {
        Err(PriceError::OutOfRange(price))
    }
}

/// A time-boxed sale price. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWindow {
    /// Sale price in minor units.
    pub price: u64,

    /// First instant the sale applies.
    pub starts_at: Timestamp,

    /// Last instant the sale applies.
    pub ends_at: Timestamp,
}

impl SaleWindow {
    /// Whether the sale applies at `now`.
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.starts_at <= now && now <= self.ends_at
    }

    /// Check the window against the price it discounts.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] when the window is inverted or not cheaper.
    pub fn validate(&self, regular: u64) -> Result<(), PriceError> {
        validate_price(self.price)?;

        if self.ends_at < self.starts_at {
            return Err(PriceError::InvertedWindow);
        }

        if self.price >= regular {
            return Err(PriceError::SaleNotCheaper {
                sale: self.price,
                regular,
            });
        }

        Ok(())
    }
}

/// A product's regular price and optional sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSchedule {
    /// Regular price in minor units.
    pub base: u64,

    /// Time-boxed sale.
    pub sale: Option<SaleWindow>,
}

impl PriceSchedule {
    /// Price at `now`.
    pub fn current(&self, now: Timestamp) -> u64 {
        self.sale
            .filter(|sale| sale.is_open(now))
            .map_or(self.base, |sale| sale.price)
    }

    /// Whether the sale applies at `now`.
    pub fn on_sale(&self, now: Timestamp) -> bool {
        self.sale.is_some_and(|sale| sale.is_open(now))
    }
}

/// Everything needed to price a variant at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPricing {
    /// Product schedule.
    pub product: PriceSchedule,

    /// Per-variant surcharge added to the product price.
    pub surcharge: u64,

    /// Variant-level sale; replaces everything else while open.
    pub variant_sale: Option<SaleWindow>,
}

impl VariantPricing {
    /// Unit price at `now`.
    ///
    /// An open variant sale wins. Otherwise the product price (sale or base) plus the surcharge.
    pub fn unit_price(&self, now: Timestamp) -> u64 {
        if let Some(sale) = self.variant_sale.filter(|sale| sale.is_open(now)) {
            return sale.price;
        }

        self.product.current(now).saturating_add(self.surcharge)
    }

    /// Whether any sale applies at `now`.
    pub fn on_sale(&self, now: Timestamp) -> bool {
        self.variant_sale.is_some_and(|sale| sale.is_open(now)) || self.product.on_sale(now)
    }
}

/// Totals persisted on an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of line totals.
    pub items: u64,

    /// Selected shipping option price.
    pub shipping: u64,

    /// Coupon discount, never more than `items + shipping`.
    pub discount: u64,

    /// `items + shipping - discount`.
    pub grand: u64,
}

impl OrderTotals {
    /// Build totals, clamping the discount so the grand total never goes negative.
    pub fn new(items: u64, shipping: u64, discount: u64) -> Self {
        let gross = items.saturating_add(shipping);
        let discount = discount.min(gross);

        Self {
            items,
            shipping,
            discount,
            grand: gross - discount,
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use testresult::TestResult;

    use super::*;

    fn window(price: u64, now: Timestamp, from: i64, to: i64) -> SaleWindow {
        SaleWindow {
            price,
            starts_at: now + SignedDuration::from_hours(from),
            ends_at: now + SignedDuration::from_hours(to),
        }
    }

    #[test]
    fn base_plus_surcharge_without_sales() {
        let pricing = VariantPricing {
            product: PriceSchedule {
                base: 10_000,
                sale: None,
            },
            surcharge: 500,
            variant_sale: None,
        };

        assert_eq!(pricing.unit_price(Timestamp::now()), 10_500);
    }

    #[test]
    fn open_product_sale_replaces_base() {
        let now = Timestamp::now();
        let pricing = VariantPricing {
            product: PriceSchedule {
                base: 10_000,
                sale: Some(window(8_000, now, -1, 1)),
            },
            surcharge: 500,
            variant_sale: None,
        };

        assert_eq!(pricing.unit_price(now), 8_500);
        assert!(pricing.on_sale(now), "product sale is open");
    }

    #[test]
    fn closed_sales_are_ignored() {
        let now = Timestamp::now();
        let pricing = VariantPricing {
            product: PriceSchedule {
                base: 10_000,
                sale: Some(window(8_000, now, 1, 2)),
            },
            surcharge: 0,
            variant_sale: Some(window(7_000, now, -3, -2)),
        };

        assert_eq!(pricing.unit_price(now), 10_000);
        assert!(!pricing.on_sale(now), "no sale is open");
    }

    #[test]
    fn open_variant_sale_wins() {
        let now = Timestamp::now();
        let pricing = VariantPricing {
            product: PriceSchedule {
                base: 10_000,
                sale: Some(window(8_000, now, -1, 1)),
            },
            surcharge: 500,
            variant_sale: Some(window(6_000, now, -1, 1)),
        };

        assert_eq!(pricing.unit_price(now), 6_000);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Timestamp::now();
        let sale = SaleWindow {
            price: 1,
            starts_at: now,
            ends_at: now,
        };

        assert!(sale.is_open(now), "both bounds are inclusive");
    }

    #[test]
    fn sale_validation() -> TestResult {
        let now = Timestamp::now();

        window(8_000, now, -1, 1).validate(10_000)?;

        assert_eq!(
            window(12_000, now, -1, 1).validate(10_000),
            Err(PriceError::SaleNotCheaper {
                sale: 12_000,
                regular: 10_000
            })
        );
        assert_eq!(
            window(8_000, now, 1, -1).validate(10_000),
            Err(PriceError::InvertedWindow)
        );

        Ok(())
    }

    #[test]
    fn price_range() {
        assert_eq!(validate_price(0), Err(PriceError::OutOfRange(0)));
        assert_eq!(validate_price(1), Ok(1));
        assert_eq!(
            validate_price(MAX_PRICE + 1),
            Err(PriceError::OutOfRange(MAX_PRICE + 1))
        );
    }

    #[test]
    fn totals_clamp_discount() {
        let totals = OrderTotals::new(1_000, 500, 2_000);

        assert_eq!(totals.discount, 1_500);
        assert_eq!(totals.grand, 0);

        let totals = OrderTotals::new(10_000, 1_500, 1_000);

        assert_eq!(totals.grand, 10_500);
    }
}
