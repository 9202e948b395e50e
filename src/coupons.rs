//! Coupons
//!
//! Coupon validation and discount calculation. Usage counters and per-user history live in the
//! database; callers gather them into a [`CouponUsage`] before asking a [`Coupon`] anything.

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    carts::CartLine,
    errors::{Categorised, ErrorKind},
};

/// Shortest accepted coupon code.
pub const MIN_CODE_LEN: usize = 3;

/// Longest accepted coupon code.
pub const MAX_CODE_LEN: usize = 32;

/// Basis points in one hundred percent.
pub const FULL_BASIS_POINTS: u32 = 10_000;

/// Why a coupon cannot be applied. Checked in declaration order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    /// The code does not exist.
    #[error("coupon not found")]
    Unknown,

    /// The coupon has been switched off.
    #[error("coupon is inactive")]
    Inactive,

    /// The validity window has not started.
    #[error("coupon is not valid yet")]
    NotYetValid,

    /// The validity window has ended.
    #[error("coupon has expired")]
    Expired,

    /// Every use has been consumed.
    #[error("coupon has no uses left")]
    Exhausted,

    /// The user already used this single-use coupon.
    #[error("coupon was already used")]
    AlreadyUsed,

    /// The coupon belongs to someone else.
    #[error("coupon is not available to this user")]
    WrongUser,

    /// The items total is below the coupon minimum.
    #[error("order total is below the coupon minimum of {minimum}")]
    BelowMinimum {
        /// Minimum items total in minor units.
        minimum: u64,
    },

    /// The coupon only applies to a user's first paid order.
    #[error("coupon is only valid on a first purchase")]
    NotFirstPurchase,
}

impl Categorised for CouponRejection {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Unknown => ErrorKind::NotFound,
            _ => ErrorKind::Validation,
        }
    }
}

/// Errors raised while computing a discount.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage arithmetic overflowed or could not be represented.
    #[error("unable to convert percentage discount")]
    PercentConversion,

    /// The coupon definition is not usable.
    #[error("invalid coupon definition: {0}")]
    InvalidDefinition(&'static str),
}

impl Categorised for DiscountError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::PercentConversion => ErrorKind::Internal,
            Self::InvalidDefinition(_) => ErrorKind::Validation,
        }
    }
}

/// What a coupon gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouponKind {
    /// A share of the items total, in basis points.
    Percentage {
        /// `1..=10_000`.
        basis_points: u32,
    },

    /// A fixed amount off the items total.
    Fixed {
        /// Minor units.
        amount: u64,
    },

    /// The shipping price is waived.
    FreeShipping,

    /// For every `buy + get` units of a line, `get` units are free.
    BuyGet {
        /// Units paid for.
        buy: u32,
        /// Units given away.
        get: u32,
    },
}

impl CouponKind {
    /// Stable identifier stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage { .. } => "percentage",
            Self::Fixed { .. } => "fixed",
            Self::FreeShipping => "free_shipping",
            Self::BuyGet { .. } => "buy_get",
        }
    }

    /// Check the definition is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::InvalidDefinition`] for zero or out-of-range values.
    pub fn validate(&self) -> Result<(), DiscountError> {
        match *self {
            Self::Percentage { basis_points } if basis_points == 0 || basis_points > FULL_BASIS_POINTS => {
                Err(DiscountError::InvalidDefinition("percentage must be within 0.01..=100"))
            }
            Self::Fixed { amount: 0 } => {
                Err(DiscountError::InvalidDefinition("fixed amount must be positive"))
            }
            Self::BuyGet { buy, get } if buy == 0 || get == 0 => {
                Err(DiscountError::InvalidDefinition("buy and get must both be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// A coupon definition plus its running use count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Upper-case code.
    pub code: String,

    /// What the coupon gives.
    pub kind: CouponKind,

    /// Switched on.
    pub active: bool,

    /// First valid instant, inclusive.
    pub starts_at: Option<Timestamp>,

    /// Last valid instant, inclusive.
    pub ends_at: Option<Timestamp>,

    /// Total uses allowed across all users.
    pub max_uses: Option<u32>,

    /// Uses consumed so far.
    pub uses: u32,

    /// Each user may use the coupon once.
    pub single_use_per_user: bool,

    /// Only valid when the user has no paid order yet.
    pub first_purchase_only: bool,

    /// Restrict the coupon to one user.
    pub user: Option<Uuid>,

    /// Minimum items total in minor units.
    pub min_order_value: Option<u64>,

    /// Cap on the discount in minor units.
    pub max_discount: Option<u64>,
}

/// Facts about the current checkout needed to validate a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponUsage {
    /// Authenticated buyer, if any.
    pub user: Option<Uuid>,

    /// Items total before discount.
    pub items_total: u64,

    /// The buyer already has a use of this coupon.
    pub used_by_user: bool,

    /// The buyer already has a paid order.
    pub has_paid_order: bool,

    /// Evaluation instant.
    pub now: Timestamp,
}

/// Normalise a user-entered code.
///
/// # Errors
///
/// Returns [`CouponRejection::Unknown`] for codes that cannot exist.
pub fn normalise_code(code: &str) -> Result<String, CouponRejection> {
    let code = code.trim().to_ascii_uppercase();

    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len())
        || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CouponRejection::Unknown);
    }

    Ok(code)
}

impl Coupon {
    /// Check whether the coupon may be applied.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn validate(&self, usage: &CouponUsage) -> Result<(), CouponRejection> {
        if !self.active {
            return Err(CouponRejection::Inactive);
        }

        if self.starts_at.is_some_and(|starts_at| usage.now < starts_at) {
            return Err(CouponRejection::NotYetValid);
        }

        if self.ends_at.is_some_and(|ends_at| usage.now > ends_at) {
            return Err(CouponRejection::Expired);
        }

        if self.max_uses.is_some_and(|max_uses| self.uses >= max_uses) {
            return Err(CouponRejection::Exhausted);
        }

        if self.single_use_per_user && usage.user.is_some() && usage.used_by_user {
            return Err(CouponRejection::AlreadyUsed);
        }

        if let Some(owner) = self.user
            && usage.user != Some(owner)
        {
            return Err(CouponRejection::WrongUser);
        }

        if let Some(minimum) = self.min_order_value
            && usage.items_total < minimum
        {
            return Err(CouponRejection::BelowMinimum { minimum });
        }

        if self.first_purchase_only && usage.user.is_some() && usage.has_paid_order {
            return Err(CouponRejection::NotFirstPurchase);
        }

        Ok(())
    }

    /// Discount in minor units for the given lines and shipping price.
    ///
    /// The result is capped by `max_discount` and never exceeds what it discounts.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountError`] when percentage arithmetic fails.
    pub fn discount(&self, lines: &[CartLine], shipping: u64) -> Result<u64, DiscountError> {
        let items_total = lines
            .iter()
            .fold(0_u64, |total, line| total.saturating_add(line.total()));

        let raw = match self.kind {
            CouponKind::Percentage { basis_points } => {
                let percent = basis_points_to_percentage(basis_points);
                let minor = i64::try_from(items_total).map_err(|_overflow| DiscountError::PercentConversion)?;

                u64::try_from(percent_of_minor(&percent, minor)?)
                    .map_err(|_negative| DiscountError::PercentConversion)?
                    .min(items_total)
            }
            CouponKind::Fixed { amount } => amount.min(items_total),
            CouponKind::FreeShipping => shipping,
            CouponKind::BuyGet { buy, get } => buy_get_discount(lines, buy, get).min(items_total),
        };

        Ok(self.max_discount.map_or(raw, |cap| raw.min(cap)))
    }
}

/// Convert basis points into a [`Percentage`] ratio.
pub fn basis_points_to_percentage(basis_points: u32) -> Percentage {
    Percentage::from(Decimal::new(i64::from(basis_points), 4))
}

/// Calculate a percentage of a minor-unit amount, rounding half away from zero.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] when the calculation overflows.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

fn buy_get_discount(lines: &[CartLine], buy: u32, get: u32) -> u64 {
    let bundle = buy.saturating_add(get);

    if bundle == 0 {
        return 0;
    }

    lines.iter().fold(0_u64, |total, line| {
        let free_units = (line.quantity / bundle).saturating_mul(get);

        total.saturating_add(line.unit_price.saturating_mul(u64::from(free_units)))
    })
}
