//! Shipping
//!
//! Postal codes, parcel dimensions, the carrier's quote format and the cache key that identifies a
//! quote request. Talking to the carrier happens in the application crate.

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::errors::{Categorised, ErrorKind};

/// Heaviest accepted parcel, in grams.
pub const MAX_WEIGHT_GRAMS: u32 = 100_000;

/// Longest accepted side, in centimetres.
pub const MAX_DIMENSION_CM: u32 = 200;

/// Errors raised while building a quote request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShippingError {
    /// A postal code is not eight digits.
    #[error("malformed postal code {0:?}")]
    MalformedPostalCode(String),

    /// A parcel is heavier than `MAX_WEIGHT_GRAMS` or weighs nothing.
    #[error("parcel weight {0}g is outside 1..={MAX_WEIGHT_GRAMS}")]
    WeightOutOfRange(u32),

    /// A parcel side is longer than `MAX_DIMENSION_CM` or zero.
    #[error("parcel dimension {0}cm is outside 1..={MAX_DIMENSION_CM}")]
    DimensionOutOfRange(u32),

    /// A carrier price could not be read.
    #[error("unreadable carrier price {0:?}")]
    UnreadablePrice(String),
}

impl Categorised for ShippingError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnreadablePrice(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

/// A Brazilian postal code (CEP), stored as eight digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// The eight digits without punctuation.
    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl FromStr for PostalCode {
    type Err = ShippingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '.' && *c != ' ')
            .collect();

        if digits.len() == 8 && digits.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(digits))
        } else {
            Err(ShippingError::MalformedPostalCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for PostalCode {
    type Error = ShippingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_at_checked(5) {
            Some((head, tail)) => write!(f, "{head}-{tail}"),
            None => f.write_str(&self.0),
        }
    }
}

/// Shipping attributes of one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// Weight of one unit in grams.
    pub weight_grams: u32,

    /// Width in centimetres.
    pub width_cm: u32,

    /// Height in centimetres.
    pub height_cm: u32,

    /// Length in centimetres.
    pub length_cm: u32,

    /// Declared value of one unit in minor units.
    pub insurance_value: u64,

    /// Units.
    pub quantity: u32,
}

impl Package {
    /// Weight used when a variant has none.
    pub const DEFAULT_WEIGHT_GRAMS: u32 = 1_000;

    /// Width used when a variant has none.
    pub const DEFAULT_WIDTH_CM: u32 = 15;

    /// Height used when a variant has none.
    pub const DEFAULT_HEIGHT_CM: u32 = 10;

    /// Length used when a variant has none.
    pub const DEFAULT_LENGTH_CM: u32 = 20;

    /// The store default package for one unit with no declared value.
    pub const DEFAULT: Self = Self {
        weight_grams: Self::DEFAULT_WEIGHT_GRAMS,
        width_cm: Self::DEFAULT_WIDTH_CM,
        height_cm: Self::DEFAULT_HEIGHT_CM,
        length_cm: Self::DEFAULT_LENGTH_CM,
        insurance_value: 0,
        quantity: 1,
    };

    /// Build a package, filling missing attributes with the defaults.
    pub fn with_defaults(
        weight_grams: Option<u32>,
        width_cm: Option<u32>,
        height_cm: Option<u32>,
        length_cm: Option<u32>,
        insurance_value: u64,
        quantity: u32,
    ) -> Self {
        Self {
            weight_grams: weight_grams.unwrap_or(Self::DEFAULT_WEIGHT_GRAMS),
            width_cm: width_cm.unwrap_or(Self::DEFAULT_WIDTH_CM),
            height_cm: height_cm.unwrap_or(Self::DEFAULT_HEIGHT_CM),
            length_cm: length_cm.unwrap_or(Self::DEFAULT_LENGTH_CM),
            insurance_value,
            quantity,
        }
    }

    /// Check the package against the carrier limits.
    ///
    /// # Errors
    ///
    /// Returns a [`ShippingError`] for the first attribute out of range.
    pub fn validate(&self) -> Result<(), ShippingError> {
        validate_dimensions(
            self.weight_grams,
            self.width_cm,
            self.height_cm,
            self.length_cm,
        )
    }

    /// Weight in kilograms as the carrier expects it.
    pub fn weight_kg(&self) -> Decimal {
        Decimal::new(i64::from(self.weight_grams), 3)
    }

    /// Declared value in major units as the carrier expects it.
    pub fn insurance_major(&self) -> Decimal {
        Decimal::from(self.insurance_value) / Decimal::ONE_HUNDRED
    }

    fn canonical(&self) -> String {
        format!(
            "{}:{}x{}x{}:{}:{}",
            self.weight_grams,
            self.width_cm,
            self.height_cm,
            self.length_cm,
            self.insurance_value,
            self.quantity
        )
    }
}

/// Check weight and dimensions against the carrier limits.
///
/// # Errors
///
/// Returns a [`ShippingError`] for the first value out of range.
pub fn validate_dimensions(
    weight_grams: u32,
    width_cm: u32,
    height_cm: u32,
    length_cm: u32,
) -> Result<(), ShippingError> {
    if !(1..=MAX_WEIGHT_GRAMS).contains(&weight_grams) {
        return Err(ShippingError::WeightOutOfRange(weight_grams));
    }

    for dimension in [width_cm, height_cm, length_cm] {
        if !(1..=MAX_DIMENSION_CM).contains(&dimension) {
            return Err(ShippingError::DimensionOutOfRange(dimension));
        }
    }

    Ok(())
}

/// Identifies one quote request for caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    /// Origin postal code.
    pub origin: PostalCode,

    /// Destination postal code.
    pub destination: PostalCode,

    /// [`package_signature`] of the request.
    pub signature: String,
}

/// SHA-256 over the sorted canonical packages. Package order does not matter.
pub fn package_signature(packages: &[Package]) -> String {
    let mut canonical: Vec<String> = packages.iter().map(Package::canonical).collect();

    canonical.sort();

    hex::encode(Sha256::digest(canonical.join("\n").as_bytes()))
}

impl QuoteKey {
    /// Build a key from the request inputs.
    pub fn new(origin: PostalCode, destination: PostalCode, packages: &[Package]) -> Self {
        Self {
            origin,
            destination,
            signature: package_signature(packages),
        }
    }

    /// Cache key string.
    pub fn cache_key(&self) -> String {
        format!(
            "shipping:quote:{}:{}:{}",
            self.origin.digits(),
            self.destination.digits(),
            self.signature
        )
    }
}

/// One option returned to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    /// Carrier service id.
    pub id: String,

    /// Carrier and service name.
    pub label: String,

    /// Price in minor units.
    pub price: u64,

    /// Estimated business days.
    pub delivery_days: Option<u32>,
}

/// Why no options could be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteWarning {
    /// The carrier could not be reached after retries.
    CarrierUnavailable,

    /// The carrier refused the request.
    CarrierRejected,

    /// The carrier answered but offered nothing for this route.
    NoOptions,
}

/// Options for one quote request, or the reason there are none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteOutcome {
    /// Priced options, cheapest first.
    pub options: Vec<ShippingOption>,

    /// Set when `options` is empty.
    pub warning: Option<QuoteWarning>,
}

impl QuoteOutcome {
    /// An empty outcome with a warning.
    pub fn unavailable(warning: QuoteWarning) -> Self {
        Self {
            options: Vec::new(),
            warning: Some(warning),
        }
    }

    /// Build an outcome from options, sorting them cheapest first.
    pub fn from_options(mut options: Vec<ShippingOption>) -> Self {
        if options.is_empty() {
            return Self::unavailable(QuoteWarning::NoOptions);
        }

        options.sort_by_key(|option| option.price);

        Self {
            options,
            warning: None,
        }
    }

    /// Find an option by id.
    pub fn find(&self, id: &str) -> Option<&ShippingOption> {
        self.options.iter().find(|option| option.id == id)
    }
}

/// Company block of a carrier quote.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CarrierCompany {
    /// Company name.
    #[serde(default)]
    pub name: String,
}

/// One element of the carrier's quote response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CarrierQuote {
    /// Service id.
    pub id: serde_json::Value,

    /// Service name.
    #[serde(default)]
    pub name: String,

    /// Decimal price in major units; absent when the service is unavailable.
    #[serde(default)]
    pub price: Option<serde_json::Value>,

    /// Discounted price offered to the account.
    #[serde(default)]
    pub custom_price: Option<serde_json::Value>,

    /// Estimated business days.
    #[serde(default)]
    pub delivery_time: Option<u32>,

    /// Carrier company.
    #[serde(default)]
    pub company: CarrierCompany,

    /// Set when the service cannot serve this route.
    #[serde(default)]
    pub error: Option<String>,
}

impl CarrierQuote {
    /// Convert into a buyer option, skipping services that reported an error or no price.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::UnreadablePrice`] when a price is present but unreadable.
    pub fn into_option(self) -> Result<Option<ShippingOption>, ShippingError> {
        if self.error.is_some() {
            return Ok(None);
        }

        let Some(price) = self.custom_price.or(self.price) else {
            return Ok(None);
        };

        let price = match price {
            serde_json::Value::String(text) => parse_price(&text)?,
            serde_json::Value::Number(number) => parse_price(&number.to_string())?,
            other => return Err(ShippingError::UnreadablePrice(other.to_string())),
        };

        let id = match self.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };

        let label = if self.company.name.is_empty() {
            self.name
        } else {
            format!("{} {}", self.company.name, self.name)
        };

        Ok(Some(ShippingOption {
            id,
            label,
            price,
            delivery_days: self.delivery_time,
        }))
    }
}

/// Parse a decimal major-unit price such as `"23.50"` into minor units.
///
/// # Errors
///
/// Returns [`ShippingError::UnreadablePrice`] for negative or unparseable values.
pub fn parse_price(text: &str) -> Result<u64, ShippingError> {
    let unreadable = || ShippingError::UnreadablePrice(text.to_string());
    let value: Decimal = text.trim().parse().map_err(|_parse| unreadable())?;

    if value.is_sign_negative() {
        return Err(unreadable());
    }

    (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(unreadable)
}
