//! Carts
//!
//! Cart contents keyed by variant, plus the canonical form that cart fingerprints and content
//! hashes are computed over.

pub mod fingerprint;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smallvec::SmallVec;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::{Categorised, ErrorKind};

/// Largest quantity a single cart line may hold.
pub const MAX_QUANTITY: u32 = 99;

/// Largest number of distinct lines a cart may hold.
pub const MAX_LINES: usize = 50;

/// Errors raised while mutating cart contents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A quantity fell outside `1..=MAX_QUANTITY`.
    #[error("quantity {0} is outside 1..={MAX_QUANTITY}")]
    QuantityOutOfRange(u32),

    /// The cart already holds `MAX_LINES` lines.
    #[error("cart already holds {MAX_LINES} lines")]
    TooManyLines,

    /// No line exists for the given variant.
    #[error("cart has no line for variant {0}")]
    UnknownLine(Uuid),
}

impl Categorised for CartError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::QuantityOutOfRange(_) | Self::TooManyLines => ErrorKind::Validation,
            Self::UnknownLine(_) => ErrorKind::NotFound,
        }
    }
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Variant this line refers to; also the line key.
    pub variant: Uuid,

    /// Units of the variant, always within `1..=MAX_QUANTITY`.
    pub quantity: u32,

    /// Size label copied from the variant.
    pub size: String,

    /// Colour label copied from the variant.
    pub colour: String,

    /// Unit price snapshot in minor units.
    pub unit_price: u64,
}

impl CartLine {
    /// Line total in minor units.
    pub fn total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }

    /// SHA-256 digest of this line's canonical form, hex encoded.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.canonical().as_bytes()))
    }

    fn canonical(&self) -> String {
        format!("{}:{}:{}", self.variant, self.quantity, self.unit_price)
    }
}

/// Outcome of merging one cart into another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Lines whose quantities were summed or copied.
    pub merged: usize,

    /// Lines whose summed quantity was capped at `MAX_QUANTITY`.
    pub capped: usize,

    /// Lines dropped because the target reached `MAX_LINES`.
    pub dropped: usize,
}

/// Ordered cart contents keyed by variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartContents {
    lines: Vec<CartLine>,
}

/// Check a requested quantity against the cart bounds.
///
/// # Errors
///
/// Returns [`CartError::QuantityOutOfRange`] when `quantity` is zero or above `MAX_QUANTITY`.
pub fn validate_quantity(quantity: u32) -> Result<u32, CartError> {
    if (1..=MAX_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(CartError::QuantityOutOfRange(quantity))
    }
}

impl CartContents {
    /// Create an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build contents from existing lines, enforcing the cart bounds.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] when a line breaks a bound. Repeated variants are summed.
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Result<Self, CartError> {
        let mut contents = Self::new();

        for line in lines {
            contents.add(line)?;
        }

        Ok(contents)
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the line for a variant.
    pub fn line(&self, variant: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.variant == variant)
    }

    /// Add a line, summing into an existing line for the same variant.
    ///
    /// Returns the resulting quantity for the variant.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] when the quantity or line bounds would be broken. The cart is left
    /// untouched on error.
    pub fn add(&mut self, line: CartLine) -> Result<u32, CartError> {
        validate_quantity(line.quantity)?;

        if let Some(existing) = self.line_mut(line.variant) {
            let quantity = existing
                .quantity
                .checked_add(line.quantity)
                .filter(|sum| *sum <= MAX_QUANTITY)
                .ok_or(CartError::QuantityOutOfRange(
                    existing.quantity.saturating_add(line.quantity),
                ))?;

            existing.quantity = quantity;
            existing.unit_price = line.unit_price;

            return Ok(quantity);
        }

        if self.lines.len() >= MAX_LINES {
            return Err(CartError::TooManyLines);
        }

        let quantity = line.quantity;

        self.lines.push(line);

        Ok(quantity)
    }

    /// Increase a line's quantity by one.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] for unknown lines or when `MAX_QUANTITY` would be exceeded.
    pub fn increment(&mut self, variant: Uuid) -> Result<u32, CartError> {
        let line = self
            .line_mut(variant)
            .ok_or(CartError::UnknownLine(variant))?;

        let quantity = validate_quantity(line.quantity.saturating_add(1))?;

        line.quantity = quantity;

        Ok(quantity)
    }

    /// Decrease a line's quantity by one, removing the line when it reaches zero.
    ///
    /// Returns the remaining quantity, or `None` when the line was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownLine`] when no line exists for `variant`.
    pub fn decrement(&mut self, variant: Uuid) -> Result<Option<u32>, CartError> {
        let line = self
            .line_mut(variant)
            .ok_or(CartError::UnknownLine(variant))?;

        if line.quantity <= 1 {
            self.remove(variant)?;

            return Ok(None);
        }

        line.quantity -= 1;

        Ok(Some(line.quantity))
    }

    /// Remove a line entirely.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownLine`] when no line exists for `variant`.
    pub fn remove(&mut self, variant: Uuid) -> Result<CartLine, CartError> {
        let position = self
            .lines
            .iter()
            .position(|line| line.variant == variant)
            .ok_or(CartError::UnknownLine(variant))?;

        Ok(self.lines.remove(position))
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Replace a line's unit price snapshot. Returns `true` when the price changed.
    pub fn refresh_price(&mut self, variant: Uuid, unit_price: u64) -> bool {
        match self.line_mut(variant) {
            Some(line) if line.unit_price != unit_price => {
                line.unit_price = unit_price;
                true
            }
            _ => false,
        }
    }

    /// Merge another cart into this one.
    ///
    /// Quantities are summed per variant and capped at `MAX_QUANTITY`. Lines that would push the
    /// cart past `MAX_LINES` are dropped.
    pub fn merge(&mut self, other: &CartContents) -> MergeReport {
        let mut report = MergeReport::default();

        for incoming in &other.lines {
            if let Some(existing) = self.line_mut(incoming.variant) {
                let sum = existing.quantity.saturating_add(incoming.quantity);

                if sum > MAX_QUANTITY {
                    report.capped += 1;
                }

                existing.quantity = sum.min(MAX_QUANTITY);
                report.merged += 1;

                continue;
            }

            if self.lines.len() >= MAX_LINES {
                report.dropped += 1;

                continue;
            }

            let mut line = incoming.clone();

            if line.quantity > MAX_QUANTITY {
                line.quantity = MAX_QUANTITY;
                report.capped += 1;
            }

            self.lines.push(line);
            report.merged += 1;
        }

        report
    }

    /// Sum of every line total in minor units.
    pub fn items_total(&self) -> u64 {
        self.lines
            .iter()
            .fold(0_u64, |total, line| total.saturating_add(line.total()))
    }

    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |total, line| total.saturating_add(line.quantity))
    }

    /// Canonical serialisation: lines sorted by variant id, one `variant:qty:price` per line.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut lines: Vec<&CartLine> = self.lines.iter().collect();

        lines.sort_by_key(|line| line.variant);

        lines
            .iter()
            .map(|line| line.canonical())
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    /// SHA-256 of the canonical serialisation, hex encoded.
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.canonical_bytes()))
    }

    /// Per-line digests sorted by variant id.
    pub fn line_hashes(&self) -> SmallVec<[String; 8]> {
        let mut lines: Vec<&CartLine> = self.lines.iter().collect();

        lines.sort_by_key(|line| line.variant);

        lines.iter().map(|line| line.digest()).collect()
    }

    fn line_mut(&mut self, variant: Uuid) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.variant == variant)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn line(variant: Uuid, quantity: u32, unit_price: u64) -> CartLine {
        CartLine {
            variant,
            quantity,
            size: "M".to_string(),
            colour: "black".to_string(),
            unit_price,
        }
    }

    #[test]
    fn add_rejects_zero_and_over_max() {
        let mut cart = CartContents::new();

        assert_eq!(
            cart.add(line(Uuid::now_v7(), 0, 100)),
            Err(CartError::QuantityOutOfRange(0))
        );
        assert_eq!(
            cart.add(line(Uuid::now_v7(), 100, 100)),
            Err(CartError::QuantityOutOfRange(100))
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn add_sums_existing_line_and_keeps_bound() -> TestResult {
        let variant = Uuid::now_v7();
        let mut cart = CartContents::new();

        cart.add(line(variant, 60, 100))?;

        assert_eq!(cart.add(line(variant, 39, 100))?, 99);
        assert_eq!(
            cart.add(line(variant, 1, 100)),
            Err(CartError::QuantityOutOfRange(100))
        );
        assert_eq!(cart.line(variant).map(|l| l.quantity), Some(99));

        Ok(())
    }

    #[test]
    fn add_rejects_fifty_first_line() -> TestResult {
        let mut cart = CartContents::new();

        for _ in 0..MAX_LINES {
            cart.add(line(Uuid::now_v7(), 1, 100))?;
        }

        assert_eq!(
            cart.add(line(Uuid::now_v7(), 1, 100)),
            Err(CartError::TooManyLines)
        );

        Ok(())
    }

    #[test]
    fn decrement_to_zero_removes_line() -> TestResult {
        let variant = Uuid::now_v7();
        let mut cart = CartContents::new();

        cart.add(line(variant, 2, 100))?;

        assert_eq!(cart.decrement(variant)?, Some(1));
        assert_eq!(cart.decrement(variant)?, None);
        assert!(cart.is_empty());

        Ok(())
    }

    #[test]
    fn increment_past_max_is_rejected() -> TestResult {
        let variant = Uuid::now_v7();
        let mut cart = CartContents::new();

        cart.add(line(variant, 99, 100))?;

        assert_eq!(
            cart.increment(variant),
            Err(CartError::QuantityOutOfRange(100))
        );

        Ok(())
    }

    #[test]
    fn unknown_line_operations_fail() {
        let mut cart = CartContents::new();
        let variant = Uuid::now_v7();

        assert_eq!(cart.increment(variant), Err(CartError::UnknownLine(variant)));
        assert_eq!(cart.decrement(variant), Err(CartError::UnknownLine(variant)));
        assert!(matches!(
            cart.remove(variant),
            Err(CartError::UnknownLine(_))
        ));
        assert_eq!(CartError::UnknownLine(variant).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn merge_sums_and_caps() -> TestResult {
        let shared = Uuid::now_v7();
        let only_session = Uuid::now_v7();

        let mut user = CartContents::new();
        user.add(line(shared, 70, 100))?;

        let mut session = CartContents::new();
        session.add(line(shared, 50, 100))?;
        session.add(line(only_session, 3, 250))?;

        let report = user.merge(&session);

        assert_eq!(report.merged, 2);
        assert_eq!(report.capped, 1);
        assert_eq!(report.dropped, 0);
        assert_eq!(user.line(shared).map(|l| l.quantity), Some(MAX_QUANTITY));
        assert_eq!(user.line(only_session).map(|l| l.quantity), Some(3));

        Ok(())
    }

    #[test]
    fn content_hash_ignores_insertion_order() -> TestResult {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();

        let mut first = CartContents::new();
        first.add(line(a, 1, 100))?;
        first.add(line(b, 2, 200))?;

        let mut second = CartContents::new();
        second.add(line(b, 2, 200))?;
        second.add(line(a, 1, 100))?;

        assert_eq!(first.content_hash(), second.content_hash());
        assert_eq!(first.line_hashes(), second.line_hashes());

        Ok(())
    }

    #[test]
    fn content_hash_changes_with_price() -> TestResult {
        let variant = Uuid::now_v7();
        let mut cart = CartContents::new();

        cart.add(line(variant, 1, 100))?;

        let before = cart.content_hash();

        assert!(cart.refresh_price(variant, 150), "price should change");
        assert_ne!(before, cart.content_hash());
        assert!(!cart.refresh_price(variant, 150), "price already current");

        Ok(())
    }

    #[test]
    fn totals_sum_lines() -> TestResult {
        let mut cart = CartContents::new();

        cart.add(line(Uuid::now_v7(), 2, 1_990))?;
        cart.add(line(Uuid::now_v7(), 1, 5_000))?;

        assert_eq!(cart.items_total(), 8_980);
        assert_eq!(cart.total_quantity(), 3);

        Ok(())
    }
}
