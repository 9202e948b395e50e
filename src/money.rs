//! Money
//!
//! Amounts are carried as minor units (`u64`) throughout the pipeline. This module resolves the
//! store currency and renders amounts for people.

use rusty_money::{
    Money,
    iso::{self, Currency},
};
use thiserror::Error;

use crate::errors::{Categorised, ErrorKind};

/// Errors raised while resolving currencies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The ISO code is not a known currency.
    #[error("unknown currency code {0:?}")]
    UnknownCurrency(String),
}

impl Categorised for MoneyError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Resolve an ISO 4217 currency code, case-insensitively.
///
/// # Errors
///
/// Returns [`MoneyError::UnknownCurrency`] for unrecognised codes.
pub fn currency(code: &str) -> Result<&'static Currency, MoneyError> {
    iso::find(&code.to_ascii_uppercase()).ok_or_else(|| MoneyError::UnknownCurrency(code.to_string()))
}

/// Lower-case ISO code, as payment gateways expect it.
pub fn gateway_code(currency: &Currency) -> String {
    currency.iso_alpha_code.to_ascii_lowercase()
}

/// Render a minor-unit amount, e.g. `R$1.990,00`.
pub fn format_minor(amount: u64, currency: &'static Currency) -> String {
    match i64::try_from(amount) {
        Ok(minor) => Money::from_minor(minor, currency).to_string(),
        Err(_overflow) => format!("{amount} {}", currency.iso_alpha_code),
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn resolves_lower_case_codes() -> TestResult {
        let brl = currency("brl")?;

        assert_eq!(brl.iso_alpha_code, "BRL");
        assert_eq!(gateway_code(brl), "brl");

        Ok(())
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(
            currency("ZZZ"),
            Err(MoneyError::UnknownCurrency("ZZZ".to_string()))
        );
    }

    #[test]
    fn formats_with_currency_symbol() -> TestResult {
        let formatted = format_minor(199_000, currency("BRL")?);

        assert!(formatted.contains("R$"), "got {formatted}");

        Ok(())
    }
}
