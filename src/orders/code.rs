//! Order codes
//!
//! Buyer-facing order references: eight characters from an alphabet without look-alike glyphs.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{Categorised, ErrorKind};

/// Characters an order code may contain.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of every order code.
pub const CODE_LEN: usize = 8;

/// Raised for strings that cannot be order codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed order code {0:?}")]
pub struct MalformedCode(pub String);

impl Categorised for MalformedCode {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NotFound
    }
}

/// A validated order code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderCode(String);

impl OrderCode {
    /// Draw a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LEN)
            .map(|_| {
                let index = rng.gen_range(0..ALPHABET.len());

                ALPHABET.get(index).copied().map_or('A', char::from)
            })
            .collect();

        Self(code)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderCode {
    type Err = MalformedCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();

        if code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b)) {
            Ok(Self(code))
        } else {
            Err(MalformedCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for OrderCode {
    type Error = MalformedCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderCode> for String {
    fn from(code: OrderCode) -> Self {
        code.0
    }
}
