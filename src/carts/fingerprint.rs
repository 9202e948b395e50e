//! Cart fingerprints
//!
//! A fingerprint is an HMAC-SHA256 over the cart id, the sorted per-line digests, a random nonce
//! and the issue time. The server stores the full [`CartProtection`]; clients only ever see the
//! hex signature and present it back on review and checkout.

use std::fmt;

use hmac::{Hmac, Mac};
use jiff::Timestamp;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use smallvec::SmallVec;
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    carts::CartContents,
    errors::{Categorised, ErrorKind},
};

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per nonce.
pub const NONCE_BYTES: usize = 16;

/// Errors raised while issuing or checking fingerprints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// The signing key is empty.
    #[error("cart signing key must not be empty")]
    EmptyKey,

    /// The stored or presented fingerprint does not match the cart.
    #[error("cart fingerprint does not match the stored cart")]
    Tampered,
}

impl Categorised for FingerprintError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyKey => ErrorKind::Internal,
            Self::Tampered => ErrorKind::CartTampered,
        }
    }
}

/// Server-side record of the fingerprint issued for a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProtection {
    /// Cart the fingerprint was issued for.
    pub cart: Uuid,

    /// Sorted per-line digests at issue time.
    pub line_hashes: SmallVec<[String; 8]>,

    /// Hex-encoded random nonce.
    pub nonce: String,

    /// Issue time, truncated to whole seconds.
    pub issued_at: Timestamp,

    /// Hex-encoded HMAC; the value clients see.
    pub signature: String,
}

/// Issues and verifies cart fingerprints with a server secret.
pub struct CartSigner {
    key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for CartSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartSigner")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CartSigner {
    /// Create a signer.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::EmptyKey`] for an empty key.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, FingerprintError> {
        let key = Zeroizing::new(key.into());

        if key.is_empty() {
            return Err(FingerprintError::EmptyKey);
        }

        Ok(Self { key })
    }

    /// Issue a fresh fingerprint with a random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::EmptyKey`] if the MAC cannot be keyed.
    pub fn issue(
        &self,
        cart: Uuid,
        contents: &CartContents,
        issued_at: Timestamp,
    ) -> Result<CartProtection, FingerprintError> {
        let mut nonce = [0_u8; NONCE_BYTES];

        OsRng.fill_bytes(&mut nonce);

        self.issue_with_nonce(cart, contents, &hex::encode(nonce), issued_at)
    }

    /// Issue a fingerprint with a caller-chosen nonce.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::EmptyKey`] if the MAC cannot be keyed.
    pub fn issue_with_nonce(
        &self,
        cart: Uuid,
        contents: &CartContents,
        nonce: &str,
        issued_at: Timestamp,
    ) -> Result<CartProtection, FingerprintError> {
        let issued_at = Timestamp::from_second(issued_at.as_second()).unwrap_or(issued_at);
        let line_hashes = contents.line_hashes();
        let signature = self.sign(cart, &line_hashes, nonce, issued_at)?;

        Ok(CartProtection {
            cart,
            line_hashes,
            nonce: nonce.to_string(),
            issued_at,
            signature,
        })
    }

    /// Compute the hex signature for the given inputs.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::EmptyKey`] if the MAC cannot be keyed.
    pub fn sign(
        &self,
        cart: Uuid,
        line_hashes: &[String],
        nonce: &str,
        issued_at: Timestamp,
    ) -> Result<String, FingerprintError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_invalid_length| FingerprintError::EmptyKey)?;

        mac.update(cart.as_bytes());

        for hash in line_hashes {
            mac.update(b"\n");
            mac.update(hash.as_bytes());
        }

        mac.update(b"\n");
        mac.update(nonce.as_bytes());
        mac.update(b"\n");
        mac.update(issued_at.as_second().to_string().as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check that the stored protection still matches the cart contents and, when given, that
    /// the client presented the same signature.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::Tampered`] on any mismatch.
    pub fn verify(
        &self,
        cart: Uuid,
        contents: &CartContents,
        protection: &CartProtection,
        presented: Option<&str>,
    ) -> Result<(), FingerprintError> {
        if protection.cart != cart {
            return Err(FingerprintError::Tampered);
        }

        let expected = self.sign(
            cart,
            &contents.line_hashes(),
            &protection.nonce,
            protection.issued_at,
        )?;

        let stored = expected.as_bytes().ct_eq(protection.signature.as_bytes());
        let presented = presented.map_or(Choice::from(1), |presented| {
            expected.as_bytes().ct_eq(presented.trim().as_bytes())
        });

        if bool::from(stored & presented) {
            Ok(())
        } else {
            Err(FingerprintError::Tampered)
        }
    }
}
