//! Bearer token generation and hashing.

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Prefix that makes leaked tokens easy to recognise.
pub const TOKEN_PREFIX: &str = "at_";

const TOKEN_SECRET_BYTES: usize = 32;

/// Generate a new raw bearer token.
pub fn generate_token() -> String {
    let mut bytes = [0_u8; TOKEN_SECRET_BYTES];

    OsRng.fill_bytes(&mut bytes);

    let token = format!("{TOKEN_PREFIX}{}", hex::encode(bytes));

    bytes.zeroize();

    token
}

/// Hex SHA-256 of a raw token; only the hash is stored.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_prefixed_and_unique() {
        let a = generate_token();
        let b = generate_token();

        assert!(a.starts_with(TOKEN_PREFIX), "token has prefix");
        assert_eq!(a.len(), TOKEN_PREFIX.len() + TOKEN_SECRET_BYTES * 2);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_hex() {
        assert_eq!(hash_token("at_x"), hash_token("at_x"));
        assert_eq!(hash_token("at_x").len(), 64);
        assert_ne!(hash_token("at_x"), hash_token("at_y"));
    }
}
