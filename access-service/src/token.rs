//! Secret generation and one-way hashing for magic-link and session credentials.
//!
//! Raw secrets are 32 random bytes hex-encoded (256 bits of entropy); only
//! their SHA-256 hex digest is ever persisted or compared.

use rand::Rng;
use sha2::{Digest, Sha256};

/// A freshly generated credential: the raw value to hand to the caller and
/// the hash to persist.
#[derive(Debug)]
pub struct SecretPair {
    pub raw: String,
    pub hash: String,
}

/// Generate a new opaque secret from the thread-local CSPRNG.
pub fn generate_secret() -> SecretPair {
    let mut rng = rand::thread_rng();
    let secret_bytes: [u8; 32] = rng.gen();
    let raw = hex::encode(secret_bytes);
    let hash = hash_secret(&raw);
    SecretPair { raw, hash }
}

/// SHA-256 hex digest of a raw secret. Deterministic, no side effects.
pub fn hash_secret(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_fixed_width_hex() {
        let pair = generate_secret();
        assert_eq!(pair.raw.len(), 64);
        assert_eq!(pair.hash.len(), 64);
        assert!(pair.raw.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(pair.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_deterministic_and_one_way() {
        let pair = generate_secret();
        assert_eq!(hash_secret(&pair.raw), pair.hash);
        assert_ne!(pair.raw, pair.hash);
    }

    #[test]
    fn secrets_are_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a.raw, b.raw);
    }
}
