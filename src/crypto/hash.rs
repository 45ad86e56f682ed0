//! Hashing utilities
//!
//! SHA-256 and the Bitcoin-style HASH160 (RIPEMD160 of SHA256) used to derive
//! wallet and contract addresses.

use crate::core::ADDRESS_LEN;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// RIPEMD160(SHA256(data)), exactly one address worth of bytes
pub fn hash160(data: &[u8]) -> [u8; ADDRESS_LEN] {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&ripemd.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hash160_is_deterministic() {
        assert_eq!(hash160(b"owners"), hash160(b"owners"));
        assert_ne!(hash160(b"owners"), hash160(b"other owners"));
    }
}
