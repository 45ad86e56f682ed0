//! Cryptographic utilities
//!
//! Only hashing lives here: the wallet trusts its host to authenticate
//! callers, so no signing or key handling is needed.

pub mod hash;

pub use hash::{hash160, sha256, sha256_hex};
