//! Core value types
//!
//! - Addresses (20-byte identities with a reserved zero sentinel)
//! - Native asset amounts

pub mod address;

pub use address::{Address, AddressError, Amount, ADDRESS_LEN};
