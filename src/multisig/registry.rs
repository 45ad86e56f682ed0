//! Owner registry
//!
//! The fixed set of owners and the confirmation threshold (M in M-of-N).

use crate::core::Address;
use crate::multisig::wallet::MultisigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Owners of a wallet plus the number of confirmations a transaction needs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRegistry")]
pub struct OwnerRegistry {
    /// Owners in registration order
    owners: Vec<Address>,
    /// Membership index over `owners`
    #[serde(skip)]
    index: HashSet<Address>,
    /// Minimum distinct confirmations required to execute
    required_confirmations: usize,
}

#[derive(Deserialize)]
struct StoredRegistry {
    owners: Vec<Address>,
    required_confirmations: usize,
}

impl TryFrom<StoredRegistry> for OwnerRegistry {
    type Error = MultisigError;

    fn try_from(stored: StoredRegistry) -> Result<Self, Self::Error> {
        Self::new(stored.owners, stored.required_confirmations)
    }
}

impl OwnerRegistry {
    /// Create a registry
    ///
    /// # Errors
    /// - `InvalidOwner` if `owners` is empty
    /// - `ZeroAddress` if any owner is the zero address
    /// - `DuplicateOwner` if an owner appears twice
    /// - `InvalidRequiredConfirmations` unless `1 <= required <= owners.len()`
    pub fn new(owners: Vec<Address>, required_confirmations: usize) -> Result<Self, MultisigError> {
        if owners.is_empty() {
            return Err(MultisigError::InvalidOwner);
        }

        let mut index = HashSet::with_capacity(owners.len());
        for owner in &owners {
            if owner.is_zero() {
                return Err(MultisigError::ZeroAddress);
            }
            if !index.insert(*owner) {
                return Err(MultisigError::DuplicateOwner(*owner));
            }
        }

        if required_confirmations == 0 || required_confirmations > owners.len() {
            return Err(MultisigError::InvalidRequiredConfirmations {
                required: required_confirmations,
                owners: owners.len(),
            });
        }

        Ok(Self {
            owners,
            index,
            required_confirmations,
        })
    }

    /// Check membership in O(1)
    pub fn is_owner(&self, identity: &Address) -> bool {
        self.index.contains(identity)
    }

    /// Fail with `NotOwner` unless `identity` is registered
    pub fn ensure_owner(&self, identity: &Address) -> Result<(), MultisigError> {
        if self.is_owner(identity) {
            Ok(())
        } else {
            Err(MultisigError::NotOwner(*identity))
        }
    }

    /// Owners in registration order
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Total number of owners (N)
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Confirmations required to execute (M)
    pub fn required_confirmations(&self) -> usize {
        self.required_confirmations
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.required_confirmations, self.owners.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners() -> Vec<Address> {
        (1..=3).map(Address::from_low_u64_be).collect()
    }

    #[test]
    fn test_registry_creation() {
        let registry = OwnerRegistry::new(owners(), 2).unwrap();

        assert_eq!(registry.owners(), owners().as_slice());
        assert_eq!(registry.required_confirmations(), 2);
        assert_eq!(registry.owner_count(), 3);
        assert_eq!(registry.description(), "2-of-3");
        assert!(registry.is_owner(&Address::from_low_u64_be(2)));
        assert!(!registry.is_owner(&Address::from_low_u64_be(4)));
    }

    #[test]
    fn test_single_owner_registry() {
        let registry = OwnerRegistry::new(vec![Address::from_low_u64_be(9)], 1).unwrap();
        assert_eq!(registry.description(), "1-of-1");
    }

    #[test]
    fn test_registry_validation() {
        assert_eq!(
            OwnerRegistry::new(vec![], 1),
            Err(MultisigError::InvalidOwner)
        );

        assert_eq!(
            OwnerRegistry::new(vec![Address::from_low_u64_be(1), Address::ZERO], 1),
            Err(MultisigError::ZeroAddress)
        );

        let dup = Address::from_low_u64_be(1);
        assert_eq!(
            OwnerRegistry::new(vec![dup, dup], 1),
            Err(MultisigError::DuplicateOwner(dup))
        );

        assert!(matches!(
            OwnerRegistry::new(owners(), 0),
            Err(MultisigError::InvalidRequiredConfirmations { required: 0, owners: 3 })
        ));
        assert!(matches!(
            OwnerRegistry::new(owners(), 4),
            Err(MultisigError::InvalidRequiredConfirmations { required: 4, owners: 3 })
        ));
    }

    #[test]
    fn test_empty_list_checked_before_threshold() {
        // An empty list with a zero threshold reports the owner problem first
        assert_eq!(OwnerRegistry::new(vec![], 0), Err(MultisigError::InvalidOwner));
    }

    #[test]
    fn test_deserialization_revalidates() {
        let registry = OwnerRegistry::new(owners(), 2).unwrap();
        let json = serde_json::to_string(&registry).unwrap();
        let loaded: OwnerRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, registry);
        assert!(loaded.is_owner(&owners()[0]));

        let tampered = json.replace(
            &owners()[1].to_hex(),
            &owners()[0].to_hex(),
        );
        assert!(serde_json::from_str::<OwnerRegistry>(&tampered).is_err());
    }
}
