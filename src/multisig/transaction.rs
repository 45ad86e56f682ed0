//! Ledger records
//!
//! A transaction is submitted once, collects confirmations from owners and is
//! executed at most once. Records are never removed from the ledger.

use crate::core::{Address, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

/// Ledger position of a transaction
pub type TxId = u64;

/// Display status of a transaction relative to the wallet threshold
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TxStatus {
    /// Waiting for more confirmations
    Pending,
    /// Has enough confirmations, any owner may execute it
    Ready,
    /// The action has been performed
    Executed,
}

/// A transaction awaiting (or past) execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredTransaction")]
pub struct TransactionRecord {
    /// Sequence number, equal to the ledger index
    pub(crate) id: TxId,
    /// Destination of the value and the call
    pub(crate) target: Address,
    /// Native amount to send
    pub(crate) value: Amount,
    /// Opaque call data; empty means a plain transfer
    #[serde(with = "hex_payload")]
    pub(crate) payload: Vec<u8>,
    pub(crate) executed: bool,
    /// Cached size of `confirmed_by`
    #[serde(skip_serializing)]
    pub(crate) confirmation_count: usize,
    /// Owners currently confirming, stored sorted
    #[serde(serialize_with = "sorted_owners")]
    pub(crate) confirmed_by: HashSet<Address>,
    pub(crate) submitted_by: Address,
    pub(crate) submitted_at: DateTime<Utc>,
    pub(crate) executed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct StoredTransaction {
    id: TxId,
    target: Address,
    value: Amount,
    #[serde(with = "hex_payload")]
    payload: Vec<u8>,
    executed: bool,
    confirmed_by: HashSet<Address>,
    submitted_by: Address,
    submitted_at: DateTime<Utc>,
    executed_at: Option<DateTime<Utc>>,
}

impl From<StoredTransaction> for TransactionRecord {
    fn from(stored: StoredTransaction) -> Self {
        Self {
            id: stored.id,
            target: stored.target,
            value: stored.value,
            payload: stored.payload,
            executed: stored.executed,
            confirmation_count: stored.confirmed_by.len(),
            confirmed_by: stored.confirmed_by,
            submitted_by: stored.submitted_by,
            submitted_at: stored.submitted_at,
            executed_at: stored.executed_at,
        }
    }
}

impl TransactionRecord {
    pub(crate) fn new(
        id: TxId,
        submitted_by: Address,
        target: Address,
        value: Amount,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id,
            target,
            value,
            payload,
            executed: false,
            confirmation_count: 0,
            confirmed_by: HashSet::new(),
            submitted_by,
            submitted_at: Utc::now(),
            executed_at: None,
        }
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether this is a plain transfer with no call data
    pub fn is_plain_transfer(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Number of owners currently confirming
    pub fn confirmation_count(&self) -> usize {
        self.confirmation_count
    }

    pub fn is_confirmed_by(&self, owner: &Address) -> bool {
        self.confirmed_by.contains(owner)
    }

    /// Confirming owners in address order
    pub fn confirmations(&self) -> impl Iterator<Item = &Address> {
        let mut owners: Vec<&Address> = self.confirmed_by.iter().collect();
        owners.sort();
        owners.into_iter()
    }

    pub fn submitted_by(&self) -> Address {
        self.submitted_by
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    /// Status against a threshold
    pub fn status(&self, required_confirmations: usize) -> TxStatus {
        if self.executed {
            TxStatus::Executed
        } else if self.confirmation_count >= required_confirmations {
            TxStatus::Ready
        } else {
            TxStatus::Pending
        }
    }

    /// Record a confirmation; returns false if `owner` already confirmed
    pub(crate) fn add_confirmation(&mut self, owner: Address) -> bool {
        let inserted = self.confirmed_by.insert(owner);
        if inserted {
            self.confirmation_count += 1;
        }
        inserted
    }

    /// Drop a confirmation; returns false if `owner` had not confirmed
    pub(crate) fn remove_confirmation(&mut self, owner: &Address) -> bool {
        let removed = self.confirmed_by.remove(owner);
        if removed {
            self.confirmation_count -= 1;
        }
        removed
    }

    pub(crate) fn mark_executed(&mut self) {
        self.executed = true;
        self.executed_at = Some(Utc::now());
    }

    pub(crate) fn unmark_executed(&mut self) {
        self.executed = false;
        self.executed_at = None;
    }
}

fn sorted_owners<S: Serializer>(owners: &HashSet<Address>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut sorted: Vec<&Address> = owners.iter().collect();
    sorted.sort();
    serializer.collect_seq(sorted)
}

/// Serde adapter storing call data as a `0x`-prefixed hex string
pub(crate) mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
