//! Quorum-controlled multi-signature wallet
//!
//! A fixed set of owners and a threshold `M` govern the wallet. Any owner can
//! submit a transaction, owners confirm or revoke, and once `M` owners confirm
//! any owner may execute it exactly once.
//!
//! # Example
//!
//! ```ignore
//! use quorum_wallet::core::Address;
//! use quorum_wallet::host::Chain;
//! use quorum_wallet::multisig::MultisigWallet;
//!
//! // Create a 2-of-3 multisig wallet
//! let mut wallet = MultisigWallet::new(vec![alice, bob, carol], 2)?;
//! let mut chain = Chain::new();
//!
//! let tx_id = wallet.submit(alice, recipient, 1_000, vec![])?;
//! wallet.confirm(alice, tx_id)?;
//! wallet.confirm(bob, tx_id)?;
//!
//! // Any owner may now execute
//! wallet.execute(carol, tx_id, &mut chain)?;
//! ```

pub mod events;
mod journal;
pub mod registry;
pub mod transaction;
pub mod wallet;

pub use events::{EventLog, EventSink, LogSink, WalletEvent};
pub use registry::OwnerRegistry;
pub use transaction::{TransactionRecord, TxId, TxStatus};
pub use wallet::{MultisigError, MultisigWallet};
