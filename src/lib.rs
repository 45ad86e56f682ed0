//! Quorum-Wallet: an M-of-N multi-signature wallet in Rust
//!
//! This crate provides a quorum authorization engine featuring:
//! - A fixed owner set with a confirmation threshold
//! - An append-only ledger of proposed transactions
//! - Confirm / revoke bookkeeping per owner
//! - Exactly-once execution with atomic rollback on failure
//! - Observable lifecycle events
//! - An in-memory execution host with contracts on a small stack VM
//! - JSON persistence, a CLI and a REST/WebSocket API
//!
//! # Example
//!
//! ```rust
//! use quorum_wallet::core::Address;
//! use quorum_wallet::host::Chain;
//! use quorum_wallet::multisig::{MultisigWallet, TxStatus};
//!
//! let alice = Address::from_low_u64_be(1);
//! let bob = Address::from_low_u64_be(2);
//! let carol = Address::from_low_u64_be(3);
//! let recipient = Address::from_low_u64_be(99);
//!
//! // Create a 2-of-3 wallet and fund it
//! let mut wallet = MultisigWallet::new(vec![alice, bob, carol], 2).unwrap();
//! wallet.deposit(recipient, 1_000).unwrap();
//!
//! // Propose and confirm
//! let tx_id = wallet.submit(alice, recipient, 250, vec![]).unwrap();
//! wallet.confirm(alice, tx_id).unwrap();
//! wallet.confirm(bob, tx_id).unwrap();
//! assert_eq!(wallet.status(tx_id).unwrap(), TxStatus::Ready);
//!
//! // Any owner may execute
//! let mut chain = Chain::new();
//! wallet.execute(carol, tx_id, &mut chain).unwrap();
//!
//! assert_eq!(wallet.balance(), 750);
//! assert_eq!(chain.balance_of(&recipient), 250);
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod contract;
pub mod core;
pub mod crypto;
pub mod host;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use config::{ApiConfig, WalletConfig};
pub use contract::{Compiler, Contract, ContractManager, OpCode, VM};
pub use core::{Address, Amount};
pub use host::{CallError, CallHost, CallOutput, CallRequest, Chain};
pub use multisig::{
    EventSink, MultisigError, MultisigWallet, OwnerRegistry, TransactionRecord, TxId, TxStatus,
    WalletEvent,
};
pub use storage::{Storage, WalletState};
