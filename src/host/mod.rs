//! Execution host
//!
//! The wallet never moves funds or runs code itself. When a transaction is
//! executed it hands a [`CallRequest`] to a [`CallHost`], which delivers the
//! value to the target and runs the call data against it.
//!
//! [`Chain`] is the in-memory host used by the CLI and API: plain accounts
//! with balances plus contracts running on the bundled VM.

pub mod chain;

use crate::core::{Address, Amount};
use crate::multisig::MultisigWallet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chain::Chain;

/// Reasons an external action can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Call reverted: {0}")]
    Reverted(String),
    #[error("Insufficient wallet balance: have {available}, need {required}")]
    InsufficientBalance { available: Amount, required: Amount },
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Balance overflow crediting {0}")]
    BalanceOverflow(Address),
    #[error("Call rejected: {0}")]
    Rejected(String),
}

/// An action the wallet asks its host to perform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRequest {
    /// The wallet performing the action
    pub from: Address,
    pub target: Address,
    pub value: Amount,
    /// Opaque call data, forwarded untouched
    pub payload: Vec<u8>,
}

/// What a successful action produced
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutput {
    /// Word returned by the callee, if any
    pub return_value: Option<u64>,
    /// Raw returned data
    pub data: Vec<u8>,
    /// Gas consumed by the callee
    pub gas_used: u64,
}

impl CallOutput {
    /// Output of a transfer that ran no code
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Performs external actions on behalf of a wallet
///
/// The wallet passes itself in so that a callee can call back into it, the
/// way a contract can re-enter the wallet that called it. Implementations
/// must be atomic: on `Err` no effect of the call may remain on the host.
pub trait CallHost {
    fn call(
        &mut self,
        wallet: &mut MultisigWallet,
        request: &CallRequest,
    ) -> Result<CallOutput, CallError>;
}
