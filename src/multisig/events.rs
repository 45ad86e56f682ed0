//! Wallet notifications
//!
//! Every committed state change produces a [`WalletEvent`]. Events are handed
//! to the registered [`EventSink`]s once the outermost operation commits; a
//! sink can observe but never influence the outcome of an operation.

use crate::core::{Address, Amount};
use crate::multisig::transaction::TxId;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Events emitted by the wallet
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WalletEvent {
    /// Funds were received
    Deposit { sender: Address, amount: Amount },
    /// A transaction was appended to the ledger
    Submitted {
        tx_id: TxId,
        target: Address,
        value: Amount,
    },
    /// An owner confirmed a transaction
    Confirmed { tx_id: TxId, owner: Address },
    /// An owner withdrew a confirmation
    Revoked { tx_id: TxId, owner: Address },
    /// A transaction's action was performed
    Executed { tx_id: TxId },
}

impl WalletEvent {
    /// Short event name, as used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            WalletEvent::Deposit { .. } => "Deposit",
            WalletEvent::Submitted { .. } => "TransactionSubmitted",
            WalletEvent::Confirmed { .. } => "TransactionConfirmed",
            WalletEvent::Revoked { .. } => "TransactionRevoked",
            WalletEvent::Executed { .. } => "TransactionExecuted",
        }
    }

    /// Transaction the event refers to, if any
    pub fn tx_id(&self) -> Option<TxId> {
        match self {
            WalletEvent::Deposit { .. } => None,
            WalletEvent::Submitted { tx_id, .. }
            | WalletEvent::Confirmed { tx_id, .. }
            | WalletEvent::Revoked { tx_id, .. }
            | WalletEvent::Executed { tx_id } => Some(*tx_id),
        }
    }
}

impl fmt::Display for WalletEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletEvent::Deposit { sender, amount } => {
                write!(f, "{} sender={} amount={}", self.kind(), sender, amount)
            }
            WalletEvent::Submitted {
                tx_id,
                target,
                value,
            } => write!(
                f,
                "{} tx={} target={} value={}",
                self.kind(),
                tx_id,
                target,
                value
            ),
            WalletEvent::Confirmed { tx_id, owner } | WalletEvent::Revoked { tx_id, owner } => {
                write!(f, "{} tx={} owner={}", self.kind(), tx_id, owner)
            }
            WalletEvent::Executed { tx_id } => write!(f, "{} tx={}", self.kind(), tx_id),
        }
    }
}

/// Receiver of wallet events
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &WalletEvent);
}

/// Writes every event to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_event(&self, event: &WalletEvent) {
        log::info!(target: "quorum_wallet::events", "{}", event);
    }
}

/// Keeps every event in memory, in delivery order
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<WalletEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<WalletEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventSink for EventLog {
    fn on_event(&self, event: &WalletEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// The set of sinks attached to a wallet
#[derive(Clone, Default)]
pub(crate) struct Observers(Vec<Arc<dyn EventSink>>);

impl Observers {
    pub(crate) fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.0.push(sink);
    }

    pub(crate) fn notify(&self, event: &WalletEvent) {
        for sink in &self.0 {
            sink.on_event(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observers({})", self.0.len())
    }
}
