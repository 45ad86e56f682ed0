//! Multi-signature wallet engine
//!
//! Owners submit transactions, confirm or revoke their approval, and once the
//! threshold is met any owner may execute. Execution marks the record as
//! executed before the action runs; if the action fails, every wallet change
//! made since the mark is rolled back.

use crate::core::{Address, Amount};
use crate::host::{CallError, CallHost, CallOutput, CallRequest};
use crate::multisig::events::{EventSink, Observers, WalletEvent};
use crate::multisig::journal::{Checkpoint, Journal, JournalEntry};
use crate::multisig::registry::OwnerRegistry;
use crate::multisig::transaction::{TransactionRecord, TxId, TxStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors related to multisig operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("Invalid owner list: at least one owner is required")]
    InvalidOwner,
    #[error("Zero address cannot be an owner")]
    ZeroAddress,
    #[error("Duplicate owner: {0}")]
    DuplicateOwner(Address),
    #[error("Invalid required confirmations: {required} with {owners} owners")]
    InvalidRequiredConfirmations { required: usize, owners: usize },
    #[error("Not an owner: {0}")]
    NotOwner(Address),
    #[error("Transaction does not exist: {0}")]
    TransactionNotExists(TxId),
    #[error("Transaction {0} already executed")]
    TransactionAlreadyExecuted(TxId),
    #[error("Transaction {tx_id} already confirmed by {owner}")]
    TransactionAlreadyConfirmed { tx_id: TxId, owner: Address },
    #[error("Transaction {tx_id} not confirmed by {owner}")]
    TransactionNotConfirmed { tx_id: TxId, owner: Address },
    #[error("Insufficient confirmations for transaction {tx_id}: have {have}, need {need}")]
    InsufficientConfirmations { tx_id: TxId, have: usize, need: usize },
    #[error("Transaction {tx_id} failed: {reason}")]
    TransactionFailed { tx_id: TxId, reason: CallError },
    #[error("Balance overflow: {balance} + {amount}")]
    BalanceOverflow { balance: Amount, amount: Amount },
}

impl MultisigError {
    /// Stable name of the failure
    pub fn kind(&self) -> &'static str {
        match self {
            MultisigError::InvalidOwner => "InvalidOwner",
            MultisigError::ZeroAddress => "ZeroAddress",
            MultisigError::DuplicateOwner(_) => "DuplicateOwner",
            MultisigError::InvalidRequiredConfirmations { .. } => "InvalidRequiredConfirmations",
            MultisigError::NotOwner(_) => "NotOwner",
            MultisigError::TransactionNotExists(_) => "TransactionNotExists",
            MultisigError::TransactionAlreadyExecuted(_) => "TransactionAlreadyExecuted",
            MultisigError::TransactionAlreadyConfirmed { .. } => "TransactionAlreadyConfirmed",
            MultisigError::TransactionNotConfirmed { .. } => "TransactionNotConfirmed",
            MultisigError::InsufficientConfirmations { .. } => "InsufficientConfirmations",
            MultisigError::TransactionFailed { .. } => "TransactionFailed",
            MultisigError::BalanceOverflow { .. } => "BalanceOverflow",
        }
    }
}

/// A quorum-controlled wallet
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "StoredWallet")]
pub struct MultisigWallet {
    /// Wallet address, derived from the registry
    address: Address,
    registry: OwnerRegistry,
    /// Optional human-readable label
    label: Option<String>,
    balance: Amount,
    /// Append-only ledger, indexed by transaction id
    transactions: Vec<TransactionRecord>,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    journal: Journal,
    /// Events waiting for the outermost operation to commit
    #[serde(skip)]
    pending_events: Vec<WalletEvent>,
    #[serde(skip)]
    observers: Observers,
}

#[derive(Deserialize)]
struct StoredWallet {
    address: Address,
    registry: OwnerRegistry,
    label: Option<String>,
    balance: Amount,
    transactions: Vec<TransactionRecord>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoredWallet> for MultisigWallet {
    type Error = String;

    fn try_from(stored: StoredWallet) -> Result<Self, Self::Error> {
        let expected = MultisigWallet::generate_address(&stored.registry);
        if stored.address != expected {
            return Err(format!(
                "wallet address {} does not match its owners (expected {})",
                stored.address, expected
            ));
        }

        let required = stored.registry.required_confirmations();
        for (index, tx) in stored.transactions.iter().enumerate() {
            if tx.id() != index as TxId {
                return Err(format!("transaction at index {} has id {}", index, tx.id()));
            }
            if let Some(stranger) = tx.confirmations().find(|c| !stored.registry.is_owner(c)) {
                return Err(format!(
                    "transaction {} confirmed by non-owner {}",
                    tx.id(),
                    stranger
                ));
            }
            if tx.is_executed() && tx.confirmation_count() < required {
                return Err(format!(
                    "transaction {} executed with {} of {} confirmations",
                    tx.id(),
                    tx.confirmation_count(),
                    required
                ));
            }
        }

        Ok(Self {
            address: stored.address,
            registry: stored.registry,
            label: stored.label,
            balance: stored.balance,
            transactions: stored.transactions,
            created_at: stored.created_at,
            journal: Journal::default(),
            pending_events: Vec::new(),
            observers: Observers::default(),
        })
    }
}

impl MultisigWallet {
    /// Create a wallet from owners and a threshold
    ///
    /// # Errors
    /// Returns the registry validation error if the owners or threshold are invalid
    pub fn new(owners: Vec<Address>, required_confirmations: usize) -> Result<Self, MultisigError> {
        let registry = OwnerRegistry::new(owners, required_confirmations)?;
        Ok(Self::from_registry(registry))
    }

    /// Create a wallet from an already validated registry
    pub fn from_registry(registry: OwnerRegistry) -> Self {
        let address = Self::generate_address(&registry);
        log::info!(
            "Multisig wallet {} created ({})",
            address,
            registry.description()
        );

        Self {
            address,
            registry,
            label: None,
            balance: 0,
            transactions: Vec::new(),
            created_at: Utc::now(),
            journal: Journal::default(),
            pending_events: Vec::new(),
            observers: Observers::default(),
        }
    }

    /// Attach a label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Address = HASH160(threshold || sorted owners)
    ///
    /// Sorting makes the address independent of registration order.
    fn generate_address(registry: &OwnerRegistry) -> Address {
        let mut sorted_owners = registry.owners().to_vec();
        sorted_owners.sort();

        let mut data = (registry.required_confirmations() as u64)
            .to_be_bytes()
            .to_vec();
        for owner in &sorted_owners {
            data.extend_from_slice(owner.as_bytes());
        }

        Address::derive(&data)
    }

    /// Register an event sink
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.observers.push(sink);
    }

    /// Number of registered event sinks
    pub fn sink_count(&self) -> usize {
        self.observers.len()
    }

    /// Copy of the wallet state with no sinks attached
    ///
    /// Lets a caller stage operations and only keep them once they have been
    /// made durable; events from the copy reach nobody unless published.
    pub fn detached(&self) -> Self {
        Self {
            address: self.address,
            registry: self.registry.clone(),
            label: self.label.clone(),
            balance: self.balance,
            transactions: self.transactions.clone(),
            created_at: self.created_at,
            journal: Journal::default(),
            pending_events: Vec::new(),
            observers: Observers::default(),
        }
    }

    /// Take over the sinks of `previous`, replacing any attached here
    pub fn adopt_sinks(&mut self, previous: &mut MultisigWallet) {
        self.observers = std::mem::take(&mut previous.observers);
    }

    /// Deliver already committed events to the attached sinks
    pub(crate) fn publish(&self, events: &[WalletEvent]) {
        for event in events {
            self.observers.notify(event);
        }
    }

    // ------------------------------------------------------------------
    // Registry queries
    // ------------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn registry(&self) -> &OwnerRegistry {
        &self.registry
    }

    /// Owners in registration order
    pub fn owners(&self) -> &[Address] {
        self.registry.owners()
    }

    pub fn is_owner(&self, identity: &Address) -> bool {
        self.registry.is_owner(identity)
    }

    pub fn owner_count(&self) -> usize {
        self.registry.owner_count()
    }

    pub fn required_confirmations(&self) -> usize {
        self.registry.required_confirmations()
    }

    /// Get human-readable description like "2-of-3"
    pub fn description(&self) -> String {
        self.registry.description()
    }

    // ------------------------------------------------------------------
    // Funding
    // ------------------------------------------------------------------

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Accept funds from anyone
    pub fn deposit(&mut self, sender: Address, amount: Amount) -> Result<(), MultisigError> {
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(MultisigError::BalanceOverflow {
                balance: self.balance,
                amount,
            })?;

        self.set_balance(balance);
        self.emit(WalletEvent::Deposit { sender, amount });
        log::debug!("Deposit of {} from {} into {}", amount, sender, self.address);
        self.flush_events();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ledger operations
    // ------------------------------------------------------------------

    /// Append a new transaction and return its id
    ///
    /// Target, value and payload are not validated here; whether the action
    /// can actually be performed is only known at execution time.
    pub fn submit(
        &mut self,
        caller: Address,
        target: Address,
        value: Amount,
        payload: Vec<u8>,
    ) -> Result<TxId, MultisigError> {
        self.registry.ensure_owner(&caller)?;

        let tx_id = self.transactions.len() as TxId;
        self.transactions
            .push(TransactionRecord::new(tx_id, caller, target, value, payload));
        self.journal.record(JournalEntry::Submitted { tx_id });

        self.emit(WalletEvent::Submitted {
            tx_id,
            target,
            value,
        });
        log::info!(
            "Transaction {} submitted by {}: {} to {}",
            tx_id,
            caller,
            value,
            target
        );
        self.flush_events();

        Ok(tx_id)
    }

    /// Record the caller's approval of a transaction
    pub fn confirm(&mut self, caller: Address, tx_id: TxId) -> Result<(), MultisigError> {
        self.registry.ensure_owner(&caller)?;

        let record = self.record_mut(tx_id)?;
        if record.executed {
            return Err(MultisigError::TransactionAlreadyExecuted(tx_id));
        }
        if !record.add_confirmation(caller) {
            return Err(MultisigError::TransactionAlreadyConfirmed {
                tx_id,
                owner: caller,
            });
        }
        let count = record.confirmation_count;

        self.journal.record(JournalEntry::Confirmed {
            tx_id,
            owner: caller,
        });
        self.emit(WalletEvent::Confirmed {
            tx_id,
            owner: caller,
        });
        log::debug!(
            "Transaction {} confirmed by {} ({}/{})",
            tx_id,
            caller,
            count,
            self.required_confirmations()
        );
        self.flush_events();

        Ok(())
    }

    /// Withdraw the caller's approval; allowed until the transaction executes
    pub fn revoke(&mut self, caller: Address, tx_id: TxId) -> Result<(), MultisigError> {
        self.registry.ensure_owner(&caller)?;

        let record = self.record_mut(tx_id)?;
        if record.executed {
            return Err(MultisigError::TransactionAlreadyExecuted(tx_id));
        }
        if !record.remove_confirmation(&caller) {
            return Err(MultisigError::TransactionNotConfirmed {
                tx_id,
                owner: caller,
            });
        }
        let count = record.confirmation_count;

        self.journal.record(JournalEntry::Revoked {
            tx_id,
            owner: caller,
        });
        self.emit(WalletEvent::Revoked {
            tx_id,
            owner: caller,
        });
        log::debug!(
            "Transaction {} revoked by {} ({}/{})",
            tx_id,
            caller,
            count,
            self.required_confirmations()
        );
        self.flush_events();

        Ok(())
    }

    /// Perform a sufficiently confirmed transaction
    ///
    /// Any owner may execute, not only the submitter or a confirmer. The
    /// record is marked executed before `host` is invoked, so a callee that
    /// re-enters with the same id is refused. If the action fails, the mark,
    /// the debit and anything a re-entering callee did to this wallet are
    /// undone and `TransactionFailed` is returned.
    pub fn execute<H>(
        &mut self,
        caller: Address,
        tx_id: TxId,
        host: &mut H,
    ) -> Result<CallOutput, MultisigError>
    where
        H: CallHost + ?Sized,
    {
        self.registry.ensure_owner(&caller)?;

        let required = self.required_confirmations();
        let record = self.record(tx_id)?;
        if record.executed {
            return Err(MultisigError::TransactionAlreadyExecuted(tx_id));
        }
        if record.confirmation_count < required {
            return Err(MultisigError::InsufficientConfirmations {
                tx_id,
                have: record.confirmation_count,
                need: required,
            });
        }

        let request = CallRequest {
            from: self.address,
            target: record.target,
            value: record.value,
            payload: record.payload.clone(),
        };

        let checkpoint = self.journal.begin(self.pending_events.len());
        if let Ok(record) = self.record_mut(tx_id) {
            record.mark_executed();
        }
        self.journal.record(JournalEntry::Executed { tx_id });

        let outcome = self
            .debit(request.value)
            .and_then(|()| host.call(self, &request));

        match outcome {
            Ok(output) => {
                self.journal.commit();
                self.emit(WalletEvent::Executed { tx_id });
                log::info!(
                    "Transaction {} executed by {}: {} to {}",
                    tx_id,
                    caller,
                    request.value,
                    request.target
                );
                self.flush_events();
                Ok(output)
            }
            Err(reason) => {
                self.revert_to(checkpoint);
                log::warn!("Transaction {} failed and was rolled back: {}", tx_id, reason);
                Err(MultisigError::TransactionFailed { tx_id, reason })
            }
        }
    }

    // ------------------------------------------------------------------
    // Ledger queries
    // ------------------------------------------------------------------

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn transaction(&self, tx_id: TxId) -> Result<&TransactionRecord, MultisigError> {
        self.record(tx_id)
    }

    /// The whole ledger in id order
    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    /// Transactions not yet executed
    pub fn pending_transactions(&self) -> Vec<&TransactionRecord> {
        self.transactions.iter().filter(|tx| !tx.executed).collect()
    }

    pub fn confirmation_count(&self, tx_id: TxId) -> Result<usize, MultisigError> {
        Ok(self.record(tx_id)?.confirmation_count)
    }

    pub fn is_confirmed_by(&self, tx_id: TxId, owner: &Address) -> Result<bool, MultisigError> {
        Ok(self.record(tx_id)?.is_confirmed_by(owner))
    }

    pub fn status(&self, tx_id: TxId) -> Result<TxStatus, MultisigError> {
        Ok(self.record(tx_id)?.status(self.required_confirmations()))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn record(&self, tx_id: TxId) -> Result<&TransactionRecord, MultisigError> {
        usize::try_from(tx_id)
            .ok()
            .and_then(|index| self.transactions.get(index))
            .ok_or(MultisigError::TransactionNotExists(tx_id))
    }

    fn record_mut(&mut self, tx_id: TxId) -> Result<&mut TransactionRecord, MultisigError> {
        usize::try_from(tx_id)
            .ok()
            .and_then(|index| self.transactions.get_mut(index))
            .ok_or(MultisigError::TransactionNotExists(tx_id))
    }

    fn set_balance(&mut self, balance: Amount) {
        self.journal.record(JournalEntry::BalanceChanged {
            previous: self.balance,
        });
        self.balance = balance;
    }

    fn debit(&mut self, amount: Amount) -> Result<(), CallError> {
        let remaining = self
            .balance
            .checked_sub(amount)
            .ok_or(CallError::InsufficientBalance {
                available: self.balance,
                required: amount,
            })?;
        self.set_balance(remaining);
        Ok(())
    }

    fn emit(&mut self, event: WalletEvent) {
        self.pending_events.push(event);
    }

    /// Deliver buffered events once no execution frame is open
    fn flush_events(&mut self) {
        if self.journal.is_active() {
            return;
        }
        for event in std::mem::take(&mut self.pending_events) {
            self.observers.notify(&event);
        }
    }

    /// Undo every journaled change above `checkpoint`, newest first
    fn revert_to(&mut self, checkpoint: Checkpoint) {
        while let Some(entry) = self.journal.pop_above(&checkpoint) {
            match entry {
                JournalEntry::Submitted { tx_id } => {
                    if self.transactions.last().map(|tx| tx.id) == Some(tx_id) {
                        self.transactions.pop();
                    }
                }
                JournalEntry::Confirmed { tx_id, owner } => {
                    if let Ok(record) = self.record_mut(tx_id) {
                        record.remove_confirmation(&owner);
                    }
                }
                JournalEntry::Revoked { tx_id, owner } => {
                    if let Ok(record) = self.record_mut(tx_id) {
                        record.add_confirmation(owner);
                    }
                }
                JournalEntry::Executed { tx_id } => {
                    if let Ok(record) = self.record_mut(tx_id) {
                        record.unmark_executed();
                    }
                }
                JournalEntry::BalanceChanged { previous } => {
                    self.balance = previous;
                }
            }
        }

        self.pending_events.truncate(checkpoint.events);
        self.journal.finish_revert();
    }
}
