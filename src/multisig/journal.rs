//! Undo journal for atomic execution
//!
//! While an execution is in flight every wallet mutation is recorded here so
//! that a failed action can be unwound entry by entry, newest first. Nested
//! executions (a callee re-entering the wallet) open nested checkpoints on the
//! same journal; entries are only discarded once the outermost frame commits.

use crate::core::{Address, Amount};
use crate::multisig::transaction::TxId;

/// A reversible wallet mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum JournalEntry {
    /// A record was appended to the ledger
    Submitted { tx_id: TxId },
    Confirmed { tx_id: TxId, owner: Address },
    Revoked { tx_id: TxId, owner: Address },
    Executed { tx_id: TxId },
    BalanceChanged { previous: Amount },
}

/// Position to roll back to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Checkpoint {
    pub(crate) entries: usize,
    pub(crate) events: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
    depth: usize,
}

impl Journal {
    /// Open a frame
    pub(crate) fn begin(&mut self, pending_events: usize) -> Checkpoint {
        self.depth += 1;
        Checkpoint {
            entries: self.entries.len(),
            events: pending_events,
        }
    }

    /// Close a frame, keeping its entries for any enclosing frame
    pub(crate) fn commit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.entries.clear();
        }
    }

    /// Close a frame after its entries have been undone
    pub(crate) fn finish_revert(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Whether any frame is open
    pub(crate) fn is_active(&self) -> bool {
        self.depth > 0
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Record a mutation; ignored when no frame is open
    pub(crate) fn record(&mut self, entry: JournalEntry) {
        if self.is_active() {
            self.entries.push(entry);
        }
    }

    /// Pop the newest entry above `checkpoint`
    pub(crate) fn pop_above(&mut self, checkpoint: &Checkpoint) -> Option<JournalEntry> {
        if self.entries.len() > checkpoint.entries {
            self.entries.pop()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_only_inside_frame() {
        let mut journal = Journal::default();
        journal.record(JournalEntry::Executed { tx_id: 0 });

        let checkpoint = journal.begin(0);
        assert_eq!(checkpoint.entries, 0);
        journal.record(JournalEntry::Executed { tx_id: 1 });

        assert_eq!(
            journal.pop_above(&checkpoint),
            Some(JournalEntry::Executed { tx_id: 1 })
        );
        assert_eq!(journal.pop_above(&checkpoint), None);
    }

    #[test]
    fn test_nested_commit_keeps_entries() {
        let mut journal = Journal::default();
        let outer = journal.begin(0);
        journal.record(JournalEntry::Executed { tx_id: 0 });

        let _inner = journal.begin(0);
        journal.record(JournalEntry::Executed { tx_id: 1 });
        journal.commit();
        assert_eq!(journal.depth(), 1);

        // The outer frame can still undo the inner frame's work
        assert_eq!(
            journal.pop_above(&outer),
            Some(JournalEntry::Executed { tx_id: 1 })
        );

        journal.commit();
        assert!(!journal.is_active());
        assert_eq!(journal.pop_above(&outer), None);
    }
}
