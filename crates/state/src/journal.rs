//! The checkpoint journal: a LIFO stack of diff records backing [`crate::JournalDb`]'s
//! `checkpoint`/`commit`/`revert` discipline.
//!
//! Modeled after the `checkpoint()` / `checkpoint_commit()` / `checkpoint_revert(checkpoint)`
//! trio used by `revm`'s own `JournaledState` to back call/create-depth rollback: a checkpoint is
//! simply "the journal's length at the time it was opened", commit is a no-op (the entries stay,
//! now owned by whichever frame is still open), and revert truncates the journal back to that
//! length, undoing each entry in reverse order. This gives invariant (a) "commits fold one level
//! into its parent" for free — there is no frame ownership to transfer — and invariant (b)
//! "reverts restore the exact pre-image" by construction.

use alloy_primitives::{Address, U256};
use revm::primitives::HashMap;

use crate::{
    account::Account,
    errors::{StateError, StateResult},
};

/// A handle returned by [`Journal::checkpoint`]. Opaque to callers; must be resolved exactly once
/// by [`Journal::commit`] or [`Journal::revert`], and only while it is the innermost open
/// checkpoint (LIFO discipline, invariant (c) in the data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Depth of the open-checkpoint stack at the time this checkpoint was taken.
    depth: usize,
    /// Length of the journal at the time this checkpoint was taken.
    mark: usize,
}

/// A single undoable mutation recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalEntry {
    /// An account slot was created, updated, or deleted. `prior` is `None` iff the account did
    /// not exist before the mutation.
    Account { address: Address, prior: Option<Account> },
    /// A storage slot was updated or deleted. `prior` is the value before the write (zero if the
    /// slot was previously unset).
    Storage { address: Address, key: U256, prior: U256 },
    /// A transient-storage slot was updated.
    Transient { address: Address, key: U256, prior: U256 },
    /// The refund counter was adjusted by `delta`; undoing it subtracts `delta` again.
    Refund { delta: i64 },
    /// An address transitioned from cold to warm.
    WarmAddress { address: Address },
    /// A storage slot transitioned from cold to warm.
    WarmStorage { address: Address, key: U256 },
}

/// The journal itself: a flat, append-only (until reverted) vector of [`JournalEntry`] plus a
/// stack of open-checkpoint marks used to enforce the LIFO discipline and detect misuse.
#[derive(Debug, Default, Clone)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
    open: Vec<usize>,
}

impl Journal {
    /// Opens a new checkpoint at the current journal length.
    pub(crate) fn checkpoint(&mut self) -> Checkpoint {
        self.open.push(self.entries.len());
        Checkpoint { depth: self.open.len() - 1, mark: self.entries.len() }
    }

    /// The number of currently-open checkpoints. Used by callers to assert balance (invariant 5
    /// in the testable-properties list: journal depth at the start and end of any public call
    /// must match).
    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }

    /// Commits a checkpoint: the entries recorded since it was opened remain in the journal,
    /// owned by the parent frame (or, if this was the outermost checkpoint, permanently applied).
    pub(crate) fn commit(&mut self, checkpoint: Checkpoint) -> StateResult<()> {
        self.pop_matching(checkpoint)?;
        Ok(())
    }

    /// Reverts a checkpoint: every entry recorded since it was opened is undone, in reverse order,
    /// against the provided account/storage/transient/refund/warm-set stores.
    pub(crate) fn revert(
        &mut self,
        checkpoint: Checkpoint,
        accounts: &mut HashMap<Address, Account>,
        storage: &mut HashMap<Address, HashMap<U256, U256>>,
        transient: &mut HashMap<(Address, U256), U256>,
        refund: &mut i64,
        warm_addresses: &mut revm::primitives::HashSet<Address>,
        warm_storage: &mut revm::primitives::HashSet<(Address, U256)>,
    ) -> StateResult<()> {
        self.pop_matching(checkpoint)?;
        while self.entries.len() > checkpoint.mark {
            match self.entries.pop().expect("checked len above") {
                JournalEntry::Account { address, prior } => match prior {
                    Some(acct) => {
                        accounts.insert(address, acct);
                    }
                    None => {
                        accounts.remove(&address);
                    }
                },
                JournalEntry::Storage { address, key, prior } => {
                    let slots = storage.entry(address).or_default();
                    if prior.is_zero() {
                        slots.remove(&key);
                    } else {
                        slots.insert(key, prior);
                    }
                }
                JournalEntry::Transient { address, key, prior } => {
                    if prior.is_zero() {
                        transient.remove(&(address, key));
                    } else {
                        transient.insert((address, key), prior);
                    }
                }
                JournalEntry::Refund { delta } => {
                    *refund -= delta;
                }
                JournalEntry::WarmAddress { address } => {
                    warm_addresses.remove(&address);
                }
                JournalEntry::WarmStorage { address, key } => {
                    warm_storage.remove(&(address, key));
                }
            }
        }
        Ok(())
    }

    /// Validates that `checkpoint` is the innermost open checkpoint, then pops it off the open
    /// stack. Does not touch journal entries.
    fn pop_matching(&mut self, checkpoint: Checkpoint) -> StateResult<()> {
        if self.open.is_empty() {
            return Err(StateError::JournalUnderflow);
        }
        if checkpoint.depth != self.open.len() - 1 {
            return Err(StateError::StaleCheckpoint(checkpoint.depth));
        }
        self.open.pop();
        Ok(())
    }

    pub(crate) fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_depth_tracks_nesting() {
        let mut journal = Journal::default();
        assert_eq!(journal.depth(), 0);
        let a = journal.checkpoint();
        let b = journal.checkpoint();
        assert_eq!(journal.depth(), 2);
        journal.commit(b).unwrap();
        assert_eq!(journal.depth(), 1);
        journal.commit(a).unwrap();
        assert_eq!(journal.depth(), 0);
    }

    #[test]
    fn test_reverting_non_innermost_checkpoint_is_rejected() {
        let mut journal = Journal::default();
        let a = journal.checkpoint();
        let _b = journal.checkpoint();
        let mut accounts = HashMap::default();
        let mut storage = HashMap::default();
        let mut transient = HashMap::default();
        let mut refund = 0i64;
        let mut warm_addresses = revm::primitives::HashSet::default();
        let mut warm_storage = revm::primitives::HashSet::default();
        let err = journal
            .revert(
                a,
                &mut accounts,
                &mut storage,
                &mut transient,
                &mut refund,
                &mut warm_addresses,
                &mut warm_storage,
            )
            .unwrap_err();
        assert_eq!(err, StateError::StaleCheckpoint(0));
    }

    #[test]
    fn test_commit_with_no_open_checkpoint_underflows() {
        let mut journal = Journal::default();
        let ghost = Checkpoint { depth: 0, mark: 0 };
        assert_eq!(journal.commit(ghost).unwrap_err(), StateError::JournalUnderflow);
    }
}
