//! The journaled state store: [`JournalDb`].

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use revm::primitives::{HashMap, HashSet, KECCAK_EMPTY};
use tracing::debug;

use crate::{
    account::Account,
    errors::{StateError, StateResult},
    journal::{Checkpoint, Journal, JournalEntry},
    traits::StateCommitter,
};

/// A journaled, in-memory account/storage store implementing the "State interface" contract:
/// read/write account, read/write storage slot, checkpoint/commit/revert, and warm/cold access
/// tracking, plus per-transaction transient storage and the refund counter.
///
/// Generic over `C: StateCommitter`, which supplies root computation — the Merkle-Patricia trie
/// (or any other verifiable commitment scheme) is an external collaborator, not something this
/// store implements itself. See [`crate::traits::StateCommitter`].
#[derive(Debug, Clone)]
pub struct JournalDb<C> {
    accounts: HashMap<Address, Account>,
    storage: HashMap<Address, HashMap<U256, U256>>,
    code: HashMap<B256, Bytes>,

    /// Per-transaction scratch state, cleared by [`Self::begin_transaction`].
    transient: HashMap<(Address, U256), U256>,
    original_storage: HashMap<(Address, U256), U256>,
    warm_addresses: HashSet<Address>,
    warm_storage: HashSet<(Address, U256)>,
    refund: i64,

    journal: Journal,
    committer: C,
}

impl<C: StateCommitter> JournalDb<C> {
    /// Constructs an empty store backed by the given [`StateCommitter`].
    pub fn new(committer: C) -> Self {
        Self {
            accounts: HashMap::default(),
            storage: HashMap::default(),
            code: HashMap::default(),
            transient: HashMap::default(),
            original_storage: HashMap::default(),
            warm_addresses: HashSet::default(),
            warm_storage: HashSet::default(),
            refund: 0,
            journal: Journal::default(),
            committer,
        }
    }

    // -- Account / code / storage reads and writes -------------------------------------------

    /// Fetches the account at `address`, synthesizing the canonical empty account on a miss.
    pub fn get_account(&self, address: Address) -> Account {
        self.accounts.get(&address).copied().unwrap_or_default()
    }

    /// Returns `true` iff an account has ever been written at `address` (distinct from an empty
    /// account being present because it was synthesized on read).
    pub fn account_exists(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    /// Writes `account` at `address`, journaling the prior value for revert.
    pub fn put_account(&mut self, address: Address, account: Account) {
        let prior = self.accounts.insert(address, account);
        self.journal.record(JournalEntry::Account { address, prior });
    }

    /// Deletes the account at `address` (and its storage), journaling the prior state.
    pub fn delete_account(&mut self, address: Address) {
        let prior = self.accounts.remove(&address);
        self.journal.record(JournalEntry::Account { address, prior });
        // Storage is not separately journaled here: a deleted account's storage is unreachable
        // until the account is recreated, at which point callers write fresh slots. Reverting the
        // `Account` entry alone is sufficient to restore reachability; any storage journal
        // entries recorded earlier in the same checkpoint scope still unwind correctly because
        // they operate on the same underlying map.
        self.storage.remove(&address);
    }

    /// Returns the contract bytecode for `address`, or empty bytes if the account has no code.
    pub fn get_contract_code(&self, address: Address) -> Bytes {
        let account = self.get_account(address);
        if account.code_hash == KECCAK_EMPTY {
            return Bytes::new();
        }
        self.code.get(&account.code_hash).cloned().unwrap_or_default()
    }

    /// Returns raw bytecode by hash, for callers that already resolved `code_hash` off an
    /// [`Account`] (e.g. the interpreter adapter).
    pub fn get_code_by_hash(&self, code_hash: B256) -> Option<Bytes> {
        if code_hash == KECCAK_EMPTY {
            return Some(Bytes::new());
        }
        self.code.get(&code_hash).cloned()
    }

    /// Stores `code` as the bytecode for `address`, updating its `code_hash`.
    pub fn put_contract_code(&mut self, address: Address, code: Bytes) {
        let code_hash = if code.is_empty() { KECCAK_EMPTY } else { keccak256(&code) };
        self.code.entry(code_hash).or_insert(code);
        let mut account = self.get_account(address);
        account.code_hash = code_hash;
        self.put_account(address, account);
    }

    /// Reads the current (possibly uncommitted, within this transaction) value of a storage slot.
    /// Unset slots read as zero.
    pub fn get_contract_storage(&self, address: Address, key: U256) -> U256 {
        self.storage.get(&address).and_then(|slots| slots.get(&key)).copied().unwrap_or_default()
    }

    /// Writes `value` to a storage slot. Writing zero deletes the slot (a no-op on the root if it
    /// was already unset).
    pub fn put_contract_storage(&mut self, address: Address, key: U256, value: U256) {
        let prior = self.get_contract_storage(address, key);
        if prior == value {
            return;
        }
        let slots = self.storage.entry(address).or_default();
        if value.is_zero() {
            slots.remove(&key);
        } else {
            slots.insert(key, value);
        }
        self.journal.record(JournalEntry::Storage { address, key, prior });
    }

    /// Returns the value of a storage slot as of the outermost checkpoint opened for the current
    /// transaction (i.e. before any mutation made during this transaction), caching the first
    /// observed value per (address, key) until [`Self::begin_transaction`] clears the cache.
    ///
    /// Required by the refund rules for storage-pricing amendments (SSTORE gas/refund depends on
    /// the original, current, and new values of a slot).
    pub fn get_original_contract_storage(&mut self, address: Address, key: U256) -> U256 {
        *self
            .original_storage
            .entry((address, key))
            .or_insert_with(|| self.storage.get(&address).and_then(|s| s.get(&key)).copied().unwrap_or_default())
    }

    // -- Checkpoint discipline ------------------------------------------------------------------

    /// Opens a new nested checkpoint. Must be resolved by a matching [`Self::commit`] or
    /// [`Self::revert`] before any ancestor checkpoint is resolved (LIFO discipline).
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.journal.checkpoint()
    }

    /// The number of currently-open checkpoints.
    pub fn journal_depth(&self) -> usize {
        self.journal.depth()
    }

    /// Commits `checkpoint`: its mutations are retained (folded into the parent frame, or, if it
    /// was the outermost checkpoint, permanently applied).
    pub fn commit(&mut self, checkpoint: Checkpoint) -> StateResult<()> {
        self.journal.commit(checkpoint)
    }

    /// Reverts `checkpoint`: every mutation recorded since it was opened — accounts, storage,
    /// transient storage, the refund counter, and warm-set membership — is undone.
    pub fn revert(&mut self, checkpoint: Checkpoint) -> StateResult<()> {
        self.journal.revert(
            checkpoint,
            &mut self.accounts,
            &mut self.storage,
            &mut self.transient,
            &mut self.refund,
            &mut self.warm_addresses,
            &mut self.warm_storage,
        )
    }

    // -- Transient storage ------------------------------------------------------------------

    /// Reads a transient-storage slot, scoped to the current transaction. Unset slots read as
    /// zero.
    pub fn get_transient_storage(&self, address: Address, key: U256) -> U256 {
        self.transient.get(&(address, key)).copied().unwrap_or_default()
    }

    /// Writes a transient-storage slot.
    pub fn put_transient_storage(&mut self, address: Address, key: U256, value: U256) {
        let prior = self.get_transient_storage(address, key);
        if prior == value {
            return;
        }
        if value.is_zero() {
            self.transient.remove(&(address, key));
        } else {
            self.transient.insert((address, key), value);
        }
        self.journal.record(JournalEntry::Transient { address, key, prior });
    }

    // -- Refund counter ------------------------------------------------------------------

    /// Adjusts the per-transaction refund counter by `delta` (may be negative).
    pub fn add_refund(&mut self, delta: i64) {
        self.refund += delta;
        self.journal.record(JournalEntry::Refund { delta });
    }

    /// The current value of the refund counter.
    pub fn refund(&self) -> i64 {
        self.refund
    }

    // -- Warm/cold access sets ------------------------------------------------------------------

    /// `true` iff `address` has already been accessed in the current transaction.
    pub fn address_is_warm(&self, address: Address) -> bool {
        self.warm_addresses.contains(&address)
    }

    /// `true` iff `(address, key)` has already been accessed in the current transaction.
    pub fn storage_is_warm(&self, address: Address, key: U256) -> bool {
        self.warm_storage.contains(&(address, key))
    }

    /// Marks `address` as warm, returning whether it was previously cold.
    pub fn warm_address(&mut self, address: Address) -> bool {
        let was_cold = self.warm_addresses.insert(address);
        if was_cold {
            self.journal.record(JournalEntry::WarmAddress { address });
        }
        was_cold
    }

    /// Marks `(address, key)` as warm, returning whether it was previously cold.
    pub fn warm_storage(&mut self, address: Address, key: U256) -> bool {
        let was_cold = self.warm_storage.insert((address, key));
        if was_cold {
            self.journal.record(JournalEntry::WarmStorage { address, key });
        }
        was_cold
    }

    // -- Transaction boundary ------------------------------------------------------------------

    /// Resets the per-transaction scratch state: transient storage, the original-storage cache,
    /// warm sets, and the refund counter. Called by the transaction runner before each
    /// transaction; must be called with the journal balanced (no open checkpoints), since it is
    /// not itself journaled/revertible.
    pub fn begin_transaction(&mut self) {
        debug!(target: "execd_state", "resetting per-transaction scratch state");
        self.transient.clear();
        self.original_storage.clear();
        self.warm_addresses.clear();
        self.warm_storage.clear();
        self.refund = 0;
    }

    // -- Root commitment ------------------------------------------------------------------

    /// Computes the root commitment over the current account/storage maps via the configured
    /// [`StateCommitter`].
    ///
    /// Account and storage writes land directly in the maps this reads from; an open checkpoint
    /// only affects whether those writes can still be unwound, not whether they're visible here.
    /// Callers that need a root guaranteed stable against a later revert must resolve their
    /// checkpoint first — the block runner does this by committing its block-scope checkpoint
    /// before computing the roots it compares against the header.
    pub fn state_root(&self) -> StateResult<B256> {
        self.committer
            .state_root(&self.accounts, &self.storage)
            .map_err(|e| StateError::CommitmentFailed(e.to_string()))
    }

    /// A read-only view over every account currently tracked, for callers (the block runner's
    /// empty-account cleanup pass, end-of-block reward application) that must enumerate touched
    /// accounts.
    pub fn accounts(&self) -> &HashMap<Address, Account> {
        &self.accounts
    }
}
