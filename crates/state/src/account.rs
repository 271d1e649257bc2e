//! The [Account] type tracked by the journaled state store.

use alloy_primitives::{keccak256, B256, U256};
use revm::primitives::KECCAK_EMPTY;

/// An account as seen by the execution engine.
///
/// This intentionally mirrors [`revm::primitives::AccountInfo`] rather than a trie-encodable
/// account: the storage root and state root of an account are a property of the Merkle-Patricia
/// trie, which this crate treats as an external collaborator (see the crate-level docs). Code is
/// addressed by hash only; the preimage lives in the [crate::JournalDb]'s code map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// Number of transactions sent from this account, or, for contract accounts, the number of
    /// contract-creations made.
    pub nonce: u64,
    /// The account's balance, denominated in the smallest unit of the native asset.
    pub balance: U256,
    /// Hash of the account's bytecode. [`KECCAK_EMPTY`] for externally-owned accounts.
    pub code_hash: B256,
}

impl Default for Account {
    fn default() -> Self {
        Self::empty()
    }
}

impl Account {
    /// Returns the canonical empty account: zero nonce, zero balance, empty code hash.
    pub const fn empty() -> Self {
        Self { nonce: 0, balance: U256::ZERO, code_hash: KECCAK_EMPTY }
    }

    /// An account is "empty" per EIP-161 iff it has no nonce, no balance, and no code.
    ///
    /// Empty accounts touched during execution are pruned from the store once the
    /// empty-account-cleanup amendment (EIP-161) is active; that gating lives with the
    /// rule-set oracle in `execd-executor`, not in this crate.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == KECCAK_EMPTY
    }

    /// Whether this account has contract code associated with it.
    pub fn is_contract(&self) -> bool {
        self.code_hash != KECCAK_EMPTY && self.code_hash != B256::ZERO
    }
}

/// Computes the keccak256 hash of a storage key, used to key the journal's original-value map.
///
/// Exposed so that callers building test fixtures can address storage the same way the store
/// does internally without reaching into private fields.
pub fn storage_key_hash(address: alloy_primitives::Address, key: U256) -> B256 {
    let mut buf = [0u8; 52];
    buf[..20].copy_from_slice(address.as_slice());
    buf[20..].copy_from_slice(&key.to_be_bytes::<32>());
    keccak256(buf)
}
