//! The [StateCommitter] trait: the seam between this crate's journaled, flat account/storage
//! maps and the Merkle-Patricia trie (or any other verifiable commitment scheme) that the
//! execution engine treats as an external collaborator (see crate-level docs).
//!
//! [`JournalDb`](crate::JournalDb) is generic over `C: StateCommitter` the same way
//! `kona-executor`'s `TrieDB` is generic over `F: TrieDBProvider` — the store holds the
//! collaborator, delegates root computation to it, and otherwise doesn't know or care how (or
//! whether) a real trie is being maintained underneath.

use alloy_primitives::{Address, B256, U256};
use revm::primitives::HashMap;

use crate::account::Account;

/// Computes a root commitment over the current (committed) account and storage state.
///
/// Implementations are free to maintain a real Merkle-Patricia trie incrementally, recompute one
/// from scratch, or (for tests) return a cheap deterministic stand-in. The store only calls this
/// when no checkpoint is open, so `accounts`/`storage` always reflect a fully-committed view.
pub trait StateCommitter {
    /// The error type returned when a root cannot be computed.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Computes the state root over the given committed account and storage maps.
    fn state_root(
        &self,
        accounts: &HashMap<Address, Account>,
        storage: &HashMap<Address, HashMap<U256, U256>>,
    ) -> Result<B256, Self::Error>;
}

/// A no-op [`StateCommitter`] for tests and embedders that don't need a verifiable root. Returns
/// the keccak256 hash of a simple, order-independent fold over the account set — deterministic
/// and reproducible across runs of the same state, but *not* a real Ethereum state trie root.
///
/// Mirrors the role of `kona-executor`'s `NoopTrieDBProvider`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStateCommitter;

/// The error type of [`NoopStateCommitter`], which never fails.
#[derive(derive_more::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[display("infallible")]
pub struct Infallible;

impl core::error::Error for Infallible {}

impl StateCommitter for NoopStateCommitter {
    type Error = Infallible;

    fn state_root(
        &self,
        accounts: &HashMap<Address, Account>,
        storage: &HashMap<Address, HashMap<U256, U256>>,
    ) -> Result<B256, Self::Error> {
        use alloy_primitives::keccak256;
        use core::hash::{Hash, Hasher};
        use std::collections::hash_map::DefaultHasher;

        // Fold every (address, account, storage) triple into a single order-independent
        // accumulator (XOR of per-entry hashes) so the result does not depend on iteration
        // order over the underlying hash maps.
        let mut acc = [0u8; 32];
        for (address, account) in accounts.iter() {
            let mut hasher = DefaultHasher::new();
            address.hash(&mut hasher);
            account.nonce.hash(&mut hasher);
            account.balance.hash(&mut hasher);
            account.code_hash.hash(&mut hasher);
            if let Some(slots) = storage.get(address) {
                for (k, v) in slots.iter() {
                    k.hash(&mut hasher);
                    v.hash(&mut hasher);
                }
            }
            let digest = keccak256(hasher.finish().to_be_bytes());
            for (a, d) in acc.iter_mut().zip(digest.iter()) {
                *a ^= d;
            }
        }
        Ok(B256::from(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_committer_is_order_independent() {
        let addr_a = Address::repeat_byte(0xAA);
        let addr_b = Address::repeat_byte(0xBB);
        let acct = Account { nonce: 1, balance: U256::from(7u64), ..Account::empty() };

        let mut one = HashMap::default();
        one.insert(addr_a, acct);
        one.insert(addr_b, acct);

        let mut two = HashMap::default();
        two.insert(addr_b, acct);
        two.insert(addr_a, acct);

        let storage = HashMap::default();
        let committer = NoopStateCommitter;
        assert_eq!(
            committer.state_root(&one, &storage).unwrap(),
            committer.state_root(&two, &storage).unwrap()
        );
    }

    #[test]
    fn test_noop_committer_differs_on_balance_change() {
        let addr = Address::repeat_byte(0xAA);
        let mut accounts = HashMap::default();
        accounts.insert(addr, Account { balance: U256::from(1u64), ..Account::empty() });
        let storage = HashMap::default();
        let committer = NoopStateCommitter;
        let root_one = committer.state_root(&accounts, &storage).unwrap();

        accounts.insert(addr, Account { balance: U256::from(2u64), ..Account::empty() });
        let root_two = committer.state_root(&accounts, &storage).unwrap();
        assert_ne!(root_one, root_two);
    }
}
