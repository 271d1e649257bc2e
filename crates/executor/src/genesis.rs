//! Genesis state materialization (§4.8 `activateGenesisState`): seeds a freshly-constructed
//! [`JournalDb`] from a chain's genesis allocation, the same way `geth`'s `core.Genesis.Commit`
//! or a `kona` host's local genesis fixture seeds an empty trie before the first block runs.
//!
//! Out of scope here: deriving a [`GenesisSpec`] from a chain-spec file format (`genesis.json`
//! and friends) — that parsing belongs to whatever crate owns the chain-parameters contract
//! (§6). This module only knows how to apply an already-parsed allocation to a store.

use alloy_primitives::{Address, Bytes, U256};
use execd_state::{Account, JournalDb, StateCommitter};

/// A single account's genesis allocation.
#[derive(Debug, Clone, Default)]
pub struct GenesisAccount {
    /// Starting balance, in the smallest unit of the native asset.
    pub balance: U256,
    /// Starting nonce (non-zero only for genesis accounts that pre-mine contract creations).
    pub nonce: u64,
    /// Contract bytecode, if this is a pre-deployed contract.
    pub code: Bytes,
    /// Pre-set storage slots, if this is a pre-deployed contract.
    pub storage: Vec<(U256, U256)>,
}

/// The full genesis allocation: every account present in the state at block zero.
#[derive(Debug, Clone, Default)]
pub struct GenesisSpec {
    /// Accounts to materialize, in no particular order.
    pub alloc: Vec<(Address, GenesisAccount)>,
}

impl GenesisSpec {
    /// An empty genesis allocation — every account reads as empty until a later block writes it.
    pub const fn empty() -> Self {
        Self { alloc: Vec::new() }
    }

    /// Materializes this allocation into `state`, outside of any checkpoint (these writes are
    /// the chain's foundation, not something a later revert should ever unwind).
    pub fn materialize<C: StateCommitter>(&self, state: &mut JournalDb<C>) {
        debug!(target: "execd_executor", accounts = self.alloc.len(), "materializing genesis state");
        for (address, genesis_account) in &self.alloc {
            if !genesis_account.code.is_empty() {
                state.put_contract_code(*address, genesis_account.code.clone());
            }
            let mut account = state.get_account(*address);
            account.balance = genesis_account.balance;
            account.nonce = genesis_account.nonce;
            state.put_account(*address, account);
            for (key, value) in &genesis_account.storage {
                state.put_contract_storage(*address, *key, *value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execd_state::NoopStateCommitter;

    #[test]
    fn test_materializes_balance_nonce_and_storage() {
        let mut db = JournalDb::new(NoopStateCommitter);
        let addr = Address::repeat_byte(0x11);
        let spec = GenesisSpec {
            alloc: vec![(
                addr,
                GenesisAccount {
                    balance: U256::from(1_000u64),
                    nonce: 1,
                    code: Bytes::new(),
                    storage: vec![(U256::from(1u64), U256::from(7u64))],
                },
            )],
        };
        spec.materialize(&mut db);
        let account = db.get_account(addr);
        assert_eq!(account.balance, U256::from(1_000u64));
        assert_eq!(account.nonce, 1);
        assert_eq!(db.get_contract_storage(addr, U256::from(1u64)), U256::from(7u64));
    }

    #[test]
    fn test_materializes_contract_code() {
        let mut db = JournalDb::new(NoopStateCommitter);
        let addr = Address::repeat_byte(0x22);
        let code = Bytes::from_static(&[0x60, 0x00]);
        let spec = GenesisSpec {
            alloc: vec![(
                addr,
                GenesisAccount { balance: U256::ZERO, nonce: 0, code: code.clone(), storage: Vec::new() },
            )],
        };
        spec.materialize(&mut db);
        assert_eq!(db.get_contract_code(addr), code);
    }

    #[test]
    fn test_empty_genesis_leaves_state_empty() {
        let mut db = JournalDb::new(NoopStateCommitter);
        GenesisSpec::empty().materialize(&mut db);
        assert!(!db.account_exists(Address::ZERO));
    }
}
