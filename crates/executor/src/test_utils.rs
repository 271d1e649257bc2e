//! In-memory fixtures for the scenarios exercised by this crate's own tests — mirroring the role
//! `kona-executor::test_utils` plays for its crate, but lighter-weight: no network fetching, since
//! every collaborator here (chain parameters, state store, block store) is already a pure,
//! in-process value this crate can construct directly.

use std::collections::HashMap;

use alloy_consensus::{Header, Sealed};

use crate::{
    block_runner::Block,
    driver::BlockStore,
    ruleset::{Activation, ChainParams, RuleSetId},
};

/// Chain parameters activating every rule-set this build supports at block zero, London-equivalent
/// amendments active from genesis. The common case for tests that don't care about hardfork
/// transitions.
pub(crate) fn always_latest_chain_params() -> ChainParams {
    ChainParams::new(
        vec![Activation { ruleset: RuleSetId::Cancun, block: 0, total_difficulty: None }],
        RuleSetId::ALL.to_vec(),
    )
}

/// An in-memory [`BlockStore`] backed by a plain map, for driver tests that don't need persistence.
#[derive(Debug, Default)]
pub(crate) struct MemoryBlockStore {
    blocks: HashMap<u64, (Block, Sealed<Header>)>,
    canonical_head: Option<u64>,
}

impl MemoryBlockStore {
    /// An empty store with no canonical head.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a block at `number` without advancing the canonical head, so driver
    /// tests can pre-populate a chain of blocks to import.
    pub(crate) fn seed(&mut self, number: u64, block: Block, header: Sealed<Header>) {
        self.blocks.insert(number, (block, header));
    }
}

impl BlockStore for MemoryBlockStore {
    fn get_block_by_number(&self, number: u64) -> Option<Block> {
        self.blocks.get(&number).map(|(block, _)| block.clone())
    }

    fn put_block(&mut self, block: &Block, header: &Sealed<Header>) {
        self.blocks.insert(block.header.number, (block.clone(), header.clone()));
    }

    fn get_canonical_head(&self) -> Option<u64> {
        self.canonical_head
    }

    fn set_canonical_head(&mut self, number: u64) {
        self.canonical_head = Some(number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Sealable;

    #[test]
    fn test_memory_block_store_round_trips_a_seeded_block() {
        let mut store = MemoryBlockStore::new();
        assert_eq!(store.get_canonical_head(), None);

        let header = Header { number: 1, ..Default::default() }.seal_slow();
        let block = Block { header: (*header).clone(), transactions: Vec::new() };
        store.seed(1, block.clone(), header.clone());

        assert_eq!(store.get_block_by_number(1).map(|b| b.header.number), Some(1));
        store.set_canonical_head(1);
        assert_eq!(store.get_canonical_head(), Some(1));
    }

    #[test]
    fn test_always_latest_chain_params_resolves_cancun_at_genesis() {
        let params = always_latest_chain_params();
        let (ruleset, amendments) = crate::ruleset::RuleSetOracle.resolve(&params, 0, None).unwrap();
        assert_eq!(ruleset, RuleSetId::Cancun);
        assert!(amendments.transient_storage);
    }
}
