//! The blockchain driver (§4.6): pulls a linear chain of blocks from a block store and feeds them
//! to the block runner with crash-consistent progress.

use alloy_consensus::{Header, Sealed};
use execd_state::StateCommitter;
use tracing::{info, warn};

use crate::{
    block_runner::{Block, BlockOutput, BlockRunner, RunBlockOpts},
    env::BlockHashOracle,
    errors::ExecutorResult,
    events::EventSink,
    interpreter::Interpreter,
    ruleset::ChainParams,
};

/// The block store contract consumed by the driver (§6).
pub trait BlockStore {
    /// Fetches the block at `number`, if the store has it.
    fn get_block_by_number(&self, number: u64) -> Option<Block>;
    /// Persists `block` (and, implicitly, its header) under its number.
    fn put_block(&mut self, block: &Block, header: &Sealed<Header>);
    /// The number of the current canonical head, if any block has been imported yet.
    fn get_canonical_head(&self) -> Option<u64>;
    /// Advances the canonical head pointer.
    fn set_canonical_head(&mut self, number: u64);
}

/// Progress reported by [`BlockchainDriver::run`] as it imports blocks.
#[derive(Debug, Clone, Copy)]
pub enum DriverEvent {
    /// A block was imported successfully.
    BlockImported {
        /// The imported block's number.
        number: u64,
        /// Gas used by the imported block.
        gas_used: u64,
    },
    /// Import stopped because the block store has no block at the given number (chain tip).
    Exhausted {
        /// The first missing block number.
        number: u64,
    },
}

/// Feeds a linear run of blocks from a [`BlockStore`] to a [`BlockRunner`] (§4.6). Single-writer:
/// the engine shell holds exactly one driver bound to one store.
#[derive(Debug, Clone, Copy)]
pub struct BlockchainDriver<I> {
    block_runner: BlockRunner<I>,
}

impl<I> BlockchainDriver<I> {
    /// Wraps the given block runner.
    pub const fn new(block_runner: BlockRunner<I>) -> Self {
        Self { block_runner }
    }
}

impl<I, C, O> BlockchainDriver<I>
where
    I: Interpreter<C, O>,
    C: StateCommitter,
    O: BlockHashOracle,
{
    /// Imports blocks starting at `store`'s canonical head + 1, stopping after `max_blocks`
    /// (if set) or when the store runs out of blocks or a block fails to validate.
    pub fn run(
        &self,
        state: &mut execd_state::JournalDb<C>,
        chain_params: &ChainParams,
        blockhash_oracle: &O,
        store: &mut impl BlockStore,
        max_blocks: Option<u64>,
        events: &mut impl EventSink,
    ) -> ExecutorResult<Vec<BlockOutput>> {
        let mut imported = Vec::new();
        let mut number = store.get_canonical_head().map(|h| h + 1).unwrap_or_default();
        let mut parent: Option<Header> = None;

        loop {
            if let Some(max) = max_blocks {
                if imported.len() as u64 >= max {
                    break;
                }
            }

            let Some(block) = store.get_block_by_number(number) else {
                info!(target: "execd_driver", number, "no further blocks to import");
                break;
            };

            events.before_block(number);
            let result = self.block_runner.run_block(
                state,
                chain_params,
                blockhash_oracle,
                parent.as_ref(),
                block.clone(),
                RunBlockOpts::default(),
            );

            match result {
                Ok(output) => {
                    store.put_block(&block, &output.header);
                    store.set_canonical_head(number);
                    events.after_block(number, true);
                    info!(target: "execd_driver", number, gas_used = output.gas_used, "imported block");
                    parent = Some((*output.header).clone());
                    imported.push(output);
                    number += 1;
                }
                Err(err) => {
                    warn!(target: "execd_driver", number, "block import failed: {err}");
                    events.after_block(number, false);
                    return Err(err);
                }
            }
        }

        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::NoopEventSink,
        interpreter::RevmInterpreter,
        ruleset::{Activation, RuleSetId},
        test_utils::MemoryBlockStore,
        tx_runner::{RecoveredTx, TransactionRunner},
    };
    use alloy_consensus::{TxEnvelope, TxLegacy};
    use alloy_primitives::{Address, Bytes, Signature, TxKind, U256};
    use execd_state::{Account, JournalDb, NoopStateCommitter};

    fn chain_params() -> ChainParams {
        ChainParams::new(
            vec![Activation { ruleset: RuleSetId::Berlin, block: 0, total_difficulty: None }],
            vec![RuleSetId::Berlin],
        )
    }

    fn transfer_tx(sender: Address, nonce: u64, to: Address) -> RecoveredTx {
        RecoveredTx {
            tx: TxEnvelope::Legacy(
                TxLegacy {
                    chain_id: None,
                    nonce,
                    gas_price: 1_000_000_000,
                    gas_limit: 21_000,
                    to: TxKind::Call(to),
                    value: U256::from(1u64),
                    input: Bytes::new(),
                }
                .into_signed(Signature::test_signature()),
            ),
            sender,
        }
    }

    /// Pre-computes a correct two-block chain (genesis + one transfer) against a scratch state,
    /// then hands the driver a *fresh* state and asks it to reproduce the same roots by replaying
    /// both blocks through `run_block(generate=false)` (§8 invariant 7's round-trip property,
    /// exercised here across the driver rather than the builder).
    fn build_reference_chain(sender: Address, recipient: Address) -> (Block, Sealed<Header>, Block, Sealed<Header>) {
        let mut state = JournalDb::new(NoopStateCommitter);
        state.put_account(sender, Account { balance: U256::from(1_000_000_000_000_000_000u64), ..Account::empty() });
        let block_runner: BlockRunner<RevmInterpreter<NoopStateCommitter, crate::env::NoopBlockHashOracle>> =
            BlockRunner::new(TransactionRunner::new(RevmInterpreter::new()));

        let block0 = Block { header: Header { number: 0, gas_limit: 30_000_000, ..Default::default() }, transactions: Vec::new() };
        let output0 = block_runner
            .run_block(&mut state, &chain_params(), &crate::env::NoopBlockHashOracle, None, block0.clone(), RunBlockOpts { generate: true, skip_header_validation: true })
            .unwrap();
        let header0: Header = (*output0.header).clone();

        let tx = transfer_tx(sender, 0, recipient);
        let block1 = Block {
            header: Header { number: 1, gas_limit: 30_000_000, timestamp: 1, parent_hash: header0.hash_slow(), ..Default::default() },
            transactions: vec![tx],
        };
        let output1 = block_runner
            .run_block(&mut state, &chain_params(), &crate::env::NoopBlockHashOracle, Some(&header0), block1.clone(), RunBlockOpts { generate: true, skip_header_validation: false })
            .unwrap();

        (block0, output0.header, block1, output1.header)
    }

    #[test]
    fn test_driver_imports_a_linear_chain_and_advances_canonical_head() {
        let sender = Address::repeat_byte(0xAA);
        let recipient = Address::repeat_byte(0xBB);
        let (block0, header0, block1, header1) = build_reference_chain(sender, recipient);

        let mut store = MemoryBlockStore::new();
        store.seed(0, block0, header0);
        store.seed(1, block1, header1);

        let mut drive_state = JournalDb::new(NoopStateCommitter);
        drive_state.put_account(sender, Account { balance: U256::from(1_000_000_000_000_000_000u64), ..Account::empty() });

        let block_runner: BlockRunner<RevmInterpreter<NoopStateCommitter, crate::env::NoopBlockHashOracle>> =
            BlockRunner::new(TransactionRunner::new(RevmInterpreter::new()));
        let driver = BlockchainDriver::new(block_runner);
        let mut events = NoopEventSink;

        let imported = driver
            .run(&mut drive_state, &chain_params(), &crate::env::NoopBlockHashOracle, &mut store, None, &mut events)
            .unwrap();

        assert_eq!(imported.len(), 2);
        assert_eq!(store.get_canonical_head(), Some(1));
        assert_eq!(drive_state.get_account(recipient).balance, U256::from(1u64));
    }

    #[test]
    fn test_driver_honors_max_blocks() {
        let sender = Address::repeat_byte(0xAA);
        let recipient = Address::repeat_byte(0xBB);
        let (block0, header0, block1, header1) = build_reference_chain(sender, recipient);

        let mut store = MemoryBlockStore::new();
        store.seed(0, block0, header0);
        store.seed(1, block1, header1);

        let mut drive_state = JournalDb::new(NoopStateCommitter);
        drive_state.put_account(sender, Account { balance: U256::from(1_000_000_000_000_000_000u64), ..Account::empty() });

        let block_runner: BlockRunner<RevmInterpreter<NoopStateCommitter, crate::env::NoopBlockHashOracle>> =
            BlockRunner::new(TransactionRunner::new(RevmInterpreter::new()));
        let driver = BlockchainDriver::new(block_runner);
        let mut events = NoopEventSink;

        let imported = driver
            .run(&mut drive_state, &chain_params(), &crate::env::NoopBlockHashOracle, &mut store, Some(1), &mut events)
            .unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(store.get_canonical_head(), Some(0));
    }
}
