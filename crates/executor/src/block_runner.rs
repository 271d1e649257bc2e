//! The block runner (§4.5): validates a block header, runs its transactions in order, and
//! verifies or generates the block's roots.

use alloy_consensus::{Header, Receipt as AlloyReceipt, ReceiptWithBloom, Sealable, Sealed};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{logs_bloom, B256};
use alloy_trie::root::ordered_trie_root_with_encoder;
use execd_state::{JournalDb, StateCommitter};
use tracing::{debug, info, warn};

use crate::{
    env::{BlockContext, BlockHashOracle},
    errors::{ExecutorError, ExecutorResult},
    interpreter::Interpreter,
    ruleset::{ChainParams, RuleSetOracle},
    tx_runner::{RecoveredTx, TransactionRunner},
};

/// A block: a header plus its ordered, already-recovered transaction list.
///
/// Uncle/ommer lists are out of scope: the rule-sets this engine targets (Berlin onward) settle
/// on `EMPTY_OMMER_ROOT_HASH`, and pre-merge uncle rewards are not implemented (§4.5's "uncle
/// rewards" clause is honored as a no-op for every rule-set this build supports).
#[derive(Debug, Clone)]
pub struct Block {
    /// The block header, as proposed (if `generate`) or claimed (if verifying).
    pub header: Header,
    /// The block's transactions, in execution order.
    pub transactions: Vec<RecoveredTx>,
}

/// Options controlling [`BlockRunner::run_block`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunBlockOpts {
    /// Compute roots and write them into the returned header, rather than verifying them against
    /// the input header.
    pub generate: bool,
    /// Skip parent-relative header validation (timestamp, gas-limit band, base fee).
    pub skip_header_validation: bool,
}

/// The outcome of [`BlockRunner::run_block`].
#[derive(Debug, Clone)]
pub struct BlockOutput {
    /// The block's receipts, in transaction order.
    pub receipts: Vec<crate::receipt::Receipt>,
    /// The sealed header — either the verified input header or, under `generate`, the newly
    /// computed one.
    pub header: Sealed<Header>,
    /// Total gas used by the block.
    pub gas_used: u64,
}

/// Runs whole blocks against a [`JournalDb`] (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct BlockRunner<I> {
    tx_runner: TransactionRunner<I>,
}

impl<I> BlockRunner<I> {
    /// Wraps the given transaction runner.
    pub const fn new(tx_runner: TransactionRunner<I>) -> Self {
        Self { tx_runner }
    }

    /// Gives the block builder access to the underlying transaction runner so it can run
    /// transactions one at a time ahead of a full [`BlockRunner::run_block`] call.
    pub const fn tx_runner(&self) -> &TransactionRunner<I> {
        &self.tx_runner
    }
}

const GAS_LIMIT_ADJUSTMENT_DIVISOR: u64 = 1024;

impl<I, C, O> BlockRunner<I>
where
    I: Interpreter<C, O>,
    C: StateCommitter,
    O: BlockHashOracle,
{
    /// Executes `block` against `state`, returning receipts and the gas/root summary (§4.5).
    pub fn run_block(
        &self,
        state: &mut JournalDb<C>,
        chain_params: &ChainParams,
        blockhash_oracle: &O,
        parent: Option<&Header>,
        block: Block,
        opts: RunBlockOpts,
    ) -> ExecutorResult<BlockOutput> {
        let (ruleset, amendments) = RuleSetOracle.resolve(chain_params, block.header.number, None)?;

        if !opts.skip_header_validation {
            if let Some(parent) = parent {
                self.validate_header_against_parent(&block.header, parent, amendments.fee_market)?;
            }
        }

        let block_context = BlockContext {
            coinbase: block.header.beneficiary,
            timestamp: block.header.timestamp,
            base_fee: block.header.base_fee_per_gas.map(u128::from),
            prev_randao: block.header.mix_hash,
            chain_id: block.transactions.first().and_then(|t| alloy_consensus::Transaction::chain_id(&t.tx)).unwrap_or(1),
            number: block.header.number,
            gas_limit: block.header.gas_limit,
        };

        info!(
            target: "execd_executor",
            block_number = block.header.number,
            tx_count = block.transactions.len(),
            "running block",
        );

        let checkpoint = state.checkpoint();

        let mut cumulative_gas_used = 0u64;
        let mut receipts = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let receipt = match self.tx_runner.run_tx(
                state,
                &block_context,
                blockhash_oracle,
                ruleset,
                amendments,
                tx,
                cumulative_gas_used,
                block.header.gas_limit,
            ) {
                Ok(receipt) => receipt,
                Err(err) => {
                    // A transaction that fails pre-execution validation rejects the whole block
                    // (§4.4/§4.5): every prior transaction's effects in this block must also be
                    // undone, not just the failing one's own internally-managed checkpoint.
                    state.revert(checkpoint)?;
                    return Err(err);
                }
            };
            cumulative_gas_used = receipt.cumulative_gas_used;
            receipts.push(receipt);
        }

        // End-of-block rewards: every rule-set supported by this build is post-merge (or this
        // build never configures a nonzero miner reward), so there is nothing to credit here.
        // The hook is kept so a chain-parameters set that does define one has somewhere to plug
        // in without touching the transaction loop above.

        // Roots are computed while the checkpoint is still open: writes land directly in the
        // backing maps regardless of checkpoint state, so this reads the post-block state without
        // having to commit first. That lets a root mismatch below revert every effect of this
        // block instead of leaving them permanently applied. A commitment failure here must also
        // revert rather than propagate through `?` directly, or the checkpoint would be left open.
        let state_root = match state.state_root() {
            Ok(root) => root,
            Err(err) => {
                state.revert(checkpoint)?;
                return Err(err.into());
            }
        };
        let receipts_root = Self::compute_receipts_root(&receipts);
        let transactions_root = Self::compute_transactions_root(&block.transactions);
        let logs_bloom_value = logs_bloom(receipts.iter().flat_map(|r| r.logs.iter()));

        let header = if opts.generate {
            state.commit(checkpoint)?;
            Header {
                state_root,
                transactions_root,
                receipts_root,
                logs_bloom: logs_bloom_value,
                gas_used: cumulative_gas_used,
                ..block.header
            }
            .seal_slow()
        } else if let Err(err) =
            Self::verify_roots(&block.header, state_root, receipts_root, transactions_root, cumulative_gas_used, logs_bloom_value)
        {
            state.revert(checkpoint)?;
            return Err(err);
        } else {
            state.commit(checkpoint)?;
            block.header.seal_slow()
        };

        debug!(target: "execd_executor", state_root = %state_root, gas_used = cumulative_gas_used, "block complete");

        Ok(BlockOutput { receipts, header, gas_used: cumulative_gas_used })
    }

    fn validate_header_against_parent(&self, header: &Header, parent: &Header, fee_market: bool) -> ExecutorResult<()> {
        if header.parent_hash != parent.hash_slow() {
            return Err(ExecutorError::ParentHashMismatch);
        }
        if header.timestamp <= parent.timestamp {
            return Err(ExecutorError::TimestampNonMonotonic);
        }
        let max_delta = parent.gas_limit / GAS_LIMIT_ADJUSTMENT_DIVISOR;
        let delta = header.gas_limit.abs_diff(parent.gas_limit);
        if delta > max_delta {
            return Err(ExecutorError::GasLimitOutOfBand(header.gas_limit));
        }
        if fee_market {
            let computed = Self::expected_base_fee(parent);
            let declared = header.base_fee_per_gas.map(u128::from).unwrap_or_default();
            if computed != declared {
                warn!(target: "execd_executor", computed, declared, "base fee mismatch");
                return Err(ExecutorError::BaseFeeMismatch { computed, declared });
            }
        }
        Ok(())
    }

    /// EIP-1559 base fee update rule, applied relative to `parent`'s own gas usage and target.
    fn expected_base_fee(parent: &Header) -> u128 {
        let parent_base_fee = parent.base_fee_per_gas.map(u128::from).unwrap_or(1_000_000_000);
        let target = parent.gas_limit as u128 / 2;
        let parent_gas_used = parent.gas_used as u128;
        if parent_gas_used == target {
            return parent_base_fee;
        }
        if parent_gas_used > target {
            let delta = parent_base_fee * (parent_gas_used - target) / target / 8;
            parent_base_fee + delta.max(1)
        } else {
            let delta = parent_base_fee * (target - parent_gas_used) / target / 8;
            parent_base_fee.saturating_sub(delta)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_roots(
        header: &Header,
        state_root: B256,
        receipts_root: B256,
        transactions_root: B256,
        gas_used: u64,
        logs_bloom_value: alloy_primitives::Bloom,
    ) -> ExecutorResult<()> {
        if state_root != header.state_root {
            return Err(ExecutorError::StateRootMismatch { computed: state_root, declared: header.state_root });
        }
        if receipts_root != header.receipts_root {
            return Err(ExecutorError::ReceiptRootMismatch { computed: receipts_root, declared: header.receipts_root });
        }
        if transactions_root != header.transactions_root {
            return Err(ExecutorError::TransactionsRootMismatch {
                computed: transactions_root,
                declared: header.transactions_root,
            });
        }
        if gas_used != header.gas_used {
            return Err(ExecutorError::GasUsedMismatch { computed: gas_used, declared: header.gas_used });
        }
        if logs_bloom_value != header.logs_bloom {
            return Err(ExecutorError::LogsBloomMismatch);
        }
        Ok(())
    }

    fn compute_receipts_root(receipts: &[crate::receipt::Receipt]) -> B256 {
        let encoded: Vec<ReceiptWithBloom<AlloyReceipt>> = receipts
            .iter()
            .map(|r| {
                ReceiptWithBloom::new(
                    AlloyReceipt { status: r.success.into(), cumulative_gas_used: r.cumulative_gas_used, logs: r.logs.clone() },
                    r.logs_bloom,
                )
            })
            .collect();
        ordered_trie_root_with_encoder(&encoded, |item, buf| item.encode(buf))
    }

    fn compute_transactions_root(transactions: &[RecoveredTx]) -> B256 {
        ordered_trie_root_with_encoder(transactions, |tx, buf| tx.tx.encode_2718(buf))
    }
}
