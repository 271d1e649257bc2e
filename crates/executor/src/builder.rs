//! The block builder (§4.7): the inverse of the block runner — accepts transactions one at a time
//! against a long-running checkpoint and seals into a block.

use alloy_consensus::{Header, Sealable, Sealed};
use execd_state::{Checkpoint, JournalDb, StateCommitter};
use tracing::debug;

use crate::{
    block_runner::{Block, BlockRunner, RunBlockOpts},
    env::BlockHashOracle,
    errors::{ExecutorError, ExecutorResult},
    interpreter::Interpreter,
    receipt::Receipt,
    ruleset::ChainParams,
    tx_runner::RecoveredTx,
};

/// A block assembled by [`BlockBuilder`], ready for the caller to broadcast or store.
#[derive(Debug, Clone)]
pub struct SealedBlock {
    /// The sealed header.
    pub header: Sealed<Header>,
    /// The transactions included, in the order they were added.
    pub transactions: Vec<RecoveredTx>,
    /// Receipts for the included transactions, in the same order.
    pub receipts: Vec<Receipt>,
}

/// Assembles a block from a caller-supplied transaction stream (§4.7). Exactly one of
/// [`BlockBuilder::build`] / [`BlockBuilder::revert`] must be called; both consume `self`, so
/// Rust's ownership rules make a second terminal call a compile error rather than the runtime
/// [`ExecutorError::BuilderClosed`] the source describes — `ensure_open`/`BuilderClosed` stay in
/// place for embedders that stash a builder behind their own `&mut` handle and only notice the
/// second call at their own call boundary. If a caller drops a builder without calling either
/// method (a panic unwinding through it, an early `?` elsewhere), [`Drop`] reverts its checkpoint
/// so the journal never leaks an unresolved frame.
#[derive(Debug)]
pub struct BlockBuilder<'s, I, C> {
    state: &'s mut JournalDb<C>,
    block_runner: BlockRunner<I>,
    chain_params: ChainParams,
    checkpoint: Option<Checkpoint>,
    provisional_header: Header,
    transactions: Vec<RecoveredTx>,
    receipts: Vec<Receipt>,
    cumulative_gas_used: u64,
}

impl<'s, I, C> BlockBuilder<'s, I, C>
where
    C: StateCommitter,
{
    /// Opens a new long-lived checkpoint and seeds a provisional header from `parent`.
    pub fn new(
        state: &'s mut JournalDb<C>,
        block_runner: BlockRunner<I>,
        chain_params: ChainParams,
        parent: &Header,
        coinbase: alloy_primitives::Address,
        timestamp: u64,
        gas_limit: u64,
    ) -> Self {
        let checkpoint = state.checkpoint();
        let base_fee = parent.base_fee_per_gas;
        let provisional_header = Header {
            parent_hash: parent.hash_slow(),
            beneficiary: coinbase,
            number: parent.number + 1,
            gas_limit,
            timestamp,
            base_fee_per_gas: base_fee,
            ..Default::default()
        };
        Self {
            state,
            block_runner,
            chain_params,
            checkpoint: Some(checkpoint),
            provisional_header,
            transactions: Vec::new(),
            receipts: Vec::new(),
            cumulative_gas_used: 0,
        }
    }
}

impl<'s, I, C, O> BlockBuilder<'s, I, C>
where
    I: Interpreter<C, O>,
    C: StateCommitter,
    O: BlockHashOracle,
{
    /// Runs `tx` against the builder's in-progress block, rejecting it if it would overflow the
    /// block gas limit.
    pub fn add_transaction(
        &mut self,
        blockhash_oracle: &O,
        ruleset: crate::ruleset::RuleSetId,
        amendments: crate::ruleset::Amendments,
        block_context: &crate::env::BlockContext,
        tx: RecoveredTx,
    ) -> ExecutorResult<()> {
        self.ensure_open()?;

        if alloy_consensus::Transaction::gas_limit(&tx.tx) > self.provisional_header.gas_limit - self.cumulative_gas_used {
            return Err(ExecutorError::BlockGasLimitExceeded);
        }

        let receipt = self.block_runner.tx_runner().run_tx(
            self.state,
            block_context,
            blockhash_oracle,
            ruleset,
            amendments,
            &tx,
            self.cumulative_gas_used,
            self.provisional_header.gas_limit,
        )?;
        debug!(target: "execd_executor", sender = %tx.sender, "added transaction to in-progress block");
        self.cumulative_gas_used = receipt.cumulative_gas_used;
        self.receipts.push(receipt);
        self.transactions.push(tx);
        Ok(())
    }

    /// Applies end-of-block processing, computes roots, commits the checkpoint, and returns the
    /// sealed block. Terminal: no further calls are permitted on this builder afterward.
    pub fn build(
        mut self,
        blockhash_oracle: &O,
        parent: Option<&Header>,
    ) -> ExecutorResult<SealedBlock> {
        self.ensure_open()?;
        let checkpoint = self.checkpoint.take().expect("checked by ensure_open");
        self.state.revert(checkpoint)?;

        // Re-run through `run_block` against a fresh checkpoint so root computation and
        // end-of-block processing stay in exactly one place (the block runner), rather than
        // duplicated here. This costs re-executing the block's transactions once more, but keeps
        // the builder a thin "accumulate, then hand off" shim instead of a second implementation
        // of block-level bookkeeping.
        // `mem::take` rather than moving the field directly: `BlockBuilder` implements `Drop`, and
        // Rust forbids partially moving a field out of a value whose type does.
        let transactions = core::mem::take(&mut self.transactions);
        let block = Block { header: self.provisional_header.clone(), transactions: transactions.clone() };
        let output = self.block_runner.run_block(
            self.state,
            &self.chain_params,
            blockhash_oracle,
            parent,
            block,
            RunBlockOpts { generate: true, skip_header_validation: true },
        )?;

        Ok(SealedBlock { header: output.header, transactions, receipts: output.receipts })
    }

    /// Discards every transaction added so far and the builder's checkpoint.
    pub fn revert(mut self) -> ExecutorResult<()> {
        self.ensure_open()?;
        let checkpoint = self.checkpoint.take().expect("checked by ensure_open");
        self.state.revert(checkpoint)?;
        Ok(())
    }

    fn ensure_open(&self) -> ExecutorResult<()> {
        if self.checkpoint.is_none() {
            return Err(ExecutorError::BuilderClosed);
        }
        Ok(())
    }
}

impl<'s, I, C: StateCommitter> Drop for BlockBuilder<'s, I, C> {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            let _ = self.state.revert(checkpoint);
        }
    }
}
