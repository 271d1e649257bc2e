//! The environment facade (EEI, §4.3): the read-only block context plus blockhash lookup plus the
//! state interface plus transient storage, as a single handle passed to the interpreter.

use alloy_primitives::{Address, B256, U256};
use execd_state::{JournalDb, StateCommitter};

/// The window of recent block hashes the blockhash oracle is expected to serve (§4.3: "up to 256
/// recent block hashes").
pub const BLOCKHASH_WINDOW: u64 = 256;

/// Read-only block context visible to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    /// The address credited with priority fees (and, pre-fee-market, the full gas price).
    pub coinbase: Address,
    /// Block timestamp, seconds since the Unix epoch.
    pub timestamp: u64,
    /// Per-gas base fee, present once the fee-market amendment is active.
    pub base_fee: Option<u128>,
    /// `PREVRANDAO` / `DIFFICULTY` opcode value.
    pub prev_randao: B256,
    /// Chain id used for `CHAINID` and transaction signature validation.
    pub chain_id: u64,
    /// Block number.
    pub number: u64,
    /// Block gas limit.
    pub gas_limit: u64,
}

/// Supplies block hashes for the `BLOCKHASH` opcode and any blockhash-history amendment. Total:
/// callers outside the supported window get [`B256::ZERO`] rather than an error (§4.3).
pub trait BlockHashOracle {
    /// Returns the hash of `number`, or [`B256::ZERO`] if unknown/out of window.
    fn block_hash(&self, number: u64) -> B256;
}

/// A [`BlockHashOracle`] that never has any history. Useful for tests and embedders that don't
/// need `BLOCKHASH` to resolve to anything but zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBlockHashOracle;

impl BlockHashOracle for NoopBlockHashOracle {
    fn block_hash(&self, _number: u64) -> B256 {
        B256::ZERO
    }
}

/// The environment facade itself: everything the interpreter needs to execute a message, bundled
/// behind one borrow so the transaction runner can hand it off for the duration of a single
/// `executeMessage` call.
#[derive(Debug)]
pub struct Environment<'a, C, O> {
    /// The state interface (§4.2), including transient storage and warm/cold tracking.
    pub state: &'a mut JournalDb<C>,
    /// The current block's context.
    pub block: &'a BlockContext,
    /// The blockhash oracle.
    pub blockhash_oracle: &'a O,
}

impl<'a, C: StateCommitter, O: BlockHashOracle> Environment<'a, C, O> {
    /// Constructs a new environment facade borrowing the given state store, block context, and
    /// blockhash oracle for its lifetime.
    pub fn new(state: &'a mut JournalDb<C>, block: &'a BlockContext, blockhash_oracle: &'a O) -> Self {
        Self { state, block, blockhash_oracle }
    }

    /// Looks up the hash of block `number`, returning zero if it falls outside the supported
    /// window behind the current block.
    pub fn block_hash(&self, number: u64) -> B256 {
        if number >= self.block.number || self.block.number - number > BLOCKHASH_WINDOW {
            return B256::ZERO;
        }
        self.blockhash_oracle.block_hash(number)
    }

    /// The effective per-gas price the interpreter should use for `GASPRICE`-style queries:
    /// `base_fee` under the fee-market amendment, falling back to a caller-supplied legacy price
    /// otherwise. Transaction-level effective price computation (§4.4 step 6) lives in the
    /// transaction runner, not here; this is purely the environment's own notion of "current
    /// price" for opcode semantics.
    pub fn base_fee(&self) -> U256 {
        U256::from(self.block.base_fee.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execd_state::NoopStateCommitter;

    fn ctx(number: u64) -> BlockContext {
        BlockContext {
            coinbase: Address::ZERO,
            timestamp: 0,
            base_fee: Some(7),
            prev_randao: B256::ZERO,
            chain_id: 1,
            number,
            gas_limit: 30_000_000,
        }
    }

    #[test]
    fn test_block_hash_outside_window_is_zero() {
        let mut db = JournalDb::new(NoopStateCommitter);
        let block = ctx(500);
        let env = Environment::new(&mut db, &block, &NoopBlockHashOracle);
        assert_eq!(env.block_hash(500), B256::ZERO); // current block itself
        assert_eq!(env.block_hash(243), B256::ZERO); // 257 blocks back, outside window
        assert_eq!(env.block_hash(244), B256::ZERO); // in window, but oracle has no history
    }
}
