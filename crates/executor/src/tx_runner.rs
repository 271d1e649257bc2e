//! The transaction runner (§4.4): validates a transaction, charges gas, invokes the interpreter,
//! and assembles a receipt.

use alloy_consensus::{Transaction, TxEnvelope};
use alloy_primitives::{Address, U256};
use execd_state::{JournalDb, StateCommitter};
use tracing::{debug, warn};

use crate::{
    constants::{
        ACCESS_LIST_ADDRESS_GAS, ACCESS_LIST_STORAGE_KEY_GAS, INITCODE_WORD_GAS, PRECOMPILE_ADDRESSES,
        TX_BASE_GAS, TX_CREATE_GAS, TX_DATA_NONZERO_GAS, TX_DATA_NONZERO_GAS_LEGACY, TX_DATA_ZERO_GAS,
    },
    env::{BlockContext, BlockHashOracle, Environment},
    errors::{ExecutorError, ExecutorResult},
    interpreter::Interpreter,
    message::{Message, MessageKind, MessageStatus},
    receipt::Receipt,
    ruleset::{Amendments, RuleSetId},
};

/// A transaction paired with its already-recovered sender.
///
/// Signature recovery is treated as an upstream concern (performed once, by whatever decodes the
/// transaction off the wire or out of a block body) rather than re-derived here on every run.
#[derive(Debug, Clone)]
pub struct RecoveredTx {
    /// The transaction envelope (legacy, access-list, or fee-market).
    pub tx: TxEnvelope,
    /// The account that signed `tx`.
    pub sender: Address,
}

/// Runs individual transactions against a [`JournalDb`] via an [`Interpreter`] (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct TransactionRunner<I> {
    interpreter: I,
}

impl<I> TransactionRunner<I> {
    /// Wraps the given interpreter.
    pub const fn new(interpreter: I) -> Self {
        Self { interpreter }
    }
}

impl<I> TransactionRunner<I> {
    /// Computes the intrinsic gas cost of `tx` under `amendments` (§4.4 step 4).
    pub fn intrinsic_gas(tx: &TxEnvelope, amendments: Amendments) -> u64 {
        let mut gas = if tx.to().is_some() { TX_BASE_GAS } else { TX_BASE_GAS + TX_CREATE_GAS };

        let data = tx.input();
        let nonzero_gas = if amendments.cheap_calldata { TX_DATA_NONZERO_GAS } else { TX_DATA_NONZERO_GAS_LEGACY };
        let (zero, nonzero) = data.iter().fold((0u64, 0u64), |(z, nz), b| {
            if *b == 0 { (z + 1, nz) } else { (z, nz + 1) }
        });
        gas += zero * TX_DATA_ZERO_GAS + nonzero * nonzero_gas;

        if amendments.access_lists {
            if let Some(access_list) = tx.access_list() {
                for item in access_list.iter() {
                    gas += ACCESS_LIST_ADDRESS_GAS;
                    gas += item.storage_keys.len() as u64 * ACCESS_LIST_STORAGE_KEY_GAS;
                }
            }
        }

        if amendments.initcode_metering && tx.to().is_none() {
            let words = data.len().div_ceil(32) as u64;
            gas += words * INITCODE_WORD_GAS;
        }

        gas
    }

    /// Computes the effective per-gas price of `tx` given the active base fee (§4.4 step 6).
    pub fn effective_gas_price(tx: &TxEnvelope, base_fee: Option<u128>) -> ExecutorResult<u128> {
        match base_fee {
            Some(base_fee) => {
                let max_fee = tx.max_fee_per_gas();
                let priority_fee = tx.max_priority_fee_per_gas().unwrap_or(max_fee);
                if max_fee < base_fee {
                    return Err(ExecutorError::FeeCapBelowBaseFee { max_fee, base_fee });
                }
                Ok(base_fee + priority_fee.min(max_fee - base_fee))
            }
            None => Ok(tx.gas_price().unwrap_or_default()),
        }
    }
}

impl<I, C, O> TransactionRunner<I>
where
    I: Interpreter<C, O>,
    C: StateCommitter,
    O: BlockHashOracle,
{
    /// Runs `tx` against `state`, returning its receipt.
    ///
    /// `cumulative_gas_used` is the amount already used by prior transactions in the enclosing
    /// block; `block_gas_limit` bounds the total. Pre-execution validation never mutates state
    /// (§8 invariant 1); once a checkpoint is opened (after validation passes) it is always
    /// committed, because a transaction that reaches execution is by definition included (see
    /// the transaction-runner design note carried in this crate's docs).
    #[allow(clippy::too_many_arguments)]
    pub fn run_tx(
        &self,
        state: &mut JournalDb<C>,
        block: &BlockContext,
        blockhash_oracle: &O,
        ruleset: RuleSetId,
        amendments: Amendments,
        tx: &RecoveredTx,
        cumulative_gas_used: u64,
        block_gas_limit: u64,
    ) -> ExecutorResult<Receipt> {
        // -- Steps 1-7: pre-execution validation, no state mutation --------------------------
        if let Some(chain_id) = tx.tx.chain_id() {
            if chain_id != block.chain_id {
                return Err(ExecutorError::WrongChainId { expected: block.chain_id, got: chain_id });
            }
        }

        if tx.tx.gas_limit() > block_gas_limit.saturating_sub(cumulative_gas_used) {
            return Err(ExecutorError::BlockGasLimitExceeded);
        }

        let intrinsic = Self::intrinsic_gas(&tx.tx, amendments);
        if tx.tx.gas_limit() < intrinsic {
            return Err(ExecutorError::IntrinsicGasTooLow { gas_limit: tx.tx.gas_limit(), intrinsic });
        }

        let sender = state.get_account(tx.sender);
        if sender.nonce != tx.tx.nonce() {
            return Err(ExecutorError::NonceMismatch { account_nonce: sender.nonce, tx_nonce: tx.tx.nonce() });
        }

        let effective_gas_price = Self::effective_gas_price(&tx.tx, amendments.fee_market.then_some(block.base_fee.unwrap_or_default()))?;
        let upfront_cost = U256::from(tx.tx.gas_limit()) * U256::from(effective_gas_price) + tx.tx.value();
        if sender.balance < upfront_cost {
            return Err(ExecutorError::InsufficientFunds { have: sender.balance, need: upfront_cost });
        }

        debug!(
            target: "execd_executor",
            sender = %tx.sender,
            nonce = tx.tx.nonce(),
            gas_limit = tx.tx.gas_limit(),
            "running transaction",
        );

        // -- Execution: open the outer checkpoint, always committed from here on -------------
        state.begin_transaction();
        let checkpoint = state.checkpoint();

        self.pre_warm(state, tx, block);

        let message = Message {
            caller: tx.sender,
            kind: tx.tx.to().map_or(MessageKind::Create, MessageKind::Call),
            value: tx.tx.value(),
            input: tx.tx.input().clone(),
            // The full tx gas limit, not `gas_limit - intrinsic`: revm re-derives and charges
            // intrinsic gas itself against this same limit (see `interpreter.rs`'s `TxEnv`
            // construction), so handing it a pre-debited limit would double-charge intrinsic.
            gas: tx.tx.gas_limit(),
            depth: 0,
            is_static: false,
        };

        let mut env = Environment::new(state, block, blockhash_oracle);
        let result = match self.interpreter.execute_message(&mut env, ruleset, effective_gas_price, &message) {
            Ok(result) => result,
            Err(err) => {
                // A fatal interpreter error (e.g. a DB error surfaced through the EVM) never
                // produces a `MessageResult` to apply; unwind this transaction's own checkpoint
                // before propagating so the enclosing block-level checkpoint stays the innermost
                // open one.
                state.revert(checkpoint)?;
                return Err(err);
            }
        };

        // `result.gas_left` already reflects revm's own post-refund accounting (it clamps
        // `refund_delta` against its gas-used/quotient formula internally before reporting this),
        // so the gas actually charged to the sender is just `message.gas - result.gas_left` —
        // no separate refund reconstruction or intrinsic add-back needed.
        let gas_used = message.gas - result.gas_left;

        if amendments.empty_account_cleanup {
            for address in result.selfdestruct_set.iter().copied().chain(core::iter::once(tx.sender)) {
                if state.account_exists(address) && state.get_account(address).is_empty() {
                    state.delete_account(address);
                }
            }
        }

        state.commit(checkpoint)?;

        let success = matches!(result.status, MessageStatus::Success);
        if !success {
            warn!(target: "execd_executor", sender = %tx.sender, status = ?result.status, "transaction did not succeed");
        }

        Ok(Receipt::new(success, cumulative_gas_used + gas_used, if success { result.logs } else { Vec::new() }))
    }

    /// Pre-warms the access sets per §3: sender, target, coinbase (when the coinbase-warming
    /// amendment is on), every precompile address, and the transaction's own access list.
    fn pre_warm(&self, state: &mut JournalDb<impl StateCommitter>, tx: &RecoveredTx, block: &BlockContext) {
        state.warm_address(tx.sender);
        if let Some(to) = tx.tx.to() {
            state.warm_address(to);
        }
        for address in PRECOMPILE_ADDRESSES {
            state.warm_address(address);
        }
        state.warm_address(block.coinbase);
        if let Some(access_list) = tx.tx.access_list() {
            for item in access_list.iter() {
                state.warm_address(item.address);
                for key in &item.storage_keys {
                    state.warm_storage(item.address, U256::from_be_bytes(key.0));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::RuleSetId;

    #[test]
    fn test_intrinsic_gas_charges_create_premium() {
        let call = alloy_consensus::TxLegacy {
            chain_id: None,
            nonce: 0,
            gas_price: 0,
            gas_limit: 0,
            to: alloy_primitives::TxKind::Call(Address::ZERO),
            value: U256::ZERO,
            input: Default::default(),
        };
        let create = alloy_consensus::TxLegacy { to: alloy_primitives::TxKind::Create, ..call.clone() };
        let amendments = RuleSetId::London.amendments();
        let call_gas = TransactionRunner::<()>::intrinsic_gas(&TxEnvelope::Legacy(call.into_signed(alloy_primitives::Signature::test_signature())), amendments);
        let create_gas = TransactionRunner::<()>::intrinsic_gas(&TxEnvelope::Legacy(create.into_signed(alloy_primitives::Signature::test_signature())), amendments);
        assert_eq!(create_gas - call_gas, TX_CREATE_GAS);
    }

    #[test]
    fn test_effective_gas_price_clamps_priority_fee_to_max_minus_base() {
        let tx = alloy_consensus::TxEip1559 {
            chain_id: 1,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: 100,
            max_priority_fee_per_gas: 50,
            to: alloy_primitives::TxKind::Call(Address::ZERO),
            value: U256::ZERO,
            access_list: Default::default(),
            input: Default::default(),
        };
        let envelope = TxEnvelope::Eip1559(tx.into_signed(alloy_primitives::Signature::test_signature()));
        // base fee 80: priority component would want 50 but only 20 is available under max_fee.
        let price = TransactionRunner::<()>::effective_gas_price(&envelope, Some(80)).unwrap();
        assert_eq!(price, 100);
    }

    #[test]
    fn test_fee_cap_below_base_fee_is_rejected() {
        let tx = alloy_consensus::TxEip1559 {
            chain_id: 1,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: 10,
            max_priority_fee_per_gas: 1,
            to: alloy_primitives::TxKind::Call(Address::ZERO),
            value: U256::ZERO,
            access_list: Default::default(),
            input: Default::default(),
        };
        let envelope = TxEnvelope::Eip1559(tx.into_signed(alloy_primitives::Signature::test_signature()));
        assert!(matches!(
            TransactionRunner::<()>::effective_gas_price(&envelope, Some(20)).unwrap_err(),
            ExecutorError::FeeCapBelowBaseFee { .. }
        ));
    }
}
