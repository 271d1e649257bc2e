//! The interpreter contract (§6) and its default, `revm`-backed implementation.
//!
//! The interpreter is treated as an external collaborator: this crate never re-implements opcode
//! dispatch, the gas table, or memory-expansion arithmetic. [`RevmInterpreter`] adapts a single
//! top-level [`Message`] into a `revm` transaction and relays the result back through
//! [`MessageResult`].
//!
//! **Fee/nonce/refund/coinbase bundling.** `revm`'s public (legacy, pre-`Context`) API only
//! exposes transaction-granularity execution (`Evm::transact`): fee debit, the sender's nonce
//! increment, refund clamping, and the coinbase payment all happen inside that one call, alongside
//! the call/create tree itself, and cannot be separated out without re-implementing `revm`'s
//! transaction handler. This crate's resolution (mirrored from how `kona-executor` drives `revm`
//! with a single `transact_commit()` per transaction) is: the transaction runner performs its own
//! pre-execution validation (§4.4 steps 1-7) so the fast, richly-typed errors in §7 are raised
//! *before* `revm` ever runs, then hands the already-validated message to this interpreter, which
//! executes it through `revm` and applies `revm`'s returned state diff unconditionally. This is
//! safe because `revm` itself keeps the fee debit / nonce increment / coinbase payment outside the
//! part of its diff that gets unwound on `Revert`/`Halt` — so invariant 2 ("sender nonce advances
//! iff the tx is included") holds for the *whole* diff regardless of status, without this crate
//! needing to special-case it.

use alloy_primitives::{Address, Log as AlloyLog, B256, U256};
use execd_state::{JournalDb, StateCommitter};
use revm::{
    primitives::{
        AccountInfo, BlockEnv, Bytecode, CfgEnv, CfgEnvWithHandlerCfg, EnvWithHandlerCfg,
        ExecutionResult, HaltReason, ResultAndState, SpecId, TransactTo, TxEnv,
    },
    Evm,
};
use tracing::{debug, warn};

use crate::{
    env::{BlockContext, BlockHashOracle, Environment, BLOCKHASH_WINDOW},
    errors::ExecutorResult,
    message::{Message, MessageKind, MessageResult, MessageStatus},
    ruleset::RuleSetId,
};

/// A hook letting embedders splice additional handler behavior (custom precompiles, altered gas
/// rules) into the `revm` build used by [`RevmInterpreter`] — the generalized equivalent of
/// `kona-executor`'s `KonaHandleRegister`.
pub type HandleRegister<C, O> =
    for<'r> fn(&mut revm::handler::register::EvmHandler<'r, (), StateAdapter<'r, C, O>>);

/// The capability interface the rest of the engine depends on (§6: "Interpreter contract").
pub trait Interpreter<C: StateCommitter, O: BlockHashOracle> {
    /// Executes `message` against `env` under the given rule-set, applying its effects (including
    /// the fee debit, nonce increment, and coinbase payment bundled into a single `revm`
    /// transaction — see module docs) directly to `env.state`, and returns the outcome.
    fn execute_message(
        &self,
        env: &mut Environment<'_, C, O>,
        ruleset: RuleSetId,
        effective_gas_price: u128,
        message: &Message,
    ) -> ExecutorResult<MessageResult>;
}

/// The default [`Interpreter`], backed by `revm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevmInterpreter<C, O> {
    handle_register: Option<HandleRegister<C, O>>,
}

impl<C: StateCommitter, O: BlockHashOracle> RevmInterpreter<C, O> {
    /// An interpreter with no handle-register override.
    pub const fn new() -> Self {
        Self { handle_register: None }
    }

    /// Installs a [`HandleRegister`] to splice into every `revm` build this interpreter performs.
    pub const fn with_handle_register(mut self, register: HandleRegister<C, O>) -> Self {
        self.handle_register = Some(register);
        self
    }
}

/// A `revm::Database` adapter over the engine's own [`JournalDb`] and [`BlockHashOracle`].
///
/// Mirrors `kona-executor`'s `TrieDB` in role (the thing `revm` reads accounts/code/storage
/// through) but delegates every read straight to [`JournalDb`] rather than a Merkle-Patricia trie.
#[derive(Debug)]
pub struct StateAdapter<'a, C, O> {
    state: &'a mut JournalDb<C>,
    block: &'a BlockContext,
    blockhash_oracle: &'a O,
}

impl<'a, C: StateCommitter, O: BlockHashOracle> revm::Database for StateAdapter<'a, C, O> {
    type Error = core::convert::Infallible;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        if !self.state.account_exists(address) {
            return Ok(None);
        }
        let account = self.state.get_account(address);
        Ok(Some(AccountInfo {
            balance: account.balance,
            nonce: account.nonce,
            code_hash: account.code_hash,
            code: None,
        }))
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        Ok(self
            .state
            .get_code_by_hash(code_hash)
            .map(Bytecode::new_raw)
            .unwrap_or_default())
    }

    fn storage(&mut self, address: Address, index: U256) -> Result<U256, Self::Error> {
        Ok(self.state.get_contract_storage(address, index))
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        if number >= self.block.number || self.block.number - number > BLOCKHASH_WINDOW {
            return Ok(B256::ZERO);
        }
        Ok(self.blockhash_oracle.block_hash(number))
    }
}

fn spec_id(ruleset: RuleSetId) -> SpecId {
    match ruleset {
        RuleSetId::Frontier => SpecId::FRONTIER,
        RuleSetId::SpuriousDragon => SpecId::SPURIOUS_DRAGON,
        RuleSetId::Byzantium => SpecId::BYZANTIUM,
        RuleSetId::Istanbul => SpecId::ISTANBUL,
        RuleSetId::Berlin => SpecId::BERLIN,
        RuleSetId::London => SpecId::LONDON,
        RuleSetId::Shanghai => SpecId::SHANGHAI,
        RuleSetId::Cancun => SpecId::CANCUN,
    }
}

impl<C: StateCommitter, O: BlockHashOracle> Interpreter<C, O> for RevmInterpreter<C, O> {
    fn execute_message(
        &self,
        env: &mut Environment<'_, C, O>,
        ruleset: RuleSetId,
        effective_gas_price: u128,
        message: &Message,
    ) -> ExecutorResult<MessageResult> {
        let transact_to = match message.kind {
            MessageKind::Call(target) => TransactTo::Call(target),
            MessageKind::Create | MessageKind::Create2 { .. } => TransactTo::Create,
        };

        let tx_env = TxEnv {
            caller: message.caller,
            gas_limit: message.gas,
            gas_price: U256::from(effective_gas_price),
            transact_to,
            value: message.value,
            data: message.input.clone(),
            nonce: None,
            chain_id: Some(env.block.chain_id),
            ..Default::default()
        };

        let block_env = BlockEnv {
            number: U256::from(env.block.number),
            coinbase: env.block.coinbase,
            timestamp: U256::from(env.block.timestamp),
            basefee: U256::from(env.block.base_fee.unwrap_or_default()),
            difficulty: U256::ZERO,
            prevrandao: Some(env.block.prev_randao),
            gas_limit: U256::from(env.block.gas_limit),
            ..Default::default()
        };

        let mut cfg = CfgEnv::default();
        cfg.chain_id = env.block.chain_id;
        cfg.disable_block_gas_limit = true;
        let cfg = CfgEnvWithHandlerCfg::new(cfg, revm::primitives::HandlerCfg::new(spec_id(ruleset)));

        let adapter = StateAdapter { state: env.state, block: env.block, blockhash_oracle: env.blockhash_oracle };

        let mut builder = Evm::builder()
            .with_db(adapter)
            .with_env_with_handler_cfg(EnvWithHandlerCfg::new_with_cfg_env(cfg, block_env, tx_env));
        if let Some(register) = self.handle_register {
            builder = builder.append_handler_register(register);
        }
        let mut evm = builder.build();

        debug!(target: "execd_executor", caller = %message.caller, gas = message.gas, "invoking interpreter");
        let ResultAndState { result, state } = evm.transact().map_err(|err| {
            warn!(target: "execd_executor", "interpreter invocation failed: {err:?}");
            err
        })?;
        drop(evm);

        for (address, account) in state.iter() {
            if !account.is_touched() {
                continue;
            }
            if account.is_selfdestructed() {
                env.state.delete_account(*address);
                continue;
            }
            let info = &account.info;
            env.state.put_account(
                *address,
                execd_state::Account { nonce: info.nonce, balance: info.balance, code_hash: info.code_hash },
            );
            if let Some(code) = &info.code {
                if !code.is_empty() {
                    env.state.put_contract_code(*address, code.original_bytes());
                }
            }
            for (slot, value) in account.storage.iter() {
                if value.is_changed() {
                    env.state.put_contract_storage(*address, *slot, value.present_value);
                }
            }
        }

        let selfdestruct_set = state
            .iter()
            .filter(|(_, acct)| acct.is_selfdestructed())
            .map(|(addr, _)| *addr)
            .collect();

        Ok(match result {
            ExecutionResult::Success { gas_used, gas_refunded, logs, output, .. } => MessageResult {
                status: MessageStatus::Success,
                gas_left: message.gas.saturating_sub(gas_used),
                return_data: output.data().clone(),
                logs: logs.into_iter().map(|l| AlloyLog::new_unchecked(l.address, l.topics().to_vec(), l.data.data)).collect(),
                selfdestruct_set,
                refund_delta: gas_refunded as i64,
                created_address: output.address().copied(),
            },
            ExecutionResult::Revert { gas_used, output } => MessageResult {
                status: MessageStatus::Revert,
                gas_left: message.gas.saturating_sub(gas_used),
                return_data: output,
                logs: Vec::new(),
                selfdestruct_set,
                refund_delta: 0,
                created_address: None,
            },
            ExecutionResult::Halt { reason, gas_used } => {
                debug!(target: "execd_executor", ?reason, "interpreter halted exceptionally");
                let _: HaltReason = reason;
                MessageResult {
                    status: MessageStatus::ExceptionalHalt,
                    gas_left: message.gas.saturating_sub(gas_used),
                    return_data: Default::default(),
                    logs: Vec::new(),
                    selfdestruct_set,
                    refund_delta: 0,
                    created_address: None,
                }
            }
        })
    }
}
