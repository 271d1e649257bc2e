//! The engine shell (§4.8): construction, one-shot initialization, snapshot-copy, and the
//! entry points (`runTx`, `runBlock`, `runBlockchain`, `buildBlock`) the rest of the public API
//! hangs off of.
//!
//! Mirrors the role `kona-executor`'s `StatelessL2BlockExecutor`/`StatelessL2BlockExecutorBuilder`
//! pair plays for its crate: a builder assembles the concrete collaborators (chain parameters,
//! state store, interpreter, blockhash oracle) and a thin owning struct holds them for the
//! lifetime of a chain of calls, generalized here away from OP-Stack specifics and widened to
//! cover genesis materialization, precompile priming, and the busy/re-entrancy guard this crate's
//! concurrency model requires (§5).

use alloy_consensus::Header;
use alloy_primitives::{keccak256, Address, B256};
use execd_state::{JournalDb, StateCommitter};
use tracing::info;

use crate::{
    block_runner::{Block, BlockOutput, BlockRunner, RunBlockOpts},
    builder::BlockBuilder,
    driver::{BlockStore, BlockchainDriver},
    env::{BlockContext, BlockHashOracle},
    errors::{ExecutorError, ExecutorResult},
    events::EventSink,
    genesis::GenesisSpec,
    interpreter::Interpreter,
    precompile::prime_precompiles,
    receipt::Receipt,
    ruleset::{ChainParams, RuleSetOracle},
    tx_runner::{RecoveredTx, TransactionRunner},
};

/// Version byte mixed into [`Engine::commitment`], analogous to `kona-executor`'s
/// `OUTPUT_ROOT_VERSION`. Bumped only if the commitment's byte layout changes.
pub const COMMITMENT_VERSION: u8 = 0;

/// A re-entrancy guard backing the [`ExecutorError::EngineBusy`] contract (§5): every mutating
/// public method on [`Engine`] takes one of these for its duration. Reset on every exit path,
/// including early returns via `?`, because `Drop` runs regardless of how the guarded scope ends.
struct BusyGuard<'a> {
    busy: &'a mut bool,
}

impl<'a> BusyGuard<'a> {
    fn enter(busy: &'a mut bool) -> ExecutorResult<Self> {
        if *busy {
            return Err(ExecutorError::EngineBusy);
        }
        *busy = true;
        Ok(Self { busy })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.busy = false;
    }
}

/// Builds an [`Engine`] (§4.8, §6 "Option surface"). Mirrors `kona-executor`'s
/// `StatelessL2BlockExecutorBuilder` (`with_*` methods consuming and returning `Self`, a terminal
/// `build()`), generalized to this crate's option surface.
#[derive(Debug)]
pub struct EngineBuilder<I, C, O> {
    chain_params: Option<ChainParams>,
    state: Option<JournalDb<C>>,
    interpreter: Option<I>,
    blockhash_oracle: Option<O>,
    activate_precompiles: bool,
    activate_genesis_state: bool,
    genesis: GenesisSpec,
    debug: Option<bool>,
    legacy_keys: Vec<&'static str>,
}

impl<I, C, O> Default for EngineBuilder<I, C, O> {
    fn default() -> Self {
        Self {
            chain_params: None,
            state: None,
            interpreter: None,
            blockhash_oracle: None,
            activate_precompiles: false,
            activate_genesis_state: false,
            genesis: GenesisSpec::empty(),
            debug: None,
            legacy_keys: Vec::new(),
        }
    }
}

impl<I, C, O> EngineBuilder<I, C, O> {
    /// An empty builder with every option at its §6-documented default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chain-parameters contract (`common`, §6) the rule-set oracle resolves against.
    pub fn with_chain_params(mut self, chain_params: ChainParams) -> Self {
        self.chain_params = Some(chain_params);
        self
    }

    /// Supplies an external state store (`stateManager`, §6). Disables genesis materialization
    /// and precompile priming regardless of the corresponding flags: an externally-supplied store
    /// is assumed to already reflect whatever state the caller wants the engine to start from.
    pub fn with_state_manager(mut self, state: JournalDb<C>) -> Self {
        self.state = Some(state);
        self
    }

    /// Overrides the default interpreter (`evm`, §6).
    pub fn with_interpreter(mut self, interpreter: I) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    /// Overrides the default blockhash oracle (part of `eei`, §6).
    pub fn with_blockhash_oracle(mut self, oracle: O) -> Self {
        self.blockhash_oracle = Some(oracle);
        self
    }

    /// Enables precompile priming (`activatePrecompiles`, §6), a no-op if an external state
    /// manager was supplied.
    pub const fn with_activate_precompiles(mut self, enabled: bool) -> Self {
        self.activate_precompiles = enabled;
        self
    }

    /// Enables genesis materialization (`activateGenesisState`, §6) from the given allocation, a
    /// no-op if an external state manager was supplied.
    pub fn with_activate_genesis_state(mut self, genesis: GenesisSpec) -> Self {
        self.activate_genesis_state = true;
        self.genesis = genesis;
        self
    }

    /// Sets the debug/trace flag explicitly, overriding the process-environment `DEBUG` fallback
    /// that [`Self::build`] otherwise applies (§9 "Global config singleton").
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Records a legacy/removed option key so [`Self::build`] rejects it with
    /// [`ExecutorError::LegacyOptionRejected`]. For embedders migrating a deserialized pre-1.0
    /// option bag rather than calling the typed `with_*` methods directly; normal construction
    /// never needs to call this.
    pub fn with_legacy_option(mut self, key: &'static str) -> Self {
        self.legacy_keys.push(key);
        self
    }

    /// Builds the [`Engine`]. Chain parameters are mandatory; the interpreter, state store, and
    /// blockhash oracle each fall back to their concrete defaults (§9: "defaults are a concrete
    /// pair built at construction") when not overridden.
    pub fn build(self) -> ExecutorResult<Engine<I, C, O>>
    where
        I: Interpreter<C, O> + Default,
        C: StateCommitter + Default,
        O: BlockHashOracle + Default,
    {
        if let Some(key) = self.legacy_keys.first() {
            return Err(ExecutorError::LegacyOptionRejected(key));
        }

        let chain_params = self
            .chain_params
            .ok_or(ExecutorError::UnsupportedRuleSet("no chain parameters configured"))?;

        let external_state = self.state.is_some();
        let state = self.state.unwrap_or_else(|| JournalDb::new(C::default()));
        let interpreter = self.interpreter.unwrap_or_default();
        let blockhash_oracle = self.blockhash_oracle.unwrap_or_default();
        let debug = self.debug.unwrap_or_else(|| std::env::var("DEBUG").is_ok());

        Ok(Engine {
            state,
            chain_params,
            blockhash_oracle,
            block_runner: BlockRunner::new(TransactionRunner::new(interpreter)),
            initialized: false,
            external_state,
            activate_precompiles: self.activate_precompiles,
            activate_genesis_state: self.activate_genesis_state,
            genesis: self.genesis,
            debug,
            busy: false,
        })
    }
}

/// The engine shell (§4.8): owns the state store, chain parameters, blockhash oracle, and the
/// block runner built on top of them, and is the type every public execution entry point hangs
/// off of.
#[derive(Debug)]
pub struct Engine<I, C, O> {
    state: JournalDb<C>,
    chain_params: ChainParams,
    blockhash_oracle: O,
    block_runner: BlockRunner<I>,
    initialized: bool,
    external_state: bool,
    activate_precompiles: bool,
    activate_genesis_state: bool,
    genesis: GenesisSpec,
    debug: bool,
    busy: bool,
}

impl<I, C, O> Engine<I, C, O> {
    /// Starts a new [`EngineBuilder`].
    pub fn builder() -> EngineBuilder<I, C, O> {
        EngineBuilder::new()
    }

    /// Whether [`Self::initialize`] has run.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the engine's debug/trace flag (driving `step` events) is set.
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// The configured chain parameters.
    pub const fn chain_params(&self) -> &ChainParams {
        &self.chain_params
    }

    /// A read-only view over the engine's state store.
    pub const fn state(&self) -> &JournalDb<C> {
        &self.state
    }
}

impl<I, C: StateCommitter, O> Engine<I, C, O> {
    /// One-shot, idempotent initialization (§4.8): materializes genesis state and/or primes
    /// precompile accounts, unless an external state manager was supplied at construction (in
    /// which case both are skipped — the caller's store is assumed already initialized). Must run
    /// before any execution method; those methods return [`ExecutorError::EngineNotInitialized`]
    /// until this has completed at least once.
    pub fn initialize(&mut self) -> ExecutorResult<()> {
        if self.initialized {
            return Ok(());
        }
        if !self.external_state {
            if self.activate_genesis_state {
                self.genesis.materialize(&mut self.state);
            }
            if self.activate_precompiles {
                prime_precompiles(&mut self.state);
            }
        }
        self.initialized = true;
        info!(target: "execd_executor", "engine initialized");
        Ok(())
    }

    /// Computes a single digest over the engine's current committed state root and a
    /// caller-supplied parent/block hash (§10.5 "Output-root-style commitments"), for embedders
    /// that need one hash to attest to the current chain tip rather than comparing roots
    /// field-by-field. Generalizes `kona-executor::compute_output_root`'s
    /// `keccak256(version_byte .. payload)` construction away from its L2-to-L1 message-passer
    /// storage root, since this crate has no analogous bridge concept.
    pub fn commitment(&self, parent_hash: B256) -> ExecutorResult<B256> {
        let state_root = self.state.state_root()?;
        let mut raw = [0u8; 96];
        raw[31] = COMMITMENT_VERSION;
        raw[32..64].copy_from_slice(state_root.as_slice());
        raw[64..96].copy_from_slice(parent_hash.as_slice());
        Ok(keccak256(raw))
    }
}

impl<I: Clone, C: Clone, O: Clone> Engine<I, C, O> {
    /// Returns a new engine bound to a clone of this one's state store and chain parameters:
    /// independent mutability from this point forward, but identical roots at the moment of the
    /// copy (§4.8 `copy()`, §8 invariant 8). The block store (§6) is intentionally not owned by
    /// `Engine` — callers pass one explicitly to [`Self::run_blockchain`] — so nothing here needs
    /// duplicating for it; an embedder that wants two independent chains should clone its own
    /// store the same way.
    pub fn copy(&self) -> Self {
        Self {
            state: self.state.clone(),
            chain_params: self.chain_params.clone(),
            blockhash_oracle: self.blockhash_oracle.clone(),
            block_runner: self.block_runner.clone(),
            initialized: self.initialized,
            external_state: self.external_state,
            activate_precompiles: self.activate_precompiles,
            activate_genesis_state: self.activate_genesis_state,
            genesis: self.genesis.clone(),
            debug: self.debug,
            busy: false,
        }
    }
}

impl<I, C, O> Engine<I, C, O>
where
    I: Interpreter<C, O>,
    C: StateCommitter,
    O: BlockHashOracle,
{
    /// Runs a single transaction (§4.4), firing `beforeTx`/`afterTx` events around it.
    pub fn run_tx(
        &mut self,
        tx: &RecoveredTx,
        block: &BlockContext,
        cumulative_gas_used: u64,
        block_gas_limit: u64,
        events: &mut impl EventSink,
    ) -> ExecutorResult<Receipt> {
        let _guard = BusyGuard::enter(&mut self.busy)?;
        if !self.initialized {
            return Err(ExecutorError::EngineNotInitialized);
        }
        let (ruleset, amendments) = RuleSetOracle.resolve(&self.chain_params, block.number, None)?;

        events.before_tx(tx.sender);
        let result = self.block_runner.tx_runner().run_tx(
            &mut self.state,
            block,
            &self.blockhash_oracle,
            ruleset,
            amendments,
            tx,
            cumulative_gas_used,
            block_gas_limit,
        );
        events.after_tx(tx.sender, result.as_ref().map(|r| r.success).unwrap_or(false));
        result
    }

    /// Runs a whole block (§4.5), firing `beforeBlock`/`afterBlock` events around it.
    pub fn run_block(
        &mut self,
        block: Block,
        parent: Option<&Header>,
        opts: RunBlockOpts,
        events: &mut impl EventSink,
    ) -> ExecutorResult<BlockOutput> {
        let _guard = BusyGuard::enter(&mut self.busy)?;
        if !self.initialized {
            return Err(ExecutorError::EngineNotInitialized);
        }
        let number = block.header.number;
        events.before_block(number);
        let result =
            self.block_runner.run_block(&mut self.state, &self.chain_params, &self.blockhash_oracle, parent, block, opts);
        events.after_block(number, result.is_ok());
        result
    }

    /// Imports a linear run of blocks from `store` (§4.6).
    pub fn run_blockchain(
        &mut self,
        store: &mut impl BlockStore,
        max_blocks: Option<u64>,
        events: &mut impl EventSink,
    ) -> ExecutorResult<Vec<BlockOutput>>
    where
        I: Copy,
    {
        let _guard = BusyGuard::enter(&mut self.busy)?;
        if !self.initialized {
            return Err(ExecutorError::EngineNotInitialized);
        }
        let driver = BlockchainDriver::new(self.block_runner);
        driver.run(&mut self.state, &self.chain_params, &self.blockhash_oracle, store, max_blocks, events)
    }

    /// Opens a [`BlockBuilder`] assembling a new block on top of `parent` (§4.7).
    #[allow(clippy::too_many_arguments)]
    pub fn build_block(
        &mut self,
        parent: &Header,
        coinbase: Address,
        timestamp: u64,
        gas_limit: u64,
    ) -> ExecutorResult<BlockBuilder<'_, I, C>>
    where
        I: Copy,
    {
        if self.busy {
            return Err(ExecutorError::EngineBusy);
        }
        if !self.initialized {
            return Err(ExecutorError::EngineNotInitialized);
        }
        Ok(BlockBuilder::new(&mut self.state, self.block_runner, self.chain_params.clone(), parent, coinbase, timestamp, gas_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        env::NoopBlockHashOracle,
        events::NoopEventSink,
        interpreter::RevmInterpreter,
        ruleset::{Activation, RuleSetId},
    };
    use execd_state::NoopStateCommitter;

    fn chain_params() -> ChainParams {
        ChainParams::new(
            vec![Activation { ruleset: RuleSetId::London, block: 0, total_difficulty: None }],
            vec![RuleSetId::London],
        )
    }

    type TestEngine = Engine<RevmInterpreter<NoopStateCommitter, NoopBlockHashOracle>, NoopStateCommitter, NoopBlockHashOracle>;

    fn new_engine() -> TestEngine {
        Engine::builder().with_chain_params(chain_params()).build().unwrap()
    }

    #[test]
    fn test_build_requires_chain_params() {
        let err = EngineBuilder::<
            RevmInterpreter<NoopStateCommitter, NoopBlockHashOracle>,
            NoopStateCommitter,
            NoopBlockHashOracle,
        >::new()
        .build()
        .unwrap_err();
        assert!(matches!(err, ExecutorError::UnsupportedRuleSet(_)));
    }

    #[test]
    fn test_build_rejects_legacy_option() {
        let err = EngineBuilder::<
            RevmInterpreter<NoopStateCommitter, NoopBlockHashOracle>,
            NoopStateCommitter,
            NoopBlockHashOracle,
        >::new()
        .with_chain_params(chain_params())
        .with_legacy_option("vm")
        .build()
        .unwrap_err();
        assert!(matches!(err, ExecutorError::LegacyOptionRejected("vm")));
    }

    #[test]
    fn test_execution_before_initialize_is_rejected() {
        let mut engine = new_engine();
        let mut events = NoopEventSink;
        let block = BlockContext {
            coinbase: Address::ZERO,
            timestamp: 0,
            base_fee: None,
            prev_randao: B256::ZERO,
            chain_id: 1,
            number: 0,
            gas_limit: 30_000_000,
        };
        let tx = RecoveredTx {
            tx: alloy_consensus::TxEnvelope::Legacy(
                alloy_consensus::TxLegacy {
                    chain_id: None,
                    nonce: 0,
                    gas_price: 0,
                    gas_limit: 21_000,
                    to: alloy_primitives::TxKind::Call(Address::ZERO),
                    value: alloy_primitives::U256::ZERO,
                    input: Default::default(),
                }
                .into_signed(alloy_primitives::Signature::test_signature()),
            ),
            sender: Address::ZERO,
        };
        let err = engine.run_tx(&tx, &block, 0, 30_000_000, &mut events).unwrap_err();
        assert!(matches!(err, ExecutorError::EngineNotInitialized));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut engine = new_engine();
        engine.initialize().unwrap();
        assert!(engine.is_initialized());
        engine.initialize().unwrap();
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_genesis_and_precompiles_skipped_with_external_state_manager() {
        let mut external = JournalDb::new(NoopStateCommitter);
        let addr = Address::repeat_byte(0xAB);
        external.put_account(addr, execd_state::Account { nonce: 3, ..execd_state::Account::empty() });

        let mut engine: TestEngine = Engine::builder()
            .with_chain_params(chain_params())
            .with_state_manager(external)
            .with_activate_precompiles(true)
            .with_activate_genesis_state(GenesisSpec::empty())
            .build()
            .unwrap();
        engine.initialize().unwrap();

        // The externally-supplied account survives untouched...
        assert_eq!(engine.state().get_account(addr).nonce, 3);
        // ...and precompiles were never primed, since an external state manager was supplied.
        assert!(!engine.state().account_exists(Address::with_last_byte(1)));
    }

    #[test]
    fn test_copy_yields_independent_but_identical_state() {
        let mut engine = new_engine();
        engine.initialize().unwrap();
        let addr = Address::repeat_byte(0xCD);
        engine.state.put_account(addr, execd_state::Account { nonce: 3, ..execd_state::Account::empty() });

        let mut replica = engine.copy();
        assert_eq!(engine.state().get_account(addr).nonce, replica.state().get_account(addr).nonce);

        // Mutating the original after the copy must not leak into the replica.
        engine.state.put_account(addr, execd_state::Account { nonce: 9, ..execd_state::Account::empty() });
        assert_eq!(replica.state().get_account(addr).nonce, 3);

        // Mutating the replica must not affect the original.
        replica.initialize().unwrap();
        assert!(engine.is_initialized());
        assert!(replica.is_initialized());
    }

    #[test]
    fn test_commitment_changes_when_state_root_changes() {
        let mut engine = new_engine();
        engine.initialize().unwrap();
        let parent_hash = B256::repeat_byte(0x11);
        let before = engine.commitment(parent_hash).unwrap();
        let after = engine.commitment(B256::repeat_byte(0x22)).unwrap();
        assert_ne!(before, after);
    }
}
