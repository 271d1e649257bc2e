//! Errors for the `execd-executor` crate.

use execd_state::StateError;
use revm::primitives::EVMError;

/// The error type for every public operation on [crate::Engine] and its collaborators.
#[derive(derive_more::Display, Debug)]
pub enum ExecutorError {
    // -- Configuration --------------------------------------------------------------------
    /// The resolved rule-set tag is outside the engine's declared support list.
    #[display("unsupported rule-set: {_0}")]
    UnsupportedRuleSet(&'static str),
    /// A protocol amendment was requested that this build does not implement.
    #[display("unsupported amendment: {_0}")]
    UnsupportedAmendment(&'static str),
    /// Both block-number and total-difficulty hardfork selectors were supplied at construction.
    #[display("conflicting hardfork selectors: specify activation by block number or by total difficulty, not both")]
    ConflictingHardforkSelectors,
    /// A legacy/removed option key was passed to the engine builder.
    #[display("legacy option rejected: {_0}")]
    LegacyOptionRejected(&'static str),
    /// An execution method was called before [`crate::Engine::initialize`].
    #[display("engine not initialized: call Engine::initialize() first")]
    EngineNotInitialized,

    // -- Validation (pre-execution, no state change) --------------------------------------
    /// `sender.nonce != tx.nonce`.
    #[display("nonce mismatch: account has {account_nonce}, transaction specifies {tx_nonce}")]
    NonceMismatch { account_nonce: u64, tx_nonce: u64 },
    /// `sender.balance < tx.gasLimit * effectiveGasPrice + tx.value`.
    #[display("insufficient funds: sender has {have}, transaction requires {need}")]
    InsufficientFunds { have: alloy_primitives::U256, need: alloy_primitives::U256 },
    /// `tx.gasLimit < intrinsicGas`.
    #[display("intrinsic gas too low: gas limit {gas_limit}, intrinsic cost {intrinsic}")]
    IntrinsicGasTooLow { gas_limit: u64, intrinsic: u64 },
    /// `tx.gasLimit > block.gasLimit - cumulativeGasUsed`.
    #[display("block gas limit exceeded")]
    BlockGasLimitExceeded,
    /// The active rule-set does not enable this transaction type.
    #[display("unsupported transaction type: {_0}")]
    UnsupportedTxType(u8),
    /// Signature recovery failed.
    #[display("bad signature: {_0}")]
    BadSignature(alloy_primitives::SignatureError),
    /// Transaction's chain id does not match the engine's configured chain id.
    #[display("wrong chain id: expected {expected}, got {got}")]
    WrongChainId { expected: u64, got: u64 },
    /// `maxFee < baseFee` under the fee-market amendment.
    #[display("fee cap below base fee: max fee {max_fee}, base fee {base_fee}")]
    FeeCapBelowBaseFee { max_fee: u128, base_fee: u128 },

    // -- Block-level ------------------------------------------------------------------------
    /// `block.header.parentHash != parent.hash()`.
    #[display("parent hash mismatch")]
    ParentHashMismatch,
    /// `block.header.timestamp <= parent.timestamp`.
    #[display("block timestamp does not strictly increase over its parent")]
    TimestampNonMonotonic,
    /// Block gas limit moved outside the parent-relative adjustment band.
    #[display("block gas limit out of band: {_0}")]
    GasLimitOutOfBand(u64),
    /// Computed base fee does not match the header's declared base fee.
    #[display("base fee mismatch: computed {computed}, header declares {declared}")]
    BaseFeeMismatch { computed: u128, declared: u128 },
    /// Computed state root does not match the header's declared state root.
    #[display("state root mismatch: computed {computed}, header declares {declared}")]
    StateRootMismatch { computed: alloy_primitives::B256, declared: alloy_primitives::B256 },
    /// Computed receipt root does not match the header's declared receipts root.
    #[display("receipt root mismatch: computed {computed}, header declares {declared}")]
    ReceiptRootMismatch { computed: alloy_primitives::B256, declared: alloy_primitives::B256 },
    /// Computed transactions root does not match the header's declared transactions root.
    #[display("transactions root mismatch: computed {computed}, header declares {declared}")]
    TransactionsRootMismatch { computed: alloy_primitives::B256, declared: alloy_primitives::B256 },
    /// Computed gas used does not match the header's declared gas used.
    #[display("gas used mismatch: computed {computed}, header declares {declared}")]
    GasUsedMismatch { computed: u64, declared: u64 },
    /// Computed logs bloom does not match the header's declared logs bloom.
    #[display("logs bloom mismatch")]
    LogsBloomMismatch,

    // -- Runtime (from the interpreter, normal failure) ------------------------------------
    /// The interpreter reverted; return data is preserved on the receipt's message result.
    #[display("reverted")]
    Revert,
    /// The interpreter halted exceptionally; all gas is consumed.
    #[display("exceptional halt: {_0}")]
    ExceptionalHalt(&'static str),

    // -- Invariant (bug or corruption); callers should treat the engine as poisoned -------
    /// The state journal underflowed (commit/revert with no matching open checkpoint).
    #[display("journal underflow: {_0}")]
    JournalUnderflow(StateError),
    /// A mutating call was attempted while another was already in flight on the same engine.
    #[display("engine busy: a mutating operation is already in progress")]
    EngineBusy,
    /// `addTransaction` was called on a block builder that already received its terminal call.
    #[display("builder closed: build() or revert() has already been called")]
    BuilderClosed,

    /// A lower-level state-store error that doesn't fit a more specific variant above.
    #[display("state error: {_0}")]
    State(StateError),
    /// The underlying interpreter (revm) reported an error outside the taxonomy above (e.g. a
    /// malformed environment it could not execute at all).
    #[display("interpreter error: {_0}")]
    Interpreter(String),
}

impl From<StateError> for ExecutorError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::JournalUnderflow => Self::JournalUnderflow(err),
            other => Self::State(other),
        }
    }
}

impl<DBError: core::fmt::Debug> From<EVMError<DBError>> for ExecutorError {
    fn from(err: EVMError<DBError>) -> Self {
        Self::Interpreter(alloc_string(err))
    }
}

fn alloc_string(err: impl core::fmt::Debug) -> String {
    format!("{err:?}")
}

impl core::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::State(err) => Some(err),
            Self::JournalUnderflow(err) => Some(err),
            _ => None,
        }
    }
}

/// A [`Result`] type for the [`ExecutorError`] enum.
pub type ExecutorResult<T> = Result<T, ExecutorError>;
