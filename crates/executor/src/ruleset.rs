//! The rule-set oracle (§4.1): a pure function from (block number, optional total difficulty,
//! configured activation list) to a rule-set version tag and its active protocol amendments.

use alloy_primitives::U256;
use tracing::debug;

use crate::{
    constants::{REFUND_QUOTIENT, REFUND_QUOTIENT_LEGACY},
    errors::{ExecutorError, ExecutorResult},
};

/// A named protocol rule-set version, in activation order. Named after the mainnet Ethereum
/// hardforks whose amendments they bundle, since the engine is not OP-Stack-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum RuleSetId {
    Frontier,
    SpuriousDragon,
    Byzantium,
    Istanbul,
    Berlin,
    London,
    Shanghai,
    Cancun,
}

impl RuleSetId {
    /// All tags this build knows about, oldest first.
    pub const ALL: [Self; 8] = [
        Self::Frontier,
        Self::SpuriousDragon,
        Self::Byzantium,
        Self::Istanbul,
        Self::Berlin,
        Self::London,
        Self::Shanghai,
        Self::Cancun,
    ];

    /// A short, stable name for error messages and logging.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Frontier => "frontier",
            Self::SpuriousDragon => "spurious-dragon",
            Self::Byzantium => "byzantium",
            Self::Istanbul => "istanbul",
            Self::Berlin => "berlin",
            Self::London => "london",
            Self::Shanghai => "shanghai",
            Self::Cancun => "cancun",
        }
    }

    /// The protocol amendments bundled into this rule-set version.
    pub const fn amendments(self) -> Amendments {
        Amendments {
            empty_account_cleanup: self as u8 >= Self::SpuriousDragon as u8,
            access_lists: self as u8 >= Self::Berlin as u8,
            fee_market: self as u8 >= Self::London as u8,
            cheap_calldata: self as u8 >= Self::Istanbul as u8,
            refund_quotient: if self as u8 >= Self::London as u8 {
                REFUND_QUOTIENT
            } else {
                REFUND_QUOTIENT_LEGACY
            },
            warm_coinbase: self as u8 >= Self::Shanghai as u8,
            initcode_metering: self as u8 >= Self::Shanghai as u8,
            transient_storage: self as u8 >= Self::Cancun as u8,
        }
    }
}

/// The set of protocol amendments active under a given [`RuleSetId`], pre-computed so callers
/// never re-derive them from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amendments {
    /// EIP-161: empty accounts touched during execution are pruned.
    pub empty_account_cleanup: bool,
    /// EIP-2929/2930: warm/cold access-list gas accounting and `accessList` transactions.
    pub access_lists: bool,
    /// EIP-1559: fee-market (base fee + priority fee) gas pricing.
    pub fee_market: bool,
    /// EIP-2028: non-zero calldata bytes cost 16 gas instead of 68.
    pub cheap_calldata: bool,
    /// The divisor applied to `gasUsed` when clamping the refund counter (EIP-3529 tightened
    /// this from 2 to 5 at London).
    pub refund_quotient: u64,
    /// EIP-3651: the coinbase address is pre-warmed at transaction start.
    pub warm_coinbase: bool,
    /// EIP-3860: initcode length is metered and capped.
    pub initcode_metering: bool,
    /// EIP-1153: transient storage opcodes and per-transaction scratch space.
    pub transient_storage: bool,
}

/// One configured activation point: a rule-set tag becomes active at `block`, and, if
/// `total_difficulty` is set, only once the chain's cumulative difficulty also reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// The rule-set tag that activates.
    pub ruleset: RuleSetId,
    /// The block number at which this tag activates.
    pub block: u64,
    /// An optional total-difficulty threshold that must also be reached.
    pub total_difficulty: Option<U256>,
}

/// The chain-parameters contract consumed by the rule-set oracle (§6): an ordered list of
/// rule-set activations plus the subset of [`RuleSetId`]s this engine build actually supports.
#[derive(Debug, Clone)]
pub struct ChainParams {
    activations: Vec<Activation>,
    supported: Vec<RuleSetId>,
    hardfork_by_block_number: bool,
    hardfork_by_td: Option<U256>,
}

impl ChainParams {
    /// Constructs chain parameters from an activation list (any order; sorted internally) and the
    /// set of rule-sets this build declares support for.
    pub fn new(activations: Vec<Activation>, supported: Vec<RuleSetId>) -> Self {
        let mut activations = activations;
        activations.sort_by_key(|a| a.block);
        Self { activations, supported, hardfork_by_block_number: false, hardfork_by_td: None }
    }

    /// Selects activation strictly by block number, rejecting any configured TD-based selector
    /// (§6 option surface: `hardforkByBlockNumber` and `hardforkByTD` are mutually exclusive).
    pub fn with_hardfork_by_block_number(mut self) -> ExecutorResult<Self> {
        if self.hardfork_by_td.is_some() {
            return Err(ExecutorError::ConflictingHardforkSelectors);
        }
        self.hardfork_by_block_number = true;
        Ok(self)
    }

    /// Selects activation by a fixed total-difficulty threshold, rejecting a conflicting
    /// block-number selector.
    pub fn with_hardfork_by_td(mut self, td: U256) -> ExecutorResult<Self> {
        if self.hardfork_by_block_number {
            return Err(ExecutorError::ConflictingHardforkSelectors);
        }
        self.hardfork_by_td = Some(td);
        Ok(self)
    }
}

/// A pure function from (block number, optional total difficulty, chain parameters) to the active
/// [`RuleSetId`] and its [`Amendments`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSetOracle;

impl RuleSetOracle {
    /// Resolves the rule-set active at `block_number` (and, when configured, `total_difficulty`).
    ///
    /// When both a block-number and a TD threshold are configured for different tags and a query
    /// satisfies both, the block-number-activated tag wins (§4.1).
    pub fn resolve(
        &self,
        params: &ChainParams,
        block_number: u64,
        total_difficulty: Option<U256>,
    ) -> ExecutorResult<(RuleSetId, Amendments)> {
        let mut resolved: Option<RuleSetId> = None;
        for activation in &params.activations {
            let block_satisfied = block_number >= activation.block;
            let td_satisfied = match (activation.total_difficulty, total_difficulty) {
                (Some(threshold), Some(td)) => td >= threshold,
                (Some(_), None) => false,
                (None, _) => true,
            };
            if block_satisfied && (activation.total_difficulty.is_none() || td_satisfied) {
                resolved = Some(activation.ruleset);
            }
        }

        let ruleset = resolved.ok_or(ExecutorError::UnsupportedRuleSet("no activation matched"))?;
        if !params.supported.contains(&ruleset) {
            return Err(ExecutorError::UnsupportedRuleSet(ruleset.name()));
        }

        debug!(target: "execd_executor", ruleset = ruleset.name(), block_number, "resolved rule-set");
        Ok((ruleset, ruleset.amendments()))
    }
}
