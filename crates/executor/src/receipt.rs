//! The [`Receipt`] type produced by the transaction runner.

use alloy_primitives::{Bloom, Log};

/// A single transaction's receipt (§3: "Receipt").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// `true` iff the transaction's message executed successfully.
    pub success: bool,
    /// Gas used by this transaction plus every transaction before it in the block.
    pub cumulative_gas_used: u64,
    /// Bloom filter over this receipt's own logs.
    pub logs_bloom: Bloom,
    /// Logs emitted by the transaction (empty unless `success`).
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Builds a receipt from the transaction runner's outcome, computing its own logs bloom.
    pub fn new(success: bool, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        let logs_bloom = alloy_primitives::logs_bloom(logs.iter());
        Self { success, cumulative_gas_used, logs_bloom, logs }
    }
}
