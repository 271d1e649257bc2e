//! Protocol constants for the executor.

use alloy_primitives::{address, Address};

/// Hard limit on call/create nesting depth (§3: "Depth is bounded").
pub const MAX_CALL_DEPTH: usize = 1024;

/// Gas charged for a non-creation transaction before the first opcode executes.
pub(crate) const TX_BASE_GAS: u64 = 21_000;

/// Additional intrinsic gas charged for a contract-creation transaction.
pub(crate) const TX_CREATE_GAS: u64 = 32_000;

/// Per-byte intrinsic gas for a zero byte of calldata.
pub(crate) const TX_DATA_ZERO_GAS: u64 = 4;

/// Per-byte intrinsic gas for a non-zero byte of calldata, under the amendment that reduced it
/// from 68 to 16 (Istanbul, EIP-2028).
pub(crate) const TX_DATA_NONZERO_GAS: u64 = 16;

/// Per-byte intrinsic gas for a non-zero byte of calldata, pre-Istanbul.
pub(crate) const TX_DATA_NONZERO_GAS_LEGACY: u64 = 68;

/// Per-word intrinsic gas charged against init code length (EIP-3860).
pub(crate) const INITCODE_WORD_GAS: u64 = 2;

/// Intrinsic gas charged per address in an access list (EIP-2930).
pub(crate) const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;

/// Intrinsic gas charged per storage key in an access list (EIP-2930).
pub(crate) const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// Refund quotient applied before London (EIP-3529 tightened this from 2 to 5).
pub(crate) const REFUND_QUOTIENT_LEGACY: u64 = 2;

/// Refund quotient applied from London onward.
pub(crate) const REFUND_QUOTIENT: u64 = 5;

/// The canonical addresses of the built-in precompiled contracts (1 through 9), primed with a
/// nonzero balance at genesis so that the first call into one is not charged new-account gas.
pub(crate) const PRECOMPILE_ADDRESSES: [Address; 9] = [
    address!("0000000000000000000000000000000000000001"),
    address!("0000000000000000000000000000000000000002"),
    address!("0000000000000000000000000000000000000003"),
    address!("0000000000000000000000000000000000000004"),
    address!("0000000000000000000000000000000000000005"),
    address!("0000000000000000000000000000000000000006"),
    address!("0000000000000000000000000000000000000007"),
    address!("0000000000000000000000000000000000000008"),
    address!("0000000000000000000000000000000000000009"),
];
