//! The internal [`Message`] type passed to the interpreter, and its [`MessageResult`].

use alloy_primitives::{Address, Bytes, Log, B256, U256};
use revm::primitives::HashSet;

/// Whether a [`Message`] is a call into an existing account or the creation of a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A call (or transfer) into `target`.
    Call(Address),
    /// A `CREATE`-style contract creation; the address is computed from the caller and its nonce.
    Create,
    /// A `CREATE2`-style contract creation at a deterministic, salt-derived address.
    Create2 {
        /// The salt mixed into the address derivation.
        salt: B256,
    },
}

/// A single call or create frame submitted to the interpreter.
///
/// This is the engine's own representation, independent of the transaction envelope it was built
/// from — the top-level message for a transaction is built by the transaction runner; nested
/// messages arise only inside the interpreter's own call/create tree and never re-enter this
/// crate's public surface (§3: "Message (internal)").
#[derive(Debug, Clone)]
pub struct Message {
    /// The account initiating this message.
    pub caller: Address,
    /// Call or create, and the target/salt as applicable.
    pub kind: MessageKind,
    /// Native value transferred with the message.
    pub value: U256,
    /// Calldata (call) or init code (create).
    pub input: Bytes,
    /// Gas made available to this message.
    pub gas: u64,
    /// Nesting depth; bounded by [`crate::constants::MAX_CALL_DEPTH`].
    pub depth: usize,
    /// `true` for messages executed in a read-only (`STATICCALL`) context.
    pub is_static: bool,
}

/// The outcome of an interpreter invocation, consumed by the transaction runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    /// Execution completed and its effects should be retained.
    Success,
    /// Execution explicitly reverted; `return_data` carries the revert reason, if any.
    Revert,
    /// Execution halted exceptionally (e.g. out-of-gas, invalid opcode, stack over/underflow,
    /// depth limit exceeded); all gas supplied to the message is consumed.
    ExceptionalHalt,
}

/// The full result bundle the interpreter contract (§6) returns for a single top-level message.
#[derive(Debug, Clone)]
pub struct MessageResult {
    /// Outcome discriminant.
    pub status: MessageStatus,
    /// Gas remaining (unused) once the message finished.
    pub gas_left: u64,
    /// Return data (or revert reason, on [`MessageStatus::Revert`]).
    pub return_data: Bytes,
    /// Logs emitted by successful, non-reverted frames within the message.
    pub logs: Vec<Log>,
    /// Accounts marked for destruction during the message.
    pub selfdestruct_set: HashSet<Address>,
    /// Net change to the per-transaction refund counter contributed by this message.
    pub refund_delta: i64,
    /// The address of the newly created contract, for [`MessageKind::Create`]/[`MessageKind::Create2`].
    pub created_address: Option<Address>,
}
