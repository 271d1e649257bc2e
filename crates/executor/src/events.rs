//! Fire-and-forget observer events (§4.8, §9 design note "Event emission vs state transitions").
//!
//! Modeled as an explicit subscribe/notify contract rather than coupling an event-emitter into the
//! engine itself: handlers are read-only observers. If a handler panics or otherwise fails, that
//! failure never reverts state — it is the caller's own problem to surface, consistent with this
//! crate's resolution of the open question in §9 ("event errors never revert").

use alloy_primitives::Address;

/// Observer hooks fired around transaction and block execution.
pub trait EventSink {
    /// Fired immediately before a transaction begins execution.
    fn before_tx(&mut self, _sender: Address) {}
    /// Fired after a transaction finishes, successfully or not.
    fn after_tx(&mut self, _sender: Address, _success: bool) {}
    /// Fired immediately before a block begins execution.
    fn before_block(&mut self, _number: u64) {}
    /// Fired after a block finishes, successfully or not.
    fn after_block(&mut self, _number: u64, _success: bool) {}
    /// Fired once per interpreted opcode, only when the engine's debug flag is enabled. The
    /// default implementation is a no-op so most embedders pay nothing for it.
    fn step(&mut self, _pc: usize, _opcode: u8) {}
}

/// An [`EventSink`] that discards every event. The engine's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {}
