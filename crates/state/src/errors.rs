//! Errors for the `execd-state` crate.

/// The error type for [crate::JournalDb] operations.
#[derive(derive_more::Display, Debug, PartialEq, Eq)]
pub enum StateError {
    /// A `commit()` or `revert()` was issued with no matching open checkpoint.
    #[display("journal underflow: no open checkpoint to resolve")]
    JournalUnderflow,
    /// A checkpoint handle was resolved against a journal it was not issued from, or was
    /// already consumed by an earlier commit/revert.
    #[display("checkpoint {_0} is not open on this journal")]
    StaleCheckpoint(usize),
    /// The configured [`crate::StateCommitter`] failed to compute a root commitment.
    #[display("state commitment failed: {_0}")]
    CommitmentFailed(String),
}

impl core::error::Error for StateError {}

/// A [`Result`] type alias where the error is [`StateError`].
pub type StateResult<T> = Result<T, StateError>;
