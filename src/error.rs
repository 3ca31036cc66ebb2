//! Error types for the engine's public boundary.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Contract violations rejected at the call boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Register index past the end of the family register file.
    #[error("register {index:#05x} out of range (0..{limit:#05x})")]
    RegisterOutOfRange {
        /// Requested register.
        index: u16,
        /// Register file size.
        limit: usize,
    },

    /// Channel index out of range.
    #[error("channel {index} out of range (0..{limit})")]
    ChannelOutOfRange {
        /// Requested channel.
        index: usize,
        /// Channel count.
        limit: usize,
    },

    /// Operator index out of range.
    #[error("operator {index} out of range (0..{limit})")]
    OperatorOutOfRange {
        /// Requested operator.
        index: usize,
        /// Operator count.
        limit: usize,
    },

    /// Timer index other than 0 (A) or 1 (B).
    #[error("timer {0} out of range (0..2)")]
    TimerOutOfRange(u32),

    /// Clock prescale of zero, or large enough to overflow a timer period.
    #[error("clock prescale {0} out of range")]
    PrescaleOutOfRange(u32),

    /// Saved state does not have the expected length.
    #[error("saved state is {actual} bytes, expected {expected}")]
    StateSize {
        /// Bytes consumed by the restore walk.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// Saved state contains a value the engine cannot hold.
    #[error("corrupt saved state: {0}")]
    CorruptState(&'static str),
}
