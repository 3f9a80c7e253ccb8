//! Pulse pipeline error types.

use thiserror::Error;

/// Errors raised when building a [`crate::PulseSequence`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    /// No durations at all
    #[error("empty pulse sequence")]
    Empty,

    /// More durations than the pipeline can hold
    #[error("sequence length {0} exceeds capacity")]
    TooLong(usize),

    /// A single duration above the sanity ceiling
    #[error("duration {duration}us at index {index} exceeds ceiling")]
    DurationOutOfRange {
        /// Position of the offending duration
        index: usize,
        /// The offending value in microseconds
        duration: u32,
    },

    /// Text form could not be parsed
    #[error("invalid duration list: {0}")]
    Parse(String),
}

/// Errors raised by an [`crate::Emitter`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitterError {
    /// Carrier setup rejected by the peripheral
    #[error("carrier configuration rejected: {0}")]
    Configure(String),

    /// Switching the carrier on or off failed
    #[error("carrier update failed: {0}")]
    Carrier(String),
}
