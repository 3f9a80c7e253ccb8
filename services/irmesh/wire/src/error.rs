//! Wire protocol error types.

use irmesh_pulse::PulseError;
use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than the fixed header
    #[error("incomplete message: {0} bytes")]
    Incomplete(usize),

    /// Length does not match what the type tag implies
    #[error("size mismatch for {kind}: got {actual} bytes, expected {expected}")]
    Size {
        /// Message type name
        kind: &'static str,
        /// Received length
        actual: usize,
        /// Required length
        expected: usize,
    },

    /// Type tag not recognised
    #[error("unknown type tag {0:?}")]
    Type(String),

    /// Fixed-width text field is not NUL terminated, not UTF-8 or too long
    #[error("invalid {0} field")]
    Field(&'static str),

    /// Pulse count outside `1..=CAPACITY`
    #[error("invalid pulse count {0}")]
    PulseCount(u32),

    /// Pulse durations violate sequence invariants
    #[error("invalid pulses: {0}")]
    Pulses(#[from] PulseError),

    /// Address text could not be parsed
    #[error("invalid address {0:?}")]
    Address(String),
}
