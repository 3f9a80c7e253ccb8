//! Raw IR pulse sequences, hardware symbol codec, edge capture and carrier playback.
//!
//! This crate owns everything between the infrared receiver/emitter pins and the
//! mesh: a burst of edges is accumulated by [`CaptureChannel`], finalized into a
//! [`PulseSequence`] once the line goes idle, and eventually replayed by a
//! [`PlaybackEngine`] that is the only writer to the physical emitter.
//!
//! ## Pulse model
//!
//! ```text
//!  index:   0        1      2     3     ...
//!  level:  MARK    SPACE  MARK  SPACE
//!          ┌──────┐       ┌──┐
//!  carrier:│38 kHz│ idle  │  │ idle
//!          ┘      └───────┘  └─────
//!  value:   9000us  4500us 560us 560us
//! ```
//!
//! Durations are opaque microsecond timings; no IR protocol is decoded.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod clock;
pub mod codec;
pub mod emitter;
pub mod error;
pub mod playback;
pub mod sequence;

// Re-export main types
pub use capture::{strip_leading_idle, CaptureChannel, CapturedSignal, DEFAULT_IDLE_THRESHOLD};
pub use clock::{Clock, MonotonicClock};
pub use codec::{decode, encode, DecodedPulses, HardwareSymbol};
pub use emitter::{Carrier, Emitter, SpinEmitter};
pub use error::{EmitterError, PulseError};
pub use playback::{
    playback_queue, DropReason, EnqueueOutcome, PlaybackConfig, PlaybackEngine, PlaybackHandle,
    PlaybackQueue, PlaybackStats, DEFAULT_QUEUE_DEPTH, DEFAULT_YIELD_EVERY,
};
pub use sequence::{Level, PulseSequence, Segment, CAPACITY, MAX_DURATION_US};
