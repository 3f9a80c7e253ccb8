//! Edge-driven capture of raw IR bursts.
//!
//! The receiver delivers one call per level change. [`CaptureChannel::on_edge`]
//! runs in that callback context, so it only computes a delta and performs one
//! bounded append. A worker task calls [`CaptureChannel::poll_idle`] to detect
//! the end of a burst and take the finished sequence.
//!
//! Appends and the post-finalize reset go through the same short critical
//! section: an edge either lands wholly in the finished burst or wholly in the
//! next one.

use crate::codec::{self, HardwareSymbol};
use crate::sequence::{PulseSequence, CAPACITY};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Silence that ends a burst (50 ms)
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_millis(50);

/// A finished burst, ready for relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSignal {
    /// Captured durations
    pub pulses: PulseSequence,
    /// Edges were dropped because the buffer was full
    pub truncated: bool,
    /// The leading quiet period was removed
    pub stripped_leading: bool,
}

/// Fixed-size in-progress buffer; never reallocated
struct CaptureBuffer {
    durations: [u32; CAPACITY],
    len: usize,
    last_edge_us: u64,
    overflowed: bool,
}

impl CaptureBuffer {
    const fn new() -> Self {
        Self {
            durations: [0; CAPACITY],
            len: 0,
            last_edge_us: 0,
            overflowed: false,
        }
    }

    fn push(&mut self, duration: u32) {
        if self.len < CAPACITY {
            self.durations[self.len] = duration;
            self.len += 1;
        } else {
            self.overflowed = true;
        }
    }
}

/// Accumulates one pulse sequence per burst of receiver activity
pub struct CaptureChannel {
    buffer: Mutex<CaptureBuffer>,
    idle_threshold_us: u64,
}

impl CaptureChannel {
    /// Create a channel that finalizes after `idle_threshold` of silence
    pub fn new(idle_threshold: Duration) -> Self {
        Self {
            buffer: Mutex::new(CaptureBuffer::new()),
            idle_threshold_us: idle_threshold.as_micros() as u64,
        }
    }

    /// Configured idle threshold
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_micros(self.idle_threshold_us)
    }

    fn lock(&self) -> MutexGuard<'_, CaptureBuffer> {
        // A panic elsewhere must not stop capture
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a level change observed at `timestamp_us`.
    ///
    /// Callback-safe: no allocation and no logging.
    pub fn on_edge(&self, timestamp_us: u64) {
        let mut buf = self.lock();
        let delta = timestamp_us.saturating_sub(buf.last_edge_us);
        buf.last_edge_us = timestamp_us;
        buf.push(u32::try_from(delta).unwrap_or(u32::MAX));
    }

    /// Record a burst delivered by a symbol-based timing peripheral.
    ///
    /// A trailing zero duration is the peripheral's end marker and is dropped.
    pub fn on_symbols(&self, symbols: &[HardwareSymbol], end_timestamp_us: u64) {
        let mut decoded = codec::decode(symbols);
        if decoded.durations.last() == Some(&0) {
            decoded.durations.pop();
        }

        let mut buf = self.lock();
        for &duration in &decoded.durations {
            buf.push(duration);
        }
        if decoded.truncated {
            buf.overflowed = true;
        }
        buf.last_edge_us = end_timestamp_us;
    }

    /// Number of durations in the current burst
    pub fn pending(&self) -> usize {
        self.lock().len
    }

    /// Finalize the current burst if the line has been idle long enough
    pub fn poll_idle(&self, now_us: u64) -> Option<CapturedSignal> {
        let (raw, len, overflowed) = {
            let mut buf = self.lock();
            if buf.len == 0 || now_us.saturating_sub(buf.last_edge_us) <= self.idle_threshold_us {
                return None;
            }
            let taken = (buf.durations, buf.len, buf.overflowed);
            buf.len = 0;
            buf.overflowed = false;
            taken
        };

        let kept = strip_leading_idle(&raw[..len], self.idle_threshold_us);
        let stripped_leading = kept.len() != len;
        if kept.is_empty() {
            debug!("Discarding burst with only a leading idle period");
            return None;
        }
        if overflowed {
            warn!(capacity = CAPACITY, "IR capture exceeded buffer, signal truncated");
        }

        match PulseSequence::new(kept.to_vec()) {
            Ok(pulses) => {
                info!(pulses = pulses.len(), "Received IR with {} pulses", pulses.len());
                info!("{}", pulses);
                Some(CapturedSignal {
                    pulses,
                    truncated: overflowed,
                    stripped_leading,
                })
            }
            Err(e) => {
                warn!(error = %e, "Discarding captured burst");
                None
            }
        }
    }
}

impl Default for CaptureChannel {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_THRESHOLD)
    }
}

/// Drop the first duration when it is longer than `threshold_us`.
///
/// The first delta of a burst measures the silence before it, not a mark.
pub fn strip_leading_idle(durations: &[u32], threshold_us: u64) -> &[u32] {
    match durations.split_first() {
        Some((&first, rest)) if u64::from(first) > threshold_us => rest,
        _ => durations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const THRESHOLD_US: u64 = 50_000;

    fn feed(channel: &CaptureChannel, start_us: u64, durations: &[u32]) -> u64 {
        let mut t = start_us;
        for &d in durations {
            t += u64::from(d);
            channel.on_edge(t);
        }
        t
    }

    #[test]
    fn test_capture_scenario_without_trim() {
        let channel = CaptureChannel::new(Duration::from_micros(THRESHOLD_US));
        let input = [9000, 4500, 560, 560, 560, 1690, 560, 40000];
        let end = feed(&channel, 0, &input);

        // Not idle yet
        assert!(channel.poll_idle(end + THRESHOLD_US).is_none());
        assert_eq!(channel.pending(), input.len());

        let signal = channel.poll_idle(end + THRESHOLD_US + 1).unwrap();
        assert_eq!(signal.pulses.as_slice(), &input);
        assert!(!signal.stripped_leading);
        assert!(!signal.truncated);
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn test_leading_idle_is_stripped() {
        let channel = CaptureChannel::default();
        // First edge after one second of silence
        channel.on_edge(1_000_000);
        let end = feed(&channel, 1_000_000, &[9000, 4500, 560]);

        let signal = channel.poll_idle(end + 60_000).unwrap();
        assert!(signal.stripped_leading);
        assert_eq!(signal.pulses.as_slice(), &[9000, 4500, 560]);
    }

    #[test]
    fn test_strip_leading_idle() {
        assert_eq!(strip_leading_idle(&[60_000, 9000], THRESHOLD_US), &[9000]);
        assert_eq!(strip_leading_idle(&[50_000, 9000], THRESHOLD_US), &[50_000, 9000]);
        assert_eq!(strip_leading_idle(&[], THRESHOLD_US), &[] as &[u32]);
    }

    #[test]
    fn test_lone_leading_idle_is_discarded() {
        let channel = CaptureChannel::default();
        channel.on_edge(2_000_000);
        assert!(channel.poll_idle(3_000_000).is_none());
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn test_overflow_truncates_without_growth() {
        let channel = CaptureChannel::default();
        let end = feed(&channel, 0, &vec![560; CAPACITY + 40]);
        assert_eq!(channel.pending(), CAPACITY);

        let signal = channel.poll_idle(end + 100_000).unwrap();
        assert!(signal.truncated);
        assert_eq!(signal.pulses.len(), CAPACITY);

        // Next burst starts clean
        let end = feed(&channel, end + 100_000, &[60_000, 9000, 4500]);
        let signal = channel.poll_idle(end + 100_000).unwrap();
        assert!(!signal.truncated);
        assert_eq!(signal.pulses.as_slice(), &[9000, 4500]);
    }

    #[test]
    fn test_symbol_capture() {
        let channel = CaptureChannel::default();
        let symbols = [
            HardwareSymbol::new(9000, 4500),
            HardwareSymbol::new(560, 1690),
            HardwareSymbol::new(560, 0),
        ];
        channel.on_symbols(&symbols, 20_000);

        let signal = channel.poll_idle(80_000).unwrap();
        assert_eq!(signal.pulses.as_slice(), &[9000, 4500, 560, 1690, 560]);
    }

    #[test]
    fn test_concurrent_edges_and_finalize() {
        const EDGES: u32 = 5_000;

        // Edge i arrives i microseconds after edge i - 1, so every delta is
        // distinct and bursts must come out as unbroken ascending runs
        let channel = Arc::new(CaptureChannel::new(Duration::from_millis(20)));
        let producer = {
            let channel = channel.clone();
            std::thread::spawn(move || {
                let mut t = 0u64;
                for i in 1..=u64::from(EDGES) {
                    t += i;
                    channel.on_edge(t);
                }
            })
        };

        let mut bursts = Vec::new();
        while !producer.is_finished() {
            if let Some(signal) = channel.poll_idle(u64::MAX) {
                bursts.push(signal);
            }
        }
        producer.join().unwrap();
        if let Some(signal) = channel.poll_idle(u64::MAX) {
            bursts.push(signal);
        }
        assert_eq!(channel.pending(), 0);
        assert!(!bursts.is_empty());

        let mut expected_next = 1u32;
        let mut previous_truncated = false;
        for signal in &bursts {
            let values = signal.pulses.as_slice();
            assert!(values.len() <= CAPACITY);
            assert!(!signal.stripped_leading);
            assert!(values.windows(2).all(|w| w[1] == w[0] + 1), "burst split an edge");

            if previous_truncated {
                assert!(values[0] >= expected_next);
            } else {
                assert_eq!(values[0], expected_next);
            }
            expected_next = values[values.len() - 1] + 1;
            previous_truncated = signal.truncated;
        }

        let last = bursts[bursts.len() - 1].pulses.as_slice();
        if !bursts[bursts.len() - 1].truncated {
            assert_eq!(last[last.len() - 1], EDGES);
        }
    }
}
