//! Host stand-in for the IR receiver.
//!
//! Reads comma-separated duration lines (the format printed for every capture)
//! and replays each one into the capture channel as edge timestamps.

use irmesh_pulse::{CaptureChannel, Clock, PulseSequence};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Wait between checks for the previous burst to be taken
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Feeds pulse lines into a [`CaptureChannel`]
pub struct LineReceiver {
    capture: Arc<CaptureChannel>,
    clock: Arc<dyn Clock>,
    next_free_us: u64,
}

impl LineReceiver {
    pub fn new(capture: Arc<CaptureChannel>, clock: Arc<dyn Clock>) -> Self {
        Self {
            capture,
            clock,
            next_free_us: 0,
        }
    }

    /// Replay one sequence as edges and return the last edge timestamp.
    ///
    /// The leading edge is placed more than one idle threshold after anything
    /// seen before, so its delta is stripped as the pre-burst silence. Edge
    /// times may lie ahead of the clock; the burst finalizes once the clock
    /// has passed the last edge by the idle threshold.
    pub fn feed(&mut self, pulses: &PulseSequence) -> u64 {
        let threshold_us = self.capture.idle_threshold().as_micros() as u64;
        let mut t = self.clock.now_us().max(self.next_free_us) + threshold_us + 1;

        self.capture.on_edge(t);
        for &duration in pulses.as_slice() {
            t += u64::from(duration);
            self.capture.on_edge(t);
        }

        self.next_free_us = t + threshold_us + 1;
        t
    }

    /// Read lines until EOF; returns how many sequences were replayed
    pub async fn run<R>(mut self, reader: R) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut fed = 0;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let pulses = match line.parse::<PulseSequence>() {
                Ok(pulses) => pulses,
                Err(e) => {
                    warn!(error = %e, "Ignoring pulse line");
                    continue;
                }
            };

            // Bursts must not merge: wait for the relay to take the last one
            while self.capture.pending() > 0 {
                tokio::time::sleep(DRAIN_POLL).await;
            }

            self.feed(&pulses);
            fed += 1;
            debug!(pulses = pulses.len(), "Pulse line replayed");
        }

        info!(sequences = fed, "Pulse input closed");
        Ok(fed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ManualClock(AtomicU64);

    impl Clock for ManualClock {
        fn now_us(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_feed_reproduces_sequence() {
        let capture = Arc::new(CaptureChannel::default());
        let clock = Arc::new(ManualClock(AtomicU64::new(10)));
        let mut receiver = LineReceiver::new(capture.clone(), clock.clone());

        let pulses: PulseSequence = "9000,4500,560,560,560,1690,560".parse().unwrap();
        let last = receiver.feed(&pulses);

        // Not finalized until the clock passes the last edge
        clock.0.store(last, Ordering::SeqCst);
        assert!(capture.poll_idle(clock.now_us()).is_none());

        clock.0.store(last + 50_001, Ordering::SeqCst);
        let signal = capture.poll_idle(clock.now_us()).unwrap();
        assert_eq!(signal.pulses, pulses);
        assert!(signal.stripped_leading);
    }

    #[test]
    fn test_consecutive_feeds_stay_separate() {
        let capture = Arc::new(CaptureChannel::default());
        let clock = Arc::new(ManualClock(AtomicU64::new(0)));
        let mut receiver = LineReceiver::new(capture.clone(), clock.clone());

        let first: PulseSequence = "100,200".parse().unwrap();
        let last = receiver.feed(&first);
        clock.0.store(last + 60_000, Ordering::SeqCst);
        assert_eq!(capture.poll_idle(clock.now_us()).unwrap().pulses, first);

        let second: PulseSequence = "300,400,500".parse().unwrap();
        let last = receiver.feed(&second);
        clock.0.store(last + 60_000, Ordering::SeqCst);
        assert_eq!(capture.poll_idle(clock.now_us()).unwrap().pulses, second);
    }

    #[tokio::test]
    async fn test_run_skips_bad_lines() {
        let capture = Arc::new(CaptureChannel::default());
        let clock = Arc::new(ManualClock(AtomicU64::new(0)));
        let receiver = LineReceiver::new(capture.clone(), clock);

        let input: &[u8] = b"# captured\n\n560,560\nnot,pulses\n";
        let fed = receiver.run(input).await.unwrap();
        assert_eq!(fed, 1);
        assert_eq!(capture.pending(), 3);
    }
}
