//! Bounded transmit queue and the single emitter-owning consumer.
//!
//! Producers hold a cloneable [`PlaybackHandle`] and never block: when the
//! queue is full the signal is dropped with a warning. The [`PlaybackEngine`]
//! runs on its own thread, owns the [`Emitter`] and replays one sequence at a
//! time, so transmissions can never overlap.

use crate::emitter::{Carrier, Emitter};
use crate::error::EmitterError;
use crate::sequence::{PulseSequence, CAPACITY};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

/// Default transmit queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Default number of segments between cooperative yields
pub const DEFAULT_YIELD_EVERY: usize = 20;

/// Why an enqueue did not take effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Queue already holds its full depth
    QueueFull,
    /// Consumer has shut down
    Closed,
    /// Input could not form a valid sequence
    Invalid,
}

/// Result of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Accepted for playback
    Queued,
    /// Dropped; a warning was logged
    Dropped(DropReason),
}

impl EnqueueOutcome {
    /// Whether the signal was accepted
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued)
    }
}

/// Playback configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Transmit queue depth
    pub queue_depth: usize,
    /// Yield to the scheduler after this many segments
    pub yield_every: usize,
    /// Carrier used for marks
    pub carrier: Carrier,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            yield_every: DEFAULT_YIELD_EVERY,
            carrier: Carrier::IR_38KHZ,
        }
    }
}

/// Producer side of the transmit queue
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    tx: mpsc::Sender<PulseSequence>,
}

/// Consumer side of the transmit queue
#[derive(Debug)]
pub struct PlaybackQueue {
    rx: mpsc::Receiver<PulseSequence>,
}

/// Create a transmit queue holding at most `depth` sequences
pub fn playback_queue(depth: usize) -> (PlaybackHandle, PlaybackQueue) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (PlaybackHandle { tx }, PlaybackQueue { rx })
}

impl PlaybackHandle {
    /// Queue a sequence for playback without blocking
    pub fn enqueue(&self, pulses: PulseSequence) -> EnqueueOutcome {
        let len = pulses.len();
        match self.tx.try_send(pulses) {
            Ok(()) => {
                debug!(pulses = len, queued = self.queued(), "IR signal queued");
                EnqueueOutcome::Queued
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    pulses = len,
                    depth = self.depth(),
                    "Playback queue full, dropping IR signal"
                );
                EnqueueOutcome::Dropped(DropReason::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                warn!(pulses = len, "Playback stopped, dropping IR signal");
                EnqueueOutcome::Dropped(DropReason::Closed)
            }
        }
    }

    /// Queue raw durations, truncating anything beyond `CAPACITY`
    pub fn enqueue_raw(&self, durations: &[u32]) -> EnqueueOutcome {
        match PulseSequence::truncating(durations.to_vec()) {
            Ok((pulses, truncated)) => {
                if truncated {
                    warn!(
                        received = durations.len(),
                        capacity = CAPACITY,
                        "IR signal truncated before playback"
                    );
                }
                self.enqueue(pulses)
            }
            Err(e) => {
                warn!(error = %e, "Invalid IR signal, not queued");
                EnqueueOutcome::Dropped(DropReason::Invalid)
            }
        }
    }

    /// Sequences currently waiting
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Maximum sequences the queue holds
    pub fn depth(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Counters kept by the consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Sequences played to the end
    pub sent: u64,
    /// Sequences aborted by an emitter error
    pub aborted: u64,
    /// Segments driven in total
    pub segments: u64,
}

/// Sole driver of the physical emitter
pub struct PlaybackEngine<E: Emitter> {
    emitter: E,
    queue: PlaybackQueue,
    yield_every: usize,
    stats: PlaybackStats,
}

impl<E: Emitter> PlaybackEngine<E> {
    /// Configure the emitter carrier and take ownership of it
    pub fn new(
        mut emitter: E,
        queue: PlaybackQueue,
        config: &PlaybackConfig,
    ) -> Result<Self, EmitterError> {
        emitter.configure(config.carrier)?;
        emitter.set_carrier(false)?;

        info!(
            frequency_hz = config.carrier.frequency_hz,
            duty = config.carrier.duty_percent,
            "IR emitter ready"
        );

        Ok(Self {
            emitter,
            queue,
            yield_every: config.yield_every.max(1),
            stats: PlaybackStats::default(),
        })
    }

    /// Run the consumer loop on a dedicated thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<PlaybackStats>>
    where
        E: 'static,
    {
        thread::Builder::new()
            .name("ir-playback".to_string())
            .spawn(move || self.run())
    }

    /// Block on the queue and play sequences until every handle is dropped
    pub fn run(mut self) -> PlaybackStats {
        info!("Playback consumer started");
        while let Some(pulses) = self.queue.rx.blocking_recv() {
            // Errors are logged inside; the loop keeps serving
            let _ = self.play(&pulses);
        }
        info!(
            sent = self.stats.sent,
            aborted = self.stats.aborted,
            "Playback queue closed, consumer exiting"
        );
        self.stats
    }

    /// Play one sequence; the carrier is always off afterwards
    pub fn play(&mut self, pulses: &PulseSequence) -> Result<(), EmitterError> {
        info!(pulses = pulses.len(), "Sending IR with {} pulses", pulses.len());

        let result = self.drive(pulses);

        if let Err(e) = self.emitter.set_carrier(false) {
            error!(error = %e, "Failed to force carrier off");
        }

        match &result {
            Ok(()) => {
                self.stats.sent += 1;
                info!("IR signal sent");
            }
            Err(e) => {
                self.stats.aborted += 1;
                error!(error = %e, "IR playback aborted");
            }
        }
        result
    }

    fn drive(&mut self, pulses: &PulseSequence) -> Result<(), EmitterError> {
        for (i, segment) in pulses.segments().enumerate() {
            self.emitter.set_carrier(segment.level.is_mark())?;
            self.emitter.hold(segment.micros);
            self.stats.segments += 1;

            if (i + 1) % self.yield_every == 0 {
                self.emitter.yield_now();
            }
        }
        Ok(())
    }

    /// Counters so far
    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    /// The owned emitter
    pub fn emitter(&self) -> &E {
        &self.emitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Carrier(bool),
        Hold(u32),
        Yield,
    }

    #[derive(Debug, Default)]
    struct RecordingEmitter {
        ops: Vec<Op>,
        on: bool,
        fail_after: Option<usize>,
        carrier_calls: usize,
    }

    impl Emitter for RecordingEmitter {
        fn configure(&mut self, _carrier: Carrier) -> Result<(), EmitterError> {
            Ok(())
        }

        fn set_carrier(&mut self, on: bool) -> Result<(), EmitterError> {
            self.carrier_calls += 1;
            if let Some(limit) = self.fail_after {
                if self.carrier_calls > limit && on {
                    return Err(EmitterError::Carrier("ledc busy".into()));
                }
            }
            self.on = on;
            self.ops.push(Op::Carrier(on));
            Ok(())
        }

        fn hold(&mut self, micros: u32) {
            self.ops.push(Op::Hold(micros));
        }

        fn yield_now(&mut self) {
            self.ops.push(Op::Yield);
        }
    }

    fn seq(durations: &[u32]) -> PulseSequence {
        PulseSequence::new(durations.to_vec()).unwrap()
    }

    #[test]
    fn test_queue_depth_drops_fifth() {
        let (handle, _queue) = playback_queue(4);
        for _ in 0..4 {
            assert_eq!(handle.enqueue(seq(&[9000, 4500])), EnqueueOutcome::Queued);
        }
        assert_eq!(
            handle.enqueue(seq(&[9000, 4500])),
            EnqueueOutcome::Dropped(DropReason::QueueFull)
        );
        assert_eq!(handle.queued(), 4);
        assert_eq!(handle.depth(), 4);
    }

    #[test]
    fn test_enqueue_raw_truncates() {
        let (handle, mut queue) = playback_queue(DEFAULT_QUEUE_DEPTH);
        let raw: Vec<u32> = vec![560; CAPACITY + 50];
        assert!(handle.enqueue_raw(&raw).is_queued());

        let queued = queue.rx.try_recv().unwrap();
        assert_eq!(queued.len(), CAPACITY);

        assert_eq!(
            handle.enqueue_raw(&[]),
            EnqueueOutcome::Dropped(DropReason::Invalid)
        );
    }

    #[test]
    fn test_enqueue_after_consumer_gone() {
        let (handle, queue) = playback_queue(2);
        drop(queue);
        assert_eq!(
            handle.enqueue(seq(&[100])),
            EnqueueOutcome::Dropped(DropReason::Closed)
        );
    }

    #[test]
    fn test_play_alternates_carrier_and_ends_off() {
        let (_handle, queue) = playback_queue(1);
        let mut engine =
            PlaybackEngine::new(RecordingEmitter::default(), queue, &PlaybackConfig::default())
                .unwrap();

        engine.play(&seq(&[9000, 4500, 560])).unwrap();

        let ops = &engine.emitter().ops;
        assert_eq!(
            ops,
            &vec![
                Op::Carrier(false),
                Op::Carrier(true),
                Op::Hold(9000),
                Op::Carrier(false),
                Op::Hold(4500),
                Op::Carrier(true),
                Op::Hold(560),
                Op::Carrier(false),
            ]
        );
        assert!(!engine.emitter().on);
        assert_eq!(engine.stats().segments, 3);
    }

    #[test]
    fn test_yields_every_twenty_segments() {
        let (_handle, queue) = playback_queue(1);
        let mut engine =
            PlaybackEngine::new(RecordingEmitter::default(), queue, &PlaybackConfig::default())
                .unwrap();

        engine.play(&seq(&[560; 65])).unwrap();

        let yields = engine
            .emitter()
            .ops
            .iter()
            .filter(|op| **op == Op::Yield)
            .count();
        assert_eq!(yields, 3);
    }

    #[test]
    fn test_emitter_failure_aborts_only_current() {
        let (handle, queue) = playback_queue(4);
        let emitter = RecordingEmitter {
            // configure-time off + first mark succeed, later marks fail
            fail_after: Some(3),
            ..Default::default()
        };
        let engine = PlaybackEngine::new(emitter, queue, &PlaybackConfig::default()).unwrap();

        handle.enqueue(seq(&[9000, 4500, 560, 560]));
        handle.enqueue(seq(&[9000]));
        drop(handle);

        let stats = engine.run();
        assert_eq!(stats.aborted, 2);
        assert_eq!(stats.sent, 0);
    }

    #[test]
    fn test_consumer_thread_drains_queue() {
        let (handle, queue) = playback_queue(4);
        let engine =
            PlaybackEngine::new(RecordingEmitter::default(), queue, &PlaybackConfig::default())
                .unwrap();
        let join = engine.spawn().unwrap();

        assert!(handle.enqueue(seq(&[100, 100])).is_queued());
        assert!(handle.enqueue(seq(&[100])).is_queued());
        drop(handle);

        let stats = join.join().unwrap();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.segments, 3);
    }
}
