//! Capture-to-mesh relay worker.
//!
//! Polls the capture channel for finished bursts and sends each one to every
//! known peer. Unless local echo is turned off, the burst is also queued on
//! the local emitter.

use crate::service::{MeshService, RelayReport};
use irmesh_pulse::{CaptureChannel, Clock};
use irmesh_wire::TargetId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default capture poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest poll period the worker will use
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Relay settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Target id stamped on relayed signals
    pub target: TargetId,
    /// How often the capture channel is checked for a finished burst
    pub poll_interval: Duration,
    /// Also replay captured signals on this node (on by default)
    pub local_echo: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target: TargetId::broadcast(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            local_echo: true,
        }
    }
}

/// Moves finished captures onto the mesh
pub struct CaptureRelay {
    service: Arc<MeshService>,
    capture: Arc<CaptureChannel>,
    clock: Arc<dyn Clock>,
    config: RelayConfig,
}

impl CaptureRelay {
    /// Create a relay worker
    pub fn new(
        service: Arc<MeshService>,
        capture: Arc<CaptureChannel>,
        clock: Arc<dyn Clock>,
        config: RelayConfig,
    ) -> Self {
        Self {
            service,
            capture,
            clock,
            config,
        }
    }

    /// Check once for a finished burst and relay it
    pub async fn poll_once(&self) -> Option<RelayReport> {
        let signal = self.capture.poll_idle(self.clock.now_us())?;

        if self.config.local_echo {
            let outcome = self.service.playback().enqueue(signal.pulses.clone());
            debug!(?outcome, "Local echo");
        }

        if self.service.registry().is_empty() {
            warn!("No peers registered, captured IR not relayed");
        }

        Some(self.service.send_ir(&self.config.target, &signal.pulses).await)
    }

    /// Poll until a shutdown signal arrives; a zero period is raised to 1 ms
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            target_id = %self.config.target,
            local_echo = self.config.local_echo,
            "Capture relay started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Capture relay stopping");
                    break;
                }
            }
        }
    }
}
