//! HELLO discovery schedule.
//!
//! A node broadcasts HELLO a fixed number of times at a fixed interval after
//! startup, then falls silent. Peers that hear it register the sender and
//! answer with a unicast WELCOME.

use crate::service::MeshService;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Default number of HELLO broadcasts
pub const DEFAULT_HELLO_COUNT: u32 = 10;

/// Default spacing between HELLO broadcasts
pub const DEFAULT_HELLO_INTERVAL: Duration = Duration::from_secs(3);

/// Shortest spacing the schedule will use
const MIN_HELLO_INTERVAL: Duration = Duration::from_millis(1);

/// Discovery schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// HELLO broadcasts to send
    pub hello_count: u32,
    /// Time between broadcasts
    pub hello_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            hello_count: DEFAULT_HELLO_COUNT,
            hello_interval: DEFAULT_HELLO_INTERVAL,
        }
    }
}

/// Broadcast HELLO on schedule, then stop. Returns how many were sent.
///
/// The first broadcast goes out immediately. A zero interval is raised to
/// one millisecond.
pub async fn run_discovery(service: &MeshService, config: DiscoveryConfig) -> u32 {
    let mut ticker = interval(config.hello_interval.max(MIN_HELLO_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sent = 0;
    for round in 1..=config.hello_count {
        ticker.tick().await;
        match service.send_hello().await {
            Ok(()) => {
                sent += 1;
                info!(
                    round,
                    total = config.hello_count,
                    peers = service.registry().len(),
                    "HELLO sent"
                );
            }
            Err(e) => warn!(round, error = %e, "HELLO broadcast failed"),
        }
    }

    info!(
        sent,
        peers = service.registry().len(),
        "Discovery finished"
    );
    sent
}
