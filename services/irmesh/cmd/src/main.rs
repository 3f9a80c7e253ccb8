//! Infrared relay node binary.
//!
//! Captures raw IR bursts, relays them to every peer in the same group over a
//! broadcast datagram link, and replays signals received from peers.

use anyhow::Context;
use clap::Parser;
use irmesh_pulse::{
    playback_queue, CaptureChannel, Clock, MonotonicClock, PlaybackEngine, SpinEmitter,
};
use irmesh_session::{
    run_discovery, CaptureRelay, LogStatusSink, MeshService, StatusSink, UdpTransport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;
mod receiver;

use config::IrMeshConfig;
use logging::IrMeshLogFormatter;
use receiver::LineReceiver;

/// Infrared remote relay node
#[derive(Parser, Debug)]
#[command(name = "ir-mesh", version, about = "Relay raw IR signals between nodes of a group")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "irmesh.yaml")]
    config: PathBuf,

    /// Node identifier matched against IR targets
    #[arg(long)]
    node_id: Option<String>,

    /// Group code shared by every node of the mesh
    #[arg(long)]
    group: Option<String>,

    /// Link-layer address of this node, e.g. 02:00:00:00:00:01
    #[arg(long)]
    address: Option<String>,

    /// UDP port for mesh traffic
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of HELLO broadcasts after startup
    #[arg(long)]
    hello_count: Option<u32>,

    /// Spacing between HELLO broadcasts, e.g. 3s
    #[arg(long)]
    hello_interval: Option<humantime::Duration>,

    /// DATA heartbeat period to known peers, e.g. 1s (0s disables)
    #[arg(long)]
    announce_interval: Option<humantime::Duration>,

    /// Transmit queue depth
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Target id for relayed captures (TODOS for every node)
    #[arg(long)]
    relay_target: Option<String>,

    /// Also replay captured signals on this node
    #[arg(long, conflicts_with = "no_local_echo")]
    local_echo: bool,

    /// Do not replay captured signals on this node
    #[arg(long)]
    no_local_echo: bool,

    /// Read comma-separated pulse lines from stdin as captured signals
    #[arg(long)]
    capture_stdin: bool,
}

impl Args {
    /// Command line values win over file and environment
    fn apply(&self, config: &mut IrMeshConfig) {
        if let Some(id) = &self.node_id {
            config.node.id = id.clone();
        }
        if let Some(group) = &self.group {
            config.mesh.group_code = group.clone();
        }
        if let Some(address) = &self.address {
            config.node.address = address.clone();
        }
        if let Some(port) = self.port {
            config.mesh.port = port;
        }
        if let Some(count) = self.hello_count {
            config.mesh.hello_count = count;
        }
        if let Some(interval) = &self.hello_interval {
            config.mesh.hello_interval = interval.to_string();
        }
        if let Some(interval) = &self.announce_interval {
            config.mesh.announce_interval = interval.to_string();
        }
        if let Some(depth) = self.queue_depth {
            config.infrared.queue_depth = depth;
        }
        if let Some(target) = &self.relay_target {
            config.infrared.relay_target = target.clone();
        }
        if self.local_echo {
            config.infrared.local_echo = true;
        }
        if self.no_local_echo {
            config.infrared.local_echo = false;
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("ir_mesh={}", args.log_level).parse()?)
        .add_directive(format!("irmesh_pulse={}", args.log_level).parse()?)
        .add_directive(format!("irmesh_wire={}", args.log_level).parse()?)
        .add_directive(format!("irmesh_session={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(true)
        .event_format(IrMeshLogFormatter::new("ir-mesh".to_string()))
        .init();

    info!("Starting irmesh node v{}", env!("CARGO_PKG_VERSION"));

    let mut config = IrMeshConfig::load_from_file(&args.config);
    args.apply(&mut config);
    let settings = config.validate().context("invalid configuration")?;

    component_info!(
        "main",
        "Node {} in group {} at {}",
        settings.mesh.node_id,
        settings.mesh.group,
        settings.transport.address
    );

    // Playback: the emitter thread owns the carrier from here on
    let (playback, queue) = playback_queue(settings.playback.queue_depth);
    let engine = PlaybackEngine::new(SpinEmitter::new(), queue, &settings.playback)
        .context("failed to configure IR emitter")?;
    let playback_thread = engine
        .spawn()
        .context("failed to start playback thread")?;

    let (transport, inbound) = UdpTransport::bind(settings.transport.clone())
        .await
        .context("failed to bind mesh transport")?;

    let status: Arc<dyn StatusSink> = Arc::new(LogStatusSink);
    let service = Arc::new(MeshService::new(
        settings.mesh.clone(),
        Arc::new(transport),
        playback,
        status,
    ));

    let inbound_task = tokio::spawn(service.clone().run_inbound(inbound));

    let discovery_task = {
        let service = service.clone();
        let discovery = settings.discovery;
        tokio::spawn(async move {
            run_discovery(&service, discovery).await;
        })
    };

    let heartbeat_task = settings.announce_interval.map(|period| {
        let service = service.clone();
        tokio::spawn(heartbeat(service, period))
    });

    let capture = Arc::new(CaptureChannel::new(settings.idle_threshold));
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock);

    let (relay_shutdown_tx, relay_shutdown_rx) = mpsc::channel::<()>(1);
    let relay = CaptureRelay::new(
        service.clone(),
        capture.clone(),
        clock.clone(),
        settings.relay.clone(),
    );
    let relay_task = tokio::spawn(relay.run(relay_shutdown_rx));

    let receiver_task = if args.capture_stdin {
        let receiver = LineReceiver::new(capture, clock);
        component_info!("receiver", "Reading pulse lines from stdin");
        Some(tokio::spawn(async move {
            if let Err(e) = receiver.run(BufReader::new(tokio::io::stdin())).await {
                component_warn!("receiver", "stdin read failed: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    let _ = relay_shutdown_tx.send(()).await;
    let _ = relay_task.await;

    for task in [Some(inbound_task), Some(discovery_task), heartbeat_task, receiver_task]
        .into_iter()
        .flatten()
    {
        task.abort();
        let _ = task.await;
    }

    // Last playback handle goes with the service; the emitter thread then exits
    drop(service);
    match tokio::task::spawn_blocking(move || playback_thread.join()).await {
        Ok(Ok(stats)) => info!(
            sent = stats.sent,
            aborted = stats.aborted,
            "Playback stopped"
        ),
        _ => warn!("Playback thread did not stop cleanly"),
    }

    info!("irmesh node stopped");
    Ok(())
}

/// Periodic DATA message to every known peer
async fn heartbeat(service: Arc<MeshService>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    let mut beat: u64 = 0;
    loop {
        ticker.tick().await;
        beat += 1;
        match service.send_data(&format!("HEARTBEAT {}", beat)).await {
            Ok(report) => component_debug!(
                "heartbeat",
                "Heartbeat {} sent to {} of {} peers",
                beat,
                report.delivered,
                report.attempted
            ),
            Err(e) => component_warn!("heartbeat", "Heartbeat not sent: {}", e),
        }
    }
}
