//! Peer registry, datagram transports, HELLO discovery and IR relay dispatch for irmesh.
//!
//! This crate ties the pulse pipeline to the mesh: it learns peers from
//! HELLO/WELCOME/DATA traffic, validates every inbound datagram and relays
//! captured IR signals to every known peer.
//!
//! ## Features
//!
//! - **Transports**: UDP broadcast emulation and an in-process hub for tests
//! - **Discovery**: fixed-count HELLO schedule answered by unicast WELCOME
//! - **Registry**: bounded, append-only peer table
//! - **Dispatch**: self-origin, size, type and group checks before acting
//! - **Relay**: capture polling with optional local echo
//!
//! ## Example
//!
//! ```rust,no_run
//! use irmesh_pulse::playback_queue;
//! use irmesh_session::{run_discovery, DiscoveryConfig, LogStatusSink, MemoryHub, MeshConfig, MeshService};
//! use irmesh_wire::{GroupCode, PeerAddress, TargetId};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let hub = MemoryHub::new();
//! let (transport, inbound) = hub.attach(PeerAddress::new([2, 0, 0, 0, 0, 1]), 32);
//! let (playback, _queue) = playback_queue(4);
//!
//! let service = Arc::new(MeshService::new(
//!     MeshConfig::new(TargetId::new("1")?, GroupCode::new("GRUPO_X")?),
//!     Arc::new(transport),
//!     playback,
//!     Arc::new(LogStatusSink),
//! ));
//!
//! tokio::spawn(service.clone().run_inbound(inbound));
//! run_discovery(&service, DiscoveryConfig::default()).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handshake;
pub mod registry;
pub mod relay;
pub mod service;
pub mod status;
pub mod transport;

// Re-export main types
pub use error::TransportError;
pub use handshake::{run_discovery, DiscoveryConfig, DEFAULT_HELLO_COUNT, DEFAULT_HELLO_INTERVAL};
pub use registry::{AddPeerOutcome, PeerRecord, PeerRegistry, MAX_PEERS};
pub use relay::{CaptureRelay, RelayConfig, DEFAULT_POLL_INTERVAL};
pub use service::{DiscardReason, MeshConfig, MeshService, ReceiveOutcome, RelayReport};
pub use status::{LogStatusSink, MemoryStatusSink, StatusSink};
pub use transport::{
    Datagram, MemoryHub, MemoryTransport, Transport, UdpTransport, UdpTransportConfig,
    DEFAULT_INBOUND_DEPTH,
};
