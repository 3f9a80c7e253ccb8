//! Best-effort datagram transports for mesh traffic.
//!
//! A transport sends one message per datagram, either to a single peer or to
//! [`PeerAddress::BROADCAST`]. Received datagrams are delivered, with their
//! source address, on a bounded channel handed out when the transport is
//! created. Delivery is fire-and-forget: a successful `send` only means the
//! datagram left this node.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use irmesh_wire::{PeerAddress, ADDRESS_LEN, MAX_MESSAGE_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Default depth of the inbound datagram channel
pub const DEFAULT_INBOUND_DEPTH: usize = 32;

/// First pause after a failed UDP receive
const RECV_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Longest pause between failed UDP receives
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before retrying after `failures` consecutive receive errors
fn recv_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    RECV_BACKOFF_MIN
        .saturating_mul(1u32 << shift)
        .min(RECV_BACKOFF_MAX)
}

/// One received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Link-layer address of the sender
    pub source: PeerAddress,
    /// Raw message bytes
    pub payload: Bytes,
}

/// Wireless link abstraction
#[async_trait]
pub trait Transport: Send + Sync {
    /// Address this node transmits from
    fn local_address(&self) -> PeerAddress;

    /// Send one datagram to `dst`, or to every node for the broadcast address
    async fn send(&self, dst: PeerAddress, payload: Bytes) -> Result<(), TransportError>;
}

/// UDP transport settings
#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    /// Link-layer identity stamped on every datagram
    pub address: PeerAddress,
    /// Local socket to bind
    pub bind: SocketAddr,
    /// Destination used for broadcast sends
    pub broadcast: SocketAddr,
    /// Inbound channel depth
    pub inbound_depth: usize,
}

/// Broadcast radio emulated over UDP.
///
/// Each datagram is prefixed with the sender's 6-byte address. Socket
/// addresses of peers are learned from their traffic so later unicasts can be
/// addressed directly.
#[derive(Debug)]
pub struct UdpTransport {
    address: PeerAddress,
    socket: Arc<UdpSocket>,
    broadcast: SocketAddr,
    routes: Arc<DashMap<PeerAddress, SocketAddr>>,
    recv_task: JoinHandle<()>,
}

impl UdpTransport {
    /// Bind the socket and start the receive task
    pub async fn bind(
        config: UdpTransportConfig,
    ) -> Result<(Self, mpsc::Receiver<Datagram>), TransportError> {
        let socket = UdpSocket::bind(config.bind).await?;
        socket.set_broadcast(true)?;
        let socket = Arc::new(socket);

        info!(
            address = %config.address,
            bind = %socket.local_addr()?,
            broadcast = %config.broadcast,
            "UDP transport bound"
        );

        let routes = Arc::new(DashMap::new());
        let (tx, rx) = mpsc::channel(config.inbound_depth.max(1));
        let recv_task = tokio::spawn(recv_loop(Arc::clone(&socket), Arc::clone(&routes), tx));

        Ok((
            Self {
                address: config.address,
                socket,
                broadcast: config.broadcast,
                routes,
                recv_task,
            },
            rx,
        ))
    }

    /// Socket address actually bound
    pub fn local_socket(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Socket address learned for `peer`, if any
    pub fn route(&self, peer: &PeerAddress) -> Option<SocketAddr> {
        self.routes.get(peer).map(|entry| *entry.value())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn local_address(&self) -> PeerAddress {
        self.address
    }

    async fn send(&self, dst: PeerAddress, payload: Bytes) -> Result<(), TransportError> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::Oversize(payload.len()));
        }

        let target = if dst.is_broadcast() {
            self.broadcast
        } else {
            self.route(&dst).ok_or(TransportError::UnknownPeer(dst))?
        };

        let mut datagram = BytesMut::with_capacity(ADDRESS_LEN + payload.len());
        datagram.put_slice(self.address.as_bytes());
        datagram.put_slice(&payload);

        self.socket.send_to(&datagram, target).await?;
        trace!(dst = %dst, to = %target, len = payload.len(), "Datagram sent");
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    routes: Arc<DashMap<PeerAddress, SocketAddr>>,
    tx: mpsc::Sender<Datagram>,
) {
    let mut buf = vec![0u8; ADDRESS_LEN + MAX_MESSAGE_SIZE + 1];
    let mut failures: u32 = 0;
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => {
                failures = 0;
                received
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let pause = recv_backoff(failures);
                error!(error = %e, failures, retry_in = ?pause, "UDP receive failed");
                tokio::time::sleep(pause).await;
                continue;
            }
        };

        let Some(source) = PeerAddress::from_slice(&buf[..len]) else {
            debug!(from = %from, len, "Ignoring datagram without sender address");
            continue;
        };
        routes.insert(source, from);

        let datagram = Datagram {
            source,
            payload: Bytes::copy_from_slice(&buf[ADDRESS_LEN..len]),
        };
        match tx.try_send(datagram) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(source = %source, "Inbound queue full, dropping datagram");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Inbound receiver dropped, stopping UDP receive loop");
                return;
            }
        }
    }
}

/// In-process broadcast medium connecting [`MemoryTransport`]s.
///
/// Broadcasts reach every attached node, the sender included, the way a
/// radio hears its own broadcast on a shared channel.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    nodes: Arc<DashMap<PeerAddress, mpsc::Sender<Datagram>>>,
}

impl MemoryHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node and return its transport and inbound channel
    pub fn attach(
        &self,
        address: PeerAddress,
        depth: usize,
    ) -> (MemoryTransport, mpsc::Receiver<Datagram>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        self.nodes.insert(address, tx);
        (
            MemoryTransport {
                address,
                hub: self.clone(),
            },
            rx,
        )
    }

    /// Detach a node; later sends to it fail
    pub fn detach(&self, address: &PeerAddress) {
        self.nodes.remove(address);
    }

    /// Number of attached nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node is attached
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn deliver(&self, dst: PeerAddress, datagram: Datagram) -> Result<(), TransportError> {
        let tx = self
            .nodes
            .get(&dst)
            .map(|entry| entry.value().clone())
            .ok_or(TransportError::UnknownPeer(dst))?;

        tx.try_send(datagram).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Congested(dst),
            TrySendError::Closed(_) => TransportError::Unreachable(dst),
        })
    }
}

/// One node's view of a [`MemoryHub`]
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    address: PeerAddress,
    hub: MemoryHub,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_address(&self) -> PeerAddress {
        self.address
    }

    async fn send(&self, dst: PeerAddress, payload: Bytes) -> Result<(), TransportError> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::Oversize(payload.len()));
        }

        let datagram = Datagram {
            source: self.address,
            payload,
        };

        if !dst.is_broadcast() {
            return self.hub.deliver(dst, datagram);
        }

        let receivers: Vec<PeerAddress> = self.hub.nodes.iter().map(|e| *e.key()).collect();
        for receiver in receivers {
            // A slow listener must not stop the broadcast for the others
            if let Err(e) = self.hub.deliver(receiver, datagram.clone()) {
                debug!(receiver = %receiver, error = %e, "Broadcast not delivered");
            }
        }
        Ok(())
    }
}
