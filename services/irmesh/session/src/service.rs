//! Mesh message dispatch: inbound validation, peer bookkeeping and IR relay.
//!
//! One [`MeshService`] exists per node. It owns the [`PeerRegistry`], sends
//! through a shared [`Transport`] and hands accepted IR signals to the
//! playback queue.

use crate::registry::{AddPeerOutcome, PeerRegistry, MAX_PEERS};
use crate::status::StatusSink;
use crate::transport::{Datagram, Transport};
use irmesh_pulse::{EnqueueOutcome, PlaybackHandle, PulseSequence};
use irmesh_wire::{
    GroupCode, MeshMessage, MessageBody, MessageType, PeerAddress, PeerCapabilities, TargetId,
    WireError,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Node identity and membership
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Identifier matched against IR targets
    pub node_id: TargetId,
    /// Group this node belongs to
    pub group: GroupCode,
    /// Capabilities advertised in HELLO and WELCOME
    pub capabilities: PeerCapabilities,
    /// Registry capacity
    pub max_peers: usize,
}

impl MeshConfig {
    /// Config with default capabilities and capacity
    pub fn new(node_id: TargetId, group: GroupCode) -> Self {
        Self {
            node_id,
            group,
            capabilities: PeerCapabilities::IR_EMITTER | PeerCapabilities::IR_RECEIVER,
            max_peers: MAX_PEERS,
        }
    }
}

/// Why an inbound datagram was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Sent by this node (broadcast loopback)
    SelfOrigin,
    /// Unknown type tag, wrong size or bad field
    Malformed,
    /// Group code differs from ours
    ForeignGroup,
    /// IR signal addressed to another node
    NotForUs,
}

/// What [`MeshService::on_receive`] did with a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// HELLO, WELCOME or DATA from a group member
    Peer {
        /// Message kind
        kind: MessageType,
        /// Registry result for the sender
        outcome: AddPeerOutcome,
    },
    /// IR signal for this node, handed to playback
    Playback(EnqueueOutcome),
    /// Ignored
    Discarded(DiscardReason),
}

/// Per-peer fan-out summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Peers a send was attempted to
    pub attempted: usize,
    /// Sends the transport accepted
    pub delivered: usize,
    /// Sends that failed
    pub failed: usize,
}

/// Protocol state machine for one node
pub struct MeshService {
    config: MeshConfig,
    transport: Arc<dyn Transport>,
    registry: PeerRegistry,
    playback: PlaybackHandle,
    status: Arc<dyn StatusSink>,
}

impl MeshService {
    /// Create the service; the registry starts empty
    pub fn new(
        config: MeshConfig,
        transport: Arc<dyn Transport>,
        playback: PlaybackHandle,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        info!(
            node_id = %config.node_id,
            group = %config.group,
            address = %transport.local_address(),
            "My address is {}",
            transport.local_address()
        );
        Self {
            registry: PeerRegistry::new(config.max_peers),
            config,
            transport,
            playback,
            status,
        }
    }

    /// Address this node sends from
    pub fn local_address(&self) -> PeerAddress {
        self.transport.local_address()
    }

    /// Node configuration
    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Known peers
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Local playback queue
    pub fn playback(&self) -> &PlaybackHandle {
        &self.playback
    }

    /// Status line collaborator
    pub fn status(&self) -> &dyn StatusSink {
        self.status.as_ref()
    }

    /// Validate and dispatch one inbound datagram
    pub async fn on_receive(&self, payload: &[u8], source: PeerAddress) -> ReceiveOutcome {
        if source == self.local_address() {
            debug!("Ignoring message from own address");
            return ReceiveOutcome::Discarded(DiscardReason::SelfOrigin);
        }

        let message = match MeshMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    peer = %source,
                    len = payload.len(),
                    error = %e,
                    "Discarding malformed message"
                );
                return ReceiveOutcome::Discarded(DiscardReason::Malformed);
            }
        };

        let kind = message.message_type();
        debug!(peer = %source, kind = %kind, "{} from {}", kind, source);

        if message.group != self.config.group {
            warn!(
                peer = %source,
                group = %message.group,
                "Invalid group code: {}",
                message.group
            );
            return ReceiveOutcome::Discarded(DiscardReason::ForeignGroup);
        }

        match message.body {
            MessageBody::Hello { capabilities } => {
                let outcome = self.registry.add_peer_if_needed(source, capabilities);
                self.send_welcome(source).await;
                ReceiveOutcome::Peer {
                    kind: MessageType::Hello,
                    outcome,
                }
            }
            MessageBody::Welcome { capabilities } => ReceiveOutcome::Peer {
                kind: MessageType::Welcome,
                outcome: self.registry.add_peer_if_needed(source, capabilities),
            },
            MessageBody::Data { text } => {
                let outcome = self
                    .registry
                    .add_peer_if_needed(source, PeerCapabilities::empty());
                info!(peer = %source, "Content: '{}'", text);
                self.status.show(&text);
                ReceiveOutcome::Peer {
                    kind: MessageType::Data,
                    outcome,
                }
            }
            MessageBody::IrSignal { target, pulses } => {
                info!(
                    peer = %source,
                    target = %target,
                    pulses = pulses.len(),
                    "IR received from {}",
                    source
                );
                if !self.accepts(&target) {
                    debug!(target = %target, "IR signal addressed to another node");
                    return ReceiveOutcome::Discarded(DiscardReason::NotForUs);
                }

                let len = pulses.len();
                let outcome = self.playback.enqueue(pulses);
                if outcome.is_queued() {
                    self.status.show(&format!("IR recv {} pulses", len));
                }
                ReceiveOutcome::Playback(outcome)
            }
        }
    }

    /// Whether an IR signal for `target` should play here
    pub fn accepts(&self, target: &TargetId) -> bool {
        target.is_broadcast() || *target == self.config.node_id
    }

    /// Broadcast one HELLO
    pub async fn send_hello(&self) -> Result<(), anyhow::Error> {
        let hello = MeshMessage::hello(self.config.group.clone(), self.config.capabilities);
        self.transport
            .send(PeerAddress::BROADCAST, hello.encode()?)
            .await?;
        debug!(group = %self.config.group, "HELLO broadcast");
        Ok(())
    }

    async fn send_welcome(&self, peer: PeerAddress) {
        let welcome = MeshMessage::welcome(self.config.group.clone(), self.config.capabilities);
        match welcome.encode() {
            Ok(bytes) => {
                if let Err(e) = self.transport.send(peer, bytes).await {
                    error!(peer = %peer, error = %e, "Failed to send WELCOME");
                }
            }
            Err(e) => error!(error = %e, "Failed to encode WELCOME"),
        }
    }

    /// Unicast an IR signal to every registered peer
    pub async fn send_ir(&self, target: &TargetId, pulses: &PulseSequence) -> RelayReport {
        let message =
            MeshMessage::ir_signal(self.config.group.clone(), target.clone(), pulses.clone());
        let report = match message.encode() {
            Ok(bytes) => self.fan_out(bytes).await,
            Err(e) => {
                error!(error = %e, "Failed to encode IR signal");
                return RelayReport::default();
            }
        };

        info!(
            target = %target,
            pulses = pulses.len(),
            delivered = report.delivered,
            failed = report.failed,
            "IR relayed to {} of {} peers",
            report.delivered,
            report.attempted
        );
        self.status
            .show(&format!("IR sent {}/{}", report.delivered, report.attempted));
        report
    }

    /// Unicast advisory text to every registered peer
    pub async fn send_data(&self, text: &str) -> Result<RelayReport, WireError> {
        let bytes = MeshMessage::data(self.config.group.clone(), text).encode()?;
        let report = self.fan_out(bytes).await;
        debug!(
            delivered = report.delivered,
            attempted = report.attempted,
            "DATA sent"
        );
        Ok(report)
    }

    async fn fan_out(&self, bytes: bytes::Bytes) -> RelayReport {
        let mut report = RelayReport::default();
        for peer in self.registry.snapshot() {
            report.attempted += 1;
            match self.transport.send(peer.address, bytes.clone()).await {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(peer = %peer.address, "Sent to {}: SUCCESS", peer.address);
                }
                Err(e) => {
                    report.failed += 1;
                    error!(peer = %peer.address, error = %e, "Sent to {}: FAILURE", peer.address);
                }
            }
        }
        report
    }

    /// Dispatch inbound datagrams until the transport closes the channel
    pub async fn run_inbound(self: Arc<Self>, mut inbound: mpsc::Receiver<Datagram>) {
        info!("Inbound dispatch started");
        while let Some(datagram) = inbound.recv().await {
            self.on_receive(&datagram.payload, datagram.source).await;
        }
        info!("Inbound channel closed, dispatch stopped");
    }
}

impl std::fmt::Debug for MeshService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshService")
            .field("config", &self.config)
            .field("address", &self.local_address())
            .field("peers", &self.registry.len())
            .finish()
    }
}
