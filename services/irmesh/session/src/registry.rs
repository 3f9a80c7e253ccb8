//! Bounded, append-only table of discovered peers.
//!
//! Peers are recorded in the order they were first heard from and are never
//! updated or removed. Once the table holds `MAX_PEERS` entries, new peers are
//! rejected and existing ones are unaffected.

use irmesh_wire::{PeerAddress, PeerCapabilities};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Default registry capacity
pub const MAX_PEERS: usize = 20;

/// A known peer eligible to receive unicast traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRecord {
    /// Link-layer address
    pub address: PeerAddress,
    /// Capabilities advertised when first seen
    pub capabilities: PeerCapabilities,
}

/// Result of [`PeerRegistry::add_peer_if_needed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPeerOutcome {
    /// Address was already registered; nothing changed
    AlreadyPresent,
    /// New entry appended
    Registered,
    /// Registry is full
    RejectedCapacity,
    /// The broadcast sentinel is never a peer
    RejectedBroadcast,
}

impl AddPeerOutcome {
    /// Whether the address is now (or already was) in the registry
    pub fn is_known(&self) -> bool {
        matches!(self, AddPeerOutcome::AlreadyPresent | AddPeerOutcome::Registered)
    }
}

/// Registry of discovered peers
#[derive(Debug)]
pub struct PeerRegistry {
    peers: RwLock<Vec<PeerRecord>>,
    capacity: usize,
}

impl PeerRegistry {
    /// Create an empty registry holding at most `capacity` peers
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: RwLock::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Register `address` unless it is already known or the table is full
    pub fn add_peer_if_needed(
        &self,
        address: PeerAddress,
        capabilities: PeerCapabilities,
    ) -> AddPeerOutcome {
        if address.is_broadcast() {
            return AddPeerOutcome::RejectedBroadcast;
        }

        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        if peers.iter().any(|p| p.address == address) {
            debug!(peer = %address, "Peer already registered");
            return AddPeerOutcome::AlreadyPresent;
        }

        if peers.len() >= self.capacity {
            warn!(
                peer = %address,
                capacity = self.capacity,
                "Peer registry full, ignoring new peer"
            );
            return AddPeerOutcome::RejectedCapacity;
        }

        peers.push(PeerRecord {
            address,
            capabilities,
        });
        info!(
            peer = %address,
            capabilities = ?capabilities,
            total = peers.len(),
            "New peer: {}",
            address
        );
        AddPeerOutcome::Registered
    }

    /// Visit every peer in registration order
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&PeerRecord),
    {
        for peer in self.read().iter() {
            f(peer);
        }
    }

    /// Copy of the current entries, in registration order
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.read().clone()
    }

    /// Whether `address` is registered
    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.read().iter().any(|p| p.address == *address)
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no peer has been registered yet
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Maximum number of peers
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<PeerRecord>> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new(MAX_PEERS)
    }
}
