//! Session layer error types.

use irmesh_wire::PeerAddress;
use thiserror::Error;

/// Datagram transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket level failure
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No route to the destination address has been learned yet
    #[error("unknown peer {0}")]
    UnknownPeer(PeerAddress),

    /// Destination inbox is full; the datagram was dropped
    #[error("peer {0} is not keeping up, datagram dropped")]
    Congested(PeerAddress),

    /// Destination has gone away
    #[error("peer {0} is unreachable")]
    Unreachable(PeerAddress),

    /// Datagram larger than any valid message
    #[error("datagram of {0} bytes exceeds the maximum message size")]
    Oversize(usize),
}
