//! Wire protocol message taxonomy, addressing and fixed-layout encoding for irmesh.
//!
//! Nodes exchange small datagrams over a best-effort broadcast radio. Each
//! datagram is exactly one [`MeshMessage`]; there is no framing, chunking or
//! reassembly.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | type tag (8B)        | HELLO / WELCOME / DATA / IR|
//! +----------------------+----------------------------+
//! | group code (16B)     | namespace isolation        |
//! +----------------------+----------------------------+
//! | variant payload      | 32B data field, or         |
//! |                      | target + count + durations |
//! +----------------------+----------------------------+
//! ```
//!
//! Variants are distinguished by the type tag only, never by length.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod codec;
pub mod error;
pub mod header;

// Re-export main types
pub use address::{PeerAddress, ADDRESS_LEN};
pub use codec::{MeshMessage, MessageBody};
pub use error::WireError;
pub use header::{
    GroupCode, MessageType, PeerCapabilities, TargetId, BROADCAST_TARGET, CONTROL_MESSAGE_SIZE,
    HEADER_LEN, MAX_MESSAGE_SIZE,
};
