//! Fixed message header: type tag and group code.
//!
//! Every message starts with an 8-byte type tag and a 16-byte group code, both
//! ASCII and NUL padded. Receivers dispatch on the tag alone.

use crate::error::WireError;
use bitflags::bitflags;
use bytes::BufMut;
use irmesh_pulse::CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag width
pub const TYPE_TAG_LEN: usize = 8;
/// Group code width
pub const GROUP_CODE_LEN: usize = 16;
/// Tag plus group code
pub const HEADER_LEN: usize = TYPE_TAG_LEN + GROUP_CODE_LEN;
/// Data field carried by HELLO, WELCOME and DATA
pub const DATA_FIELD_LEN: usize = 32;
/// Target identifier width in IR messages
pub const TARGET_ID_LEN: usize = 32;
/// Size of every HELLO, WELCOME and DATA message
pub const CONTROL_MESSAGE_SIZE: usize = HEADER_LEN + DATA_FIELD_LEN;
/// IR message size before the durations
pub const IR_FIXED_LEN: usize = HEADER_LEN + TARGET_ID_LEN + 4;
/// Largest message on the wire: an IR signal at full capacity
pub const MAX_MESSAGE_SIZE: usize = IR_FIXED_LEN + 4 * CAPACITY;

/// Target identifier that addresses every node
pub const BROADCAST_TARGET: &str = "TODOS";

/// Message discriminant carried in the type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Discovery broadcast
    Hello,
    /// Reply to a HELLO
    Welcome,
    /// Advisory data
    Data,
    /// Raw IR signal for replay
    IrSignal,
}

impl MessageType {
    /// ASCII tag as written on the wire (before padding)
    pub fn tag(self) -> &'static str {
        match self {
            MessageType::Hello => "HELLO",
            MessageType::Welcome => "WELCOME",
            MessageType::Data => "DATA",
            MessageType::IrSignal => "IR",
        }
    }

    /// Write the padded tag
    pub fn encode(self, buf: &mut impl BufMut) {
        put_padded(buf, self.tag().as_bytes(), TYPE_TAG_LEN);
    }
}

impl TryFrom<&[u8]> for MessageType {
    type Error = WireError;

    fn try_from(field: &[u8]) -> Result<Self, Self::Error> {
        match read_padded(field, "type")? {
            "HELLO" => Ok(MessageType::Hello),
            "WELCOME" => Ok(MessageType::Welcome),
            "DATA" => Ok(MessageType::Data),
            "IR" => Ok(MessageType::IrSignal),
            other => Err(WireError::Type(other.to_string())),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

bitflags! {
    /// What a node can do, advertised in HELLO and WELCOME
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PeerCapabilities: u8 {
        /// Has an IR emitter and replays signals
        const IR_EMITTER = 1 << 0;
        /// Has an IR receiver and captures signals
        const IR_RECEIVER = 1 << 1;
    }
}

impl Default for PeerCapabilities {
    fn default() -> Self {
        PeerCapabilities::empty()
    }
}

/// Shared plaintext tag scoping mesh membership
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupCode(String);

impl GroupCode {
    /// Validate a configured group code (1..=15 ASCII bytes)
    pub fn new(code: impl Into<String>) -> Result<Self, WireError> {
        let code = code.into();
        if code.is_empty() || code.len() >= GROUP_CODE_LEN || !is_wire_text(&code) {
            return Err(WireError::Field("group code"));
        }
        Ok(Self(code))
    }

    /// Read the group field of a received message.
    ///
    /// Any terminated text is accepted here; comparison decides membership.
    pub fn decode(field: &[u8]) -> Result<Self, WireError> {
        read_padded(field, "group code").map(|code| Self(code.to_string()))
    }

    /// Write the padded field
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_padded(buf, self.0.as_bytes(), GROUP_CODE_LEN);
    }

    /// Code as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GroupCode {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupCode> for String {
    fn from(code: GroupCode) -> Self {
        code.0
    }
}

/// Destination of an IR signal: a node identity or [`BROADCAST_TARGET`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetId(String);

impl TargetId {
    /// Validate an identifier (1..=31 bytes)
    pub fn new(id: impl Into<String>) -> Result<Self, WireError> {
        let id = id.into();
        if id.is_empty() || id.len() >= TARGET_ID_LEN || !is_wire_text(&id) {
            return Err(WireError::Field("target id"));
        }
        Ok(Self(id))
    }

    /// The every-node target
    pub fn broadcast() -> Self {
        Self(BROADCAST_TARGET.to_string())
    }

    /// Whether this addresses every node
    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST_TARGET
    }

    /// Read the target field of a received IR message
    pub fn decode(field: &[u8]) -> Result<Self, WireError> {
        let id = read_padded(field, "target id")?;
        Self::new(id)
    }

    /// Write the padded field
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_padded(buf, self.0.as_bytes(), TARGET_ID_LEN);
    }

    /// Identifier as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TargetId {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetId> for String {
    fn from(id: TargetId) -> Self {
        id.0
    }
}

/// Printable ASCII without NUL
fn is_wire_text(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_graphic() || b == b' ')
}

/// Write `value` NUL padded to `width`; callers guarantee `value.len() < width`
pub(crate) fn put_padded(buf: &mut impl BufMut, value: &[u8], width: usize) {
    let len = value.len().min(width - 1);
    buf.put_slice(&value[..len]);
    buf.put_bytes(0, width - len);
}

/// Text up to the first NUL; the field must contain one
pub(crate) fn read_padded<'a>(field: &'a [u8], name: &'static str) -> Result<&'a str, WireError> {
    let end = field
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::Field(name))?;
    std::str::from_utf8(&field[..end]).map_err(|_| WireError::Field(name))
}
