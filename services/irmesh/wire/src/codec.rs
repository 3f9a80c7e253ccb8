//! Message taxonomy and its fixed-layout encoding.
//!
//! ```text
//! HELLO / WELCOME / DATA (56 bytes)
//! +---------+--------------+-------------------------------+
//! | tag (8) | group (16)   | data (32)                     |
//! +---------+--------------+-------------------------------+
//!
//! IR (60 + 4 * count bytes)
//! +---------+--------------+-------------+-----------+------------------+
//! | tag (8) | group (16)   | target (32) | count u32 | count * u32 (us) |
//! +---------+--------------+-------------+-----------+------------------+
//! ```
//!
//! Integers are little-endian. HELLO and WELCOME carry capability bits in the
//! first data byte; DATA carries NUL-padded text.

use crate::error::WireError;
use crate::header::{
    put_padded, read_padded, GroupCode, MessageType, PeerCapabilities, TargetId,
    CONTROL_MESSAGE_SIZE, DATA_FIELD_LEN, GROUP_CODE_LEN, HEADER_LEN, IR_FIXED_LEN,
    TARGET_ID_LEN, TYPE_TAG_LEN,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use irmesh_pulse::{PulseSequence, CAPACITY};

/// Per-variant content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Discovery broadcast
    Hello {
        /// Sender capabilities
        capabilities: PeerCapabilities,
    },
    /// Reply to a HELLO
    Welcome {
        /// Sender capabilities
        capabilities: PeerCapabilities,
    },
    /// Advisory text, at most 31 bytes
    Data {
        /// Free-form payload
        text: String,
    },
    /// Raw IR signal to replay
    IrSignal {
        /// Node identity or broadcast target
        target: TargetId,
        /// Durations to replay
        pulses: PulseSequence,
    },
}

/// One message exchanged between nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshMessage {
    /// Group the sender belongs to
    pub group: GroupCode,
    /// Variant content
    pub body: MessageBody,
}

impl MeshMessage {
    /// Build a HELLO
    pub fn hello(group: GroupCode, capabilities: PeerCapabilities) -> Self {
        Self {
            group,
            body: MessageBody::Hello { capabilities },
        }
    }

    /// Build a WELCOME
    pub fn welcome(group: GroupCode, capabilities: PeerCapabilities) -> Self {
        Self {
            group,
            body: MessageBody::Welcome { capabilities },
        }
    }

    /// Build a DATA message
    pub fn data(group: GroupCode, text: impl Into<String>) -> Self {
        Self {
            group,
            body: MessageBody::Data { text: text.into() },
        }
    }

    /// Build an IR signal message
    pub fn ir_signal(group: GroupCode, target: TargetId, pulses: PulseSequence) -> Self {
        Self {
            group,
            body: MessageBody::IrSignal { target, pulses },
        }
    }

    /// Discriminant of the body
    pub fn message_type(&self) -> MessageType {
        match self.body {
            MessageBody::Hello { .. } => MessageType::Hello,
            MessageBody::Welcome { .. } => MessageType::Welcome,
            MessageBody::Data { .. } => MessageType::Data,
            MessageBody::IrSignal { .. } => MessageType::IrSignal,
        }
    }

    /// Exact encoded length
    pub fn encoded_size(&self) -> usize {
        match &self.body {
            MessageBody::IrSignal { pulses, .. } => IR_FIXED_LEN + 4 * pulses.len(),
            _ => CONTROL_MESSAGE_SIZE,
        }
    }

    /// Encode to a contiguous buffer
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());

        self.message_type().encode(&mut buf);
        self.group.encode(&mut buf);

        match &self.body {
            MessageBody::Hello { capabilities } | MessageBody::Welcome { capabilities } => {
                buf.put_u8(capabilities.bits());
                buf.put_bytes(0, DATA_FIELD_LEN - 1);
            }
            MessageBody::Data { text } => {
                if text.len() >= DATA_FIELD_LEN || text.as_bytes().contains(&0) {
                    return Err(WireError::Field("data"));
                }
                put_padded(&mut buf, text.as_bytes(), DATA_FIELD_LEN);
            }
            MessageBody::IrSignal { target, pulses } => {
                target.encode(&mut buf);
                buf.put_u32_le(pulses.len() as u32);
                for &duration in pulses.as_slice() {
                    buf.put_u32_le(duration);
                }
            }
        }

        Ok(buf.freeze())
    }

    /// Decode one message; the type tag decides the expected layout
    pub fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Incomplete(buf.len()));
        }
        let total = buf.len();

        let typ = MessageType::try_from(&buf[..TYPE_TAG_LEN])?;
        buf.advance(TYPE_TAG_LEN);
        let group = GroupCode::decode(&buf[..GROUP_CODE_LEN])?;
        buf.advance(GROUP_CODE_LEN);

        let body = match typ {
            MessageType::Hello | MessageType::Welcome | MessageType::Data => {
                expect_size(typ, total, CONTROL_MESSAGE_SIZE)?;
                let field = &buf[..DATA_FIELD_LEN];
                match typ {
                    MessageType::Hello => MessageBody::Hello {
                        // Unknown bits from newer nodes are ignored
                        capabilities: PeerCapabilities::from_bits_truncate(field[0]),
                    },
                    MessageType::Welcome => MessageBody::Welcome {
                        capabilities: PeerCapabilities::from_bits_truncate(field[0]),
                    },
                    _ => MessageBody::Data {
                        text: read_padded(field, "data")?.to_string(),
                    },
                }
            }
            MessageType::IrSignal => {
                if total < IR_FIXED_LEN {
                    return Err(WireError::Size {
                        kind: typ.tag(),
                        actual: total,
                        expected: IR_FIXED_LEN,
                    });
                }
                let target = TargetId::decode(&buf[..TARGET_ID_LEN])?;
                buf.advance(TARGET_ID_LEN);

                let count = buf.get_u32_le();
                if count == 0 || count as usize > CAPACITY {
                    return Err(WireError::PulseCount(count));
                }
                expect_size(typ, total, IR_FIXED_LEN + 4 * count as usize)?;

                let durations = (0..count).map(|_| buf.get_u32_le()).collect();
                MessageBody::IrSignal {
                    target,
                    pulses: PulseSequence::new(durations)?,
                }
            }
        };

        Ok(Self { group, body })
    }
}

fn expect_size(typ: MessageType, actual: usize, expected: usize) -> Result<(), WireError> {
    if actual != expected {
        return Err(WireError::Size {
            kind: typ.tag(),
            actual,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::MAX_MESSAGE_SIZE;

    fn group() -> GroupCode {
        GroupCode::new("GRUPO_X").unwrap()
    }

    fn pulses() -> PulseSequence {
        PulseSequence::new(vec![9000, 4500, 560, 560, 560, 1690, 560, 40000]).unwrap()
    }

    #[test]
    fn test_hello_layout() {
        let msg = MeshMessage::hello(group(), PeerCapabilities::IR_EMITTER);
        let bytes = msg.encode().unwrap();

        assert_eq!(bytes.len(), CONTROL_MESSAGE_SIZE);
        assert_eq!(&bytes[..8], b"HELLO\0\0\0");
        assert_eq!(&bytes[8..16], b"GRUPO_X\0");
        assert_eq!(bytes[24], PeerCapabilities::IR_EMITTER.bits());
        assert_eq!(MeshMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_data_message() {
        let msg = MeshMessage::data(group(), "LED ON");
        let bytes = msg.encode().unwrap();
        assert_eq!(MeshMessage::decode(&bytes).unwrap(), msg);

        let too_long = MeshMessage::data(group(), "x".repeat(32));
        assert_eq!(too_long.encode(), Err(WireError::Field("data")));
    }

    #[test]
    fn test_ir_signal_layout() {
        let msg = MeshMessage::ir_signal(group(), TargetId::broadcast(), pulses());
        let bytes = msg.encode().unwrap();

        assert_eq!(bytes.len(), msg.encoded_size());
        assert_eq!(bytes.len(), IR_FIXED_LEN + 32);
        assert_eq!(&bytes[..8], b"IR\0\0\0\0\0\0");
        assert_eq!(&bytes[24..30], b"TODOS\0");
        assert_eq!(&bytes[56..60], &8u32.to_le_bytes());
        assert_eq!(&bytes[60..64], &9000u32.to_le_bytes());
        assert_eq!(MeshMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_full_capacity_fits_max_size() {
        let full = PulseSequence::new(vec![560; CAPACITY]).unwrap();
        let msg = MeshMessage::ir_signal(group(), TargetId::new("1").unwrap(), full);
        assert_eq!(msg.encode().unwrap().len(), MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_tag_decides_not_length() {
        // A control-sized buffer tagged IR is still parsed as IR, and fails
        let mut bytes = BytesMut::from(
            &MeshMessage::hello(group(), PeerCapabilities::empty())
                .encode()
                .unwrap()[..],
        );
        bytes[..8].copy_from_slice(b"IR\0\0\0\0\0\0");
        assert!(MeshMessage::decode(&bytes).is_err());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let bytes = MeshMessage::hello(group(), PeerCapabilities::empty())
            .encode()
            .unwrap();
        let mut longer = bytes.to_vec();
        longer.push(0);
        assert!(matches!(
            MeshMessage::decode(&longer),
            Err(WireError::Size { kind: "HELLO", .. })
        ));

        let ir = MeshMessage::ir_signal(group(), TargetId::broadcast(), pulses())
            .encode()
            .unwrap();
        assert!(matches!(
            MeshMessage::decode(&ir[..ir.len() - 4]),
            Err(WireError::Size { kind: "IR", .. })
        ));
        assert_eq!(
            MeshMessage::decode(&ir[..10]),
            Err(WireError::Incomplete(10))
        );
    }

    #[test]
    fn test_bad_pulse_count_rejected() {
        let mut ir = MeshMessage::ir_signal(group(), TargetId::broadcast(), pulses())
            .encode()
            .unwrap()
            .to_vec();
        ir[56..60].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(MeshMessage::decode(&ir), Err(WireError::PulseCount(0)));

        ir[56..60].copy_from_slice(&((CAPACITY as u32) + 1).to_le_bytes());
        assert_eq!(
            MeshMessage::decode(&ir),
            Err(WireError::PulseCount(CAPACITY as u32 + 1))
        );
    }

    #[test]
    fn test_foreign_group_still_decodes() {
        let other = GroupCode::new("OTHER").unwrap();
        let bytes = MeshMessage::hello(other.clone(), PeerCapabilities::empty())
            .encode()
            .unwrap();
        assert_eq!(MeshMessage::decode(&bytes).unwrap().group, other);
    }
}
