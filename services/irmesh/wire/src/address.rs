//! Six-byte link-layer peer addresses.

use crate::error::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address length in bytes
pub const ADDRESS_LEN: usize = 6;

/// Link-layer identifier of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress(pub [u8; ADDRESS_LEN]);

impl PeerAddress {
    /// All-ones broadcast sentinel; never a registered peer
    pub const BROADCAST: PeerAddress = PeerAddress([0xFF; ADDRESS_LEN]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Whether this is the broadcast sentinel
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Read an address from the first six bytes of `buf`
    pub fn from_slice(buf: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_LEN] = buf.get(..ADDRESS_LEN)?.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for PeerAddress {
    type Err = WireError;

    /// Accepts `AA:BB:CC:DD:EE:FF` or `aa-bb-cc-dd-ee-ff`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != ADDRESS_LEN {
            return Err(WireError::Address(s.to_string()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        for (slot, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(WireError::Address(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| WireError::Address(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerAddress> for String {
    fn from(address: PeerAddress) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let addr = PeerAddress::new([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56]);
        assert_eq!(addr.to_string(), "24:0A:C4:12:34:56");
        assert_eq!("24:0a:c4:12:34:56".parse::<PeerAddress>().unwrap(), addr);
        assert_eq!("24-0A-C4-12-34-56".parse::<PeerAddress>().unwrap(), addr);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("24:0a:c4:12:34".parse::<PeerAddress>().is_err());
        assert!("24:0a:c4:12:34:zz".parse::<PeerAddress>().is_err());
        assert!("240:a:c4:12:34:56".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn test_broadcast() {
        assert!(PeerAddress::BROADCAST.is_broadcast());
        assert_eq!(PeerAddress::BROADCAST.to_string(), "FF:FF:FF:FF:FF:FF");
        assert!(!PeerAddress::new([0; 6]).is_broadcast());
    }

    #[test]
    fn test_from_slice() {
        let buf = [1, 2, 3, 4, 5, 6, 7];
        assert_eq!(
            PeerAddress::from_slice(&buf),
            Some(PeerAddress::new([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(PeerAddress::from_slice(&buf[..5]), None);
    }

    #[test]
    fn test_serde_as_string() {
        let addr: PeerAddress = serde_yaml::from_str("\"02:00:00:00:00:01\"").unwrap();
        assert_eq!(addr, PeerAddress::new([2, 0, 0, 0, 0, 1]));
    }
}
