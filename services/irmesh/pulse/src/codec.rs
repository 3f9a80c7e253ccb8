//! Conversion between raw durations and hardware `(mark, space)` symbols.
//!
//! Timing peripherals (e.g. an RMT-style capture/transmit block) work in
//! symbols that carry one mark and one space each. These functions are pure.

use crate::sequence::CAPACITY;

/// One hardware symbol: a mark followed by a space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareSymbol {
    /// Carrier-on duration in microseconds
    pub mark: u32,
    /// Carrier-off duration in microseconds
    pub space: u32,
}

impl HardwareSymbol {
    /// Create a symbol
    pub fn new(mark: u32, space: u32) -> Self {
        Self { mark, space }
    }
}

/// Result of expanding symbols back into durations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedPulses {
    /// Expanded durations, at most `CAPACITY`
    pub durations: Vec<u32>,
    /// Set when symbols were left over because of `CAPACITY`
    pub truncated: bool,
}

/// Pair durations `(2i, 2i + 1)` into symbols.
///
/// An odd-length input loses its final duration. This is intentional: padding
/// it would change what existing peers receive on the wire.
pub fn encode(durations: &[u32]) -> Vec<HardwareSymbol> {
    durations
        .chunks_exact(2)
        .map(|pair| HardwareSymbol::new(pair[0], pair[1]))
        .collect()
}

/// Expand symbols into durations, stopping before `CAPACITY` would be exceeded
pub fn decode(symbols: &[HardwareSymbol]) -> DecodedPulses {
    let mut durations = Vec::with_capacity((symbols.len() * 2).min(CAPACITY));
    let mut truncated = false;

    for symbol in symbols {
        if durations.len() + 2 > CAPACITY {
            truncated = true;
            break;
        }
        durations.push(symbol.mark);
        durations.push(symbol.space);
    }

    DecodedPulses {
        durations,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_length_roundtrip() {
        let pulses = vec![9000, 4500, 560, 560, 560, 1690, 560, 40000];
        let symbols = encode(&pulses);
        assert_eq!(symbols.len(), 4);
        assert_eq!(symbols[0], HardwareSymbol::new(9000, 4500));

        let decoded = decode(&symbols);
        assert!(!decoded.truncated);
        assert_eq!(decoded.durations, pulses);
    }

    #[test]
    fn test_roundtrip_at_capacity() {
        let pulses: Vec<u32> = (0..CAPACITY as u32).map(|i| 300 + i).collect();
        let decoded = decode(&encode(&pulses));
        assert!(!decoded.truncated);
        assert_eq!(decoded.durations, pulses);
    }

    #[test]
    fn test_odd_length_drops_last_duration() {
        let symbols = encode(&[9000, 4500, 560]);
        assert_eq!(symbols, vec![HardwareSymbol::new(9000, 4500)]);
        assert_eq!(decode(&symbols).durations, vec![9000, 4500]);

        assert!(encode(&[560]).is_empty());
    }

    #[test]
    fn test_decode_truncates_at_capacity() {
        let symbols = vec![HardwareSymbol::new(560, 560); CAPACITY / 2 + 5];
        let decoded = decode(&symbols);
        assert!(decoded.truncated);
        assert_eq!(decoded.durations.len(), CAPACITY);
    }

    #[test]
    fn test_decode_empty() {
        let decoded = decode(&[]);
        assert!(decoded.durations.is_empty());
        assert!(!decoded.truncated);
    }
}
