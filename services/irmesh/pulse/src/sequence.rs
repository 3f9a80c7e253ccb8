//! Validated raw pulse sequences.
//!
//! A [`PulseSequence`] is an ordered list of microsecond durations that
//! alternates mark (carrier on) and space (carrier off), starting with a mark.

use crate::error::PulseError;
use std::fmt;
use std::str::FromStr;

/// Maximum number of durations in one sequence
pub const CAPACITY: usize = 200;

/// Sanity ceiling for a single duration (10 s)
pub const MAX_DURATION_US: u32 = 10_000_000;

/// Signal level of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Carrier modulated
    Mark,
    /// Carrier idle
    Space,
}

impl Level {
    /// Level of the segment at `index` (even = mark, odd = space)
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Level::Mark
        } else {
            Level::Space
        }
    }

    /// Whether the carrier is on during this level
    pub fn is_mark(self) -> bool {
        self == Level::Mark
    }
}

/// One timed segment of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Mark or space
    pub level: Level,
    /// Duration in microseconds
    pub micros: u32,
}

/// Raw IR waveform: `1..=CAPACITY` durations, each at most `MAX_DURATION_US`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseSequence {
    durations: Vec<u32>,
}

impl PulseSequence {
    /// Build a sequence, rejecting anything outside the invariants
    pub fn new(durations: Vec<u32>) -> Result<Self, PulseError> {
        if durations.is_empty() {
            return Err(PulseError::Empty);
        }
        if durations.len() > CAPACITY {
            return Err(PulseError::TooLong(durations.len()));
        }
        if let Some((index, &duration)) = durations
            .iter()
            .enumerate()
            .find(|&(_, &d)| d > MAX_DURATION_US)
        {
            return Err(PulseError::DurationOutOfRange { index, duration });
        }

        Ok(Self { durations })
    }

    /// Build a sequence, cutting it down to `CAPACITY` first.
    ///
    /// Returns the sequence and whether anything was cut.
    pub fn truncating(mut durations: Vec<u32>) -> Result<(Self, bool), PulseError> {
        let truncated = durations.len() > CAPACITY;
        durations.truncate(CAPACITY);
        Self::new(durations).map(|seq| (seq, truncated))
    }

    /// Durations as a slice
    pub fn as_slice(&self) -> &[u32] {
        &self.durations
    }

    /// Number of durations
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// Always false for a constructed sequence
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Consume into the raw durations
    pub fn into_inner(self) -> Vec<u32> {
        self.durations
    }

    /// Iterate segments with their level
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.durations
            .iter()
            .enumerate()
            .map(|(i, &micros)| Segment {
                level: Level::for_index(i),
                micros,
            })
    }

    /// Total airtime in microseconds
    pub fn total_micros(&self) -> u64 {
        self.durations.iter().map(|&d| u64::from(d)).sum()
    }
}

impl fmt::Display for PulseSequence {
    /// Comma-separated durations, e.g. `9000,4500,560`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.durations.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl FromStr for PulseSequence {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let durations = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| PulseError::Parse(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(durations)
    }
}

impl TryFrom<Vec<u32>> for PulseSequence {
    type Error = PulseError;

    fn try_from(durations: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(durations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert_eq!(PulseSequence::new(vec![]), Err(PulseError::Empty));
        assert_eq!(
            PulseSequence::new(vec![100; CAPACITY + 1]),
            Err(PulseError::TooLong(CAPACITY + 1))
        );
        assert_eq!(
            PulseSequence::new(vec![100, MAX_DURATION_US + 1]),
            Err(PulseError::DurationOutOfRange {
                index: 1,
                duration: MAX_DURATION_US + 1
            })
        );
        assert!(PulseSequence::new(vec![MAX_DURATION_US]).is_ok());
    }

    #[test]
    fn test_truncating_is_deterministic() {
        let raw: Vec<u32> = (1..=250).collect();
        let (seq, truncated) = PulseSequence::truncating(raw.clone()).unwrap();
        assert!(truncated);
        assert_eq!(seq.len(), CAPACITY);
        assert_eq!(seq.as_slice(), &raw[..CAPACITY]);

        let (seq, truncated) = PulseSequence::truncating(vec![9000, 4500]).unwrap();
        assert!(!truncated);
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_segments_alternate_levels() {
        let seq = PulseSequence::new(vec![9000, 4500, 560]).unwrap();
        let levels: Vec<Level> = seq.segments().map(|s| s.level).collect();
        assert_eq!(levels, vec![Level::Mark, Level::Space, Level::Mark]);
        assert_eq!(seq.total_micros(), 14060);
    }

    #[test]
    fn test_text_form() {
        let seq: PulseSequence = "9000, 4500,560,1690".parse().unwrap();
        assert_eq!(seq.as_slice(), &[9000, 4500, 560, 1690]);
        assert_eq!(seq.to_string(), "9000,4500,560,1690");

        assert!(matches!(
            "9000,abc".parse::<PulseSequence>(),
            Err(PulseError::Parse(_))
        ));
        assert_eq!("".parse::<PulseSequence>(), Err(PulseError::Empty));
    }
}
