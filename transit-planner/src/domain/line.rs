//! Line, mode and segment records.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{LineIdx, SegmentIdx, StationIdx};

/// Error returned when parsing an unknown transport mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transport mode: {0} (expected Metro, Bus or Train)")]
pub struct InvalidMode(pub String);

/// Transport mode of a line.
///
/// A plain attribute, not a type distinction: routing is mode-agnostic
/// and only the transfer-time configuration and display care about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Metro,
    Bus,
    Train,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Metro => "Metro",
            Mode::Bus => "Bus",
            Mode::Train => "Train",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Metro" => Ok(Mode::Metro),
            "Bus" => Ok(Mode::Bus),
            "Train" => Ok(Mode::Train),
            other => Err(InvalidMode(other.to_string())),
        }
    }
}

/// A transit line: an ordered run of stations served by one mode.
#[derive(Debug, Clone)]
pub struct Line {
    /// Caller-facing unique identifier, e.g. `"m1"`.
    pub id: String,
    pub mode: Mode,
    /// Stations in service order. At least two; a line may revisit a
    /// station (loops), but never twice in a row.
    pub stations: Vec<StationIdx>,
    /// Segments between consecutive stations, `stations.len() - 1` of them.
    pub segments: Vec<SegmentIdx>,
    /// Nominal vehicle capacity for this line's rolling stock.
    pub vehicle_capacity: u32,
}

impl Line {
    /// Number of inter-station hops on this line.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// A directed edge between two consecutive stations on a line.
#[derive(Debug, Clone)]
pub struct Segment {
    pub line: LineIdx,
    pub from: StationIdx,
    pub to: StationIdx,
    /// Position of `from` within the line's station sequence.
    pub position: usize,
    /// Nominal travel time between the two stations.
    pub travel_time: Duration,
    /// Vehicle capacity of the line serving this segment.
    pub vehicle_capacity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_roundtrip() {
        for mode in [Mode::Metro, Mode::Bus, Mode::Train] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn mode_parse_rejects_unknown() {
        assert!("Tram".parse::<Mode>().is_err());
        assert!("metro".parse::<Mode>().is_err());
        assert!("".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_serde_names() {
        assert_eq!(serde_json::to_string(&Mode::Metro).unwrap(), "\"Metro\"");
        let parsed: Mode = serde_json::from_str("\"Bus\"").unwrap();
        assert_eq!(parsed, Mode::Bus);
    }
}
