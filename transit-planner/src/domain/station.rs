//! Station record.

use serde::{Deserialize, Serialize};

use super::LineIdx;

/// A geographic coordinate (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// A station in the transit network.
///
/// Stations are created by the network builder and live in the model's
/// station arena. The capacity rating (maximum simultaneous occupancy) is
/// immutable once the model is built; the *current* load is not stored
/// here — it belongs to the capacity tracker, which keeps an independent
/// atomic counter per station.
#[derive(Debug, Clone)]
pub struct Station {
    /// Caller-facing unique identifier, e.g. `"central"`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Geographic position, when known.
    pub coordinate: Option<Coordinate>,
    /// Maximum simultaneous occupancy this station is rated for.
    pub capacity: u32,
    /// Lines calling at this station, in network declaration order.
    /// Filled in while the model is built.
    pub lines: Vec<LineIdx>,
}

impl Station {
    /// True if at least two distinct lines call here.
    pub fn is_transfer_point(&self) -> bool {
        self.lines.len() >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_point_needs_two_lines() {
        let mut station = Station {
            id: "a".into(),
            name: "A".into(),
            coordinate: None,
            capacity: 100,
            lines: vec![LineIdx(0)],
        };
        assert!(!station.is_transfer_point());
        station.lines.push(LineIdx(1));
        assert!(station.is_transfer_point());
    }
}
