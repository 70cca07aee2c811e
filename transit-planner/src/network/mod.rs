//! Network model: stations, lines, segments and transfer points.
//!
//! The model is built once from declarations, validated as a whole, and
//! then immutable. Topology updates are copy-on-update: build a new model
//! (which gets a fresh version number) and swap it in — a model shared
//! with in-flight queries is never mutated, so the read path needs no
//! locking.

use chrono::Duration;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::domain::{Coordinate, Line, LineIdx, Mode, Segment, SegmentIdx, Station, StationIdx};

/// One inconsistency detected while building a network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigViolation {
    #[error("duplicate station id {id:?}")]
    DuplicateStation { id: String },

    #[error("duplicate line id {id:?}")]
    DuplicateLine { id: String },

    #[error("line {line:?} references unknown station {station:?}")]
    UnknownStation { line: String, station: String },

    #[error("line {line:?} has {count} stop(s), need at least 2")]
    TooFewStops { line: String, count: usize },

    #[error("line {line:?} visits station {station:?} twice in a row")]
    RepeatedStation { line: String, station: String },

    #[error("line {line:?} declares {found} travel time(s) for {expected} segment(s)")]
    TravelTimeCountMismatch {
        line: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line:?} has a non-positive travel time at segment {position}")]
    NonPositiveTravelTime { line: String, position: usize },

    #[error("station {station:?} has zero capacity")]
    ZeroStationCapacity { station: String },

    #[error("line {line:?} has zero vehicle capacity")]
    ZeroVehicleCapacity { line: String },
}

/// Malformed or inconsistent network topology.
///
/// Carries *every* violation found, not just the first, so a large network
/// definition can be corrected in one pass. Fatal to the whole build: no
/// model is produced.
#[derive(Debug, Clone, thiserror::Error)]
#[error("network configuration rejected with {} violation(s)", violations.len())]
pub struct ConfigurationError {
    violations: Vec<ConfigViolation>,
}

impl ConfigurationError {
    pub fn violations(&self) -> &[ConfigViolation] {
        &self.violations
    }
}

struct StationSpec {
    id: String,
    name: String,
    coordinate: Option<Coordinate>,
    capacity: u32,
}

struct LineSpec {
    id: String,
    mode: Mode,
    stations: Vec<String>,
    travel_times: Vec<Duration>,
    vehicle_capacity: u32,
}

/// Accumulates station and line declarations, then validates and builds an
/// immutable [`NetworkModel`].
#[derive(Default)]
pub struct NetworkBuilder {
    stations: Vec<StationSpec>,
    lines: Vec<LineSpec>,
}

/// Version numbers are process-global so that two models built from
/// different declarations can never be confused for one another.
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a station.
    pub fn add_station(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        coordinate: Option<Coordinate>,
        capacity: u32,
    ) -> &mut Self {
        self.stations.push(StationSpec {
            id: id.into(),
            name: name.into(),
            coordinate,
            capacity,
        });
        self
    }

    /// Declare a line over previously declared stations.
    ///
    /// `travel_times` gives the nominal time for each of the
    /// `stations.len() - 1` segments, in order.
    pub fn add_line<I, S>(
        &mut self,
        id: impl Into<String>,
        mode: Mode,
        stations: I,
        travel_times: Vec<Duration>,
        vehicle_capacity: u32,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.push(LineSpec {
            id: id.into(),
            mode,
            stations: stations.into_iter().map(Into::into).collect(),
            travel_times,
            vehicle_capacity,
        });
        self
    }

    /// Validate all declarations and build the model.
    ///
    /// All-or-nothing: any violation means no model, and the returned
    /// [`ConfigurationError`] enumerates every violation found.
    pub fn build(self) -> Result<NetworkModel, ConfigurationError> {
        let mut violations = Vec::new();

        let mut stations: Vec<Station> = Vec::with_capacity(self.stations.len());
        let mut station_ids: HashMap<String, StationIdx> = HashMap::new();

        for spec in self.stations {
            if station_ids.contains_key(&spec.id) {
                violations.push(ConfigViolation::DuplicateStation { id: spec.id });
                continue;
            }
            if spec.capacity == 0 {
                violations.push(ConfigViolation::ZeroStationCapacity {
                    station: spec.id.clone(),
                });
            }
            station_ids.insert(spec.id.clone(), StationIdx(stations.len()));
            stations.push(Station {
                id: spec.id,
                name: spec.name,
                coordinate: spec.coordinate,
                capacity: spec.capacity,
                lines: Vec::new(),
            });
        }

        let mut lines: Vec<Line> = Vec::with_capacity(self.lines.len());
        let mut line_ids: HashMap<String, LineIdx> = HashMap::new();
        let mut segments: Vec<Segment> = Vec::new();
        let mut outgoing: Vec<Vec<SegmentIdx>> = vec![Vec::new(); stations.len()];

        for spec in self.lines {
            let before = violations.len();

            if line_ids.contains_key(&spec.id) {
                violations.push(ConfigViolation::DuplicateLine {
                    id: spec.id.clone(),
                });
            }
            if spec.stations.len() < 2 {
                violations.push(ConfigViolation::TooFewStops {
                    line: spec.id.clone(),
                    count: spec.stations.len(),
                });
            }
            if spec.vehicle_capacity == 0 {
                violations.push(ConfigViolation::ZeroVehicleCapacity {
                    line: spec.id.clone(),
                });
            }

            let mut resolved = Vec::with_capacity(spec.stations.len());
            for name in &spec.stations {
                match station_ids.get(name) {
                    Some(idx) => resolved.push(*idx),
                    None => violations.push(ConfigViolation::UnknownStation {
                        line: spec.id.clone(),
                        station: name.clone(),
                    }),
                }
            }
            for window in spec.stations.windows(2) {
                if window[0] == window[1] {
                    violations.push(ConfigViolation::RepeatedStation {
                        line: spec.id.clone(),
                        station: window[0].clone(),
                    });
                }
            }

            let expected_segments = spec.stations.len().saturating_sub(1);
            if spec.travel_times.len() != expected_segments {
                violations.push(ConfigViolation::TravelTimeCountMismatch {
                    line: spec.id.clone(),
                    expected: expected_segments,
                    found: spec.travel_times.len(),
                });
            }
            for (position, travel_time) in spec.travel_times.iter().enumerate() {
                if *travel_time <= Duration::zero() {
                    violations.push(ConfigViolation::NonPositiveTravelTime {
                        line: spec.id.clone(),
                        position,
                    });
                }
            }

            // Only materialize lines with no violations of their own; the
            // whole build fails anyway if anything was recorded.
            if violations.len() > before {
                continue;
            }

            let line_idx = LineIdx(lines.len());
            let mut line_segments = Vec::with_capacity(expected_segments);
            for (position, pair) in resolved.windows(2).enumerate() {
                let segment_idx = SegmentIdx(segments.len());
                segments.push(Segment {
                    line: line_idx,
                    from: pair[0],
                    to: pair[1],
                    position,
                    travel_time: spec.travel_times[position],
                    vehicle_capacity: spec.vehicle_capacity,
                });
                outgoing[pair[0].0].push(segment_idx);
                line_segments.push(segment_idx);
            }
            for station in &resolved {
                let serving = &mut stations[station.0].lines;
                if !serving.contains(&line_idx) {
                    serving.push(line_idx);
                }
            }
            line_ids.insert(spec.id.clone(), line_idx);
            lines.push(Line {
                id: spec.id,
                mode: spec.mode,
                stations: resolved,
                segments: line_segments,
                vehicle_capacity: spec.vehicle_capacity,
            });
        }

        if !violations.is_empty() {
            return Err(ConfigurationError { violations });
        }

        let version = NEXT_VERSION.fetch_add(1, Ordering::Relaxed);
        debug!(
            version,
            stations = stations.len(),
            lines = lines.len(),
            segments = segments.len(),
            "network model built"
        );

        Ok(NetworkModel {
            version,
            stations,
            lines,
            segments,
            station_ids,
            line_ids,
            outgoing,
            transfer_points: OnceLock::new(),
        })
    }
}

/// The immutable transit network: station/line/segment arenas plus lookup
/// tables. Safe to share across any number of concurrent route queries.
#[derive(Debug)]
pub struct NetworkModel {
    version: u64,
    stations: Vec<Station>,
    lines: Vec<Line>,
    segments: Vec<Segment>,
    station_ids: HashMap<String, StationIdx>,
    line_ids: HashMap<String, LineIdx>,
    outgoing: Vec<Vec<SegmentIdx>>,
    transfer_points: OnceLock<Vec<StationIdx>>,
}

impl NetworkModel {
    /// Version of this model. Strictly increasing across builds in one
    /// process; indices from one version are not valid against another.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn station(&self, idx: StationIdx) -> &Station {
        &self.stations[idx.0]
    }

    pub fn line(&self, idx: LineIdx) -> &Line {
        &self.lines[idx.0]
    }

    pub fn segment(&self, idx: SegmentIdx) -> &Segment {
        &self.segments[idx.0]
    }

    pub fn stations(&self) -> impl Iterator<Item = (StationIdx, &Station)> {
        self.stations
            .iter()
            .enumerate()
            .map(|(i, s)| (StationIdx(i), s))
    }

    pub fn lines(&self) -> impl Iterator<Item = (LineIdx, &Line)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, l)| (LineIdx(i), l))
    }

    /// Look up a station by its caller-facing id.
    pub fn resolve_station(&self, id: &str) -> Option<StationIdx> {
        self.station_ids.get(id).copied()
    }

    /// Look up a line by its caller-facing id.
    pub fn resolve_line(&self, id: &str) -> Option<LineIdx> {
        self.line_ids.get(id).copied()
    }

    /// Outgoing segments of a station, across all lines.
    pub fn segments_of(&self, station: StationIdx) -> &[SegmentIdx] {
        &self.outgoing[station.0]
    }

    /// Lines calling at a station, in declaration order.
    pub fn lines_serving(&self, station: StationIdx) -> &[LineIdx] {
        &self.station(station).lines
    }

    /// The line a segment belongs to.
    pub fn line_of(&self, segment: SegmentIdx) -> LineIdx {
        self.segment(segment).line
    }

    /// Stations where two or more distinct lines intersect.
    ///
    /// Computed on first use and cached for the lifetime of the model;
    /// the model is immutable, so the cache can never go stale.
    pub fn transfer_points(&self) -> &[StationIdx] {
        self.transfer_points.get_or_init(|| {
            self.stations()
                .filter(|(_, s)| s.is_transfer_point())
                .map(|(idx, _)| idx)
                .collect()
        })
    }

    /// Read-only view of the whole network for visualization consumers.
    pub fn snapshot(&self) -> NetworkSnapshot {
        let transfer: Vec<String> = self
            .transfer_points()
            .iter()
            .map(|idx| self.station(*idx).id.clone())
            .collect();
        NetworkSnapshot {
            version: self.version,
            stations: self
                .stations
                .iter()
                .map(|s| StationView {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    coordinate: s.coordinate,
                    capacity: s.capacity,
                    lines: s.lines.iter().map(|l| self.line(*l).id.clone()).collect(),
                    is_transfer_point: s.is_transfer_point(),
                })
                .collect(),
            segments: self
                .segments
                .iter()
                .map(|seg| SegmentView {
                    line: self.line(seg.line).id.clone(),
                    mode: self.line(seg.line).mode,
                    from: self.station(seg.from).id.clone(),
                    to: self.station(seg.to).id.clone(),
                    travel_time_mins: seg.travel_time.num_minutes(),
                })
                .collect(),
            transfer_points: transfer,
        }
    }
}

/// Serializable snapshot of the network topology.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub version: u64,
    pub stations: Vec<StationView>,
    pub segments: Vec<SegmentView>,
    pub transfer_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationView {
    pub id: String,
    pub name: String,
    pub coordinate: Option<Coordinate>,
    pub capacity: u32,
    pub lines: Vec<String>,
    pub is_transfer_point: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentView {
    pub line: String,
    pub mode: Mode,
    pub from: String,
    pub to: String,
    pub travel_time_mins: i64,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// A line plan over station indices; indices >= station_count dangle.
    fn line_plan(station_count: usize) -> impl Strategy<Value = Vec<usize>> {
        proptest::collection::vec(0..station_count + 2, 2..6)
    }

    proptest! {
        /// Every segment endpoint must resolve to a declared station:
        /// builds fail exactly when some referenced station is unknown.
        #[test]
        fn dangling_endpoints_always_rejected(
            station_count in 2usize..8,
            plans in proptest::collection::vec(line_plan(7), 1..4),
        ) {
            let mut builder = NetworkBuilder::new();
            for i in 0..station_count {
                builder.add_station(format!("s{i}"), format!("Station {i}"), None, 100);
            }

            let mut expect_dangling = false;
            for (n, plan) in plans.iter().enumerate() {
                // Collapse consecutive repeats so the only possible
                // violation is a dangling endpoint.
                let mut stops: Vec<usize> = Vec::new();
                for &s in plan {
                    if stops.last() != Some(&s) {
                        stops.push(s);
                    }
                }
                prop_assume!(stops.len() >= 2);
                expect_dangling |= stops.iter().any(|&s| s >= station_count);
                let names: Vec<String> = stops.iter().map(|s| format!("s{s}")).collect();
                let times = vec![Duration::minutes(3); names.len() - 1];
                builder.add_line(format!("l{n}"), Mode::Bus, names, times, 50);
            }

            let result = builder.build();
            prop_assert_eq!(result.is_err(), expect_dangling);
            if let Err(err) = result {
                let all_unknown_station = err
                    .violations()
                    .iter()
                    .all(|v| matches!(v, ConfigViolation::UnknownStation { .. }));
                prop_assert!(all_unknown_station);
            }
        }
    }
}
