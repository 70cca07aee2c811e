//! Schedule index: per-line, per-station departure timetables.
//!
//! Trips are published once, validated against the line topology, and then
//! immutable. "Earliest trip departing station S on line L at or after T"
//! is the hot query of the planner's expansion loop; it is answered from
//! per-(station, line) departure vectors kept sorted by time, with a
//! binary search per lookup.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{DayTime, LineIdx, StationIdx, Trip, TripIdx};
use crate::network::NetworkModel;

/// Trip data inconsistent with the line topology or with itself.
///
/// Fatal to that trip's publication only: the index keeps accepting other
/// trips.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Trip references a line the model does not have
    #[error("trip references unknown line index {0}")]
    UnknownLine(LineIdx),

    /// Trip has a different number of stops than its line
    #[error("trip on line {line:?} has {found} stop(s), line has {expected}")]
    StopCountMismatch {
        line: String,
        expected: usize,
        found: usize,
    },

    /// Trip stop serves a different station than the line at that position
    #[error("trip on line {line:?} calls at the wrong station at position {position}")]
    StationMismatch { line: String, position: usize },

    /// Times go backwards somewhere along the stop sequence
    #[error("trip on line {line:?} has non-monotonic times at position {position}")]
    NonMonotonicTimes { line: String, position: usize },
}

/// A boardable departure found by [`ScheduleIndex::next_departure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextDeparture {
    pub trip: TripIdx,
    /// Position of the boarding stop within the trip's stop sequence.
    pub stop_pos: usize,
    pub departure: DayTime,
}

#[derive(Debug, Clone, Copy)]
struct DepartureEntry {
    departure: DayTime,
    trip: TripIdx,
    stop_pos: usize,
}

/// Timetable index over one network model version.
///
/// Built by publishing trips, then shared read-only. A timetable update
/// produces a new index (and usually a new model), never an in-place edit
/// visible to running queries.
#[derive(Debug)]
pub struct ScheduleIndex {
    model: Arc<NetworkModel>,
    trips: Vec<Trip>,
    /// (station, line) -> departures sorted by time.
    departures: HashMap<(StationIdx, LineIdx), Vec<DepartureEntry>>,
}

impl ScheduleIndex {
    pub fn new(model: Arc<NetworkModel>) -> Self {
        Self {
            model,
            trips: Vec::new(),
            departures: HashMap::new(),
        }
    }

    /// The model version this index was built against.
    pub fn model_version(&self) -> u64 {
        self.model.version()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn trip(&self, idx: TripIdx) -> &Trip {
        &self.trips[idx.0]
    }

    pub fn trips(&self) -> impl Iterator<Item = (TripIdx, &Trip)> {
        self.trips.iter().enumerate().map(|(i, t)| (TripIdx(i), t))
    }

    /// Validate and insert one trip.
    ///
    /// Checks that the trip's stop sequence mirrors its line's station
    /// sequence exactly and that times never decrease along it
    /// (arrival ≤ departure at each stop, departure ≤ next arrival).
    pub fn publish(&mut self, trip: Trip) -> Result<TripIdx, ScheduleError> {
        if trip.line.0 >= self.model.line_count() {
            return Err(ScheduleError::UnknownLine(trip.line));
        }
        let line = self.model.line(trip.line);

        if trip.stops.len() != line.stations.len() {
            return Err(ScheduleError::StopCountMismatch {
                line: line.id.clone(),
                expected: line.stations.len(),
                found: trip.stops.len(),
            });
        }
        for (position, (stop, expected)) in trip.stops.iter().zip(&line.stations).enumerate() {
            if stop.station != *expected {
                return Err(ScheduleError::StationMismatch {
                    line: line.id.clone(),
                    position,
                });
            }
        }
        for (position, stop) in trip.stops.iter().enumerate() {
            if stop.departure < stop.arrival {
                return Err(ScheduleError::NonMonotonicTimes {
                    line: line.id.clone(),
                    position,
                });
            }
        }
        for (position, window) in trip.stops.windows(2).enumerate() {
            if window[1].arrival < window[0].departure {
                return Err(ScheduleError::NonMonotonicTimes {
                    line: line.id.clone(),
                    position: position + 1,
                });
            }
        }

        let trip_idx = TripIdx(self.trips.len());
        for (stop_pos, stop) in trip.stops.iter().enumerate() {
            // The final stop is not boardable; indexing it would only
            // produce dead-end expansions.
            if stop_pos + 1 == trip.stops.len() {
                break;
            }
            let entries = self
                .departures
                .entry((stop.station, trip.line))
                .or_default();
            let entry = DepartureEntry {
                departure: stop.departure,
                trip: trip_idx,
                stop_pos,
            };
            let at = entries.partition_point(|e| e.departure <= entry.departure);
            entries.insert(at, entry);
        }

        debug!(trip = trip_idx.0, line = %line.id, stops = trip.stops.len(), "trip published");
        self.trips.push(trip);
        Ok(trip_idx)
    }

    /// Earliest trip departing `station` on `line` at or after `after`.
    ///
    /// Returns `None` when no service remains in the day — the caller's
    /// "no more service" sentinel. There is no next-day wrap-around.
    pub fn next_departure(
        &self,
        station: StationIdx,
        line: LineIdx,
        after: DayTime,
    ) -> Option<NextDeparture> {
        let entries = self.departures.get(&(station, line))?;
        let at = entries.partition_point(|e| e.departure < after);
        entries.get(at).map(|e| NextDeparture {
            trip: e.trip,
            stop_pos: e.stop_pos,
            departure: e.departure,
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{Mode, StopTime};
    use crate::network::NetworkBuilder;
    use chrono::Duration;
    use proptest::prelude::*;

    fn line_model(stops: usize) -> Arc<NetworkModel> {
        let mut builder = NetworkBuilder::new();
        let names: Vec<String> = (0..stops).map(|i| format!("s{i}")).collect();
        for name in &names {
            builder.add_station(name.clone(), name.clone(), None, 100);
        }
        builder.add_line(
            "l",
            Mode::Train,
            names,
            vec![Duration::minutes(5); stops - 1],
            100,
        );
        Arc::new(builder.build().unwrap())
    }

    proptest! {
        /// Published trips always have non-decreasing times; shuffled time
        /// sequences are rejected exactly when they break monotonicity.
        #[test]
        fn monotonicity_enforced(offsets in proptest::collection::vec(0u32..1200, 4..10)) {
            let stops = offsets.len() / 2;
            prop_assume!(stops >= 2);
            let model = line_model(stops);
            let line = model.resolve_line("l").unwrap();
            let stations = model.line(line).stations.clone();

            let base = DayTime::parse_hhmm("06:00").unwrap();
            let times: Vec<DayTime> = offsets
                .iter()
                .take(stops * 2)
                .map(|m| base.checked_add(Duration::minutes(i64::from(*m))).unwrap())
                .collect();

            let monotonic = times.windows(2).all(|w| w[0] <= w[1]);
            let stop_times: Vec<StopTime> = stations
                .iter()
                .enumerate()
                .map(|(i, s)| StopTime::new(*s, times[2 * i], times[2 * i + 1]))
                .collect();

            let mut index = ScheduleIndex::new(model);
            let result = index.publish(Trip::new(line, stop_times));
            prop_assert_eq!(result.is_ok(), monotonic);
        }

        /// next_departure returns the earliest departure >= the query time.
        #[test]
        fn next_departure_is_earliest(
            departures in proptest::collection::vec(300u32..1300, 1..12),
            query in 300u32..1400,
        ) {
            let model = line_model(2);
            let line = model.resolve_line("l").unwrap();
            let stations = model.line(line).stations.clone();
            let base = DayTime::MIDNIGHT;
            let mut index = ScheduleIndex::new(model);

            for dep in &departures {
                let start = base.checked_add(Duration::minutes(i64::from(*dep))).unwrap();
                let end = start.checked_add(Duration::minutes(5)).unwrap();
                index
                    .publish(Trip::new(
                        line,
                        vec![
                            StopTime::new(stations[0], start, start),
                            StopTime::new(stations[1], end, end),
                        ],
                    ))
                    .unwrap();
            }

            let after = base.checked_add(Duration::minutes(i64::from(query))).unwrap();
            let answer = index.next_departure(stations[0], line, after);
            let expected = departures
                .iter()
                .map(|d| base.checked_add(Duration::minutes(i64::from(*d))).unwrap())
                .filter(|d| *d >= after)
                .min();

            prop_assert_eq!(answer.map(|n| n.departure), expected);
        }
    }
}
