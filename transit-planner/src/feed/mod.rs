//! Feed ingestion: JSON network and timetable definitions.
//!
//! The feed is the bulk-build surface: one call builds a whole network
//! model, another builds a whole schedule index, and each call is
//! all-or-nothing — any violation aborts that load with every problem
//! enumerated, so the system never runs on a partially valid feed.
//!
//! Trips can be listed stop by stop or generated from a headway ("every
//! 15 minutes from 05:00 to 23:00"), which is how most real feeds for
//! this planner are written.

use chrono::Duration;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::capacity::CapacityTracker;
use crate::domain::{Coordinate, DayTime, LineIdx, Mode, StationIdx, StopTime, TimeError, Trip};
use crate::network::{ConfigurationError, NetworkBuilder, NetworkModel};
use crate::schedule::{ScheduleError, ScheduleIndex};

/// Failure to get a feed off disk and into memory.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to read feed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed feed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A complete feed file: network topology plus timetable.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitFeed {
    pub stations: Vec<StationFeed>,
    pub lines: Vec<LineFeed>,
    #[serde(default)]
    pub trips: Vec<TripFeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationFeed {
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    /// Maximum simultaneous occupancy.
    pub capacity: u32,
    /// Observed current occupancy, if the feed carries one.
    #[serde(default)]
    pub load: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineFeed {
    pub id: String,
    pub mode: Mode,
    pub stops: Vec<String>,
    /// Minutes per segment; `stops.len() - 1` entries.
    pub travel_times: Vec<i64>,
    pub vehicle_capacity: u32,
}

/// A timetable entry: either explicit stop times or a headway pattern
/// expanded into individual runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TripFeed {
    Explicit {
        line: String,
        /// One entry per stop of the line, in line order.
        stops: Vec<StopTimeFeed>,
    },
    Headway {
        line: String,
        /// Departure of the first run, "HH:MM".
        first: String,
        /// Latest first-stop departure, "HH:MM".
        last: String,
        headway_mins: i64,
        /// Dwell at intermediate stops, seconds.
        #[serde(default)]
        dwell_secs: i64,
    },
}

/// One invalid timetable entry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TimetableViolation {
    #[error("trip {position}: references unknown line {line:?}")]
    UnknownLine { position: usize, line: String },

    #[error("trip {position}: {found} stop time(s) for a line with {expected} stops")]
    StopCountMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("trip {position}: bad time {value:?}: {source}")]
    BadTime {
        position: usize,
        value: String,
        source: TimeError,
    },

    #[error("trip {position}: headway must be positive")]
    NonPositiveHeadway { position: usize },

    #[error("trip {position}: {source}")]
    Schedule {
        position: usize,
        source: ScheduleError,
    },
}

/// Invalid timetable feed. All-or-nothing for the load call, with every
/// invalid entry listed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("timetable rejected with {} invalid trip entries", violations.len())]
pub struct TimetableError {
    violations: Vec<TimetableViolation>,
}

impl TimetableError {
    pub fn violations(&self) -> &[TimetableViolation] {
        &self.violations
    }
}

/// Read and parse a feed file.
pub fn read_feed(path: &Path) -> Result<TransitFeed, FeedError> {
    let raw = std::fs::read_to_string(path)?;
    let feed: TransitFeed = serde_json::from_str(&raw)?;
    debug!(
        stations = feed.stations.len(),
        lines = feed.lines.len(),
        trips = feed.trips.len(),
        "feed parsed"
    );
    Ok(feed)
}

/// Build a network model from the feed's stations and lines.
pub fn load_network(feed: &TransitFeed) -> Result<NetworkModel, ConfigurationError> {
    let mut builder = NetworkBuilder::new();
    for station in &feed.stations {
        builder.add_station(
            station.id.clone(),
            station.name.clone().unwrap_or_else(|| station.id.clone()),
            station.coordinate,
            station.capacity,
        );
    }
    for line in &feed.lines {
        builder.add_line(
            line.id.clone(),
            line.mode,
            line.stops.iter().cloned(),
            line.travel_times.iter().map(|m| Duration::minutes(*m)).collect(),
            line.vehicle_capacity,
        );
    }
    builder.build()
}

/// Build a schedule index from the feed's trips.
///
/// Headway entries are expanded into individual runs first. Any invalid
/// entry fails the whole call; the error lists all of them.
pub fn load_timetable(
    model: &Arc<NetworkModel>,
    feed: &TransitFeed,
) -> Result<ScheduleIndex, TimetableError> {
    let mut index = ScheduleIndex::new(model.clone());
    let mut violations: Vec<TimetableViolation> = Vec::new();

    for (position, entry) in feed.trips.iter().enumerate() {
        match entry {
            TripFeed::Explicit { line, stops } => {
                let Some(line_idx) = model.resolve_line(line) else {
                    violations.push(TimetableViolation::UnknownLine {
                        position,
                        line: line.clone(),
                    });
                    continue;
                };
                let stations = &model.line(line_idx).stations;
                if stops.len() != stations.len() {
                    violations.push(TimetableViolation::StopCountMismatch {
                        position,
                        expected: stations.len(),
                        found: stops.len(),
                    });
                    continue;
                }
                match parse_stop_times(position, stops, stations) {
                    Ok(parsed) => {
                        if let Err(source) = index.publish(Trip::new(line_idx, parsed)) {
                            violations.push(TimetableViolation::Schedule { position, source });
                        }
                    }
                    Err(violation) => violations.push(violation),
                }
            }
            TripFeed::Headway {
                line,
                first,
                last,
                headway_mins,
                dwell_secs,
            } => {
                let Some(line_idx) = model.resolve_line(line) else {
                    violations.push(TimetableViolation::UnknownLine {
                        position,
                        line: line.clone(),
                    });
                    continue;
                };
                if *headway_mins <= 0 {
                    violations.push(TimetableViolation::NonPositiveHeadway { position });
                    continue;
                }
                let (first, last) = match (parse_time(position, first), parse_time(position, last))
                {
                    (Ok(first), Ok(last)) => (first, last),
                    (Err(violation), _) | (_, Err(violation)) => {
                        violations.push(violation);
                        continue;
                    }
                };
                for trip in generate_trips(
                    model,
                    line_idx,
                    first,
                    last,
                    Duration::minutes(*headway_mins),
                    Duration::seconds(*dwell_secs),
                ) {
                    if let Err(source) = index.publish(trip) {
                        violations.push(TimetableViolation::Schedule { position, source });
                    }
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(index)
    } else {
        Err(TimetableError { violations })
    }
}

/// Seed the capacity tracker with the feed's observed station loads.
pub fn seed_loads(model: &NetworkModel, tracker: &CapacityTracker, feed: &TransitFeed) {
    for station in &feed.stations {
        if let (Some(load), Some(idx)) = (station.load, model.resolve_station(&station.id)) {
            tracker.set_station_load(idx, load);
        }
    }
}

/// Expand a line into runs departing every `headway` from `first` until
/// `last`, inclusive. Runs that would exceed the service day are skipped
/// (service simply ends); a non-positive headway yields no runs.
pub fn generate_trips(
    model: &NetworkModel,
    line: LineIdx,
    first: DayTime,
    last: DayTime,
    headway: Duration,
    dwell: Duration,
) -> Vec<Trip> {
    if headway <= Duration::zero() {
        return Vec::new();
    }
    let mut trips = Vec::new();
    let mut start = first;
    while start <= last {
        if let Some(trip) = single_run(model, line, start, dwell) {
            trips.push(trip);
        }
        match start.checked_add(headway) {
            Some(next) => start = next,
            None => break,
        }
    }
    trips
}

/// One run of a line starting at `start`; `None` if it would run past the
/// end of the service day.
fn single_run(model: &NetworkModel, line: LineIdx, start: DayTime, dwell: Duration) -> Option<Trip> {
    let line_def = model.line(line);
    let mut stops = Vec::with_capacity(line_def.stations.len());
    let mut arrival = start;
    for (pos, station) in line_def.stations.iter().enumerate() {
        let is_last = pos + 1 == line_def.stations.len();
        let departure = if pos == 0 || is_last {
            arrival
        } else {
            arrival.checked_add(dwell)?
        };
        stops.push(StopTime::new(*station, arrival, departure));
        if !is_last {
            let travel = model.segment(line_def.segments[pos]).travel_time;
            arrival = departure.checked_add(travel)?;
        }
    }
    Some(Trip::new(line, stops))
}

fn parse_time(position: usize, value: &str) -> Result<DayTime, TimetableViolation> {
    DayTime::parse_hhmm(value).map_err(|source| TimetableViolation::BadTime {
        position,
        value: value.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimeFeed {
    /// "HH:MM"
    pub arrival: String,
    /// "HH:MM"
    pub departure: String,
}

fn parse_stop_times(
    position: usize,
    stops: &[StopTimeFeed],
    stations: &[StationIdx],
) -> Result<Vec<StopTime>, TimetableViolation> {
    let mut parsed = Vec::with_capacity(stops.len());
    for (stop, station) in stops.iter().zip(stations) {
        parsed.push(StopTime::new(
            *station,
            parse_time(position, &stop.arrival)?,
            parse_time(position, &stop.departure)?,
        ));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn feed_json() -> &'static str {
        r#"{
            "stations": [
                {"id": "a", "name": "Alpha", "capacity": 100, "load": 20},
                {"id": "b", "capacity": 80, "coordinate": {"lat": 51.5, "lon": -0.1}},
                {"id": "c", "capacity": 120}
            ],
            "lines": [
                {"id": "m1", "mode": "Metro", "stops": ["a", "b", "c"],
                 "travel_times": [10, 13], "vehicle_capacity": 200},
                {"id": "b1", "mode": "Bus", "stops": ["a", "c"],
                 "travel_times": [35], "vehicle_capacity": 60}
            ],
            "trips": [
                {"line": "m1", "stops": [
                    {"arrival": "08:00", "departure": "08:00"},
                    {"arrival": "08:10", "departure": "08:12"},
                    {"arrival": "08:25", "departure": "08:25"}
                ]},
                {"line": "b1", "first": "08:05", "last": "09:05", "headway_mins": 30}
            ]
        }"#
    }

    #[test]
    fn read_feed_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(feed_json().as_bytes()).unwrap();
        let feed = read_feed(file.path()).unwrap();
        assert_eq!(feed.stations.len(), 3);
        assert_eq!(feed.lines.len(), 2);
        assert_eq!(feed.trips.len(), 2);
    }

    #[test]
    fn read_feed_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        assert!(matches!(read_feed(file.path()), Err(FeedError::Json(_))));
    }

    #[test]
    fn load_network_builds_model() {
        let feed: TransitFeed = serde_json::from_str(feed_json()).unwrap();
        let model = load_network(&feed).unwrap();
        assert_eq!(model.station_count(), 3);
        assert_eq!(model.line_count(), 2);
        // Name defaults to the id when absent.
        let b = model.resolve_station("b").unwrap();
        assert_eq!(model.station(b).name, "b");
        assert!(model.station(b).coordinate.is_some());
    }

    #[test]
    fn load_network_propagates_violations() {
        let feed: TransitFeed = serde_json::from_str(
            r#"{
                "stations": [{"id": "a", "capacity": 100}],
                "lines": [{"id": "m1", "mode": "Metro", "stops": ["a", "ghost"],
                           "travel_times": [5], "vehicle_capacity": 100}]
            }"#,
        )
        .unwrap();
        let err = load_network(&feed).unwrap_err();
        assert_eq!(err.violations().len(), 1);
    }

    #[test]
    fn load_timetable_expands_headways() {
        let feed: TransitFeed = serde_json::from_str(feed_json()).unwrap();
        let model = Arc::new(load_network(&feed).unwrap());
        let index = load_timetable(&model, &feed).unwrap();
        // One explicit metro trip plus bus runs at 08:05, 08:35, 09:05.
        assert_eq!(index.trip_count(), 4);

        let a = model.resolve_station("a").unwrap();
        let b1 = model.resolve_line("b1").unwrap();
        let second = index
            .next_departure(a, b1, DayTime::parse_hhmm("08:06").unwrap())
            .unwrap();
        assert_eq!(second.departure, DayTime::parse_hhmm("08:35").unwrap());
    }

    #[test]
    fn load_timetable_enumerates_all_violations() {
        let feed: TransitFeed = serde_json::from_str(feed_json()).unwrap();
        let model = Arc::new(load_network(&feed).unwrap());

        let bad: TransitFeed = serde_json::from_str(
            r#"{
                "stations": [], "lines": [],
                "trips": [
                    {"line": "nope", "stops": []},
                    {"line": "m1", "stops": [
                        {"arrival": "08:00", "departure": "08:00"},
                        {"arrival": "07:50", "departure": "07:52"},
                        {"arrival": "08:25", "departure": "08:25"}
                    ]},
                    {"line": "b1", "first": "8 oclock", "last": "09:00", "headway_mins": 15}
                ]
            }"#,
        )
        .unwrap();

        let err = load_timetable(&model, &bad).unwrap_err();
        assert_eq!(err.violations().len(), 3);
        assert!(matches!(
            err.violations()[0],
            TimetableViolation::UnknownLine { position: 0, .. }
        ));
        assert!(matches!(
            err.violations()[1],
            TimetableViolation::Schedule { position: 1, .. }
        ));
        assert!(matches!(
            err.violations()[2],
            TimetableViolation::BadTime { position: 2, .. }
        ));
    }

    #[test]
    fn seed_loads_applies_observed_occupancy() {
        let feed: TransitFeed = serde_json::from_str(feed_json()).unwrap();
        let model = Arc::new(load_network(&feed).unwrap());
        let index = load_timetable(&model, &feed).unwrap();
        let tracker = CapacityTracker::new(&model, &index, Default::default());

        seed_loads(&model, &tracker, &feed);
        let a = model.resolve_station("a").unwrap();
        let c = model.resolve_station("c").unwrap();
        assert_eq!(tracker.station_load(a), 20);
        assert_eq!(tracker.station_load(c), 0);
    }

    #[test]
    fn generate_trips_covers_the_service_day() {
        let feed: TransitFeed = serde_json::from_str(feed_json()).unwrap();
        let model = Arc::new(load_network(&feed).unwrap());
        let m1 = model.resolve_line("m1").unwrap();

        // The classic all-day pattern: every 15 minutes, 05:00 to 23:00.
        let trips = generate_trips(
            &model,
            m1,
            DayTime::parse_hhmm("05:00").unwrap(),
            DayTime::parse_hhmm("23:00").unwrap(),
            Duration::minutes(15),
            Duration::seconds(120),
        );
        assert_eq!(trips.len(), 73);

        let first = &trips[0];
        assert_eq!(first.first_departure().unwrap(), DayTime::parse_hhmm("05:00").unwrap());
        // 10 min travel, 2 min dwell, 13 min travel.
        assert_eq!(first.last_arrival().unwrap(), DayTime::parse_hhmm("05:25").unwrap());

        // Every generated run passes schedule validation.
        let mut index = ScheduleIndex::new(model.clone());
        for trip in trips {
            index.publish(trip).unwrap();
        }
    }

    #[test]
    fn generate_trips_stops_at_end_of_day() {
        let feed: TransitFeed = serde_json::from_str(feed_json()).unwrap();
        let model = Arc::new(load_network(&feed).unwrap());
        let m1 = model.resolve_line("m1").unwrap();

        // Runs starting close to midnight that cannot finish are skipped.
        let trips = generate_trips(
            &model,
            m1,
            DayTime::parse_hhmm("23:30").unwrap(),
            DayTime::parse_hhmm("23:59").unwrap(),
            Duration::minutes(15),
            Duration::zero(),
        );
        // 23:30 finishes 23:53; 23:45 would arrive past midnight.
        assert_eq!(trips.len(), 1);
    }

    #[test]
    fn zero_headway_generates_nothing() {
        let feed: TransitFeed = serde_json::from_str(feed_json()).unwrap();
        let model = Arc::new(load_network(&feed).unwrap());
        let m1 = model.resolve_line("m1").unwrap();
        let trips = generate_trips(
            &model,
            m1,
            DayTime::parse_hhmm("08:00").unwrap(),
            DayTime::parse_hhmm("09:00").unwrap(),
            Duration::zero(),
            Duration::zero(),
        );
        assert!(trips.is_empty());
    }
}
