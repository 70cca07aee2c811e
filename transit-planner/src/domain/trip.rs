//! Scheduled trip records.

use super::{DayTime, LineIdx, StationIdx};

/// One station call of a trip: where the vehicle stops and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTime {
    pub station: StationIdx,
    pub arrival: DayTime,
    pub departure: DayTime,
}

impl StopTime {
    pub fn new(station: StationIdx, arrival: DayTime, departure: DayTime) -> Self {
        Self {
            station,
            arrival,
            departure,
        }
    }
}

/// A scheduled run of a line within the service day.
///
/// The stop sequence must mirror the line's station sequence exactly —
/// same stations, same order, nothing skipped or added — and times must be
/// non-decreasing along it. Both invariants are enforced when the trip is
/// published into the schedule index, after which the trip is immutable.
#[derive(Debug, Clone)]
pub struct Trip {
    pub line: LineIdx,
    pub stops: Vec<StopTime>,
}

impl Trip {
    pub fn new(line: LineIdx, stops: Vec<StopTime>) -> Self {
        Self { line, stops }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Departure time of the first stop.
    pub fn first_departure(&self) -> Option<DayTime> {
        self.stops.first().map(|s| s.departure)
    }

    /// Arrival time at the last stop.
    pub fn last_arrival(&self) -> Option<DayTime> {
        self.stops.last().map(|s| s.arrival)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DayTime {
        DayTime::parse_hhmm(s).unwrap()
    }

    #[test]
    fn endpoints() {
        let trip = Trip::new(
            LineIdx(0),
            vec![
                StopTime::new(StationIdx(0), t("08:00"), t("08:00")),
                StopTime::new(StationIdx(1), t("08:10"), t("08:12")),
                StopTime::new(StationIdx(2), t("08:25"), t("08:25")),
            ],
        );
        assert_eq!(trip.stop_count(), 3);
        assert_eq!(trip.first_departure(), Some(t("08:00")));
        assert_eq!(trip.last_arrival(), Some(t("08:25")));
    }

    #[test]
    fn empty_trip_has_no_endpoints() {
        let trip = Trip::new(LineIdx(0), vec![]);
        assert_eq!(trip.first_departure(), None);
        assert_eq!(trip.last_arrival(), None);
    }
}
