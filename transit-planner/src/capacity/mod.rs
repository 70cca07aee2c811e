//! Capacity tracker: load estimates and crowding penalties.
//!
//! Capacity is a soft constraint. The tracker keeps one atomic counter per
//! station and one per (trip, segment); `reserve`/`release` touch only the
//! counters an itinerary crosses, and no cross-counter transaction is ever
//! needed — each counter is independently consistent. A tracker instance
//! is passed explicitly to the planner per query, so tests get a fresh one
//! each time and nothing is global.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::domain::{Itinerary, LegKind, StationIdx, TripIdx};
use crate::network::NetworkModel;
use crate::schedule::ScheduleIndex;

/// Shape of the crowding penalty as a function of occupancy.
///
/// Zero below `threshold` (a fraction of rated capacity), then a convex
/// polynomial rise to `max_penalty` at 100%, clamped there for anything
/// above. Finite on purpose: an over-capacity itinerary ranks last but is
/// still returned when nothing else exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyCurve {
    /// Occupancy fraction below which the penalty is zero.
    pub threshold: f64,
    /// Polynomial exponent of the rise; 2.0 is quadratic.
    pub exponent: f64,
    /// Penalty at (and above) 100% occupancy.
    pub max_penalty: f64,
}

impl Default for PenaltyCurve {
    fn default() -> Self {
        Self {
            threshold: 0.70,
            exponent: 2.0,
            max_penalty: 120.0,
        }
    }
}

impl PenaltyCurve {
    /// Penalty for `load` passengers against a rated `capacity`.
    pub fn penalty(&self, load: u32, capacity: u32) -> f64 {
        if capacity == 0 {
            return self.max_penalty;
        }
        let ratio = f64::from(load) / f64::from(capacity);
        if ratio <= self.threshold {
            return 0.0;
        }
        let span = 1.0 - self.threshold;
        if span <= 0.0 {
            return self.max_penalty;
        }
        let t = ((ratio - self.threshold) / span).min(1.0);
        self.max_penalty * t.powf(self.exponent)
    }
}

/// Live load estimates for one (model, schedule) version pair.
pub struct CapacityTracker {
    curve: PenaltyCurve,
    model_version: u64,
    station_loads: Vec<AtomicU32>,
    station_capacities: Vec<u32>,
    /// One counter per segment of each trip (`stops - 1` each).
    trip_loads: Vec<Vec<AtomicU32>>,
    trip_capacities: Vec<u32>,
}

impl CapacityTracker {
    pub fn new(model: &NetworkModel, schedule: &ScheduleIndex, curve: PenaltyCurve) -> Self {
        let station_loads = (0..model.station_count()).map(|_| AtomicU32::new(0)).collect();
        let station_capacities = model.stations().map(|(_, s)| s.capacity).collect();
        let mut trip_loads = Vec::with_capacity(schedule.trip_count());
        let mut trip_capacities = Vec::with_capacity(schedule.trip_count());
        for (_, trip) in schedule.trips() {
            let segments = trip.stop_count().saturating_sub(1);
            trip_loads.push((0..segments).map(|_| AtomicU32::new(0)).collect());
            trip_capacities.push(model.line(trip.line).vehicle_capacity);
        }
        Self {
            curve,
            model_version: model.version(),
            station_loads,
            station_capacities,
            trip_loads,
            trip_capacities,
        }
    }

    pub fn curve(&self) -> &PenaltyCurve {
        &self.curve
    }

    /// The model version this tracker's counters belong to.
    pub fn model_version(&self) -> u64 {
        self.model_version
    }

    /// Current estimated occupancy of a station.
    pub fn station_load(&self, station: StationIdx) -> u32 {
        self.station_loads[station.0].load(Ordering::Relaxed)
    }

    /// Seed a station's load from observed data.
    pub fn set_station_load(&self, station: StationIdx, load: u32) {
        self.station_loads[station.0].store(load, Ordering::Relaxed);
    }

    /// Current estimated occupancy of a trip over one of its segments.
    pub fn trip_load(&self, trip: TripIdx, segment_pos: usize) -> u32 {
        self.trip_loads[trip.0][segment_pos].load(Ordering::Relaxed)
    }

    /// Crowding penalty of a station at its current load.
    pub fn station_penalty(&self, station: StationIdx) -> f64 {
        self.curve.penalty(
            self.station_load(station),
            self.station_capacities[station.0],
        )
    }

    /// Crowding penalty of a trip segment at its current load.
    pub fn trip_penalty(&self, trip: TripIdx, segment_pos: usize) -> f64 {
        self.curve
            .penalty(self.trip_load(trip, segment_pos), self.trip_capacities[trip.0])
    }

    /// Optimistically occupy everything an itinerary touches: the stations
    /// where the rider boards or alights, and each trip segment ridden.
    pub fn reserve(&self, itinerary: &Itinerary) {
        self.apply(itinerary, |counter| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Undo a previous [`reserve`](Self::reserve). Saturates at zero, so a
    /// stray release can never underflow a counter.
    pub fn release(&self, itinerary: &Itinerary) {
        self.apply(itinerary, |counter| {
            let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
        });
    }

    fn apply(&self, itinerary: &Itinerary, touch: impl Fn(&AtomicU32)) {
        for leg in itinerary.legs() {
            match leg.kind {
                LegKind::Ride {
                    trip,
                    board_pos,
                    alight_pos,
                } => {
                    touch(&self.station_loads[leg.board.0]);
                    touch(&self.station_loads[leg.alight.0]);
                    for pos in board_pos..alight_pos {
                        touch(&self.trip_loads[trip.0][pos]);
                    }
                }
                // The transfer's station is already counted by the
                // surrounding ride legs.
                LegKind::Transfer => {}
            }
        }
    }
}
