//! Itinerary and leg types.
//!
//! An `Itinerary` is the planner's output: an ordered sequence of legs
//! from an origin to a destination. It is derived data owned by the caller
//! that requested it — nothing in the core retains it.

use chrono::Duration;

use super::{DayTime, StationIdx, TripIdx};

/// What a leg rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    /// Riding a scheduled trip from the stop at `board_pos` to the stop at
    /// `alight_pos` within that trip's stop sequence. Positions rather
    /// than stations disambiguate lines that revisit a station.
    Ride {
        trip: TripIdx,
        board_pos: usize,
        alight_pos: usize,
    },
    /// Changing lines at a station: a walking/waiting transfer. Board and
    /// alight station are the same.
    Transfer,
}

/// One uninterrupted piece of an itinerary.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub board: StationIdx,
    pub alight: StationIdx,
    pub kind: LegKind,
    pub departure: DayTime,
    pub arrival: DayTime,
    /// Crowding penalty accrued on this leg, as evaluated by the capacity
    /// tracker's penalty curve when the itinerary was planned.
    pub crowding_penalty: f64,
}

impl Leg {
    pub fn duration(&self) -> Duration {
        self.arrival.signed_duration_since(self.departure)
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self.kind, LegKind::Transfer)
    }

    pub fn is_ride(&self) -> bool {
        matches!(self.kind, LegKind::Ride { .. })
    }
}

/// Error raised when assembling an inconsistent itinerary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ItineraryError {
    /// First leg does not start at the stated origin
    #[error("first leg boards at station {found}, expected origin {expected}")]
    OriginMismatch {
        expected: StationIdx,
        found: StationIdx,
    },

    /// A leg does not board where the previous one alighted
    #[error("legs disconnected between stations {0} and {1}")]
    NotConnected(StationIdx, StationIdx),

    /// A leg departs before the previous leg arrives
    #[error("leg {position} departs before the previous leg arrives")]
    NonChronological { position: usize },
}

/// A complete journey from origin to destination.
///
/// Zero legs is valid and means origin == destination: the caller is
/// already there. Otherwise legs connect end to end and never go back in
/// time, checked at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    origin: StationIdx,
    destination: StationIdx,
    departure: DayTime,
    arrival: DayTime,
    legs: Vec<Leg>,
}

impl Itinerary {
    /// The "already there" itinerary for origin == destination.
    pub fn zero_leg(origin: StationIdx, at: DayTime) -> Self {
        Self {
            origin,
            destination: origin,
            departure: at,
            arrival: at,
            legs: Vec::new(),
        }
    }

    /// Assemble an itinerary from connecting legs.
    ///
    /// `anchor` is the requested departure time; it becomes both departure
    /// and arrival for a zero-leg itinerary. With legs present, departure
    /// is the first leg's departure and arrival the last leg's arrival.
    pub fn new(
        origin: StationIdx,
        anchor: DayTime,
        legs: Vec<Leg>,
    ) -> Result<Self, ItineraryError> {
        let Some(first) = legs.first() else {
            return Ok(Self::zero_leg(origin, anchor));
        };

        if first.board != origin {
            return Err(ItineraryError::OriginMismatch {
                expected: origin,
                found: first.board,
            });
        }

        for (position, window) in legs.windows(2).enumerate() {
            if window[0].alight != window[1].board {
                return Err(ItineraryError::NotConnected(
                    window[0].alight,
                    window[1].board,
                ));
            }
            if window[1].departure < window[0].arrival {
                return Err(ItineraryError::NonChronological {
                    position: position + 1,
                });
            }
        }

        let departure = first.departure;
        let last = legs.last().expect("non-empty checked above");
        Ok(Self {
            origin,
            destination: last.alight,
            departure,
            arrival: last.arrival,
            legs,
        })
    }

    pub fn origin(&self) -> StationIdx {
        self.origin
    }

    pub fn destination(&self) -> StationIdx {
        self.destination
    }

    pub fn departure_time(&self) -> DayTime {
        self.departure
    }

    pub fn arrival_time(&self) -> DayTime {
        self.arrival
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Total duration from first departure to last arrival.
    pub fn duration(&self) -> Duration {
        self.arrival.signed_duration_since(self.departure)
    }

    /// Number of line changes.
    pub fn transfer_count(&self) -> usize {
        self.legs.iter().filter(|l| l.is_transfer()).count()
    }

    /// Total crowding penalty across all legs.
    pub fn crowding_penalty(&self) -> f64 {
        self.legs.iter().map(|l| l.crowding_penalty).sum()
    }

    /// True for the origin == destination case.
    pub fn is_zero_leg(&self) -> bool {
        self.legs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DayTime {
        DayTime::parse_hhmm(s).unwrap()
    }

    fn ride(board: usize, alight: usize, dep: &str, arr: &str) -> Leg {
        Leg {
            board: StationIdx(board),
            alight: StationIdx(alight),
            kind: LegKind::Ride {
                trip: TripIdx(0),
                board_pos: 0,
                alight_pos: 1,
            },
            departure: t(dep),
            arrival: t(arr),
            crowding_penalty: 0.0,
        }
    }

    fn transfer(at: usize, dep: &str, arr: &str) -> Leg {
        Leg {
            board: StationIdx(at),
            alight: StationIdx(at),
            kind: LegKind::Transfer,
            departure: t(dep),
            arrival: t(arr),
            crowding_penalty: 0.0,
        }
    }

    #[test]
    fn zero_leg_itinerary() {
        let it = Itinerary::new(StationIdx(4), t("09:00"), vec![]).unwrap();
        assert!(it.is_zero_leg());
        assert_eq!(it.origin(), it.destination());
        assert_eq!(it.departure_time(), t("09:00"));
        assert_eq!(it.arrival_time(), t("09:00"));
        assert_eq!(it.duration(), Duration::zero());
        assert_eq!(it.transfer_count(), 0);
    }

    #[test]
    fn connected_legs_accepted() {
        let it = Itinerary::new(
            StationIdx(0),
            t("08:00"),
            vec![
                ride(0, 1, "08:00", "08:10"),
                transfer(1, "08:10", "08:14"),
                ride(1, 2, "08:20", "08:30"),
            ],
        )
        .unwrap();
        assert_eq!(it.destination(), StationIdx(2));
        assert_eq!(it.transfer_count(), 1);
        assert_eq!(it.duration(), Duration::minutes(30));
    }

    #[test]
    fn disconnected_legs_rejected() {
        let err = Itinerary::new(
            StationIdx(0),
            t("08:00"),
            vec![ride(0, 1, "08:00", "08:10"), ride(2, 3, "08:20", "08:30")],
        )
        .unwrap_err();
        assert!(matches!(err, ItineraryError::NotConnected(_, _)));
    }

    #[test]
    fn time_travel_rejected() {
        let err = Itinerary::new(
            StationIdx(0),
            t("08:00"),
            vec![ride(0, 1, "08:00", "08:10"), ride(1, 2, "08:05", "08:15")],
        )
        .unwrap_err();
        assert!(matches!(err, ItineraryError::NonChronological { .. }));
    }

    #[test]
    fn origin_mismatch_rejected() {
        let err = Itinerary::new(StationIdx(5), t("08:00"), vec![ride(0, 1, "08:00", "08:10")])
            .unwrap_err();
        assert!(matches!(err, ItineraryError::OriginMismatch { .. }));
    }
}
