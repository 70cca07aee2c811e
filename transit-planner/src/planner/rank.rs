//! Ranking of candidate itineraries.
//!
//! The search finalizes candidates in roughly best-first order, but
//! different routes to the destination can still look identical to a
//! rider. This module collapses those and fixes the final, deterministic
//! presentation order. Dominance pruning happens inside the search's
//! per-station label fronts, not here: a finalized-but-slower alternative
//! is still a useful K-th answer.

use crate::domain::Itinerary;

/// An itinerary with its scalar cost under the request's cost function.
#[derive(Debug, Clone)]
pub struct RankedItinerary {
    pub itinerary: Itinerary,
    pub cost: f64,
}

impl RankedItinerary {
    pub fn transfer_count(&self) -> usize {
        self.itinerary.transfer_count()
    }

    pub fn crowding_penalty(&self) -> f64 {
        self.itinerary.crowding_penalty()
    }
}

/// Collapse itineraries that are indistinguishable to a rider: same
/// departure, same arrival, same number of transfers. Keeps the cheapest.
pub fn deduplicate(mut itineraries: Vec<RankedItinerary>) -> Vec<RankedItinerary> {
    if itineraries.len() <= 1 {
        return itineraries;
    }

    itineraries.sort_by(|a, b| {
        (
            a.itinerary.departure_time(),
            a.itinerary.arrival_time(),
            a.transfer_count(),
        )
            .cmp(&(
                b.itinerary.departure_time(),
                b.itinerary.arrival_time(),
                b.transfer_count(),
            ))
            .then(a.cost.total_cmp(&b.cost))
    });

    let mut result: Vec<RankedItinerary> = Vec::with_capacity(itineraries.len());
    for candidate in itineraries {
        let duplicate = result.last().is_some_and(|kept| {
            kept.itinerary.departure_time() == candidate.itinerary.departure_time()
                && kept.itinerary.arrival_time() == candidate.itinerary.arrival_time()
                && kept.transfer_count() == candidate.transfer_count()
        });
        if !duplicate {
            result.push(candidate);
        }
    }
    result
}

/// Final presentation order: cost, then fewer transfers, then earlier
/// arrival, then later departure (shorter waiting at the origin). Fully
/// deterministic, so identical queries rank identically.
pub fn rank(mut itineraries: Vec<RankedItinerary>) -> Vec<RankedItinerary> {
    itineraries.sort_by(|a, b| {
        a.cost
            .total_cmp(&b.cost)
            .then_with(|| a.transfer_count().cmp(&b.transfer_count()))
            .then_with(|| a.itinerary.arrival_time().cmp(&b.itinerary.arrival_time()))
            .then_with(|| b.itinerary.departure_time().cmp(&a.itinerary.departure_time()))
    });
    itineraries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DayTime, Itinerary, Leg, LegKind, StationIdx, TripIdx};

    fn t(s: &str) -> DayTime {
        DayTime::parse_hhmm(s).unwrap()
    }

    /// One-leg itinerary with an optional extra transfer leg to vary the
    /// transfer count.
    fn candidate(dep: &str, arr: &str, transfers: usize, cost: f64) -> RankedItinerary {
        let mut legs = vec![Leg {
            board: StationIdx(0),
            alight: StationIdx(1),
            kind: LegKind::Ride {
                trip: TripIdx(0),
                board_pos: 0,
                alight_pos: 1,
            },
            departure: t(dep),
            arrival: t(arr),
            crowding_penalty: 0.0,
        }];
        for _ in 0..transfers {
            legs.push(Leg {
                board: StationIdx(1),
                alight: StationIdx(1),
                kind: LegKind::Transfer,
                departure: t(arr),
                arrival: t(arr),
                crowding_penalty: 0.0,
            });
        }
        RankedItinerary {
            itinerary: Itinerary::new(StationIdx(0), t(dep), legs).unwrap(),
            cost,
        }
    }

    #[test]
    fn rank_orders_by_cost_first() {
        let ranked = rank(vec![
            candidate("08:05", "08:40", 0, 40.0),
            candidate("08:00", "08:25", 0, 25.0),
        ]);
        assert_eq!(ranked[0].cost, 25.0);
        assert_eq!(ranked[1].cost, 40.0);
    }

    #[test]
    fn rank_breaks_cost_ties_by_transfers_then_arrival() {
        let ranked = rank(vec![
            candidate("08:00", "08:30", 1, 30.0),
            candidate("08:00", "08:30", 0, 30.0),
            candidate("08:00", "08:20", 0, 30.0),
        ]);
        assert_eq!(ranked[0].itinerary.arrival_time(), t("08:20"));
        assert_eq!(ranked[1].transfer_count(), 0);
        assert_eq!(ranked[2].transfer_count(), 1);
    }

    #[test]
    fn duplicates_collapse_to_cheapest() {
        let kept = deduplicate(vec![
            candidate("08:00", "08:30", 0, 33.0),
            candidate("08:00", "08:30", 0, 30.0),
            candidate("08:05", "08:30", 0, 31.0),
        ]);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|r| r.cost == 30.0));
        assert!(!kept.iter().any(|r| r.cost == 33.0));
    }

    #[test]
    fn empty_input() {
        assert!(rank(vec![]).is_empty());
        assert!(deduplicate(vec![]).is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{DayTime, Itinerary, Leg, LegKind, StationIdx, TripIdx};
    use chrono::Duration;
    use proptest::prelude::*;

    fn candidate(dep_mins: u32, ride_mins: u32, cost: f64) -> RankedItinerary {
        let dep = DayTime::MIDNIGHT
            .checked_add(Duration::minutes(i64::from(dep_mins)))
            .unwrap();
        let arr = dep.checked_add(Duration::minutes(i64::from(ride_mins))).unwrap();
        let leg = Leg {
            board: StationIdx(0),
            alight: StationIdx(1),
            kind: LegKind::Ride {
                trip: TripIdx(0),
                board_pos: 0,
                alight_pos: 1,
            },
            departure: dep,
            arrival: arr,
            crowding_penalty: 0.0,
        };
        RankedItinerary {
            itinerary: Itinerary::new(StationIdx(0), dep, vec![leg]).unwrap(),
            cost,
        }
    }

    fn candidates() -> impl Strategy<Value = Vec<RankedItinerary>> {
        proptest::collection::vec(
            (0u32..1200, 5u32..120, 0.0f64..200.0)
                .prop_map(|(dep, ride, cost)| candidate(dep, ride, cost)),
            0..16,
        )
    }

    proptest! {
        /// rank() output is sorted by its documented key.
        #[test]
        fn rank_is_sorted(input in candidates()) {
            let ranked = rank(input);
            for window in ranked.windows(2) {
                let a = &window[0];
                let b = &window[1];
                let ordering = a
                    .cost
                    .total_cmp(&b.cost)
                    .then_with(|| a.transfer_count().cmp(&b.transfer_count()))
                    .then_with(|| a.itinerary.arrival_time().cmp(&b.itinerary.arrival_time()))
                    .then_with(|| {
                        b.itinerary
                            .departure_time()
                            .cmp(&a.itinerary.departure_time())
                    });
                prop_assert_ne!(ordering, std::cmp::Ordering::Greater);
            }
        }

        /// Deduplication leaves no two itineraries with the same
        /// rider-visible key, and never invents itineraries.
        #[test]
        fn dedup_key_is_unique(input in candidates()) {
            let n = input.len();
            let kept = deduplicate(input);
            prop_assert!(kept.len() <= n);
            for (i, a) in kept.iter().enumerate() {
                for (j, b) in kept.iter().enumerate() {
                    if i != j {
                        let key = |r: &RankedItinerary| {
                            (
                                r.itinerary.departure_time(),
                                r.itinerary.arrival_time(),
                                r.transfer_count(),
                            )
                        };
                        prop_assert_ne!(key(a), key(b));
                    }
                }
            }
        }
    }
}
