//! Time-dependent multi-criteria route search.
//!
//! Best-first search over (station, time) states implied by the schedule
//! index. The queue is ordered by accumulated scalar cost under the
//! request's cost function; per station the search keeps a small Pareto
//! front of labels over (arrival time, transfers, crowding), so an
//! itinerary that is slower but changes less or avoids crowds survives
//! next to the fastest one. Time only ever moves forward along an edge,
//! which bounds cyclic lines without any explicit visited set.

use std::collections::BinaryHeap;
use std::time::Instant;

use tracing::{debug, trace};

use crate::capacity::CapacityTracker;
use crate::domain::{DayTime, Itinerary, Leg, LegKind, LineIdx, StationIdx};
use crate::network::NetworkModel;
use crate::schedule::ScheduleIndex;

use super::config::PlannerConfig;
use super::cost::{CostFunction, InvalidPreferenceError, PreferenceWeights};
use super::rank::{RankedItinerary, deduplicate, rank};

/// Malformed route request.
///
/// Note what is *not* here: "no route found" and deadline expiry are
/// ordinary results, never errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error(transparent)]
    InvalidPreference(#[from] InvalidPreferenceError),

    /// Station index does not exist in the model
    #[error("unknown station index {0}")]
    UnknownStation(StationIdx),

    /// Schedule index or capacity tracker belongs to another model version
    #[error("component built for model version {found}, expected {expected}")]
    VersionMismatch { expected: u64, found: u64 },
}

/// A route query.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub origin: StationIdx,
    pub destination: StationIdx,
    /// Earliest acceptable departure.
    pub depart_after: DayTime,
    pub weights: PreferenceWeights,
    /// Maximum number of itineraries to return (K). Zero yields an empty
    /// result.
    pub max_results: usize,
    /// Wall-clock bound on the search. On expiry the best itineraries
    /// found so far are returned with a truncation flag, not an error.
    pub deadline: Option<Instant>,
}

impl PlanRequest {
    pub fn new(origin: StationIdx, destination: StationIdx, depart_after: DayTime) -> Self {
        Self {
            origin,
            destination,
            depart_after,
            weights: PreferenceWeights::default(),
            max_results: 3,
            deadline: None,
        }
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Search space fully explored, or K itineraries finalized.
    Exhausted,
    /// The caller's deadline expired mid-search.
    DeadlineTruncated,
    /// The expansion safety cap was hit.
    ExpansionCapped,
}

impl Termination {
    /// True when the result may be missing better itineraries.
    pub fn is_truncated(&self) -> bool {
        !matches!(self, Termination::Exhausted)
    }
}

/// Outcome of a route query. An empty itinerary list is a valid answer.
#[derive(Debug)]
pub struct PlanResult {
    /// Up to K itineraries, best first.
    pub itineraries: Vec<RankedItinerary>,
    pub termination: Termination,
    /// Labels taken off the queue; a rough effort measure.
    pub labels_expanded: usize,
}

/// A search label: one way of being at `station` at `time`.
#[derive(Debug, Clone)]
struct Label {
    station: StationIdx,
    time: DayTime,
    /// Line ridden to get here; `None` only at the origin. Boarding a
    /// different line than this one is a transfer.
    line: Option<LineIdx>,
    cost: f64,
    transfers: u32,
    crowding: f64,
    parent: Option<usize>,
    /// Leg that produced this label; `None` only at the origin.
    leg: Option<Leg>,
    /// Set when evicted from its station front; skipped at pop time.
    dead: bool,
}

/// Queue entry ordered as a min-heap on (cost, transfers, arrival, seq).
/// The sequence number makes tie-breaking — and therefore the whole
/// search — deterministic.
struct QueueEntry {
    cost: f64,
    transfers: u32,
    arrival: DayTime,
    seq: u64,
    label: usize,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the cheapest first.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.transfers.cmp(&self.transfers))
            .then_with(|| other.arrival.cmp(&self.arrival))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for QueueEntry {}

/// Multi-criteria route planner over one (model, schedule, tracker)
/// version. Holds references only; cheap to construct per query.
pub struct Planner<'a> {
    network: &'a NetworkModel,
    schedule: &'a ScheduleIndex,
    capacity: &'a CapacityTracker,
    config: &'a PlannerConfig,
}

impl<'a> Planner<'a> {
    pub fn new(
        network: &'a NetworkModel,
        schedule: &'a ScheduleIndex,
        capacity: &'a CapacityTracker,
        config: &'a PlannerConfig,
    ) -> Self {
        Self {
            network,
            schedule,
            capacity,
            config,
        }
    }

    /// Find up to K itineraries from origin to destination departing at or
    /// after the requested time.
    pub fn plan(&self, request: &PlanRequest) -> Result<PlanResult, PlanError> {
        let cost_fn = request.weights.resolve()?;
        self.validate(request)?;

        if request.max_results == 0 {
            return Ok(PlanResult {
                itineraries: Vec::new(),
                termination: Termination::Exhausted,
                labels_expanded: 0,
            });
        }

        if request.origin == request.destination {
            let itinerary = Itinerary::zero_leg(request.origin, request.depart_after);
            return Ok(PlanResult {
                itineraries: vec![RankedItinerary {
                    itinerary,
                    cost: 0.0,
                }],
                termination: Termination::Exhausted,
                labels_expanded: 0,
            });
        }

        debug!(
            origin = %self.network.station(request.origin).id,
            destination = %self.network.station(request.destination).id,
            depart_after = %request.depart_after,
            k = request.max_results,
            "route query"
        );

        let mut search = Search {
            planner: self,
            cost_fn,
            destination: request.destination,
            k: request.max_results,
            prune_crowding: cost_fn.cares_about_crowding(),
            arena: Vec::new(),
            fronts: vec![Vec::new(); self.network.station_count()],
            heap: BinaryHeap::new(),
            seq: 0,
        };

        let root = Label {
            station: request.origin,
            time: request.depart_after,
            line: None,
            cost: 0.0,
            transfers: 0,
            crowding: 0.0,
            parent: None,
            leg: None,
            dead: false,
        };
        search.enqueue_root(root);

        let mut destination_labels: Vec<usize> = Vec::new();
        let mut labels_expanded = 0usize;
        let mut termination = Termination::Exhausted;

        while let Some(entry) = search.heap.pop() {
            if let Some(deadline) = request.deadline {
                if Instant::now() >= deadline {
                    termination = Termination::DeadlineTruncated;
                    break;
                }
            }
            if search.arena[entry.label].dead {
                continue;
            }
            labels_expanded += 1;
            if labels_expanded > self.config.max_expansions {
                termination = Termination::ExpansionCapped;
                break;
            }

            let station = search.arena[entry.label].station;
            if station == request.destination {
                destination_labels.push(entry.label);
                if destination_labels.len() >= request.max_results {
                    break;
                }
                continue;
            }

            search.expand(entry.label);
        }

        // Finalized labels are already non-dominated up to the per-station
        // fronts; the result pipeline only collapses rider-identical
        // options and fixes the presentation order. Deliberately no
        // dominance filter here: a strictly slower alternative is still a
        // useful K-th answer.
        let candidates: Vec<RankedItinerary> = destination_labels
            .into_iter()
            .filter_map(|id| search.build_itinerary(id, request))
            .collect();
        let mut itineraries = rank(deduplicate(candidates));
        itineraries.truncate(request.max_results);

        debug!(
            found = itineraries.len(),
            labels_expanded,
            truncated = termination.is_truncated(),
            "route query finished"
        );

        Ok(PlanResult {
            itineraries,
            termination,
            labels_expanded,
        })
    }

    fn validate(&self, request: &PlanRequest) -> Result<(), PlanError> {
        for station in [request.origin, request.destination] {
            if station.0 >= self.network.station_count() {
                return Err(PlanError::UnknownStation(station));
            }
        }
        let expected = self.network.version();
        for found in [
            self.schedule.model_version(),
            self.capacity.model_version(),
        ] {
            if found != expected {
                return Err(PlanError::VersionMismatch { expected, found });
            }
        }
        Ok(())
    }
}

/// Mutable state of one search run.
struct Search<'a, 'b> {
    planner: &'b Planner<'a>,
    cost_fn: CostFunction,
    destination: StationIdx,
    k: usize,
    /// Whether crowding participates in label dominance. An inactive
    /// criterion must neither keep labels alive nor evict equal ones, or
    /// a zero-weight request would still route around crowds.
    prune_crowding: bool,
    arena: Vec<Label>,
    /// Per-station Pareto fronts of live label ids, capped at `k`.
    fronts: Vec<Vec<usize>>,
    heap: BinaryHeap<QueueEntry>,
    seq: u64,
}

/// `a` is at least as good as `b` on every active criterion. Crowding is
/// a criterion only while `prune_crowding` is set.
fn label_dominates(prune_crowding: bool, a: &Label, b: &Label) -> bool {
    a.time <= b.time
        && a.transfers <= b.transfers
        && a.cost <= b.cost
        && (!prune_crowding || a.crowding <= b.crowding)
}

impl Search<'_, '_> {

    fn enqueue_root(&mut self, root: Label) {
        let station = root.station;
        self.arena.push(root);
        let id = self.arena.len() - 1;
        self.fronts[station.0].push(id);
        self.push_queue(id);
    }

    fn push_queue(&mut self, id: usize) {
        let label = &self.arena[id];
        self.heap.push(QueueEntry {
            cost: label.cost,
            transfers: label.transfers,
            arrival: label.time,
            seq: self.seq,
            label: id,
        });
        self.seq += 1;
    }

    /// Expand one label: for every line serving its station, board the
    /// next departure (inserting a transfer leg when changing lines) and
    /// step to the following stop on that trip.
    fn expand(&mut self, id: usize) {
        let (station, time, current_line, cost, transfers, crowding) = {
            let label = &self.arena[id];
            (
                label.station,
                label.time,
                label.line,
                label.cost,
                label.transfers,
                label.crowding,
            )
        };
        let planner = self.planner;

        trace!(station = station.0, time = %time, cost, "expanding");

        for &next_line in planner.network.lines_serving(station) {
            let transfer = match current_line {
                Some(current) if current != next_line => {
                    let duration = planner.config.transfer_duration(
                        planner.network.line(current).mode,
                        planner.network.line(next_line).mode,
                    );
                    // Transfers that run past the end of the service day
                    // cannot board anything.
                    match time.checked_add(duration) {
                        Some(ready) => Some(ready),
                        None => continue,
                    }
                }
                _ => None,
            };
            let ready = transfer.unwrap_or(time);

            let Some(next_dep) = planner.schedule.next_departure(station, next_line, ready) else {
                continue;
            };
            let trip = planner.schedule.trip(next_dep.trip);
            let board_pos = next_dep.stop_pos;
            let next_stop = trip.stops[board_pos + 1];
            let arrival = next_stop.arrival;

            // Cost and criteria of the would-be successor, computed before
            // any label is materialized so rejected candidates leave no
            // trace in the arena.
            let mut new_cost = cost;
            let mut new_transfers = transfers;
            let mut new_crowding = crowding;
            let station_penalty = planner.capacity.station_penalty(station);
            if transfer.is_some() {
                let wait = ready.signed_duration_since(time);
                new_cost += self.cost_fn.leg_cost(wait, true, station_penalty);
                new_transfers += 1;
                new_crowding += station_penalty;
            }
            let ride_penalty = planner.capacity.station_penalty(next_stop.station)
                + planner.capacity.trip_penalty(next_dep.trip, board_pos);
            let elapsed = arrival.signed_duration_since(ready);
            new_cost += self.cost_fn.leg_cost(elapsed, false, ride_penalty);
            new_crowding += ride_penalty;

            // Arrivals at the destination are finalized results, not
            // prunable search state; everything else must survive its
            // station's front.
            let finalizes = next_stop.station == self.destination;
            if !finalizes
                && !self.front_admits(
                    next_stop.station,
                    arrival,
                    new_transfers,
                    new_crowding,
                    new_cost,
                )
            {
                continue;
            }

            // Materialize: an intermediate (unqueued) transfer label when
            // changing lines, then the ride label.
            let mut parent = id;
            if let Some(ready) = transfer {
                self.arena.push(Label {
                    station,
                    time: ready,
                    line: Some(next_line),
                    cost: cost + self.cost_fn.leg_cost(
                        ready.signed_duration_since(time),
                        true,
                        station_penalty,
                    ),
                    transfers: new_transfers,
                    crowding: crowding + station_penalty,
                    parent: Some(parent),
                    leg: Some(Leg {
                        board: station,
                        alight: station,
                        kind: LegKind::Transfer,
                        departure: time,
                        arrival: ready,
                        crowding_penalty: station_penalty,
                    }),
                    dead: false,
                });
                parent = self.arena.len() - 1;
            }

            self.arena.push(Label {
                station: next_stop.station,
                time: arrival,
                line: Some(next_line),
                cost: new_cost,
                transfers: new_transfers,
                crowding: new_crowding,
                parent: Some(parent),
                leg: Some(Leg {
                    board: station,
                    alight: next_stop.station,
                    kind: LegKind::Ride {
                        trip: next_dep.trip,
                        board_pos,
                        alight_pos: board_pos + 1,
                    },
                    departure: next_dep.departure,
                    arrival,
                    crowding_penalty: ride_penalty,
                }),
                dead: false,
            });
            let new_id = self.arena.len() - 1;
            if !finalizes {
                self.admit(next_stop.station, new_id);
            }
            self.push_queue(new_id);
        }
    }

    /// Would a label with these criteria survive the station's front?
    fn front_admits(
        &self,
        station: StationIdx,
        time: DayTime,
        transfers: u32,
        crowding: f64,
        cost: f64,
    ) -> bool {
        let probe = Label {
            station,
            time,
            line: None,
            cost,
            transfers,
            crowding,
            parent: None,
            leg: None,
            dead: false,
        };
        let front = &self.fronts[station.0];
        if front
            .iter()
            .any(|&id| label_dominates(self.prune_crowding, &self.arena[id], &probe))
        {
            return false;
        }
        if front.len() >= self.k {
            // Full front: the candidate must at least beat the costliest
            // surviving label, which it would evict.
            let worst = front
                .iter()
                .map(|&id| self.arena[id].cost)
                .fold(f64::NEG_INFINITY, f64::max);
            if probe.cost >= worst {
                return false;
            }
        }
        true
    }

    /// Insert an admitted label into its station front, evicting whatever
    /// it dominates (and the costliest label if the front is full).
    fn admit(&mut self, station: StationIdx, id: usize) {
        let prune_crowding = self.prune_crowding;
        let mut evicted: Vec<usize> = Vec::new();
        {
            let arena = &self.arena;
            let front = &mut self.fronts[station.0];
            front.retain(|&kept| {
                if label_dominates(prune_crowding, &arena[id], &arena[kept]) {
                    evicted.push(kept);
                    false
                } else {
                    true
                }
            });
            if front.len() >= self.k {
                if let Some((position, &worst)) = front
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| arena[**a].cost.total_cmp(&arena[**b].cost))
                {
                    evicted.push(worst);
                    front.remove(position);
                }
            }
            front.push(id);
        }
        for dead in evicted {
            self.arena[dead].dead = true;
        }
    }

    /// Reconstruct the leg chain of a finalized label, merging consecutive
    /// single-stop rides on the same trip into one leg.
    fn build_itinerary(&self, id: usize, request: &PlanRequest) -> Option<RankedItinerary> {
        let cost = self.arena[id].cost;
        let mut legs: Vec<Leg> = Vec::new();
        let mut cursor = id;
        loop {
            let label = &self.arena[cursor];
            match (&label.leg, label.parent) {
                (Some(leg), Some(parent)) => {
                    legs.push(leg.clone());
                    cursor = parent;
                }
                _ => break,
            }
        }
        legs.reverse();

        let merged = merge_rides(legs);
        Itinerary::new(request.origin, request.depart_after, merged)
            .ok()
            .map(|itinerary| RankedItinerary { itinerary, cost })
    }
}

/// Collapse runs of single-stop ride legs on the same trip.
fn merge_rides(legs: Vec<Leg>) -> Vec<Leg> {
    let mut merged: Vec<Leg> = Vec::new();
    for leg in legs {
        if let LegKind::Ride {
            trip,
            board_pos,
            alight_pos,
        } = leg.kind
        {
            if let Some(last) = merged.last_mut() {
                if let LegKind::Ride {
                    trip: last_trip,
                    alight_pos: last_alight,
                    ..
                } = &mut last.kind
                {
                    if *last_trip == trip && *last_alight == board_pos {
                        *last_alight = alight_pos;
                        last.alight = leg.alight;
                        last.arrival = leg.arrival;
                        last.crowding_penalty += leg.crowding_penalty;
                        continue;
                    }
                }
            }
        }
        merged.push(leg);
    }
    merged
}
