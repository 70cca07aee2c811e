//! Command-line front end for the route planner.
//!
//! Loads a JSON feed, answers route queries and prints (or exports) the
//! resulting itineraries. Exit code 0 for any result set, including an
//! empty one; non-zero only for ingestion or request failures.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use clap::{Parser, Subcommand};
use serde::Serialize;

use transit_planner::capacity::{CapacityTracker, PenaltyCurve};
use transit_planner::domain::{DayTime, LegKind, TimeError};
use transit_planner::feed::{self, FeedError, TimetableError, TransitFeed};
use transit_planner::network::{ConfigurationError, NetworkModel};
use transit_planner::planner::{
    PlanError, PlanRequest, PlanResult, Planner, PlannerConfig, PreferenceWeights,
};
use transit_planner::schedule::ScheduleIndex;

#[derive(Parser)]
#[command(name = "transit-planner", about = "Multi-modal transit route planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan routes between two stations.
    Route {
        /// Path to the network/timetable feed file.
        #[arg(long)]
        network: PathBuf,
        /// Origin station id.
        #[arg(long = "from")]
        origin: String,
        /// Destination station id.
        #[arg(long = "to")]
        destination: String,
        /// Earliest departure, HH:MM.
        #[arg(long, default_value = "08:00")]
        depart_after: String,
        #[arg(long, default_value_t = 1.0)]
        minimize_time: f64,
        #[arg(long, default_value_t = 0.0)]
        minimize_transfers: f64,
        #[arg(long, default_value_t = 0.0)]
        avoid_crowding: f64,
        /// Maximum number of itineraries (K).
        #[arg(long, default_value_t = 3)]
        max_results: usize,
        /// Search deadline in milliseconds.
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Emit itineraries as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the network snapshot (stations, segments, transfer points).
    Inspect {
        /// Path to the network/timetable feed file.
        #[arg(long)]
        network: PathBuf,
        /// Emit the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Timetable(#[from] TimetableError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("invalid --depart-after: {0}")]
    DepartAfter(#[from] TimeError),

    #[error("unknown station id {0:?}")]
    UnknownStation(String),

    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            match &error {
                CliError::Configuration(err) => {
                    for violation in err.violations() {
                        eprintln!("  - {violation}");
                    }
                }
                CliError::Timetable(err) => {
                    for violation in err.violations() {
                        eprintln!("  - {violation}");
                    }
                }
                _ => {}
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Route {
            network,
            origin,
            destination,
            depart_after,
            minimize_time,
            minimize_transfers,
            avoid_crowding,
            max_results,
            deadline_ms,
            json,
        } => {
            let (model, index, tracker) = load(&network)?;

            let mut request = PlanRequest::new(
                resolve(&model, &origin)?,
                resolve(&model, &destination)?,
                DayTime::parse_hhmm(&depart_after)?,
            );
            request.weights =
                PreferenceWeights::new(minimize_time, minimize_transfers, avoid_crowding);
            request.max_results = max_results;
            request.deadline =
                deadline_ms.map(|ms| Instant::now() + StdDuration::from_millis(ms));

            let config = PlannerConfig::default();
            let planner = Planner::new(&model, &index, &tracker, &config);
            let result = planner.plan(&request)?;

            if json {
                let dto = ItinerariesDto::from_result(&result, &model, &index);
                println!("{}", serde_json::to_string_pretty(&dto)?);
            } else {
                print_result(&result, &model, &index);
            }
            Ok(())
        }
        Command::Inspect { network, json } => {
            let (model, _, _) = load(&network)?;
            let snapshot = model.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!(
                    "network v{}: {} stations, {} segments, {} transfer points",
                    snapshot.version,
                    snapshot.stations.len(),
                    snapshot.segments.len(),
                    snapshot.transfer_points.len()
                );
                for station in &snapshot.stations {
                    let marker = if station.is_transfer_point { "*" } else { " " };
                    println!(
                        "  {marker} {} ({}) capacity {} lines [{}]",
                        station.id,
                        station.name,
                        station.capacity,
                        station.lines.join(", ")
                    );
                }
            }
            Ok(())
        }
    }
}

fn load(path: &PathBuf) -> Result<(Arc<NetworkModel>, ScheduleIndex, CapacityTracker), CliError> {
    let feed: TransitFeed = feed::read_feed(path)?;
    let model = Arc::new(feed::load_network(&feed)?);
    let index = feed::load_timetable(&model, &feed)?;
    let tracker = CapacityTracker::new(&model, &index, PenaltyCurve::default());
    feed::seed_loads(&model, &tracker, &feed);
    Ok((model, index, tracker))
}

fn resolve(model: &NetworkModel, id: &str) -> Result<transit_planner::domain::StationIdx, CliError> {
    model
        .resolve_station(id)
        .ok_or_else(|| CliError::UnknownStation(id.to_string()))
}

fn print_result(result: &PlanResult, model: &NetworkModel, index: &ScheduleIndex) {
    if result.itineraries.is_empty() {
        println!("no route found");
    }
    for (rank, ranked) in result.itineraries.iter().enumerate() {
        let itinerary = &ranked.itinerary;
        println!(
            "#{} {} -> {}  {}..{}  {} min, {} transfer(s), crowding {:.1}, cost {:.2}",
            rank + 1,
            model.station(itinerary.origin()).id,
            model.station(itinerary.destination()).id,
            itinerary.departure_time(),
            itinerary.arrival_time(),
            itinerary.duration().num_minutes(),
            itinerary.transfer_count(),
            itinerary.crowding_penalty(),
            ranked.cost,
        );
        for leg in itinerary.legs() {
            match leg.kind {
                LegKind::Ride { trip, .. } => {
                    let line = model.line(index.trip(trip).line);
                    println!(
                        "     {} {}  {} {} -> {}",
                        leg.departure,
                        leg.arrival,
                        line.mode,
                        model.station(leg.board).id,
                        model.station(leg.alight).id,
                    );
                }
                LegKind::Transfer => {
                    println!(
                        "     {} {}  transfer at {}",
                        leg.departure,
                        leg.arrival,
                        model.station(leg.board).id,
                    );
                }
            }
        }
    }
    if result.termination.is_truncated() {
        println!("(search truncated; results may be incomplete)");
    }
}

/// JSON shape handed to visualization consumers.
#[derive(Serialize)]
struct ItinerariesDto {
    truncated: bool,
    itineraries: Vec<ItineraryDto>,
}

#[derive(Serialize)]
struct ItineraryDto {
    origin: String,
    destination: String,
    departure: String,
    arrival: String,
    duration_mins: i64,
    transfers: usize,
    crowding_penalty: f64,
    cost: f64,
    legs: Vec<LegDto>,
}

#[derive(Serialize)]
struct LegDto {
    kind: &'static str,
    line: Option<String>,
    board: String,
    alight: String,
    departure: String,
    arrival: String,
}

impl ItinerariesDto {
    fn from_result(result: &PlanResult, model: &NetworkModel, index: &ScheduleIndex) -> Self {
        Self {
            truncated: result.termination.is_truncated(),
            itineraries: result
                .itineraries
                .iter()
                .map(|ranked| {
                    let itinerary = &ranked.itinerary;
                    ItineraryDto {
                        origin: model.station(itinerary.origin()).id.clone(),
                        destination: model.station(itinerary.destination()).id.clone(),
                        departure: itinerary.departure_time().to_string(),
                        arrival: itinerary.arrival_time().to_string(),
                        duration_mins: itinerary.duration().num_minutes(),
                        transfers: itinerary.transfer_count(),
                        crowding_penalty: itinerary.crowding_penalty(),
                        cost: ranked.cost,
                        legs: itinerary
                            .legs()
                            .iter()
                            .map(|leg| LegDto {
                                kind: if leg.is_transfer() { "transfer" } else { "ride" },
                                line: match leg.kind {
                                    LegKind::Ride { trip, .. } => {
                                        Some(model.line(index.trip(trip).line).id.clone())
                                    }
                                    LegKind::Transfer => None,
                                },
                                board: model.station(leg.board).id.clone(),
                                alight: model.station(leg.alight).id.clone(),
                                departure: leg.departure.to_string(),
                                arrival: leg.arrival.to_string(),
                            })
                            .collect(),
                    }
                })
                .collect(),
        }
    }
}
