//! Multi-modal transit route planner.
//!
//! Plans routes through a metro/bus/train network against real vehicle
//! schedules, with transfer costs, station capacity and caller preferences
//! (time vs transfers vs crowding). The crate is the planning core: the
//! network model, the schedule index, the capacity tracker and the
//! multi-criteria planner. Rendering, interactive highlighting and data
//! acquisition live outside and consume the snapshot/itinerary shapes
//! exposed here.

pub mod capacity;
pub mod domain;
pub mod feed;
pub mod network;
pub mod planner;
pub mod schedule;
