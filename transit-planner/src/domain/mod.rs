//! Domain types for the transit route planner.
//!
//! Core model types shared by the network model, schedule index, capacity
//! tracker and planner. Types enforce their invariants at construction
//! time, so code that receives them can trust their validity.

mod ids;
mod itinerary;
mod line;
mod station;
mod time;
mod trip;

pub use ids::{LineIdx, SegmentIdx, StationIdx, TripIdx};
pub use itinerary::{Itinerary, ItineraryError, Leg, LegKind};
pub use line::{InvalidMode, Line, Mode, Segment};
pub use station::{Coordinate, Station};
pub use time::{DayTime, TimeError};
pub use trip::{StopTime, Trip};
