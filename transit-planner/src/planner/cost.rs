//! Preference resolution: caller weights to a scalar cost function.
//!
//! The search algorithm is criterion-agnostic — it only ever sees the
//! [`CostFunction`] value produced here, never the raw preferences.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Malformed preference weights. Fatal to the single request that
/// supplied them; nothing else is affected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidPreferenceError {
    #[error("preference weight {name} is negative ({value})")]
    Negative { name: &'static str, value: f64 },

    #[error("preference weight {name} is not a finite number")]
    NotFinite { name: &'static str },

    #[error("at least one preference weight must be positive")]
    AllZero,
}

/// Caller-supplied optimization preferences.
///
/// Weights are relative; they are normalized to sum to 1 during
/// resolution, so `{2, 1, 0}` and `{0.5, 0.25, 0}` mean the same thing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreferenceWeights {
    /// Weight on total elapsed time.
    pub minimize_time: f64,
    /// Weight on the number of line changes.
    pub minimize_transfers: f64,
    /// Weight on crowding penalties along the way.
    pub avoid_crowding: f64,
}

impl PreferenceWeights {
    pub fn new(minimize_time: f64, minimize_transfers: f64, avoid_crowding: f64) -> Self {
        Self {
            minimize_time,
            minimize_transfers,
            avoid_crowding,
        }
    }

    /// Pure earliest-arrival preferences.
    pub fn time_only() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    /// Validate and normalize into a [`CostFunction`].
    pub fn resolve(self) -> Result<CostFunction, InvalidPreferenceError> {
        let named = [
            ("minimize_time", self.minimize_time),
            ("minimize_transfers", self.minimize_transfers),
            ("avoid_crowding", self.avoid_crowding),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(InvalidPreferenceError::NotFinite { name });
            }
            if value < 0.0 {
                return Err(InvalidPreferenceError::Negative { name, value });
            }
        }
        let total = self.minimize_time + self.minimize_transfers + self.avoid_crowding;
        if total <= 0.0 {
            return Err(InvalidPreferenceError::AllZero);
        }
        Ok(CostFunction {
            w_time: self.minimize_time / total,
            w_transfers: self.minimize_transfers / total,
            w_crowding: self.avoid_crowding / total,
        })
    }
}

impl Default for PreferenceWeights {
    fn default() -> Self {
        Self::time_only()
    }
}

/// The scalar cost function driving the search.
///
/// `cost(leg) = w_time * minutes + w_transfers * transfer_indicator +
/// w_crowding * crowding_penalty`, with the weights already normalized to
/// sum to 1 so costs are comparable across requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostFunction {
    w_time: f64,
    w_transfers: f64,
    w_crowding: f64,
}

impl CostFunction {
    /// Cost of one leg. `elapsed` is the wall-clock time the leg consumes
    /// (riding plus any waiting it forces), `is_transfer` marks a line
    /// change, `crowding_penalty` comes from the capacity tracker.
    pub fn leg_cost(&self, elapsed: Duration, is_transfer: bool, crowding_penalty: f64) -> f64 {
        let minutes = elapsed.num_seconds() as f64 / 60.0;
        self.w_time * minutes
            + self.w_transfers * f64::from(u8::from(is_transfer))
            + self.w_crowding * crowding_penalty
    }

    pub fn w_time(&self) -> f64 {
        self.w_time
    }

    pub fn w_transfers(&self) -> f64 {
        self.w_transfers
    }

    pub fn w_crowding(&self) -> f64 {
        self.w_crowding
    }

    /// True if crowding has any influence on ranking.
    pub fn cares_about_crowding(&self) -> bool {
        self.w_crowding > 0.0
    }
}
