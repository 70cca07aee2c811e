//! Planner configuration.

use chrono::Duration;

use crate::domain::Mode;

/// Tunable parameters of the route search.
///
/// Transfer times are deliberately split by mode relationship: changing
/// platforms within one mode is usually quicker than walking between, say,
/// a metro concourse and a street-level bus stop.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Minimum time to change lines of the same mode (minutes).
    pub min_transfer_mins: i64,

    /// Minimum time to change lines across modes (minutes).
    pub cross_mode_transfer_mins: i64,

    /// Safety cap on label expansions per query. The monotonic time
    /// component already guarantees termination; this bounds worst-case
    /// latency on very dense networks.
    pub max_expansions: usize,
}

impl PlannerConfig {
    /// Minimum transfer duration between two lines.
    pub fn transfer_duration(&self, from: Mode, to: Mode) -> Duration {
        if from == to {
            Duration::minutes(self.min_transfer_mins)
        } else {
            Duration::minutes(self.cross_mode_transfer_mins)
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_transfer_mins: 4,
            cross_mode_transfer_mins: 6,
            max_expansions: 100_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlannerConfig::default();
        assert_eq!(config.min_transfer_mins, 4);
        assert_eq!(config.cross_mode_transfer_mins, 6);
        assert_eq!(config.max_expansions, 100_000);
    }

    #[test]
    fn transfer_duration_by_mode() {
        let config = PlannerConfig::default();
        assert_eq!(
            config.transfer_duration(Mode::Metro, Mode::Metro),
            Duration::minutes(4)
        );
        assert_eq!(
            config.transfer_duration(Mode::Bus, Mode::Metro),
            Duration::minutes(6)
        );
    }
}
