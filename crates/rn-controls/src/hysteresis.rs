//! On/off law with a dead-band around the goal.
//!
//! Transitions use strict inequalities only, so a measurement sitting exactly
//! on `goal ± delta` never switches the sub-state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::controller::Direction;

/// Sub-state of the on/off law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnfState {
    /// Actuator driven at maximum.
    Acting,
    /// Actuator driven at minimum.
    Waiting,
    /// Inert marker while the regulator is not running.
    Off,
}

impl OnfState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acting => "ACTING",
            Self::Waiting => "WAITING",
            Self::Off => "OFF",
        }
    }

    /// Sub-state to use on the next tick after observing `measured`.
    pub fn next(self, direction: Direction, measured: f64, goal: f64, delta: f64) -> Self {
        let upper = goal + delta;
        let lower = goal - delta;
        match (self, direction) {
            (Self::Acting, Direction::Heating) if measured > upper => Self::Waiting,
            (Self::Acting, Direction::Cooling) if measured < lower => Self::Waiting,
            (Self::Waiting, Direction::Heating) if measured < lower => Self::Acting,
            (Self::Waiting, Direction::Cooling) if measured > upper => Self::Acting,
            (state, _) => state,
        }
    }

    /// Output associated with this sub-state.
    pub fn output(self, output_min: f64, output_max: f64) -> f64 {
        match self {
            Self::Acting => output_max,
            Self::Waiting | Self::Off => output_min,
        }
    }
}

impl fmt::Display for OnfState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(start: OnfState, direction: Direction, values: &[f64]) -> Vec<OnfState> {
        let mut state = start;
        values
            .iter()
            .map(|v| {
                state = state.next(direction, *v, 50.0, 2.0);
                state
            })
            .collect()
    }

    #[test]
    fn heating_switches_off_above_band() {
        let seen = feed(OnfState::Acting, Direction::Heating, &[51.0, 52.9, 53.1]);
        assert_eq!(
            seen,
            vec![OnfState::Acting, OnfState::Waiting, OnfState::Waiting]
        );
    }

    #[test]
    fn heating_rearms_below_band() {
        let seen = feed(OnfState::Waiting, Direction::Heating, &[49.0, 48.1, 47.9]);
        assert_eq!(
            seen,
            vec![OnfState::Waiting, OnfState::Waiting, OnfState::Acting]
        );
    }

    #[test]
    fn cooling_is_mirrored() {
        let seen = feed(OnfState::Acting, Direction::Cooling, &[49.0, 47.9]);
        assert_eq!(seen, vec![OnfState::Acting, OnfState::Waiting]);
        let seen = feed(OnfState::Waiting, Direction::Cooling, &[51.0, 52.1]);
        assert_eq!(seen, vec![OnfState::Waiting, OnfState::Acting]);
    }

    #[test]
    fn boundary_values_are_sticky() {
        assert_eq!(
            OnfState::Acting.next(Direction::Heating, 52.0, 50.0, 2.0),
            OnfState::Acting
        );
        assert_eq!(
            OnfState::Waiting.next(Direction::Heating, 48.0, 50.0, 2.0),
            OnfState::Waiting
        );
    }

    #[test]
    fn off_never_transitions() {
        assert_eq!(
            OnfState::Off.next(Direction::Heating, -1000.0, 50.0, 2.0),
            OnfState::Off
        );
        assert_eq!(OnfState::Off.output(0.0, 100.0), 0.0);
    }

    #[test]
    fn outputs() {
        assert_eq!(OnfState::Acting.output(0.0, 100.0), 100.0);
        assert_eq!(OnfState::Waiting.output(0.0, 100.0), 0.0);
    }
}
