//! Continuous PID law.
//!
//! The controller is stateful: it keeps the integral accumulator, the previous
//! error and the timestamp of the previous step. Output is unbounded; clamping
//! belongs to the actuator driver.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Sign convention shared by both control laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Output raises the measured value.
    #[serde(rename = "heater")]
    Heating,
    /// Output lowers the measured value.
    #[serde(rename = "cooler")]
    Cooling,
}

impl Direction {
    pub const HEATER: &'static str = "heater";
    pub const COOLER: &'static str = "cooler";

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heating => Self::HEATER,
            Self::Cooling => Self::COOLER,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::HEATER => Ok(Self::Heating),
            Self::COOLER => Ok(Self::Cooling),
            other => Err(ControlError::UnknownToken {
                what: "direction",
                token: other.to_string(),
            }),
        }
    }
}

/// PID gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (per second).
    pub ki: f64,
    /// Derivative gain (seconds).
    pub kd: f64,
    /// Integral windup limit (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integral_limit: Option<f64>,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: None,
        }
    }

    /// Set integral windup limit.
    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    pub fn is_finite(&self) -> bool {
        self.kp.is_finite()
            && self.ki.is_finite()
            && self.kd.is_finite()
            && self.integral_limit.is_none_or(f64::is_finite)
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }
}

/// PID history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PidState {
    /// Integral accumulator.
    pub integral: f64,
    /// Error seen at the previous step.
    pub previous_error: f64,
    /// Timestamp of the previous step, `None` until the first step.
    pub previous_time: Option<DateTime<Utc>>,
}

/// Stateful PID controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    pub gains: PidGains,
    pub direction: Direction,
    state: PidState,
    reset: bool,
}

impl PidController {
    pub fn new(gains: PidGains, direction: Direction) -> Self {
        Self {
            gains,
            direction,
            state: PidState::default(),
            reset: true,
        }
    }

    /// Clear all history before the next step.
    pub fn request_reset(&mut self) {
        self.reset = true;
    }

    pub fn is_reset_pending(&self) -> bool {
        self.reset
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    /// Error with the direction's sign convention applied: positive whenever
    /// the output should increase.
    pub fn error(&self, goal: f64, measured: f64) -> f64 {
        match self.direction {
            Direction::Heating => goal - measured,
            Direction::Cooling => measured - goal,
        }
    }

    /// Compute one output from `goal` and the value measured at `at`.
    ///
    /// The time base is the gap between successive sample timestamps. After a
    /// reset the first step has no integral or derivative contribution.
    pub fn step(&mut self, goal: f64, measured: f64, at: DateTime<Utc>) -> f64 {
        if self.reset {
            self.state = PidState {
                integral: 0.0,
                previous_error: 0.0,
                previous_time: Some(at),
            };
            self.reset = false;
        }

        let error = self.error(goal, measured);
        let dt = self
            .state
            .previous_time
            .map(|prev| (at - prev).num_microseconds().unwrap_or(0) as f64 / 1e6)
            .unwrap_or(0.0)
            .max(0.0);

        let new_integral = self.state.integral + error * dt;
        let integral = match self.gains.integral_limit {
            Some(limit) => new_integral.clamp(-limit.abs(), limit.abs()),
            None => new_integral,
        };

        let derivative = if dt > 0.0 {
            (error - self.state.previous_error) / dt
        } else {
            0.0
        };

        let output = self.gains.kp * error + self.gains.ki * integral + self.gains.kd * derivative;

        self.state = PidState {
            integral,
            previous_error: error,
            previous_time: Some(at),
        };

        output
    }
}
