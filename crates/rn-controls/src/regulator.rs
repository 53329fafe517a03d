//! Dual-mode regulator.
//!
//! One regulator drives one actuator. Each tick it either initialises,
//! samples and applies the active law, or shuts the actuator down. Sensor
//! failures are counted; once the count passes the threshold the actuator is
//! forced to its safe value and the regulator re-initialises itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::actuator::ClampedActuator;
use crate::controller::{Direction, PidController, PidGains};
use crate::error::ControlError;
use crate::hysteresis::OnfState;
use crate::sampled::{SampleOutcome, SampleSource};

/// Failures tolerated before the safety reset kicks in.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Top-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegState {
    Init,
    Busy,
    Disable,
    Off,
}

impl RegState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Busy => "BUSY",
            Self::Disable => "DISABLE",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for RegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegState {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(Self::Init),
            "BUSY" => Ok(Self::Busy),
            "DISABLE" => Ok(Self::Disable),
            "OFF" => Ok(Self::Off),
            other => Err(ControlError::UnknownToken {
                what: "regulator state",
                token: other.to_string(),
            }),
        }
    }
}

/// Active control law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Pid,
    Onf,
}

impl Mode {
    pub const PID: &'static str = "pid";
    pub const ONF: &'static str = "onf";

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pid => Self::PID,
            Self::Onf => Self::ONF,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ControlError;

    /// Only the first three characters are significant, so `"pid"` and
    /// `"pidx"` both select PID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.get(..3) {
            Some(Self::PID) => Ok(Self::Pid),
            Some(Self::ONF) => Ok(Self::Onf),
            _ => Err(ControlError::UnknownToken {
                what: "mode",
                token: s.to_string(),
            }),
        }
    }
}

/// Read-only view of a regulator for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatorSnapshot {
    pub state: RegState,
    pub enabled: bool,
    pub mode: Mode,
    pub direction: Direction,
    pub onf_state: OnfState,
    pub goal: f64,
    pub delta: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output: f64,
    pub output_min: f64,
    pub output_max: f64,
    pub failure_count: u32,
}

/// PID / on-off regulator for one execution mechanism.
#[derive(Debug)]
pub struct Regulator {
    state: RegState,
    mode: Mode,
    goal: f64,
    delta: f64,
    pid: PidController,
    onf: OnfState,
    em: ClampedActuator,
    failure_count: u32,
    failure_threshold: u32,
}

impl Regulator {
    /// Create a disabled regulator in PID heating mode with unit gains.
    pub fn new(em: ClampedActuator) -> Self {
        Self {
            state: RegState::Off,
            mode: Mode::Pid,
            goal: 0.0,
            delta: 0.0,
            pid: PidController::new(PidGains::default(), Direction::Heating),
            onf: OnfState::Off,
            em,
            failure_count: 0,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.pid.direction = direction;
        self
    }

    pub fn with_goal(mut self, goal: f64) -> Self {
        self.goal = goal;
        self
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_gains(mut self, gains: PidGains) -> Self {
        self.pid.gains = gains;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Advance the state machine by one tick.
    pub fn tick(&mut self, source: &mut dyn SampleSource) {
        match self.state {
            RegState::Off => {}
            RegState::Init => {
                self.em.off();
                self.failure_count = 0;
                self.pid.request_reset();
                self.onf = OnfState::Waiting;
                self.state = RegState::Busy;
            }
            RegState::Busy => self.busy(source),
            RegState::Disable => {
                self.em.off();
                // Only the on/off sub-state is parked; the direction survives
                // so a later enable resumes the same law.
                self.onf = OnfState::Off;
                self.pid.request_reset();
                self.state = RegState::Off;
            }
        }
        debug!(
            state = %self.state,
            onf_state = %self.onf,
            mode = %self.mode,
            goal = self.goal,
            output = self.em.output(),
            "regulator tick"
        );
    }

    fn busy(&mut self, source: &mut dyn SampleSource) {
        let sample = source.read();
        match sample.outcome {
            SampleOutcome::Ok => {
                self.failure_count = 0;
                let output = match self.mode {
                    Mode::Pid => self.pid.step(self.goal, sample.value, sample.timestamp),
                    Mode::Onf => {
                        // The output follows the sub-state held when the sample
                        // arrived; the transition takes effect next tick.
                        let prior = self.onf;
                        self.onf =
                            prior.next(self.pid.direction, sample.value, self.goal, self.delta);
                        prior.output(self.em.output_min(), self.em.output_max())
                    }
                };
                self.em.command(output);
            }
            SampleOutcome::Failed => {
                self.failure_count = self.failure_count.saturating_add(1);
                if self.failure_count > self.failure_threshold {
                    self.em.off();
                    self.failure_count = 0;
                    self.state = RegState::Init;
                    error!(
                        threshold = self.failure_threshold,
                        "reading from sensor failed, actuator turned off"
                    );
                } else {
                    warn!(
                        failure_count = self.failure_count,
                        threshold = self.failure_threshold,
                        "sensor failure counter"
                    );
                }
            }
        }
    }

    /// Start (or keep) running. Has no effect while already enabled.
    pub fn enable(&mut self) {
        if !self.is_enabled() {
            self.state = RegState::Init;
        }
    }

    /// Enable only if [`Regulator::validate`] passes. Returns whether the
    /// regulator is enabled afterwards.
    pub fn enable_checked(&mut self) -> bool {
        if !self.validate() {
            warn!(state = %self.state, "regulator configuration invalid, not enabling");
            return self.is_enabled();
        }
        self.enable();
        true
    }

    /// Request a shutdown; the actuator is turned off on the next tick.
    pub fn disable(&mut self) {
        if self.state != RegState::Off {
            self.state = RegState::Disable;
        }
    }

    /// Stop immediately and turn the actuator off now.
    pub fn turn_off(&mut self) {
        self.state = RegState::Off;
        self.em.off();
    }

    /// `true` unless the regulator is disabling or off.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.state, RegState::Disable | RegState::Off)
    }

    /// Returns `false` and leaves the goal untouched for non-finite input.
    pub fn set_goal(&mut self, goal: f64) -> bool {
        if !goal.is_finite() {
            return false;
        }
        self.goal = goal;
        true
    }

    /// Change the dead-band. A running heating on/off regulator re-initialises.
    ///
    /// Returns `false` and changes nothing for negative or non-finite input.
    pub fn set_delta(&mut self, delta: f64) -> bool {
        if !delta.is_finite() || delta < 0.0 {
            return false;
        }
        self.delta = delta;
        // Only heating on/off runs restart.
        if self.state == RegState::Busy
            && self.mode == Mode::Onf
            && self.pid.direction == Direction::Heating
        {
            self.state = RegState::Init;
        }
        true
    }

    /// Replace the PID gains, keeping any integral limit.
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) -> bool {
        if !(kp.is_finite() && ki.is_finite() && kd.is_finite()) {
            return false;
        }
        self.pid.gains.kp = kp;
        self.pid.gains.ki = ki;
        self.pid.gains.kd = kd;
        true
    }

    pub fn set_kp(&mut self, kp: f64) -> bool {
        let PidGains { ki, kd, .. } = self.pid.gains;
        self.set_gains(kp, ki, kd)
    }

    pub fn set_ki(&mut self, ki: f64) -> bool {
        let PidGains { kp, kd, .. } = self.pid.gains;
        self.set_gains(kp, ki, kd)
    }

    pub fn set_kd(&mut self, kd: f64) -> bool {
        let PidGains { kp, ki, .. } = self.pid.gains;
        self.set_gains(kp, ki, kd)
    }

    /// Select the law from its token (`"pid"` / `"onf"`).
    ///
    /// Unknown tokens are ignored and `false` is returned. A running heating
    /// regulator re-initialises after a change.
    pub fn set_mode(&mut self, token: &str) -> bool {
        let Ok(mode) = token.parse::<Mode>() else {
            return false;
        };
        self.mode = mode;
        if self.state == RegState::Busy && self.pid.direction == Direction::Heating {
            self.state = RegState::Init;
        }
        true
    }

    /// Select the direction from its token (`"heater"` / `"cooler"`).
    ///
    /// Unknown tokens are ignored and `false` is returned. A running regulator
    /// re-initialises after a change.
    pub fn set_direction(&mut self, token: &str) -> bool {
        let Ok(direction) = token.parse::<Direction>() else {
            return false;
        };
        self.pid.direction = direction;
        if self.state == RegState::Busy {
            self.state = RegState::Init;
        }
        true
    }

    /// Manual override: command the actuator directly, bypassing the laws.
    pub fn set_power(&mut self, output: f64) -> f64 {
        self.em.command(output)
    }

    /// Restore a lifecycle state by name. Unknown names fall back to OFF.
    pub fn restore_state(&mut self, name: &str) {
        self.state = match name.parse::<RegState>() {
            Ok(state) => state,
            Err(err) => {
                error!(error = %err, "unknown regulator state, forcing OFF");
                RegState::Off
            }
        };
    }

    /// Check the configuration before activation. Emits one diagnostic per
    /// problem found.
    pub fn validate(&self) -> bool {
        let mut ok = true;
        if !self.goal.is_finite() {
            error!(goal = self.goal, "regulator check: bad goal");
            ok = false;
        }
        if !self.delta.is_finite() || self.delta < 0.0 {
            error!(delta = self.delta, "regulator check: bad delta");
            ok = false;
        }
        if !self.pid.gains.is_finite() {
            error!(gains = ?self.pid.gains, "regulator check: bad pid gains");
            ok = false;
        }
        if self.em.output_min() > self.em.output_max() {
            error!(
                output_min = self.em.output_min(),
                output_max = self.em.output_max(),
                "regulator check: bad output range"
            );
            ok = false;
        }
        ok
    }

    pub fn state(&self) -> RegState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.pid.direction
    }

    pub fn onf_state(&self) -> OnfState {
        self.onf
    }

    pub fn goal(&self) -> f64 {
        self.goal
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn gains(&self) -> PidGains {
        self.pid.gains
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn actuator(&self) -> &ClampedActuator {
        &self.em
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn snapshot(&self) -> RegulatorSnapshot {
        RegulatorSnapshot {
            state: self.state,
            enabled: self.is_enabled(),
            mode: self.mode,
            direction: self.pid.direction,
            onf_state: self.onf,
            goal: self.goal,
            delta: self.delta,
            kp: self.pid.gains.kp,
            ki: self.pid.gains.ki,
            kd: self.pid.gains.kd,
            output: self.em.output(),
            output_min: self.em.output_min(),
            output_max: self.em.output_max(),
            failure_count: self.failure_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::CommandLog;
    use crate::sampled::Sample;
    use chrono::{DateTime, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn regulator() -> (Regulator, CommandLog) {
        let log = CommandLog::new();
        let em = ClampedActuator::new(log.clone(), 0.0, 100.0).unwrap();
        (Regulator::new(em), log)
    }

    #[test]
    fn mode_tokens() {
        assert_eq!("pid".parse::<Mode>().unwrap(), Mode::Pid);
        assert_eq!("onf".parse::<Mode>().unwrap(), Mode::Onf);
        assert_eq!("onfxyz".parse::<Mode>().unwrap(), Mode::Onf);
        assert!("on".parse::<Mode>().is_err());
        assert!("bogus".parse::<Mode>().is_err());
        assert!("PID".parse::<Mode>().is_err());
    }

    #[test]
    fn state_names_round_trip() {
        for state in [RegState::Init, RegState::Busy, RegState::Disable, RegState::Off] {
            assert_eq!(state.as_str().parse::<RegState>().unwrap(), state);
        }
    }

    #[test]
    fn created_off_and_idle() {
        let (mut reg, log) = regulator();
        assert_eq!(reg.state(), RegState::Off);
        assert!(!reg.is_enabled());
        let mut source = || Sample::ok(10.0, ts(0));
        reg.tick(&mut source);
        assert_eq!(reg.state(), RegState::Off);
        assert!(log.is_empty());
    }

    #[test]
    fn init_tick_forces_minimum_and_goes_busy() {
        let (mut reg, log) = regulator();
        reg.enable();
        assert_eq!(reg.state(), RegState::Init);
        let mut source = || -> Sample { panic!("INIT must not sample") };
        reg.tick(&mut source);
        assert_eq!(reg.state(), RegState::Busy);
        assert_eq!(log.commands(), vec![0.0]);
        assert!(reg.pid().is_reset_pending());
        assert_eq!(reg.onf_state(), OnfState::Waiting);
    }

    #[test]
    fn enable_is_idempotent_while_running() {
        let (mut reg, _log) = regulator();
        reg.enable();
        let mut source = || Sample::ok(1.0, ts(0));
        reg.tick(&mut source);
        assert_eq!(reg.state(), RegState::Busy);
        reg.enable();
        assert_eq!(reg.state(), RegState::Busy);
    }

    #[test]
    fn disable_twice_sends_single_off() {
        let (mut reg, log) = regulator();
        reg.enable();
        let mut source = || Sample::ok(1.0, ts(0));
        reg.tick(&mut source);
        let before = log.len();

        reg.disable();
        reg.disable();
        reg.tick(&mut source);
        assert_eq!(reg.state(), RegState::Off);
        reg.disable();
        reg.tick(&mut source);
        assert_eq!(reg.state(), RegState::Off);
        assert_eq!(log.len(), before + 1);
        assert_eq!(reg.onf_state(), OnfState::Off);
    }

    #[test]
    fn disable_parks_onf_but_keeps_direction() {
        let (reg, _log) = regulator();
        let mut reg = reg.with_mode(Mode::Onf).with_direction(Direction::Cooling);
        reg.enable();
        let mut source = || Sample::ok(1.0, ts(0));
        reg.tick(&mut source);
        reg.disable();
        reg.tick(&mut source);
        assert_eq!(reg.state(), RegState::Off);
        assert_eq!(reg.onf_state(), OnfState::Off);
        assert_eq!(reg.direction(), Direction::Cooling);
        assert!(reg.pid().is_reset_pending());

        reg.enable();
        reg.tick(&mut source);
        assert_eq!(reg.direction(), Direction::Cooling);
        assert_eq!(reg.onf_state(), OnfState::Waiting);
    }

    #[test]
    fn enable_checked_refuses_invalid_configuration() {
        let (reg, log) = regulator();
        let mut reg = reg.with_goal(f64::NAN);
        assert!(!reg.enable_checked());
        assert_eq!(reg.state(), RegState::Off);
        assert!(log.is_empty());

        let (mut reg, _log) = regulator();
        assert!(reg.enable_checked());
        assert_eq!(reg.state(), RegState::Init);
    }

    #[test]
    fn turn_off_is_synchronous() {
        let (mut reg, log) = regulator();
        reg.enable();
        let mut source = || Sample::ok(1.0, ts(0));
        reg.tick(&mut source);
        reg.set_power(70.0);
        reg.turn_off();
        assert_eq!(reg.state(), RegState::Off);
        assert_eq!(log.last(), Some(0.0));
    }

    #[test]
    fn unknown_mode_changes_nothing() {
        let (mut reg, _log) = regulator();
        reg.enable();
        let mut source = || Sample::ok(1.0, ts(0));
        reg.tick(&mut source);
        assert!(!reg.set_mode("bogus"));
        assert_eq!(reg.mode(), Mode::Pid);
        assert_eq!(reg.state(), RegState::Busy);
        assert!(!reg.set_direction("sideways"));
        assert_eq!(reg.direction(), Direction::Heating);
        assert_eq!(reg.state(), RegState::Busy);
    }

    #[test]
    fn mode_change_reinitialises_heating_run_only() {
        let (mut reg, _log) = regulator();
        reg.enable();
        let mut source = || Sample::ok(1.0, ts(0));
        reg.tick(&mut source);
        assert!(reg.set_mode("onf"));
        assert_eq!(reg.state(), RegState::Init);

        let (reg, _log) = regulator();
        let mut reg = reg.with_direction(Direction::Cooling);
        reg.enable();
        reg.tick(&mut source);
        assert!(reg.set_mode("onf"));
        assert_eq!(reg.state(), RegState::Busy);
    }

    #[test]
    fn direction_change_reinitialises_busy() {
        let (mut reg, _log) = regulator();
        reg.enable();
        let mut source = || Sample::ok(1.0, ts(0));
        reg.tick(&mut source);
        assert!(reg.set_direction("cooler"));
        assert_eq!(reg.direction(), Direction::Cooling);
        assert_eq!(reg.state(), RegState::Init);
    }

    #[test]
    fn delta_change_reinitialises_heating_onf_only() {
        let mut source = || Sample::ok(1.0, ts(0));

        let (reg, _log) = regulator();
        let mut reg = reg.with_mode(Mode::Onf);
        reg.enable();
        reg.tick(&mut source);
        assert!(reg.set_delta(3.0));
        assert_eq!(reg.state(), RegState::Init);

        let (reg, _log) = regulator();
        let mut reg = reg.with_mode(Mode::Onf).with_direction(Direction::Cooling);
        reg.enable();
        reg.tick(&mut source);
        assert!(reg.set_delta(3.0));
        assert_eq!(reg.state(), RegState::Busy);

        assert!(!reg.set_delta(-1.0));
        assert_eq!(reg.delta(), 3.0);
    }

    #[test]
    fn onf_output_follows_prior_sub_state() {
        let (reg, log) = regulator();
        let mut reg = reg.with_mode(Mode::Onf).with_goal(50.0).with_delta(2.0);
        reg.enable();
        let mut values = vec![40.0, 45.0, 60.0, 55.0].into_iter();
        let mut source = move || Sample::ok(values.next().unwrap_or(50.0), ts(0));

        reg.tick(&mut source); // INIT -> off, WAITING
        reg.tick(&mut source); // 40 < 48: WAITING output, now ACTING
        assert_eq!(reg.onf_state(), OnfState::Acting);
        reg.tick(&mut source); // 45: ACTING output
        reg.tick(&mut source); // 60 > 52: ACTING output, now WAITING
        assert_eq!(reg.onf_state(), OnfState::Waiting);
        reg.tick(&mut source); // 55: WAITING output

        assert_eq!(log.commands(), vec![0.0, 0.0, 100.0, 100.0, 0.0]);
    }

    #[test]
    fn failures_escalate_to_safety_reset() {
        let (reg, log) = regulator();
        let mut reg = reg.with_failure_threshold(2).with_goal(60.0);
        reg.enable();
        let mut ok = || Sample::ok(55.0, ts(0));
        reg.tick(&mut ok);
        reg.tick(&mut ok);
        assert!(log.last().unwrap() > 0.0);

        let mut bad = || Sample::failed(0.0, ts(1));
        reg.tick(&mut bad);
        assert_eq!(reg.failure_count(), 1);
        reg.tick(&mut bad);
        assert_eq!(reg.failure_count(), 2);
        assert_eq!(reg.state(), RegState::Busy);

        reg.tick(&mut bad);
        assert_eq!(reg.state(), RegState::Init);
        assert_eq!(reg.failure_count(), 0);
        assert_eq!(log.last(), Some(0.0));
        assert_eq!(reg.actuator().output(), 0.0);
    }

    #[test]
    fn success_clears_failure_count() {
        let (mut reg, _log) = regulator();
        reg.enable();
        let mut ok = || Sample::ok(55.0, ts(0));
        let mut bad = || Sample::failed(0.0, ts(1));
        reg.tick(&mut ok);
        reg.tick(&mut bad);
        reg.tick(&mut bad);
        assert_eq!(reg.failure_count(), 2);
        reg.tick(&mut ok);
        assert_eq!(reg.failure_count(), 0);
    }

    #[test]
    fn failed_sample_leaves_last_command_in_place() {
        let (reg, log) = regulator();
        let mut reg = reg.with_goal(60.0);
        reg.enable();
        let mut ok = || Sample::ok(55.0, ts(0));
        reg.tick(&mut ok);
        reg.tick(&mut ok);
        let sent = log.len();
        let mut bad = || Sample::failed(0.0, ts(1));
        reg.tick(&mut bad);
        assert_eq!(log.len(), sent);
    }

    #[test]
    fn restore_unknown_state_forces_off() {
        let (mut reg, _log) = regulator();
        reg.restore_state("BUSY");
        assert_eq!(reg.state(), RegState::Busy);
        reg.restore_state("WEIRD");
        assert_eq!(reg.state(), RegState::Off);
    }

    #[test]
    fn validate_flags_bad_configuration() {
        let (reg, _log) = regulator();
        assert!(reg.validate());

        let (reg, _log) = regulator();
        let reg = reg.with_delta(-1.0);
        assert!(!reg.validate());

        let (reg, _log) = regulator();
        let reg = reg.with_gains(PidGains::new(f64::NAN, 0.0, 0.0));
        assert!(!reg.validate());
    }

    #[test]
    fn snapshot_reports_configuration() {
        let (reg, _log) = regulator();
        let reg = reg.with_goal(21.5).with_mode(Mode::Onf);
        let snap = reg.snapshot();
        assert_eq!(snap.goal, 21.5);
        assert_eq!(snap.mode, Mode::Onf);
        assert_eq!(snap.state, RegState::Off);
        assert!(!snap.enabled);
        assert_eq!(snap.output_max, 100.0);
    }
}
