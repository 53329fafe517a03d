//! Regulation primitives for the process-control node.
//!
//! This crate holds everything that decides what an actuator is told to do:
//! the sample contract consumed from sensors, the clamped actuator driver,
//! the two control laws and the regulator state machine that arbitrates
//! between them.
//!
//! # Architecture
//!
//! - A [`SampleSource`] yields one timestamped [`Sample`] per read; failure is
//!   a normal return value, never a panic or an error.
//! - A [`ClampedActuator`] owns the remote endpoint and guarantees every
//!   command lies inside `[output_min, output_max]`.
//! - [`PidController`] and the hysteresis law in [`hysteresis`] compute raw
//!   outputs and never clamp.
//! - [`Regulator`] is stepped once per control-loop tick and owns the
//!   sensor-failure policy.

pub mod actuator;
pub mod controller;
pub mod error;
pub mod hysteresis;
pub mod regulator;
pub mod sampled;

pub use actuator::{ActuatorEndpoint, ClampedActuator, CommandLog};
pub use controller::{Direction, PidController, PidGains, PidState};
pub use error::{ControlError, ControlResult};
pub use hysteresis::OnfState;
pub use regulator::{DEFAULT_FAILURE_THRESHOLD, Mode, RegState, Regulator, RegulatorSnapshot};
pub use sampled::{Sample, SampleOutcome, SampleSource};
