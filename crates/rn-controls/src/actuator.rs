//! Clamped actuator driver.
//!
//! The driver is the only place output limits are enforced. Control laws may
//! request anything; what reaches the remote endpoint is always inside
//! `[output_min, output_max]`.

use std::sync::{Arc, Mutex};

use rn_core::{clamp_output, ensure_finite};

use crate::error::{ControlError, ControlResult};

/// Remote actuator endpoint. Fire-and-forget: no acknowledgement is expected.
pub trait ActuatorEndpoint {
    fn send(&mut self, output: f64);
}

impl<F> ActuatorEndpoint for F
where
    F: FnMut(f64),
{
    fn send(&mut self, output: f64) {
        self(output)
    }
}

/// Endpoint that records every command it receives.
///
/// Clones share the same log, so one clone can be handed to a driver while
/// another is kept to inspect what was sent.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    sent: Arc<Mutex<Vec<f64>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every command sent so far, oldest first.
    pub fn commands(&self) -> Vec<f64> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.commands().last().copied()
    }

    pub fn len(&self) -> usize {
        self.commands().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActuatorEndpoint for CommandLog {
    fn send(&mut self, output: f64) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(output),
            Err(poisoned) => poisoned.into_inner().push(output),
        }
    }
}

/// Output stage for one execution mechanism.
pub struct ClampedActuator {
    endpoint: Box<dyn ActuatorEndpoint + Send>,
    output_min: f64,
    output_max: f64,
    output: f64,
}

impl ClampedActuator {
    /// Create a driver with output range `[output_min, output_max]`.
    ///
    /// # Errors
    ///
    /// Returns error if either bound is not finite or `output_min > output_max`.
    pub fn new(
        endpoint: impl ActuatorEndpoint + Send + 'static,
        output_min: f64,
        output_max: f64,
    ) -> ControlResult<Self> {
        let output_min = ensure_finite(output_min, "output_min")?;
        let output_max = ensure_finite(output_max, "output_max")?;
        if output_min > output_max {
            return Err(ControlError::InvalidArg {
                what: "output_min must not exceed output_max",
            });
        }
        Ok(Self {
            endpoint: Box::new(endpoint),
            output_min,
            output_max,
            output: output_min,
        })
    }

    /// Clamp `output`, send it and record it. Returns the value actually sent.
    pub fn command(&mut self, output: f64) -> f64 {
        let output = clamp_output(output, self.output_min, self.output_max);
        self.endpoint.send(output);
        self.output = output;
        output
    }

    /// Send the safe resting value (`output_min`).
    pub fn off(&mut self) {
        let output = self.output_min;
        self.endpoint.send(output);
        self.output = output;
    }

    /// Last commanded value.
    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn output_min(&self) -> f64 {
        self.output_min
    }

    pub fn output_max(&self) -> f64 {
        self.output_max
    }
}

impl std::fmt::Debug for ClampedActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClampedActuator")
            .field("output_min", &self.output_min)
            .field("output_max", &self.output_max)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
