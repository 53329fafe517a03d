//! Simulated first-order thermal plant.
//!
//! Stands in for the remote sensor and actuator endpoints so a node can run
//! without hardware. Every sensor read, whoever makes it, advances simulated
//! time by one step using explicit Euler integration of
//!
//! ```text
//! dT/dt = gain * power - (T - ambient) / time_constant
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use rn_controls::{ActuatorEndpoint, Sample, SampleSource};

use crate::config::PlantConfig;

#[derive(Debug)]
struct PlantInner {
    params: PlantConfig,
    temperature: f64,
    power: f64,
    reads: u64,
    clock: DateTime<Utc>,
}

/// Shared plant handle. Clones observe the same plant.
#[derive(Debug, Clone)]
pub struct ThermalPlant {
    inner: Arc<Mutex<PlantInner>>,
}

impl ThermalPlant {
    pub fn new(params: PlantConfig) -> Self {
        Self::starting_at(params, Utc::now())
    }

    /// Create a plant whose simulated clock starts at `start`.
    pub fn starting_at(params: PlantConfig, start: DateTime<Utc>) -> Self {
        let temperature = params.initial.unwrap_or(params.ambient);
        Self {
            inner: Arc::new(Mutex::new(PlantInner {
                params,
                temperature,
                power: 0.0,
                reads: 0,
                clock: start,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlantInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn sensor(&self) -> PlantSensor {
        PlantSensor {
            plant: self.clone(),
        }
    }

    pub fn heater(&self) -> PlantDriver {
        PlantDriver {
            plant: self.clone(),
        }
    }

    pub fn temperature(&self) -> f64 {
        self.lock().temperature
    }

    pub fn power(&self) -> f64 {
        self.lock().power
    }

    pub fn reads(&self) -> u64 {
        self.lock().reads
    }

    fn read(&self) -> Sample {
        let mut inner = self.lock();
        let p = &inner.params;
        let dt = p.step_s;
        let dtemp = p.gain * inner.power - (inner.temperature - p.ambient) / p.time_constant_s;
        let fail_every = p.fail_every;
        inner.temperature += dtemp * dt;
        inner.clock += TimeDelta::microseconds((dt * 1e6) as i64);
        inner.reads += 1;

        let failed = fail_every.is_some_and(|n| n > 0 && inner.reads % u64::from(n) == 0);
        if failed {
            Sample::failed(inner.temperature, inner.clock)
        } else {
            Sample::ok(inner.temperature, inner.clock)
        }
    }
}

/// Sensor side of a [`ThermalPlant`].
#[derive(Debug, Clone)]
pub struct PlantSensor {
    plant: ThermalPlant,
}

impl SampleSource for PlantSensor {
    fn read(&mut self) -> Sample {
        self.plant.read()
    }
}

/// Heater side of a [`ThermalPlant`]. Commands set the applied power.
#[derive(Debug, Clone)]
pub struct PlantDriver {
    plant: ThermalPlant,
}

impl ActuatorEndpoint for PlantDriver {
    fn send(&mut self, output: f64) {
        self.plant.lock().power = output;
    }
}
