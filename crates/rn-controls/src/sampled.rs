//! Sample contract between sensors and the control/logging paths.
//!
//! A source is polled once per use; it must always return. A failed read is
//! reported through [`SampleOutcome::Failed`] so callers can apply their own
//! failure accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one sensor read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SampleOutcome {
    Ok,
    Failed,
}

impl SampleOutcome {
    /// Numeric code used by the store rows (1 = success).
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 1,
            Self::Failed => 0,
        }
    }
}

/// A timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub outcome: SampleOutcome,
}

impl Sample {
    pub fn ok(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp,
            outcome: SampleOutcome::Ok,
        }
    }

    /// A failed read. The value is carried along but must not be trusted.
    pub fn failed(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp,
            outcome: SampleOutcome::Failed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == SampleOutcome::Ok
    }
}

/// Anything that can be polled for a reading.
pub trait SampleSource {
    fn read(&mut self) -> Sample;
}

impl<F> SampleSource for F
where
    F: FnMut() -> Sample,
{
    fn read(&mut self) -> Sample {
        self()
    }
}
