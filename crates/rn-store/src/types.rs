//! Stored row types.

use chrono::{DateTime, Utc};
use rn_controls::{Sample, SampleOutcome};
use rn_core::ChannelId;
use serde::{Deserialize, Serialize};

/// One retained sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub channel_id: ChannelId,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub outcome: SampleOutcome,
}

impl StoredRow {
    pub fn from_sample(channel_id: ChannelId, sample: &Sample) -> Self {
        Self {
            channel_id,
            timestamp: sample.timestamp,
            value: sample.value,
            outcome: sample.outcome,
        }
    }

    pub fn sample(&self) -> Sample {
        Sample {
            value: self.value,
            timestamp: self.timestamp,
            outcome: self.outcome,
        }
    }
}
