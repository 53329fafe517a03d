//! Periodic sampling programme for one channel.
//!
//! On every period boundary the programme reads the channel's source once
//! and, on success, hands the sample to the store. Failed reads are dropped
//! without accounting; the regulator owns failure handling.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use rn_controls::{ControlError, SampleSource};
use rn_core::{ChannelId, PeriodTimer};
use rn_store::SampleStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgState {
    Off,
    Init,
    Run,
    Disable,
    Failure,
}

impl ProgState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Init => "INIT",
            Self::Run => "RUN",
            Self::Disable => "DISABLE",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for ProgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgState {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFF" => Ok(Self::Off),
            "INIT" => Ok(Self::Init),
            "RUN" => Ok(Self::Run),
            "DISABLE" => Ok(Self::Disable),
            "FAILURE" => Ok(Self::Failure),
            other => Err(ControlError::UnknownToken {
                what: "prog state",
                token: other.to_string(),
            }),
        }
    }
}

/// Read-only view of a programme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgSnapshot {
    pub state: ProgState,
    pub enabled: bool,
    pub period_ms: u64,
    pub max_rows: usize,
    pub clear_on_start: bool,
    pub remaining_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Prog {
    state: ProgState,
    period: Duration,
    clear_on_start: bool,
    max_rows: usize,
    timer: PeriodTimer,
}

impl Prog {
    /// Create a stopped programme.
    pub fn new(period: Duration, max_rows: usize, clear_on_start: bool) -> Self {
        Self {
            state: ProgState::Off,
            period,
            clear_on_start,
            max_rows,
            timer: PeriodTimer::new(period),
        }
    }

    /// Advance by one tick.
    pub fn tick(
        &mut self,
        now: Instant,
        channel_id: ChannelId,
        source: &mut dyn SampleSource,
        store: &SampleStore,
    ) {
        match self.state {
            ProgState::Init => {
                self.timer.set_interval(self.period);
                self.timer.arm(now);
                if self.clear_on_start
                    && let Err(err) = store.clear(channel_id)
                {
                    warn!(channel = %channel_id, error = %err, "clearing stored samples failed");
                }
                self.state = ProgState::Run;
            }
            ProgState::Run => {
                if self.timer.fire(now) {
                    let sample = source.read();
                    if sample.is_ok()
                        && let Err(err) = store.append(channel_id, &sample, self.max_rows)
                    {
                        warn!(channel = %channel_id, error = %err, "saving sample failed");
                    }
                }
            }
            ProgState::Disable => {
                self.state = ProgState::Off;
            }
            ProgState::Off | ProgState::Failure => {}
        }
        debug!(
            channel = %channel_id,
            state = %self.state,
            remaining_ms = self.timer.remaining(now).as_millis() as u64,
            "prog tick"
        );
    }

    pub fn enable(&mut self) {
        self.state = ProgState::Init;
    }

    pub fn disable(&mut self) {
        self.state = ProgState::Disable;
    }

    /// Same as [`Prog::disable`].
    pub fn stop(&mut self) {
        self.state = ProgState::Disable;
    }

    /// `true` unless off or failed.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.state, ProgState::Off | ProgState::Failure)
    }

    /// Restore a lifecycle state by name. Unknown names put the programme in
    /// FAILURE.
    pub fn restore_state(&mut self, name: &str) {
        self.state = match name.parse::<ProgState>() {
            Ok(state) => state,
            Err(err) => {
                error!(error = %err, "unknown prog state, entering FAILURE");
                ProgState::Failure
            }
        };
    }

    pub fn state(&self) -> ProgState {
        self.state
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn clear_on_start(&self) -> bool {
        self.clear_on_start
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.timer.remaining(now)
    }

    pub fn snapshot(&self, now: Instant) -> ProgSnapshot {
        ProgSnapshot {
            state: self.state,
            enabled: self.is_enabled(),
            period_ms: self.period.as_millis() as u64,
            max_rows: self.max_rows,
            clear_on_start: self.clear_on_start,
            remaining_ms: self.remaining(now).as_millis() as u64,
        }
    }
}
