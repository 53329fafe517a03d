//! Addressable channel: sample source, scheduler and optional regulator
//! behind one guard.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use rn_controls::{Regulator, RegulatorSnapshot, Sample, SampleSource};
use rn_core::ChannelId;
use rn_store::SampleStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{NodeError, NodeResult};
use crate::scheduler::{Prog, ProgSnapshot};

/// Guarded channel state.
pub struct ChannelInner {
    pub regulator: Option<Regulator>,
    pub scheduler: Prog,
    pub last_sample: Option<Sample>,
    source: Box<dyn SampleSource + Send>,
}

impl std::fmt::Debug for ChannelInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelInner")
            .field("regulator", &self.regulator)
            .field("scheduler", &self.scheduler)
            .field("last_sample", &self.last_sample)
            .finish_non_exhaustive()
    }
}

/// Remembers the most recent reading passed through it.
struct Recording<'a> {
    source: &'a mut (dyn SampleSource + Send),
    last: &'a mut Option<Sample>,
}

impl SampleSource for Recording<'_> {
    fn read(&mut self) -> Sample {
        let sample = self.source.read();
        *self.last = Some(sample);
        sample
    }
}

/// Read-only view of a channel for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub last_sample: Option<Sample>,
    pub prog: ProgSnapshot,
    /// `None` for log-only channels.
    pub regulator_enabled: Option<bool>,
    pub regulator: Option<RegulatorSnapshot>,
}

#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    inner: Mutex<ChannelInner>,
}

impl Channel {
    pub fn new(
        id: ChannelId,
        scheduler: Prog,
        source: impl SampleSource + Send + 'static,
        regulator: Option<Regulator>,
    ) -> Self {
        Self {
            id,
            inner: Mutex::new(ChannelInner {
                regulator,
                scheduler,
                last_sample: None,
                source: Box::new(source),
            }),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    fn guard(&self) -> NodeResult<MutexGuard<'_, ChannelInner>> {
        self.inner.lock().map_err(|_| {
            warn!(channel = %self.id, "channel guard poisoned, operation skipped");
            NodeError::GuardUnavailable { channel: self.id }
        })
    }

    /// Run `f` with the channel guard held.
    pub fn with<R>(&self, f: impl FnOnce(&mut ChannelInner) -> R) -> NodeResult<R> {
        let mut inner = self.guard()?;
        Ok(f(&mut inner))
    }

    /// Run `f` against the channel's regulator.
    ///
    /// # Errors
    ///
    /// [`NodeError::NoRegulator`] for log-only channels.
    pub fn with_regulator<R>(&self, f: impl FnOnce(&mut Regulator) -> R) -> NodeResult<R> {
        let mut inner = self.guard()?;
        match inner.regulator.as_mut() {
            Some(regulator) => Ok(f(regulator)),
            None => Err(NodeError::NoRegulator(self.id)),
        }
    }

    /// One control-loop slot: regulator tick, then scheduler tick.
    pub fn tick(&self, now: Instant, store: &SampleStore) -> NodeResult<()> {
        let mut inner = self.guard()?;
        let ChannelInner {
            regulator,
            scheduler,
            last_sample,
            source,
        } = &mut *inner;
        let mut recording = Recording {
            source: source.as_mut(),
            last: last_sample,
        };
        if let Some(regulator) = regulator.as_mut() {
            regulator.tick(&mut recording);
        }
        scheduler.tick(now, self.id, &mut recording, store);
        Ok(())
    }

    /// Enable the scheduler and, if present and valid, the regulator.
    pub fn enable(&self) -> NodeResult<()> {
        self.with(|inner| {
            inner.scheduler.enable();
            if let Some(regulator) = inner.regulator.as_mut() {
                regulator.enable_checked();
            }
        })
    }

    pub fn disable(&self) -> NodeResult<()> {
        self.with(|inner| {
            inner.scheduler.disable();
            if let Some(regulator) = inner.regulator.as_mut() {
                regulator.disable();
            }
        })
    }

    /// Force the actuator off now and stop sampling.
    pub fn shutdown(&self) -> NodeResult<()> {
        self.with(|inner| {
            if let Some(regulator) = inner.regulator.as_mut() {
                regulator.turn_off();
            }
            inner.scheduler.stop();
        })
    }

    pub fn snapshot(&self, now: Instant) -> NodeResult<ChannelSnapshot> {
        self.with(|inner| ChannelSnapshot {
            id: self.id,
            last_sample: inner.last_sample,
            prog: inner.scheduler.snapshot(now),
            regulator_enabled: inner.regulator.as_ref().map(Regulator::is_enabled),
            regulator: inner.regulator.as_ref().map(Regulator::snapshot),
        })
    }
}
