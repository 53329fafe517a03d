//! Node runtime: owns the channels and the shared store and drives them from
//! one control loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rn_controls::{ClampedActuator, Direction, Mode, PidGains, Regulator};
use rn_core::ChannelId;
use rn_store::SampleStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelSnapshot};
use crate::config::{ChannelConfig, NodeConfig, RegulatorConfig, StoreConfig};
use crate::error::{NodeError, NodeResult};
use crate::scheduler::Prog;
use crate::sim::ThermalPlant;
use crate::validate::validate_config;

/// Node-wide reporting view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub cadence_ms: u64,
    pub store: String,
    pub channels: Vec<ChannelSnapshot>,
}

#[derive(Debug)]
pub struct Node {
    channels: Vec<Channel>,
    store: Arc<SampleStore>,
    cadence: Duration,
}

impl Node {
    pub fn new(store: Arc<SampleStore>, cadence: Duration) -> Self {
        Self {
            channels: Vec::new(),
            store,
            cadence,
        }
    }

    /// Build a node with simulated plants from a validated configuration.
    pub fn from_config(config: &NodeConfig) -> NodeResult<Self> {
        validate_config(config)?;

        let store = match &config.store {
            StoreConfig::Memory => SampleStore::in_memory(),
            StoreConfig::Jsonl { path } => SampleStore::open_jsonl(path)?,
        };
        let mut node = Self::new(Arc::new(store), Duration::from_millis(config.cadence_ms));
        for channel in &config.channels {
            node.add_channel(build_channel(channel, config.failure_threshold)?)?;
        }
        info!(
            channels = node.channels.len(),
            store = %node.store.describe(),
            "node built"
        );
        Ok(node)
    }

    /// Append a channel. Insertion order is tick order.
    pub fn add_channel(&mut self, channel: Channel) -> NodeResult<()> {
        if self.channels.iter().any(|c| c.id() == channel.id()) {
            return Err(NodeError::DuplicateChannel(channel.id()));
        }
        self.channels.push(channel);
        Ok(())
    }

    pub fn channel(&self, id: ChannelId) -> NodeResult<&Channel> {
        self.channels
            .iter()
            .find(|c| c.id() == id)
            .ok_or(NodeError::ChannelNotFound(id))
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Tick every channel once, in order. Returns how many channels ran.
    pub fn tick(&self, now: Instant) -> usize {
        let mut ran = 0;
        for channel in &self.channels {
            match channel.tick(now, &self.store) {
                Ok(()) => ran += 1,
                Err(err) => {
                    warn!(channel = %channel.id(), error = %err, "channel tick skipped");
                }
            }
        }
        ran
    }

    /// Run `ticks` ticks back to back on a virtual clock that advances by the
    /// cadence each tick. Returns the clock after the last tick.
    pub fn run_for(&self, start: Instant, ticks: u64) -> Instant {
        let mut now = start;
        for _ in 0..ticks {
            self.tick(now);
            now += self.cadence;
        }
        now
    }

    /// Drive the node on its own thread at the configured cadence until
    /// `stop` is set.
    pub fn spawn_loop(self: &Arc<Self>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        std::thread::spawn(move || {
            debug!(cadence_ms = node.cadence.as_millis() as u64, "control loop started");
            while !stop.load(Ordering::Relaxed) {
                let started = Instant::now();
                node.tick(started);
                std::thread::sleep(node.cadence.saturating_sub(started.elapsed()));
            }
            debug!("control loop stopped");
        })
    }

    /// Turn every actuator off and stop every scheduler.
    pub fn shutdown(&self) {
        for channel in &self.channels {
            if let Err(err) = channel.shutdown() {
                warn!(channel = %channel.id(), error = %err, "channel shutdown skipped");
            }
        }
        info!("node shut down");
    }

    /// Snapshot of every reachable channel. Channels whose guard is
    /// unavailable are left out.
    pub fn snapshot(&self, now: Instant) -> NodeSnapshot {
        let channels = self
            .channels
            .iter()
            .filter_map(|c| match c.snapshot(now) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(channel = %c.id(), error = %err, "channel snapshot skipped");
                    None
                }
            })
            .collect();
        NodeSnapshot {
            cadence_ms: self.cadence.as_millis() as u64,
            store: self.store.describe(),
            channels,
        }
    }
}

fn build_channel(config: &ChannelConfig, default_threshold: u32) -> NodeResult<Channel> {
    let id = ChannelId::new(config.id);
    let plant = ThermalPlant::new(config.source.clone());

    let mut prog = Prog::new(
        Duration::from_millis(non_negative(config.prog.period_ms)),
        non_negative(config.prog.max_rows) as usize,
        config.prog.clear,
    );
    if config.prog.enabled {
        prog.enable();
    }
    if let Some(state) = &config.prog.initial_state {
        prog.restore_state(state);
    }

    let regulator = config
        .regulator
        .as_ref()
        .map(|r| build_regulator(r, &plant, default_threshold))
        .transpose()?;

    Ok(Channel::new(id, prog, plant.sensor(), regulator))
}

fn build_regulator(
    config: &RegulatorConfig,
    plant: &ThermalPlant,
    default_threshold: u32,
) -> NodeResult<Regulator> {
    let em = ClampedActuator::new(plant.heater(), config.output_min, config.output_max)?;
    let mode: Mode = config.mode.parse()?;
    let direction: Direction = config.direction.parse()?;
    let mut gains = PidGains::new(config.kp, config.ki, config.kd);
    if let Some(limit) = config.integral_limit {
        gains = gains.with_integral_limit(limit);
    }

    let mut regulator = Regulator::new(em)
        .with_mode(mode)
        .with_direction(direction)
        .with_goal(config.goal)
        .with_delta(config.delta)
        .with_gains(gains)
        .with_failure_threshold(config.failure_threshold.unwrap_or(default_threshold));
    if config.enabled {
        regulator.enable_checked();
    }
    if let Some(state) = &config.initial_state {
        regulator.restore_state(state);
    }
    Ok(regulator)
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
