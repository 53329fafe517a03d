//! Node configuration schema.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NodeResult;
use crate::validate::validate_config;

pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub version: u32,
    /// Control-loop tick in milliseconds.
    pub cadence_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    Jsonl {
        path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    pub id: u32,
    #[serde(default)]
    pub source: PlantConfig,
    pub prog: ProgConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulator: Option<RegulatorConfig>,
}

/// Sampling programme for one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgConfig {
    /// Sampling interval in milliseconds.
    pub period_ms: i64,
    /// Store capacity for this channel.
    pub max_rows: i64,
    /// Purge stored history on activation.
    #[serde(default)]
    pub clear: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Persisted lifecycle state to resume from, overrides `enabled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegulatorConfig {
    /// `pid` or `onf`.
    pub mode: String,
    /// `heater` or `cooler`.
    pub direction: String,
    pub goal: f64,
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integral_limit: Option<f64>,
    pub output_min: f64,
    pub output_max: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
}

/// Simulated first-order thermal plant standing in for a remote sensor and
/// execution mechanism.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantConfig {
    #[serde(default = "default_ambient")]
    pub ambient: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<f64>,
    /// Degrees per second per unit of actuator output. Negative for coolers.
    #[serde(default = "default_gain")]
    pub gain: f64,
    /// Heat-loss time constant in seconds.
    #[serde(default = "default_time_constant")]
    pub time_constant_s: f64,
    /// Simulated seconds that pass per sensor read.
    ///
    /// Time advances with reads, not ticks: on a regulated channel the
    /// regulator reads every tick and the scheduler reads again on each
    /// period boundary, so that plant runs ahead of a log-only one.
    #[serde(default = "default_step")]
    pub step_s: f64,
    /// Every n-th read fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_every: Option<u32>,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            ambient: default_ambient(),
            initial: None,
            gain: default_gain(),
            time_constant_s: default_time_constant(),
            step_s: default_step(),
            fail_every: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_failure_threshold() -> u32 {
    rn_controls::DEFAULT_FAILURE_THRESHOLD
}

fn default_ambient() -> f64 {
    20.0
}

fn default_gain() -> f64 {
    0.05
}

fn default_time_constant() -> f64 {
    120.0
}

fn default_step() -> f64 {
    1.0
}

pub fn from_yaml_str(content: &str) -> NodeResult<NodeConfig> {
    let config: NodeConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_yaml(path: &Path) -> NodeResult<NodeConfig> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}

pub fn save_yaml(path: &Path, config: &NodeConfig) -> NodeResult<()> {
    validate_config(config)?;
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
