//! Node runtime for the regulation node.
//!
//! Ties regulators, channel schedulers and the shared sample store into
//! addressable channels, drives them from one control loop, and exposes the
//! read/write surface the command protocol layer consumes.

pub mod channel;
pub mod config;
pub mod error;
pub mod node;
pub mod scheduler;
pub mod sim;
pub mod validate;

pub use channel::{Channel, ChannelInner, ChannelSnapshot};
pub use config::{
    ChannelConfig, NodeConfig, PlantConfig, ProgConfig, RegulatorConfig, StoreConfig,
    from_yaml_str, load_yaml, save_yaml,
};
pub use error::{NodeError, NodeResult};
pub use node::{Node, NodeSnapshot};
pub use scheduler::{Prog, ProgSnapshot, ProgState};
pub use sim::{PlantDriver, PlantSensor, ThermalPlant};
pub use validate::{ValidationError, validate_config};
