//! Node configuration validation.

use std::collections::HashSet;

use rn_controls::{Direction, Mode};

use crate::config::{ChannelConfig, LATEST_VERSION, NodeConfig, PlantConfig, ProgConfig, RegulatorConfig};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown token for {field}: {token:?}")]
    UnknownToken { field: String, token: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: String, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_config(config: &NodeConfig) -> Result<(), ValidationError> {
    if config.version == 0 || config.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }

    if config.cadence_ms == 0 {
        return Err(invalid("cadence_ms".to_string(), 0, "must be positive"));
    }

    let mut ids = HashSet::new();
    for channel in &config.channels {
        if !ids.insert(channel.id) {
            return Err(ValidationError::DuplicateId {
                id: channel.id.to_string(),
                context: "channels".to_string(),
            });
        }
        validate_channel(channel)?;
    }

    Ok(())
}

fn validate_channel(channel: &ChannelConfig) -> Result<(), ValidationError> {
    validate_prog(channel.id, &channel.prog)?;
    validate_plant(channel.id, &channel.source)?;
    if let Some(regulator) = &channel.regulator {
        validate_regulator(channel.id, regulator)?;
    }
    Ok(())
}

pub fn validate_prog(id: u32, prog: &ProgConfig) -> Result<(), ValidationError> {
    if prog.period_ms < 0 {
        return Err(invalid(
            format!("channel {id} prog.period_ms"),
            prog.period_ms,
            "negative interval",
        ));
    }
    if prog.max_rows < 0 {
        return Err(invalid(
            format!("channel {id} prog.max_rows"),
            prog.max_rows,
            "negative max_rows",
        ));
    }
    Ok(())
}

fn validate_plant(id: u32, plant: &PlantConfig) -> Result<(), ValidationError> {
    let finite = [
        ("ambient", plant.ambient),
        ("gain", plant.gain),
        ("time_constant_s", plant.time_constant_s),
        ("step_s", plant.step_s),
    ];
    for (name, value) in finite {
        if !value.is_finite() {
            return Err(invalid(format!("channel {id} source.{name}"), value, "must be finite"));
        }
    }
    if plant.time_constant_s <= 0.0 {
        return Err(invalid(
            format!("channel {id} source.time_constant_s"),
            plant.time_constant_s,
            "must be positive",
        ));
    }
    if plant.step_s < 0.0 {
        return Err(invalid(
            format!("channel {id} source.step_s"),
            plant.step_s,
            "must be non-negative",
        ));
    }
    if plant.fail_every == Some(0) {
        return Err(invalid(
            format!("channel {id} source.fail_every"),
            0,
            "must be positive when set",
        ));
    }
    Ok(())
}

fn validate_regulator(id: u32, reg: &RegulatorConfig) -> Result<(), ValidationError> {
    if reg.mode.parse::<Mode>().is_err() {
        return Err(ValidationError::UnknownToken {
            field: format!("channel {id} regulator.mode"),
            token: reg.mode.clone(),
        });
    }
    if reg.direction.parse::<Direction>().is_err() {
        return Err(ValidationError::UnknownToken {
            field: format!("channel {id} regulator.direction"),
            token: reg.direction.clone(),
        });
    }
    let finite = [
        ("goal", reg.goal),
        ("delta", reg.delta),
        ("kp", reg.kp),
        ("ki", reg.ki),
        ("kd", reg.kd),
        ("output_min", reg.output_min),
        ("output_max", reg.output_max),
    ];
    for (name, value) in finite {
        if !value.is_finite() {
            return Err(invalid(format!("channel {id} regulator.{name}"), value, "must be finite"));
        }
    }
    if reg.delta < 0.0 {
        return Err(invalid(
            format!("channel {id} regulator.delta"),
            reg.delta,
            "must be non-negative",
        ));
    }
    if reg.output_min > reg.output_max {
        return Err(invalid(
            format!("channel {id} regulator.output_min"),
            reg.output_min,
            "exceeds output_max",
        ));
    }
    Ok(())
}
