//! Error types for the node runtime.

use rn_core::ChannelId;

/// Node error type wrapping the lower crates' errors.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] crate::validate::ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] rn_store::StoreError),

    #[error("Control error: {0}")]
    Control(#[from] rn_controls::ControlError),

    #[error("Guard for channel {channel} unavailable")]
    GuardUnavailable { channel: ChannelId },

    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("Channel {0} has no regulator")]
    NoRegulator(ChannelId),

    #[error("Duplicate channel: {0}")]
    DuplicateChannel(ChannelId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
