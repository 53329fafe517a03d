//! Error types for control operations.

use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while building or configuring control blocks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    Core(#[from] rn_core::CoreError),

    /// A textual token did not name any recognised variant.
    #[error("Unknown {what} token: {token:?}")]
    UnknownToken { what: &'static str, token: String },
}
