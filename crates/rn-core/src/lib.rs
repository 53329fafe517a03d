//! rn-core: shared foundation for the regulation node.
//!
//! Contains:
//! - ids (stable channel identity)
//! - numeric (Real + output clamping + finiteness check)
//! - timing (on-delay period timer)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;

pub use error::{CoreError, CoreResult};
pub use ids::ChannelId;
pub use numeric::*;
pub use timing::PeriodTimer;
