//! rn-store: bounded, oldest-evicted sample storage.

pub mod backend;
pub mod jsonl;
pub mod store;
pub mod types;

pub use backend::{MemoryBackend, SampleBackend};
pub use jsonl::JsonlBackend;
pub use store::{AppendOutcome, SampleStore};
pub use types::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend error: {what}")]
    Backend { what: String },

    #[error("Store guard poisoned")]
    GuardPoisoned,

    #[error("Capacity must be positive for channel {channel_id}")]
    ZeroCapacity { channel_id: u32 },
}
