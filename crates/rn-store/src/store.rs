//! Bounded time-series store.

use std::sync::{Mutex, MutexGuard};

use rn_controls::Sample;
use rn_core::ChannelId;
use tracing::debug;

use crate::backend::{MemoryBackend, SampleBackend};
use crate::jsonl::JsonlBackend;
use crate::types::StoredRow;
use crate::{StoreError, StoreResult};

/// What `append` did with the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new row was added.
    Inserted,
    /// The channel was full and its oldest row was overwritten.
    Evicted,
}

/// Store shared by every channel of a node.
///
/// One guard covers the backend, so the count-then-insert-or-update sequence
/// of an append is atomic with respect to every other store operation.
pub struct SampleStore {
    backend: Mutex<Box<dyn SampleBackend>>,
}

impl SampleStore {
    pub fn new(backend: impl SampleBackend + 'static) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn open_jsonl(path: impl Into<std::path::PathBuf>) -> StoreResult<Self> {
        Ok(Self::new(JsonlBackend::open(path)?))
    }

    fn guard(&self) -> StoreResult<MutexGuard<'_, Box<dyn SampleBackend>>> {
        self.backend.lock().map_err(|_| StoreError::GuardPoisoned)
    }

    /// Keep `sample` for `channel_id`, holding at most `capacity` rows.
    ///
    /// When the channel is full the row with the smallest timestamp is
    /// overwritten in place. A channel holding more than `capacity` rows,
    /// for instance after the capacity was lowered, is first trimmed from
    /// the oldest end.
    pub fn append(
        &self,
        channel_id: ChannelId,
        sample: &Sample,
        capacity: usize,
    ) -> StoreResult<AppendOutcome> {
        if capacity == 0 {
            return Err(StoreError::ZeroCapacity {
                channel_id: channel_id.get(),
            });
        }
        let row = StoredRow::from_sample(channel_id, sample);
        let mut backend = self.guard()?;
        let count = backend.count(channel_id)?;
        if count < capacity {
            backend.insert(row)?;
            debug!(channel = %channel_id, count = count + 1, "sample inserted");
            Ok(AppendOutcome::Inserted)
        } else {
            if count > capacity {
                let trimmed = backend.delete_oldest(channel_id, count - capacity)?;
                debug!(channel = %channel_id, trimmed, capacity, "over-capacity rows dropped");
            }
            backend.update_oldest(row)?;
            debug!(channel = %channel_id, count = capacity, "oldest sample overwritten");
            Ok(AppendOutcome::Evicted)
        }
    }

    /// Drop every row for `channel_id`.
    pub fn clear(&self, channel_id: ChannelId) -> StoreResult<usize> {
        let mut backend = self.guard()?;
        backend.delete(channel_id)
    }

    /// Retained rows for `channel_id`, oldest first.
    pub fn rows(&self, channel_id: ChannelId) -> StoreResult<Vec<StoredRow>> {
        self.guard()?.rows(channel_id)
    }

    pub fn count(&self, channel_id: ChannelId) -> StoreResult<usize> {
        self.guard()?.count(channel_id)
    }

    pub fn describe(&self) -> String {
        match self.guard() {
            Ok(backend) => backend.describe(),
            Err(_) => "unavailable".to_string(),
        }
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("backend", &self.describe())
            .finish()
    }
}
