//! Persistence backend contract and the in-memory backend.

use rn_core::ChannelId;

use crate::StoreResult;
use crate::types::StoredRow;

/// Row store keyed by `(channel_id, timestamp)`.
///
/// Implementations report failures through the result; they must not panic.
/// Callers serialise access, so methods take `&mut self` where they mutate.
pub trait SampleBackend: Send {
    /// Number of rows held for `channel_id`.
    fn count(&self, channel_id: ChannelId) -> StoreResult<usize>;

    /// Add a new row.
    fn insert(&mut self, row: StoredRow) -> StoreResult<()>;

    /// Overwrite the row with the smallest timestamp for `row.channel_id`.
    ///
    /// Does nothing when the channel has no rows.
    fn update_oldest(&mut self, row: StoredRow) -> StoreResult<()>;

    /// Remove up to `n` of the oldest rows for `channel_id`, returning how
    /// many were removed.
    fn delete_oldest(&mut self, channel_id: ChannelId, n: usize) -> StoreResult<usize>;

    /// Remove every row for `channel_id`, returning how many were removed.
    fn delete(&mut self, channel_id: ChannelId) -> StoreResult<usize>;

    /// Rows for `channel_id`, oldest first.
    fn rows(&self, channel_id: ChannelId) -> StoreResult<Vec<StoredRow>>;

    /// Short human-readable description for reports.
    fn describe(&self) -> String;
}

/// Index of the oldest row for `channel_id`, first one wins on ties.
pub(crate) fn oldest_index(rows: &[StoredRow], channel_id: ChannelId) -> Option<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, r)| r.channel_id == channel_id)
        .min_by_key(|(_, r)| r.timestamp)
        .map(|(i, _)| i)
}

/// Drop up to `n` of the oldest rows for `channel_id`.
pub(crate) fn remove_oldest(rows: &mut Vec<StoredRow>, channel_id: ChannelId, n: usize) -> usize {
    let mut removed = 0;
    while removed < n {
        let Some(i) = oldest_index(rows, channel_id) else {
            break;
        };
        rows.remove(i);
        removed += 1;
    }
    removed
}

pub(crate) fn channel_rows(rows: &[StoredRow], channel_id: ChannelId) -> Vec<StoredRow> {
    let mut out: Vec<StoredRow> = rows
        .iter()
        .filter(|r| r.channel_id == channel_id)
        .copied()
        .collect();
    out.sort_by_key(|r| r.timestamp);
    out
}

/// Volatile backend; history is lost on restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    rows: Vec<StoredRow>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleBackend for MemoryBackend {
    fn count(&self, channel_id: ChannelId) -> StoreResult<usize> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.channel_id == channel_id)
            .count())
    }

    fn insert(&mut self, row: StoredRow) -> StoreResult<()> {
        self.rows.push(row);
        Ok(())
    }

    fn update_oldest(&mut self, row: StoredRow) -> StoreResult<()> {
        if let Some(i) = oldest_index(&self.rows, row.channel_id) {
            self.rows[i] = row;
        }
        Ok(())
    }

    fn delete_oldest(&mut self, channel_id: ChannelId, n: usize) -> StoreResult<usize> {
        Ok(remove_oldest(&mut self.rows, channel_id, n))
    }

    fn delete(&mut self, channel_id: ChannelId) -> StoreResult<usize> {
        let before = self.rows.len();
        self.rows.retain(|r| r.channel_id != channel_id);
        Ok(before - self.rows.len())
    }

    fn rows(&self, channel_id: ChannelId) -> StoreResult<Vec<StoredRow>> {
        Ok(channel_rows(&self.rows, channel_id))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
