//! JSON-lines file backend.
//!
//! The whole row set is kept in memory and the file is rewritten after every
//! mutation, one row per line. Suitable for the small capacities a node keeps
//! per channel.

use std::fs;
use std::path::{Path, PathBuf};

use rn_core::ChannelId;

use crate::{StoreError, StoreResult};
use crate::backend::{SampleBackend, channel_rows, oldest_index, remove_oldest};
use crate::types::StoredRow;

#[derive(Debug, Clone)]
pub struct JsonlBackend {
    path: PathBuf,
    rows: Vec<StoredRow>,
}

impl JsonlBackend {
    /// Open `path`, loading any rows already there. The file and its parent
    /// directory are created on first write.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let rows = if path.exists() {
            Self::load(&path)?
        } else {
            Vec::new()
        };
        Ok(Self { path, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row from a JSON-lines file.
    pub fn load(path: &Path) -> StoreResult<Vec<StoredRow>> {
        let content = fs::read_to_string(path)?;
        let mut rows = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: StoredRow = serde_json::from_str(line).map_err(|e| StoreError::Backend {
                what: format!("{} line {}: {e}", path.display(), n + 1),
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn flush(&self) -> StoreResult<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir)?;
        }
        let mut content = String::new();
        for row in &self.rows {
            let line = serde_json::to_string(row)?;
            content.push_str(&line);
            content.push('\n');
        }
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SampleBackend for JsonlBackend {
    fn count(&self, channel_id: ChannelId) -> StoreResult<usize> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.channel_id == channel_id)
            .count())
    }

    fn insert(&mut self, row: StoredRow) -> StoreResult<()> {
        self.rows.push(row);
        if let Err(err) = self.flush() {
            self.rows.pop();
            return Err(err);
        }
        Ok(())
    }

    fn update_oldest(&mut self, row: StoredRow) -> StoreResult<()> {
        let Some(i) = oldest_index(&self.rows, row.channel_id) else {
            return Ok(());
        };
        let previous = std::mem::replace(&mut self.rows[i], row);
        if let Err(err) = self.flush() {
            self.rows[i] = previous;
            return Err(err);
        }
        Ok(())
    }

    fn delete_oldest(&mut self, channel_id: ChannelId, n: usize) -> StoreResult<usize> {
        let previous = self.rows.clone();
        let removed = remove_oldest(&mut self.rows, channel_id, n);
        if removed == 0 {
            return Ok(0);
        }
        if let Err(err) = self.flush() {
            self.rows = previous;
            return Err(err);
        }
        Ok(removed)
    }

    fn delete(&mut self, channel_id: ChannelId) -> StoreResult<usize> {
        let kept: Vec<StoredRow> = self
            .rows
            .iter()
            .filter(|r| r.channel_id != channel_id)
            .copied()
            .collect();
        let removed = self.rows.len() - kept.len();
        let previous = std::mem::replace(&mut self.rows, kept);
        if let Err(err) = self.flush() {
            self.rows = previous;
            return Err(err);
        }
        Ok(removed)
    }

    fn rows(&self, channel_id: ChannelId) -> StoreResult<Vec<StoredRow>> {
        Ok(channel_rows(&self.rows, channel_id))
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.path.display())
    }
}
