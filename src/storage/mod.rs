//! Persistence for classified samples.
//!
//! The driving log is append-only: rows are written once per processed
//! sample and only ever removed all at once when a session is reset.

pub mod jsonl;
pub mod memory;

use crate::telemetry::ClassifiedSample;
use std::sync::Arc;
use thiserror::Error;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Errors raised by a sample store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Append-only storage of classified samples, queryable by time.
pub trait SampleStore: Send + Sync {
    /// Append one row.
    fn append(&self, row: &ClassifiedSample) -> Result<(), StoreError>;

    /// All rows with `timestamp >= since_ms`, oldest first.
    ///
    /// Rows sharing a timestamp keep their insertion order.
    fn since(&self, since_ms: i64) -> Result<Vec<ClassifiedSample>, StoreError>;

    /// The `limit` newest rows, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<ClassifiedSample>, StoreError>;

    /// Delete every row.
    fn clear(&self) -> Result<(), StoreError>;

    /// Number of stored rows.
    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Thread-safe shared store handle.
pub type SharedStore = Arc<dyn SampleStore>;

/// Filter and order rows the way every store answers a range query.
pub(crate) fn select_since(rows: &[ClassifiedSample], since_ms: i64) -> Vec<ClassifiedSample> {
    let mut selected: Vec<ClassifiedSample> = rows
        .iter()
        .filter(|row| row.timestamp() >= since_ms)
        .copied()
        .collect();
    selected.sort_by_key(|row| row.timestamp());
    selected
}

/// Newest-first selection for log inspection.
pub(crate) fn select_recent(rows: &[ClassifiedSample], limit: usize) -> Vec<ClassifiedSample> {
    let mut selected = rows.to_vec();
    selected.reverse();
    // Stable sort keeps later inserts first among equal timestamps.
    selected.sort_by_key(|row| std::cmp::Reverse(row.timestamp()));
    selected.truncate(limit);
    selected
}
