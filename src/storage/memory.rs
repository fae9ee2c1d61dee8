//! In-memory sample store for tests and throwaway runs.

use crate::storage::{select_recent, select_since, SampleStore, StoreError};
use crate::telemetry::ClassifiedSample;
use std::sync::RwLock;

/// Volatile driving log held in a vector.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<ClassifiedSample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleStore for MemoryStore {
    fn append(&self, row: &ClassifiedSample) -> Result<(), StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(*row);
        Ok(())
    }

    fn since(&self, since_ms: i64) -> Result<Vec<ClassifiedSample>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(select_since(&rows, since_ms))
    }

    fn recent(&self, limit: usize) -> Result<Vec<ClassifiedSample>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(select_recent(&rows, limit))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.rows.write().map_err(|_| StoreError::Poisoned)?.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows.read().map_err(|_| StoreError::Poisoned)?.len())
    }
}
