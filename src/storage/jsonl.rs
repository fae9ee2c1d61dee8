//! File-backed driving log in JSON Lines format.
//!
//! Each classified sample is appended as one JSON object per line. The file
//! is the durable record a report is computed from, so a reset truncates it.

use crate::storage::{select_recent, select_since, SampleStore, StoreError};
use crate::telemetry::ClassifiedSample;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only JSON Lines store.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    /// Serializes writers against truncation
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (or create) a log at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!(path = %path.display(), "Opened driving log");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Attach to a log only if it already exists. Creates nothing on disk.
    pub fn open_existing(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        path.is_file().then(|| Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row in file order. Lines that do not parse are skipped.
    fn read_all(&self) -> Result<Vec<ClassifiedSample>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ClassifiedSample>(&line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "Skipping unreadable driving log row");
                }
            }
        }
        Ok(rows)
    }
}

impl SampleStore for JsonlStore {
    fn append(&self, row: &ClassifiedSample) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(row)?;
        line.push('\n');

        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn since(&self, since_ms: i64) -> Result<Vec<ClassifiedSample>, StoreError> {
        Ok(select_since(&self.read_all()?, since_ms))
    }

    fn recent(&self, limit: usize) -> Result<Vec<ClassifiedSample>, StoreError> {
        Ok(select_recent(&self.read_all()?, limit))
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        File::create(&self.path)?;
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read_all()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{RiskLevel, Sample};

    fn test_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join("neurodrive-store-test")
            .join(format!("{name}-{}.jsonl", uuid::Uuid::new_v4()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn row(timestamp: i64, speed: f64, risk_level: RiskLevel) -> ClassifiedSample {
        ClassifiedSample {
            sample: Sample {
                timestamp,
                acc_x: 0.3,
                acc_y: -0.1,
                acc_z: 9.7,
                gyro_x: 0.02,
                gyro_y: 0.01,
                gyro_z: -0.4,
                speed,
            },
            predicted_class: 1,
            risk_level,
        }
    }

    #[test]
    fn test_rows_survive_reopen() {
        let path = test_path("reopen");
        {
            let store = JsonlStore::open(&path).unwrap();
            store.append(&row(1_000, 12.5, RiskLevel::Aggressive)).unwrap();
            store.append(&row(2_000, 48.0, RiskLevel::Slow)).unwrap();
        }

        let store = JsonlStore::open(&path).unwrap();
        let rows = store.since(0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], row(1_000, 12.5, RiskLevel::Aggressive));
        assert_eq!(rows[1].risk_level, RiskLevel::Slow);
        assert_eq!(rows[1].sample.speed, 48.0);
    }

    #[test]
    fn test_unreadable_lines_are_skipped() {
        let path = test_path("corrupt");
        let store = JsonlStore::open(&path).unwrap();
        store.append(&row(1_000, 10.0, RiskLevel::Normal)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{not json").unwrap();
        }
        store.append(&row(2_000, 20.0, RiskLevel::Normal)).unwrap();

        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_clear_truncates() {
        let path = test_path("clear");
        let store = JsonlStore::open(&path).unwrap();
        store.append(&row(1_000, 10.0, RiskLevel::Normal)).unwrap();

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());

        store.append(&row(5_000, 10.0, RiskLevel::Normal)).unwrap();
        assert_eq!(store.recent(10).unwrap().len(), 1);
    }

    #[test]
    fn test_open_existing_leaves_missing_log_alone() {
        let dir = std::env::temp_dir()
            .join("neurodrive-store-test")
            .join(format!("absent-{}", uuid::Uuid::new_v4()));
        let path = dir.join("driving_log.jsonl");

        assert!(JsonlStore::open_existing(&path).is_none());
        assert!(!dir.exists());

        let created = JsonlStore::open(&path).unwrap();
        created.append(&row(5_000, 33.0, RiskLevel::Normal)).unwrap();
        let existing = JsonlStore::open_existing(&path).unwrap();
        assert_eq!(existing.len().unwrap(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
