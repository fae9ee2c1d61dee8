//! Pipeline transparency log.
//!
//! Counts what the pipeline has done with the data it received: how many
//! samples arrived, how many were dropped or classified, how often the
//! driving log could not be written, and how many reports were produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Processing counters for the running process.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Sample events received (valid or not)
    samples_received: AtomicU64,
    /// Sample events dropped by validation
    samples_dropped: AtomicU64,
    /// Samples that received a model classification
    samples_classified: AtomicU64,
    /// Rows that could not be written to the driving log
    persist_failures: AtomicU64,
    /// Reports generated
    reports_generated: AtomicU64,
    /// Session resets
    session_resets: AtomicU64,
    /// When this process started counting
    started_at: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            samples_received: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            samples_classified: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            reports_generated: AtomicU64::new(0),
            session_resets: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that continues from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "Could not load previous pipeline stats");
        }

        log
    }

    pub fn record_sample_received(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_classified(&self) {
        self.samples_classified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report_generated(&self) {
        self.reports_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_reset(&self) {
        self.session_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            samples_classified: self.samples_classified.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            reports_generated: self.reports_generated.load(Ordering::Relaxed),
            session_resets: self.session_resets.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Pipeline Statistics:\n\
             - Samples received: {}\n\
             - Samples dropped: {}\n\
             - Samples classified: {}\n\
             - Storage failures: {}\n\
             - Reports generated: {}\n\
             - Session resets: {}\n\
             - Uptime: {} seconds",
            stats.samples_received,
            stats.samples_dropped,
            stats.samples_classified,
            stats.persist_failures,
            stats.reports_generated,
            stats.session_resets,
            stats.uptime_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_received: stats.samples_received,
                samples_dropped: stats.samples_dropped,
                samples_classified: stats.samples_classified,
                persist_failures: stats.persist_failures,
                reports_generated: stats.reports_generated,
                session_resets: stats.session_resets,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_received
                    .store(persisted.samples_received, Ordering::Relaxed);
                self.samples_dropped
                    .store(persisted.samples_dropped, Ordering::Relaxed);
                self.samples_classified
                    .store(persisted.samples_classified, Ordering::Relaxed);
                self.persist_failures
                    .store(persisted.persist_failures, Ordering::Relaxed);
                self.reports_generated
                    .store(persisted.reports_generated, Ordering::Relaxed);
                self.session_resets
                    .store(persisted.session_resets, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub samples_received: u64,
    pub samples_dropped: u64,
    pub samples_classified: u64,
    pub persist_failures: u64,
    pub reports_generated: u64,
    pub session_resets: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_received: u64,
    samples_dropped: u64,
    samples_classified: u64,
    persist_failures: u64,
    reports_generated: u64,
    session_resets: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
