//! Driving session lifecycle.
//!
//! A session is the span of data collection between two resets, identified
//! by its start time. Reports only look at rows recorded since that start.

use crate::storage::SampleStore;
use chrono::{DateTime, Utc};

/// Start time and active flag of the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    start_time: Option<DateTime<Utc>>,
    active: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session now if none is active; return its start time.
    pub fn ensure_active(&mut self) -> DateTime<Utc> {
        self.ensure_active_at(Utc::now())
    }

    /// As [`ensure_active`](Self::ensure_active) with an explicit clock reading.
    pub fn ensure_active_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.start_time {
            Some(start) if self.active => start,
            _ => {
                self.start_time = Some(now);
                self.active = true;
                tracing::info!(start_time = %now.to_rfc3339(), "Driving session started");
                now
            }
        }
    }

    /// Clear the driving log and restart the session clock now.
    pub fn reset(&mut self, store: &dyn SampleStore) -> DateTime<Utc> {
        self.reset_at(store, Utc::now())
    }

    /// As [`reset`](Self::reset) with an explicit clock reading.
    ///
    /// A store that fails to clear is logged; the session restarts anyway.
    pub fn reset_at(&mut self, store: &dyn SampleStore, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Err(e) = store.clear() {
            tracing::error!(error = %e, "Failed to clear driving log");
        }
        self.start_time = Some(now);
        self.active = true;
        tracing::info!(start_time = %now.to_rfc3339(), "Driving session reset");
        now
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Session start in epoch milliseconds, for comparison with sample stamps.
    pub fn start_millis(&self) -> Option<i64> {
        self.start_time.map(|t| t.timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::telemetry::{ClassifiedSample, RiskLevel, Sample};
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_ensure_active_is_idempotent() {
        let mut session = SessionState::new();
        assert!(!session.is_active());
        assert_eq!(session.start_time(), None);

        let first = session.ensure_active_at(at(0));
        let second = session.ensure_active_at(at(30));

        assert!(session.is_active());
        assert_eq!(first, at(0));
        assert_eq!(second, at(0));
        assert_eq!(session.start_millis(), Some(at(0).timestamp_millis()));
    }

    #[test]
    fn test_reset_clears_log_and_restarts_clock() {
        let store = MemoryStore::new();
        store
            .append(&ClassifiedSample {
                sample: Sample {
                    timestamp: 1,
                    acc_x: 0.0,
                    acc_y: 0.0,
                    acc_z: 0.0,
                    gyro_x: 0.0,
                    gyro_y: 0.0,
                    gyro_z: 0.0,
                    speed: 0.0,
                },
                predicted_class: 0,
                risk_level: RiskLevel::Collecting,
            })
            .unwrap();

        let mut session = SessionState::new();
        session.ensure_active_at(at(0));
        let restarted = session.reset_at(&store, at(0) + Duration::minutes(5));

        assert_eq!(restarted, at(300));
        assert_eq!(session.start_time(), Some(at(300)));
        assert!(session.is_active());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_reset_without_prior_session() {
        let store = MemoryStore::new();
        let mut session = SessionState::new();
        let start = session.reset_at(&store, at(10));

        assert!(session.is_active());
        assert_eq!(session.ensure_active_at(at(20)), start);
    }
}
