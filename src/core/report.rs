//! Session driving report.
//!
//! Reads every row recorded since the session started, attributes each row
//! the time elapsed since the previous row, and summarizes speed, time spent
//! per behavior and a safety score.

use crate::storage::{SharedStore, StoreError};
use crate::telemetry::{ClassifiedSample, RiskLevel};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use thiserror::Error;

/// Driver name used when the request does not name one.
pub const DEFAULT_DRIVER_NAME: &str = "Osmi";

/// Report text when the session has fewer than two rows.
pub const NOT_ENOUGH_DATA: &str = "Not enough driving data recorded for a report.";

/// Format for session start/end in the report body.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised while building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("timestamp {0} is out of range")]
    Timestamp(i64),
}

/// Time spent in one behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDuration {
    pub risk_level: RiskLevel,
    pub seconds: f64,
    /// Share of the summed behavior time, 0-100
    pub percentage: f64,
}

/// Aggregates for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_secs: f64,
    pub avg_speed: f64,
    pub max_speed: f64,
    /// Ordered by label text
    pub behaviors: Vec<BehaviorDuration>,
    pub safety_score: f64,
}

impl ReportStatistics {
    /// Seconds attributed to `risk_level`, 0 if it never occurred.
    pub fn seconds_in(&self, risk_level: RiskLevel) -> f64 {
        self.behaviors
            .iter()
            .find(|b| b.risk_level == risk_level)
            .map(|b| b.seconds)
            .unwrap_or(0.0)
    }
}

/// Safety score penalizing the share of session time spent driving aggressively.
///
/// `100 - aggressive/total * 100`, floored at 0; a zero-length session scores 100.
pub fn safety_score(aggressive_secs: f64, total_secs: f64) -> f64 {
    if total_secs > 0.0 {
        (100.0 - aggressive_secs / total_secs * 100.0).max(0.0)
    } else {
        100.0
    }
}

/// Compute statistics from rows sorted by timestamp.
///
/// Returns `None` when there are fewer than two rows.
pub fn compute_statistics(rows: &[ClassifiedSample]) -> Option<ReportStatistics> {
    let (first, last) = match rows {
        [first, .., last] => (first, last),
        _ => return None,
    };

    // Each row owns the gap since its predecessor; the first row owns nothing.
    let mut per_label: BTreeMap<&'static str, (RiskLevel, f64)> = BTreeMap::new();
    let mut previous = first.timestamp();
    for row in rows {
        let seconds = elapsed_secs(previous, row.timestamp());
        previous = row.timestamp();
        per_label
            .entry(row.risk_level.as_str())
            .or_insert((row.risk_level, 0.0))
            .1 += seconds;
    }

    let total_behavior_secs: f64 = per_label.values().map(|(_, secs)| secs).sum();
    let behaviors: Vec<BehaviorDuration> = per_label
        .into_values()
        .map(|(risk_level, seconds)| BehaviorDuration {
            risk_level,
            seconds,
            percentage: if total_behavior_secs > 0.0 {
                seconds / total_behavior_secs * 100.0
            } else {
                0.0
            },
        })
        .collect();

    let speeds: Vec<f64> = rows.iter().map(|row| row.sample.speed).collect();
    let duration_secs = elapsed_secs(first.timestamp(), last.timestamp());

    let mut stats = ReportStatistics {
        start_ms: first.timestamp(),
        end_ms: last.timestamp(),
        duration_secs,
        avg_speed: Statistics::mean(&speeds),
        max_speed: Statistics::max(&speeds),
        behaviors,
        safety_score: 100.0,
    };
    stats.safety_score = safety_score(stats.seconds_in(RiskLevel::Aggressive), duration_secs);
    Some(stats)
}

/// Seconds between two epoch-millisecond stamps.
///
/// Computed in f64 so producer clocks anywhere in the i64 range cannot overflow.
fn elapsed_secs(from_ms: i64, to_ms: i64) -> f64 {
    (to_ms as f64 - from_ms as f64) / 1000.0
}

/// Render statistics as the fixed-layout report text.
pub fn render_report(
    stats: &ReportStatistics,
    driver_name: &str,
    timezone: Tz,
) -> Result<String, ReportError> {
    let mut lines = vec![
        "=== DRIVING BEHAVIOR ANALYSIS REPORT ===".to_string(),
        format!("\nDriver: {driver_name}"),
        format!("Session Start: {}", format_millis(stats.start_ms, timezone)?),
        format!("Session End: {}", format_millis(stats.end_ms, timezone)?),
        format!("Duration: {:.2} seconds", stats.duration_secs),
        "\n--- Speed Statistics ---".to_string(),
        format!("Average Speed: {:.2} km/h", stats.avg_speed),
        format!("Maximum Speed: {:.2} km/h", stats.max_speed),
        "\n--- Behavior Summary ---".to_string(),
    ];

    for behavior in &stats.behaviors {
        lines.push(format!(
            "{}: {:.2}s ({:.1}%)",
            behavior.risk_level, behavior.seconds, behavior.percentage
        ));
    }

    lines.extend([
        "\n--- Safety Evaluation ---".to_string(),
        format!("Safety Score: {:.1}/100", stats.safety_score),
        "\n=== END OF REPORT ===".to_string(),
    ]);

    Ok(lines.join("\n"))
}

fn format_millis(ms: i64, timezone: Tz) -> Result<String, ReportError> {
    let utc = Utc
        .timestamp_millis_opt(ms)
        .single()
        .ok_or(ReportError::Timestamp(ms))?;
    Ok(utc.with_timezone(&timezone).format(TIMESTAMP_FORMAT).to_string())
}

/// Builds session reports from the driving log.
#[derive(Clone)]
pub struct ReportGenerator {
    store: SharedStore,
    timezone: Tz,
}

impl ReportGenerator {
    pub fn new(store: SharedStore, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Report for the session that started at `session_start`.
    ///
    /// Never fails: problems are described in the returned text.
    pub fn generate(&self, session_start: DateTime<Utc>, driver_name: &str) -> String {
        self.generate_since(session_start.timestamp_millis(), driver_name)
    }

    /// Report over every row with `timestamp >= since_ms`.
    pub fn generate_since(&self, since_ms: i64, driver_name: &str) -> String {
        tracing::info!(driver = driver_name, since_ms, "Generating driving report");
        match self.try_generate_since(since_ms, driver_name) {
            Ok(report) => report,
            Err(e) => {
                let message = format!("Error generating report: {e}");
                tracing::error!("{message}");
                message
            }
        }
    }

    /// Fallible form of [`generate_since`](Self::generate_since).
    pub fn try_generate_since(&self, since_ms: i64, driver_name: &str) -> Result<String, ReportError> {
        let rows = self.store.since(since_ms)?;
        match compute_statistics(&rows) {
            Some(stats) => render_report(&stats, driver_name, self.timezone),
            None => Ok(NOT_ENOUGH_DATA.to_string()),
        }
    }

    /// Statistics without rendering.
    pub fn statistics_since(&self, since_ms: i64) -> Result<Option<ReportStatistics>, ReportError> {
        Ok(compute_statistics(&self.store.since(since_ms)?))
    }
}

impl std::fmt::Debug for ReportGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportGenerator")
            .field("timezone", &self.timezone)
            .finish()
    }
}
