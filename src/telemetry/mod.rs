//! Inbound telemetry for NeuroDrive.
//!
//! This module defines the sample data model and the validation applied to
//! every event a producer (simulator, phone, replay file) sends us.

pub mod types;
pub mod validation;

// Re-export commonly used types
pub use types::{ClassifiedSample, FeatureVector, RiskLevel, Sample, FEATURE_COUNT};
pub use validation::{parse_sample, DropReason, SENSOR_KEYS, SPEED_KEY, TIMESTAMP_KEY};
