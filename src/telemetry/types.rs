//! Sample types for the inertial telemetry stream.
//!
//! A [`Sample`] is one reading from the vehicle: three accelerometer axes,
//! three gyroscope axes and the current speed, stamped with the client's
//! epoch-millisecond clock.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of inertial features per sample (3 accelerometer + 3 gyroscope axes).
pub const FEATURE_COUNT: usize = 6;

/// A validated sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Client-supplied timestamp (epoch milliseconds)
    pub timestamp: i64,
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    /// Vehicle speed in km/h (0 when the producer omits it)
    pub speed: f64,
}

impl Sample {
    /// Extract the ordered feature vector used as model input.
    pub fn features(&self) -> FeatureVector {
        FeatureVector([
            self.acc_x,
            self.acc_y,
            self.acc_z,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
        ])
    }
}

/// Ordered `(acc_x, acc_y, acc_z, gyro_x, gyro_y, gyro_z)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Driving-behavior label attached to every processed sample.
///
/// The serialized names are the labels shown on the dashboard and stored in
/// the driving log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Window not yet full, or no model loaded
    #[serde(rename = "Collecting Data")]
    Collecting,
    Aggressive,
    Normal,
    Slow,
    /// Model produced a class outside the known set
    #[serde(rename = "Invalid Class")]
    Invalid,
    /// Model inference failed
    Error,
}

impl RiskLevel {
    /// Map a 1-based model class id to its label.
    pub fn from_class(class: u32) -> Self {
        match class {
            1 => RiskLevel::Aggressive,
            2 => RiskLevel::Normal,
            3 => RiskLevel::Slow,
            _ => RiskLevel::Invalid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Collecting => "Collecting Data",
            RiskLevel::Aggressive => "Aggressive",
            RiskLevel::Normal => "Normal",
            RiskLevel::Slow => "Slow",
            RiskLevel::Invalid => "Invalid Class",
            RiskLevel::Error => "Error",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sample together with its classification. This is the persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSample {
    #[serde(flatten)]
    pub sample: Sample,
    /// 1-based model class, or 0 when no classification was made
    pub predicted_class: u32,
    pub risk_level: RiskLevel,
}

impl ClassifiedSample {
    pub fn timestamp(&self) -> i64 {
        self.sample.timestamp
    }
}
