//! Validation of inbound sample events.
//!
//! Producers send loosely-typed JSON objects keyed `Timestamp`, `AccX` ...
//! `GyroZ` and optionally `speed`. Anything that cannot be turned into a
//! [`Sample`] is dropped with a [`DropReason`].

use crate::telemetry::types::Sample;
use serde_json::{Map, Value};
use std::fmt;

/// Wire key for the sample timestamp.
pub const TIMESTAMP_KEY: &str = "Timestamp";

/// Wire keys for the six inertial channels, in feature order.
pub const SENSOR_KEYS: [&str; 6] = ["AccX", "AccY", "AccZ", "GyroX", "GyroY", "GyroZ"];

/// Wire key for the optional speed field.
pub const SPEED_KEY: &str = "speed";

/// Why an inbound event was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Event payload is not a JSON object
    NotAnObject,
    /// A required key is absent
    MissingField(&'static str),
    /// A required key is present but null
    NullField(&'static str),
    /// A required key holds something other than a number
    NonNumericField(&'static str),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NotAnObject => write!(f, "sample event is not an object"),
            DropReason::MissingField(key) => write!(f, "missing field '{key}'"),
            DropReason::NullField(key) => write!(f, "field '{key}' is null"),
            DropReason::NonNumericField(key) => write!(f, "field '{key}' is not numeric"),
        }
    }
}

/// Parse and validate a raw sample event.
///
/// Presence of every required key is checked before any value is inspected,
/// so a payload with both a missing and a null field reports the missing one.
pub fn parse_sample(raw: &Value) -> Result<Sample, DropReason> {
    let object = raw.as_object().ok_or(DropReason::NotAnObject)?;

    if let Some(missing) = std::iter::once(TIMESTAMP_KEY)
        .chain(SENSOR_KEYS)
        .find(|key| !object.contains_key(*key))
    {
        return Err(DropReason::MissingField(missing));
    }

    let mut channels = [0.0f64; 6];
    for (slot, key) in channels.iter_mut().zip(SENSOR_KEYS) {
        *slot = required_number(object, key)?;
    }
    let timestamp = required_timestamp(object)?;

    // Absent, null or garbage speed all fall back to standing still.
    let speed = object.get(SPEED_KEY).and_then(Value::as_f64).unwrap_or(0.0);

    Ok(Sample {
        timestamp,
        acc_x: channels[0],
        acc_y: channels[1],
        acc_z: channels[2],
        gyro_x: channels[3],
        gyro_y: channels[4],
        gyro_z: channels[5],
        speed,
    })
}

fn required_number(object: &Map<String, Value>, key: &'static str) -> Result<f64, DropReason> {
    match object.get(key) {
        None => Err(DropReason::MissingField(key)),
        Some(Value::Null) => Err(DropReason::NullField(key)),
        Some(value) => value.as_f64().ok_or(DropReason::NonNumericField(key)),
    }
}

fn required_timestamp(object: &Map<String, Value>) -> Result<i64, DropReason> {
    match object.get(TIMESTAMP_KEY) {
        None => Err(DropReason::MissingField(TIMESTAMP_KEY)),
        Some(Value::Null) => Err(DropReason::NullField(TIMESTAMP_KEY)),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|ms| ms as i64))
            .ok_or(DropReason::NonNumericField(TIMESTAMP_KEY)),
    }
}
