//! Outbound messages produced by the pipeline and report commands.
//!
//! The pipeline never talks to clients directly. It returns these values and
//! the transport decides how to deliver them. On the wire every message is
//! `{"event": <name>, "data": {...}}`.

use crate::telemetry::{ClassifiedSample, RiskLevel};
use serde::{Deserialize, Serialize};

/// Raw inertial channels echoed back to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(rename = "AccX")]
    pub acc_x: f64,
    #[serde(rename = "AccY")]
    pub acc_y: f64,
    #[serde(rename = "AccZ")]
    pub acc_z: f64,
    #[serde(rename = "GyroX")]
    pub gyro_x: f64,
    #[serde(rename = "GyroY")]
    pub gyro_y: f64,
    #[serde(rename = "GyroZ")]
    pub gyro_z: f64,
}

/// Live classification update for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub timestamp: i64,
    pub speed: f64,
    pub class: u32,
    pub risk_level: RiskLevel,
    pub sensor_data: SensorData,
}

impl From<&ClassifiedSample> for UpdatePayload {
    fn from(row: &ClassifiedSample) -> Self {
        let s = &row.sample;
        Self {
            timestamp: s.timestamp,
            speed: s.speed,
            class: row.predicted_class,
            risk_level: row.risk_level,
            sensor_data: SensorData {
                acc_x: s.acc_x,
                acc_y: s.acc_y,
                acc_z: s.acc_z,
                gyro_x: s.gyro_x,
                gyro_y: s.gyro_y,
                gyro_z: s.gyro_z,
            },
        }
    }
}

/// A message for connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    ConnectionStatus { status: String },
    Update(UpdatePayload),
    RiskAlert { risk_level: RiskLevel },
    DrivingReport { report: String },
    SessionReset { status: String, start_time: String },
}

impl OutboundMessage {
    /// Wire event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundMessage::ConnectionStatus { .. } => "connection_status",
            OutboundMessage::Update(_) => "update",
            OutboundMessage::RiskAlert { .. } => "risk_alert",
            OutboundMessage::DrivingReport { .. } => "driving_report",
            OutboundMessage::SessionReset { .. } => "session_reset",
        }
    }

    pub fn connected() -> Self {
        OutboundMessage::ConnectionStatus {
            status: "connected".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
