//! NeuroDrive - real-time driving behavior classification.
//!
//! This library turns a stream of inertial sensor samples from a driving
//! simulator into live behavior labels and end-of-session driving reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         NeuroDrive                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Validation  │──▶│  Windowing  │──▶│ Classifier  │       │
//! │  │ (telemetry) │   │ (5 samples) │   │   (model)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │Transparency │   │   Report    │◀──│ Driving Log │       │
//! │  │    Log      │   │(per session)│   │  (storage)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use neurodrive::{Classifier, MemoryStore, ProcessOutcome, StreamPipeline};
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut pipeline = StreamPipeline::new(5, Classifier::new(None), store);
//!
//! let event = serde_json::json!({
//!     "Timestamp": 1_700_000_000_000i64,
//!     "AccX": 0.1, "AccY": 0.0, "AccZ": 9.8,
//!     "GyroX": 0.0, "GyroY": 0.0, "GyroZ": 0.2,
//!     "speed": 42.0
//! });
//! if let ProcessOutcome::Processed(result) = pipeline.process(&event) {
//!     println!("{}", result.sample.risk_level);
//! }
//! ```

pub mod config;
pub mod core;
pub mod storage;
pub mod telemetry;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    Classification, Classifier, FeatureWindow, Model, OutboundMessage, ProcessOutcome,
    ReportGenerator, ReportStatistics, SessionState, StreamPipeline,
};
pub use storage::{JsonlStore, MemoryStore, SampleStore, SharedStore, StoreError};
pub use telemetry::{ClassifiedSample, DropReason, FeatureVector, RiskLevel, Sample};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
