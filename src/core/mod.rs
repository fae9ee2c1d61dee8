//! Core functionality for NeuroDrive.
//!
//! This module contains:
//! - The sliding feature window that shapes model input
//! - The model capability and the classifier built on it
//! - Session lifecycle and the streaming pipeline
//! - Session report computation and rendering

pub mod classifier;
pub mod messages;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod windowing;

// Re-export commonly used types
pub use classifier::{Classification, Classifier};
pub use messages::{OutboundMessage, SensorData, UpdatePayload};
pub use model::{load_model, LinearModel, Model, ModelError, ModelInput, SharedModel};
pub use pipeline::{PipelineResult, ProcessOutcome, SessionContext, StreamPipeline};
pub use report::{
    compute_statistics, render_report, safety_score, BehaviorDuration, ReportError,
    ReportGenerator, ReportStatistics, DEFAULT_DRIVER_NAME, NOT_ENOUGH_DATA,
};
pub use session::SessionState;
pub use windowing::{FeatureWindow, DEFAULT_SEQUENCE_LENGTH};
