//! Transparency module for NeuroDrive.
//!
//! Tracks what the pipeline did with the telemetry it received so operators
//! can see drops and storage failures without reading logs.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
