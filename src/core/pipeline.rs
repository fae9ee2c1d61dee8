//! Streaming classification pipeline.
//!
//! Each inbound sample event goes through:
//! 1. Session activation (lazy start on the first event)
//! 2. Validation (malformed events are dropped)
//! 3. Window update and classification
//! 4. Persistence of the classified row
//! 5. Emission of `update` and `risk_alert` messages
//!
//! All per-session mutable state lives in a [`SessionContext`] owned by the
//! pipeline, so callers that share a pipeline must serialize access to it.

use crate::core::classifier::{Classification, Classifier};
use crate::core::messages::{OutboundMessage, UpdatePayload};
use crate::core::session::SessionState;
use crate::core::windowing::FeatureWindow;
use crate::storage::SharedStore;
use crate::telemetry::{parse_sample, ClassifiedSample, DropReason, RiskLevel, Sample};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Mutable state scoped to one driving session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub window: FeatureWindow,
    pub session: SessionState,
}

impl SessionContext {
    pub fn new(sequence_length: usize) -> Self {
        Self {
            window: FeatureWindow::new(sequence_length),
            session: SessionState::new(),
        }
    }
}

/// Result of processing one valid sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub sample: ClassifiedSample,
    /// Whether the row reached the driving log
    pub persisted: bool,
    /// Messages for clients, in delivery order
    pub messages: Vec<OutboundMessage>,
}

/// What happened to an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Processed(PipelineResult),
    Dropped(DropReason),
}

impl ProcessOutcome {
    pub fn messages(&self) -> &[OutboundMessage] {
        match self {
            ProcessOutcome::Processed(result) => &result.messages,
            ProcessOutcome::Dropped(_) => &[],
        }
    }
}

/// The sample-to-classification pipeline.
pub struct StreamPipeline {
    context: SessionContext,
    classifier: Classifier,
    store: SharedStore,
    stats: SharedTransparencyLog,
}

impl StreamPipeline {
    /// Create a pipeline with a window of `sequence_length` samples.
    pub fn new(sequence_length: usize, classifier: Classifier, store: SharedStore) -> Self {
        Self {
            context: SessionContext::new(sequence_length),
            classifier,
            store,
            stats: create_shared_log(),
        }
    }

    /// Report counters to a shared transparency log.
    pub fn with_stats(mut self, stats: SharedTransparencyLog) -> Self {
        self.stats = stats;
        self
    }

    /// Process one raw sample event.
    pub fn process(&mut self, raw: &Value) -> ProcessOutcome {
        self.context.session.ensure_active();
        self.stats.record_sample_received();

        match parse_sample(raw) {
            Ok(sample) => ProcessOutcome::Processed(self.process_sample(sample)),
            Err(reason) => {
                tracing::debug!(reason = %reason, "Dropping malformed sample");
                self.stats.record_sample_dropped();
                ProcessOutcome::Dropped(reason)
            }
        }
    }

    /// Process a sample that already passed validation.
    pub fn process_sample(&mut self, sample: Sample) -> PipelineResult {
        self.context.window.push(sample.features());

        let Classification {
            predicted_class,
            risk_level,
        } = self.classifier.infer(&self.context.window);
        if risk_level != RiskLevel::Collecting {
            self.stats.record_sample_classified();
        }

        let row = ClassifiedSample {
            sample,
            predicted_class,
            risk_level,
        };

        let persisted = match self.store.append(&row) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(timestamp = row.timestamp(), error = %e, "Failed to store sample");
                self.stats.record_persist_failure();
                false
            }
        };

        let messages = vec![
            OutboundMessage::Update(UpdatePayload::from(&row)),
            OutboundMessage::RiskAlert { risk_level },
        ];
        PipelineResult {
            sample: row,
            persisted,
            messages,
        }
    }

    /// Clear the driving log and restart the session clock.
    ///
    /// The feature window is left as is, so the first classifications of the
    /// new session still see the previous session's last samples.
    pub fn reset_session(&mut self) -> DateTime<Utc> {
        self.stats.record_session_reset();
        self.context.session.reset(self.store.as_ref())
    }

    /// Acknowledgement message for a reset that started at `start_time`.
    pub fn reset_ack(start_time: DateTime<Utc>) -> OutboundMessage {
        OutboundMessage::SessionReset {
            status: "success".to_string(),
            start_time: start_time.to_rfc3339(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.context.session
    }

    /// Start the session if needed and return its start time.
    pub fn ensure_session(&mut self) -> DateTime<Utc> {
        self.context.session.ensure_active()
    }

    pub fn window(&self) -> &FeatureWindow {
        &self.context.window
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn stats(&self) -> &SharedTransparencyLog {
        &self.stats
    }
}
