//! Sequence model capability.
//!
//! The classifier only needs something that maps a `(1, N, 6)` window tensor
//! to a class probability vector. [`Model`] is that capability; it can be a
//! trained artifact loaded from disk ([`LinearModel`]) or a stub in tests.

use crate::telemetry::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading or running a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model: {0}")]
    Invalid(String),
    #[error("input shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Model input: a batch of one window, flattened row-major as `(1, N, 6)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    sequence_length: usize,
    values: Vec<f64>,
}

impl ModelInput {
    /// Build the input tensor from a window snapshot (oldest first).
    pub fn from_window(vectors: &[FeatureVector]) -> Self {
        Self {
            sequence_length: vectors.len(),
            values: vectors.iter().flat_map(|v| v.0).collect(),
        }
    }

    /// Tensor shape `[batch, sequence, features]`.
    pub fn shape(&self) -> [usize; 3] {
        [1, self.sequence_length, FEATURE_COUNT]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Anything that can score a window.
pub trait Model: Send + Sync {
    /// Return one probability (or score) per class; the index of the largest
    /// entry is the predicted class, 0-based.
    fn predict(&self, input: &ModelInput) -> Result<Vec<f64>, ModelError>;
}

/// Thread-safe shared model handle.
pub type SharedModel = Arc<dyn Model>;

/// Softmax-linear classifier over the flattened window.
///
/// Stored as JSON:
///
/// ```json
/// { "sequence_length": 5, "weights": [[...30 values...], ...], "bias": [0.0, ...] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub sequence_length: usize,
    /// One row of `sequence_length * 6` weights per class
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl LinearModel {
    /// Load and validate a model file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let model: LinearModel = serde_json::from_str(&content)?;
        model.validate()?;
        Ok(model)
    }

    fn input_len(&self) -> usize {
        self.sequence_length * FEATURE_COUNT
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.weights.is_empty() {
            return Err(ModelError::Invalid("model has no classes".to_string()));
        }
        if self.bias.len() != self.weights.len() {
            return Err(ModelError::Invalid(format!(
                "{} weight rows but {} bias terms",
                self.weights.len(),
                self.bias.len()
            )));
        }
        if let Some(row) = self.weights.iter().find(|w| w.len() != self.input_len()) {
            return Err(ModelError::Invalid(format!(
                "weight row has {} values, expected {}",
                row.len(),
                self.input_len()
            )));
        }
        Ok(())
    }
}

impl Model for LinearModel {
    fn predict(&self, input: &ModelInput) -> Result<Vec<f64>, ModelError> {
        let values = input.values();
        if values.len() != self.input_len() {
            return Err(ModelError::ShapeMismatch {
                expected: self.input_len(),
                actual: values.len(),
            });
        }

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(values).map(|(w, x)| w * x).sum::<f64>() + bias)
            .collect();

        Ok(softmax(&logits))
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Load the model at `path` if one is installed.
///
/// A missing file is not an error: the pipeline runs without predictions.
pub fn load_model(path: &Path) -> Result<Option<SharedModel>, ModelError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No model installed, running without predictions");
        return Ok(None);
    }

    let model = LinearModel::load(path)?;
    tracing::info!(
        path = %path.display(),
        classes = model.weights.len(),
        sequence_length = model.sequence_length,
        "Model loaded"
    );
    Ok(Some(Arc::new(model)))
}
