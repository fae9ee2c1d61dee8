//! Window classification.
//!
//! Turns a full feature window into a 1-based class id and a risk label.
//! Inference problems never escape: they degrade to a labelled result.

use crate::core::model::{ModelInput, SharedModel};
use crate::core::windowing::FeatureWindow;
use crate::telemetry::RiskLevel;
use serde::{Deserialize, Serialize};

/// Outcome of classifying one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// 1-based class id, 0 when no prediction was made
    pub predicted_class: u32,
    pub risk_level: RiskLevel,
}

impl Classification {
    /// Window not full yet or no model available.
    pub const COLLECTING: Classification = Classification {
        predicted_class: 0,
        risk_level: RiskLevel::Collecting,
    };

    /// The model was invoked and failed.
    pub const ERROR: Classification = Classification {
        predicted_class: 0,
        risk_level: RiskLevel::Error,
    };

    fn from_class(predicted_class: u32) -> Self {
        Self {
            predicted_class,
            risk_level: RiskLevel::from_class(predicted_class),
        }
    }
}

/// Wraps an optional model.
#[derive(Clone, Default)]
pub struct Classifier {
    model: Option<SharedModel>,
}

impl Classifier {
    pub fn new(model: Option<SharedModel>) -> Self {
        Self { model }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Classify the window.
    ///
    /// The model is only consulted when the window is full and a model is
    /// loaded; otherwise the result is [`Classification::COLLECTING`].
    pub fn infer(&self, window: &FeatureWindow) -> Classification {
        let model = match &self.model {
            Some(model) if window.is_full() => model,
            _ => return Classification::COLLECTING,
        };

        let input = ModelInput::from_window(&window.snapshot());
        let probabilities = match model.predict(&input) {
            Ok(probabilities) => probabilities,
            Err(e) => {
                tracing::warn!(error = %e, "Model inference failed");
                return Classification::ERROR;
            }
        };

        match argmax(&probabilities) {
            Some(index) => Classification::from_class(index as u32 + 1),
            None => {
                tracing::warn!("Model returned no usable class scores");
                Classification::ERROR
            }
        }
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("has_model", &self.has_model())
            .finish()
    }
}

/// Index of the first maximum, ignoring NaN entries.
fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Model, ModelError};
    use crate::telemetry::FeatureVector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns fixed scores and counts invocations.
    struct FixedModel {
        scores: Vec<f64>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(scores: Vec<f64>) -> Arc<Self> {
            Arc::new(Self {
                scores,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Model for FixedModel {
        fn predict(&self, input: &ModelInput) -> Result<Vec<f64>, ModelError> {
            assert_eq!(input.shape(), [1, 5, 6]);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.clone())
        }
    }

    struct FailingModel;

    impl Model for FailingModel {
        fn predict(&self, _input: &ModelInput) -> Result<Vec<f64>, ModelError> {
            Err(ModelError::Inference("tensor backend unavailable".to_string()))
        }
    }

    fn window(len: usize) -> FeatureWindow {
        let mut window = FeatureWindow::new(5);
        for i in 0..len {
            window.push(FeatureVector([i as f64; 6]));
        }
        window
    }

    #[test]
    fn test_partial_window_skips_model() {
        let model = FixedModel::new(vec![0.9, 0.05, 0.05]);
        let classifier = Classifier::new(Some(model.clone()));

        for len in 0..5 {
            assert_eq!(classifier.infer(&window(len)), Classification::COLLECTING);
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_model_is_collecting() {
        let classifier = Classifier::new(None);
        assert!(!classifier.has_model());
        assert_eq!(classifier.infer(&window(5)), Classification::COLLECTING);
        assert_eq!(classifier.infer(&window(9)), Classification::COLLECTING);
    }

    #[test]
    fn test_argmax_maps_to_labels() {
        let cases = [
            (vec![0.7, 0.2, 0.1], 1, RiskLevel::Aggressive),
            (vec![0.1, 0.8, 0.1], 2, RiskLevel::Normal),
            (vec![0.1, 0.2, 0.7], 3, RiskLevel::Slow),
            (vec![0.1, 0.1, 0.1, 0.7], 4, RiskLevel::Invalid),
        ];
        for (scores, class, label) in cases {
            let model = FixedModel::new(scores);
            let result = Classifier::new(Some(model.clone())).infer(&window(5));
            assert_eq!(result.predicted_class, class);
            assert_eq!(result.risk_level, label);
            assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_inference_failure_is_recovered() {
        let classifier = Classifier::new(Some(Arc::new(FailingModel)));
        assert_eq!(classifier.infer(&window(5)), Classification::ERROR);
    }

    #[test]
    fn test_empty_scores_are_an_error() {
        let classifier = Classifier::new(Some(FixedModel::new(Vec::new())));
        assert_eq!(classifier.infer(&window(5)), Classification::ERROR);
    }

    #[test]
    fn test_argmax_ties_and_nan() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(argmax(&[f64::NAN, 0.1, 0.3]), Some(2));
        assert_eq!(argmax(&[f64::NAN]), None);
    }
}
