//! Inference adapter turning any supported classifier into a yes/no prediction

use crate::error::{PredictError, PredictResult};
use crate::features::FeatureFrame;
use crate::models::classifier::{Capability, Classifier};
use crate::models::loader::LoadedArtifact;
use crate::types::record::CustomerRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Result of a single prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Probability of subscribing, when the classifier exposes one
    pub probability: Option<f64>,
    /// Predicted subscription
    pub decision: bool,
}

impl PredictionResult {
    /// Decision label as shown to users
    pub fn label(&self) -> &'static str {
        if self.decision {
            "YES"
        } else {
            "NO"
        }
    }
}

/// Predict one record with an explicit classifier and threshold.
pub fn predict(
    classifier: &dyn Classifier,
    threshold: f64,
    record: &CustomerRecord,
) -> PredictResult<PredictionResult> {
    predict_frame(
        classifier,
        classifier.capability(),
        threshold,
        &FeatureFrame::from_record(record),
    )
}

/// Predict one single-row frame.
///
/// Probability-capable classifiers decide by `probability >= threshold`;
/// label-only classifiers decide by their first label.
pub fn predict_frame(
    classifier: &dyn Classifier,
    capability: Capability,
    threshold: f64,
    frame: &FeatureFrame,
) -> PredictResult<PredictionResult> {
    let result = match capability {
        Capability::Probability => {
            let proba = classifier.predict_proba(frame)?;
            let probability = proba.get([0, 1]).copied().ok_or_else(|| {
                PredictError::Inference(format!(
                    "probability matrix of shape {:?} has no positive-class column",
                    proba.shape()
                ))
            })?;
            if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
                return Err(PredictError::Inference(format!(
                    "probability {} is outside [0, 1]",
                    probability
                )));
            }
            PredictionResult {
                probability: Some(probability),
                decision: probability >= threshold,
            }
        }
        Capability::LabelOnly => {
            let labels = classifier.predict(frame)?;
            let label = labels.first().copied().ok_or_else(|| {
                PredictError::Inference("classifier returned no label".to_string())
            })?;
            PredictionResult {
                probability: None,
                decision: label != 0,
            }
        }
    };

    debug!(
        model = %classifier.describe(),
        threshold = threshold,
        probability = ?result.probability,
        decision = result.decision,
        "Prediction complete"
    );

    Ok(result)
}

/// Inference engine bound to one loaded artifact
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    artifact: Arc<LoadedArtifact>,
}

impl InferenceEngine {
    /// Create an engine over a loaded (usually cached) artifact
    pub fn new(artifact: Arc<LoadedArtifact>) -> Self {
        Self { artifact }
    }

    /// Predict one customer record
    pub fn predict(&self, record: &CustomerRecord) -> PredictResult<PredictionResult> {
        predict_frame(
            self.artifact.classifier.as_ref(),
            self.artifact.capability,
            self.artifact.threshold,
            &FeatureFrame::from_record(record),
        )
    }

    pub fn threshold(&self) -> f64 {
        self.artifact.threshold
    }

    pub fn describe(&self) -> String {
        self.artifact.describe()
    }

    pub fn artifact(&self) -> &Arc<LoadedArtifact> {
        &self.artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    /// Classifier returning fixed outputs
    struct Fixed {
        proba: Option<Array2<f64>>,
        labels: Vec<i64>,
    }

    impl Classifier for Fixed {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        fn capability(&self) -> Capability {
            if self.proba.is_some() {
                Capability::Probability
            } else {
                Capability::LabelOnly
            }
        }

        fn predict(&self, _frame: &FeatureFrame) -> PredictResult<Vec<i64>> {
            Ok(self.labels.clone())
        }

        fn predict_proba(&self, _frame: &FeatureFrame) -> PredictResult<Array2<f64>> {
            self.proba
                .clone()
                .ok_or_else(|| PredictError::Inference("no proba".to_string()))
        }
    }

    fn with_probability(p: f64) -> Fixed {
        Fixed {
            proba: Some(array![[1.0 - p, p]]),
            labels: vec![0],
        }
    }

    #[test]
    fn test_probability_above_threshold() {
        let record = CustomerRecord::default();
        let result = predict(&with_probability(0.42), 0.3, &record).unwrap();

        assert_eq!(result.probability, Some(0.42));
        assert!(result.decision);
        assert_eq!(result.label(), "YES");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let record = CustomerRecord::default();
        let result = predict(&with_probability(0.5), 0.5, &record).unwrap();
        assert!(result.decision);

        let result = predict(&with_probability(0.49), 0.5, &record).unwrap();
        assert!(!result.decision);
    }

    #[test]
    fn test_probability_wins_over_label() {
        // label output disagrees; probability path must not consult it
        let clf = Fixed {
            proba: Some(array![[0.2, 0.8]]),
            labels: vec![0],
        };
        let result = predict(&clf, 0.5, &CustomerRecord::default()).unwrap();
        assert!(result.decision);
    }

    #[test]
    fn test_label_only() {
        let record = CustomerRecord::default();
        let no = Fixed {
            proba: None,
            labels: vec![0],
        };
        let yes = Fixed {
            proba: None,
            labels: vec![1],
        };

        let result = predict(&no, 0.5, &record).unwrap();
        assert_eq!(result.probability, None);
        assert!(!result.decision);
        assert_eq!(result.label(), "NO");

        assert!(predict(&yes, 0.5, &record).unwrap().decision);
    }

    #[test]
    fn test_malformed_outputs() {
        let record = CustomerRecord::default();

        let empty = Fixed {
            proba: None,
            labels: vec![],
        };
        assert!(matches!(
            predict(&empty, 0.5, &record),
            Err(PredictError::Inference(_))
        ));

        let one_column = Fixed {
            proba: Some(array![[0.7]]),
            labels: vec![1],
        };
        assert!(matches!(
            predict(&one_column, 0.5, &record),
            Err(PredictError::Inference(_))
        ));

        assert!(matches!(
            predict(&with_probability(1.7), 0.5, &record),
            Err(PredictError::Inference(_))
        ));
    }

    #[test]
    fn test_idempotent() {
        let record = CustomerRecord::default();
        let clf = with_probability(0.61);

        let first = predict(&clf, 0.3, &record).unwrap();
        let second = predict(&clf, 0.3, &record).unwrap();
        assert_eq!(first, second);
    }
}
