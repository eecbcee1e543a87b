//! Capability contract every classifier backend satisfies

use crate::error::{PredictError, PredictResult};
use crate::features::FeatureFrame;
use ndarray::Array2;

/// What a classifier can produce for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Class probabilities (and labels)
    Probability,
    /// Hard labels only
    LabelOnly,
}

impl Capability {
    pub fn supports_probability(&self) -> bool {
        matches!(self, Capability::Probability)
    }
}

/// A trained binary classifier over named-column frames.
///
/// Implementations validate the frame's columns themselves and report a
/// mismatch as [`PredictError::SchemaMismatch`].
pub trait Classifier: Send + Sync {
    /// Human readable description shown under predictions
    fn describe(&self) -> String;

    /// Capability of this classifier; must not change over its lifetime.
    fn capability(&self) -> Capability;

    /// Hard class labels, one per row.
    fn predict(&self, frame: &FeatureFrame) -> PredictResult<Vec<i64>>;

    /// Class probability matrix of shape `[rows, classes]`.
    ///
    /// Only meaningful when [`Classifier::capability`] is
    /// [`Capability::Probability`].
    fn predict_proba(&self, _frame: &FeatureFrame) -> PredictResult<Array2<f64>> {
        Err(PredictError::Inference(format!(
            "{} does not produce probabilities",
            self.describe()
        )))
    }
}
