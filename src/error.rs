//! Error taxonomy for artifact loading and inference

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a model artifact or running a prediction.
#[derive(Debug, Clone, Error)]
pub enum PredictError {
    /// Artifact path does not exist
    #[error("model artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// Artifact exists but cannot be turned into a usable classifier
    #[error("model artifact {} is corrupt: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// Artifact is a mapping without a `model` entry (recoverable)
    #[error("model artifact {} has no bundled threshold, using default {default_threshold}", path.display())]
    ArtifactSchema {
        path: PathBuf,
        default_threshold: f64,
    },

    /// Classifier rejected the input columns
    #[error("input schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Any other failure while computing a prediction
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    /// Short machine-readable kind used in service responses and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ArtifactNotFound { .. } => "artifact_not_found",
            PredictError::ArtifactCorrupt { .. } => "artifact_corrupt",
            PredictError::ArtifactSchema { .. } => "artifact_schema",
            PredictError::SchemaMismatch(_) => "schema_mismatch",
            PredictError::Inference(_) => "inference_error",
        }
    }

    /// Whether the process can keep going after this error.
    ///
    /// Artifact errors leave no usable classifier, except the schema
    /// fallback which degrades to a bare model.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PredictError::ArtifactNotFound { .. } | PredictError::ArtifactCorrupt { .. }
        )
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PredictError::ArtifactCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for the prediction core.
pub type PredictResult<T> = Result<T, PredictError>;
