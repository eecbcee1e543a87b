//! Linear pipeline classifier stored as JSON.
//!
//! Mirrors a tabular training pipeline: numeric columns are standard-scaled,
//! categorical columns are one-hot encoded (unknown categories encode as all
//! zeros), and the encoded row feeds a linear estimator.

use crate::error::{PredictError, PredictResult};
use crate::features::FeatureFrame;
use crate::models::classifier::{Capability, Classifier};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Standard scaler parameters for one numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericColumn {
    pub column: String,
    #[serde(default)]
    pub mean: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// One-hot encoder categories for one categorical column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub column: String,
    pub categories: Vec<String>,
}

/// Final estimator of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinearEstimator {
    /// Probability-capable logistic regression
    LogisticRegression { coef: Vec<f64>, intercept: f64 },
    /// Margin classifier, labels only
    LinearSvc { coef: Vec<f64>, intercept: f64 },
}

impl LinearEstimator {
    fn coef(&self) -> &[f64] {
        match self {
            LinearEstimator::LogisticRegression { coef, .. }
            | LinearEstimator::LinearSvc { coef, .. } => coef,
        }
    }

    fn intercept(&self) -> f64 {
        match self {
            LinearEstimator::LogisticRegression { intercept, .. }
            | LinearEstimator::LinearSvc { intercept, .. } => *intercept,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LinearEstimator::LogisticRegression { .. } => "Logistic Regression",
            LinearEstimator::LinearSvc { .. } => "Linear SVC",
        }
    }
}

/// Serialized form of a linear pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearPipelineSpec {
    #[serde(default = "default_name")]
    pub name: String,
    /// Columns seen at fit time, in order
    pub feature_names_in: Vec<String>,
    #[serde(default)]
    pub numeric: Vec<NumericColumn>,
    #[serde(default)]
    pub categorical: Vec<CategoricalColumn>,
    pub estimator: LinearEstimator,
}

fn default_name() -> String {
    "linear pipeline".to_string()
}

/// Validated linear pipeline ready for inference
#[derive(Debug, Clone)]
pub struct LinearPipeline {
    spec: LinearPipelineSpec,
    coef: Array1<f64>,
}

impl LinearPipeline {
    /// Validate a spec; the error string describes the inconsistency.
    pub fn from_spec(spec: LinearPipelineSpec) -> Result<Self, String> {
        let known: HashSet<&str> = spec.feature_names_in.iter().map(String::as_str).collect();
        if known.len() != spec.feature_names_in.len() {
            return Err("feature_names_in contains duplicates".to_string());
        }

        for column in spec
            .numeric
            .iter()
            .map(|c| &c.column)
            .chain(spec.categorical.iter().map(|c| &c.column))
        {
            if !known.contains(column.as_str()) {
                return Err(format!("encoded column '{}' is not in feature_names_in", column));
            }
        }

        if let Some(empty) = spec.categorical.iter().find(|c| c.categories.is_empty()) {
            return Err(format!("categorical column '{}' has no categories", empty.column));
        }

        let width = spec.numeric.len()
            + spec
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>();
        let coef = spec.estimator.coef();
        if coef.len() != width {
            return Err(format!(
                "estimator has {} coefficients but the encoder produces {} features",
                coef.len(),
                width
            ));
        }
        if !coef.iter().all(|c| c.is_finite()) || !spec.estimator.intercept().is_finite() {
            return Err("estimator parameters must be finite".to_string());
        }

        Ok(Self {
            coef: Array1::from(coef.to_vec()),
            spec,
        })
    }

    /// Number of encoded features
    pub fn width(&self) -> usize {
        self.coef.len()
    }

    fn check_columns(&self, frame: &FeatureFrame) -> PredictResult<()> {
        let got = frame.column_names();
        let expected: Vec<&str> = self.spec.feature_names_in.iter().map(String::as_str).collect();
        if got == expected {
            return Ok(());
        }

        let got_set: HashSet<&str> = got.iter().copied().collect();
        let expected_set: HashSet<&str> = expected.iter().copied().collect();

        let unseen: Vec<&str> = got.iter().copied().filter(|c| !expected_set.contains(c)).collect();
        let missing: Vec<&str> = expected.iter().copied().filter(|c| !got_set.contains(c)).collect();

        let message = if !unseen.is_empty() || !missing.is_empty() {
            let mut parts = Vec::new();
            if !unseen.is_empty() {
                parts.push(format!("unseen at fit time: {}", unseen.join(", ")));
            }
            if !missing.is_empty() {
                parts.push(format!("seen at fit time, yet now missing: {}", missing.join(", ")));
            }
            format!("feature names {}", parts.join("; "))
        } else {
            "feature names must be in the same order as they were at fit time".to_string()
        };

        Err(PredictError::SchemaMismatch(message))
    }

    /// Encode the frame into a `[1, width]` design matrix.
    fn encode(&self, frame: &FeatureFrame) -> PredictResult<Array2<f64>> {
        self.check_columns(frame)?;

        let mut row = Vec::with_capacity(self.width());

        for numeric in &self.spec.numeric {
            let value = frame.get(&numeric.column).ok_or_else(|| {
                PredictError::SchemaMismatch(format!("missing column '{}'", numeric.column))
            })?;
            let x = value.as_f64().ok_or_else(|| {
                PredictError::Inference(format!(
                    "could not convert '{}' to float in column '{}'",
                    value, numeric.column
                ))
            })?;
            if !x.is_finite() {
                return Err(PredictError::Inference(format!(
                    "input contains NaN or infinity in column '{}'",
                    numeric.column
                )));
            }
            let scale = if numeric.scale == 0.0 { 1.0 } else { numeric.scale };
            row.push((x - numeric.mean) / scale);
        }

        for categorical in &self.spec.categorical {
            let value = frame.get(&categorical.column).ok_or_else(|| {
                PredictError::SchemaMismatch(format!("missing column '{}'", categorical.column))
            })?;
            let label = value.as_category();
            row.extend(
                categorical
                    .categories
                    .iter()
                    .map(|c| if *c == label { 1.0 } else { 0.0 }),
            );
        }

        Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| PredictError::Inference(format!("failed to shape encoded row: {}", e)))
    }

    /// Signed distance of each row to the separating hyperplane.
    pub fn decision_function(&self, frame: &FeatureFrame) -> PredictResult<Array1<f64>> {
        let encoded = self.encode(frame)?;
        let scores = encoded.dot(&self.coef) + self.spec.estimator.intercept();
        if scores.iter().all(|s| s.is_finite()) {
            Ok(scores)
        } else {
            Err(PredictError::Inference("decision function is not finite".to_string()))
        }
    }
}

impl Classifier for LinearPipeline {
    fn describe(&self) -> String {
        format!("{} ({})", self.spec.estimator.label(), self.spec.name)
    }

    fn capability(&self) -> Capability {
        match self.spec.estimator {
            LinearEstimator::LogisticRegression { .. } => Capability::Probability,
            LinearEstimator::LinearSvc { .. } => Capability::LabelOnly,
        }
    }

    fn predict(&self, frame: &FeatureFrame) -> PredictResult<Vec<i64>> {
        let scores = self.decision_function(frame)?;
        Ok(scores.iter().map(|&s| i64::from(s > 0.0)).collect())
    }

    fn predict_proba(&self, frame: &FeatureFrame) -> PredictResult<Array2<f64>> {
        if !self.capability().supports_probability() {
            return Err(PredictError::Inference(format!(
                "{} does not produce probabilities",
                self.describe()
            )));
        }

        let scores = self.decision_function(frame)?;
        let mut proba = Array2::zeros((scores.len(), 2));
        for (i, &z) in scores.iter().enumerate() {
            let p = 1.0 / (1.0 + (-z).exp());
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }
}
