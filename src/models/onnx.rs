//! ONNX classifier executed with ONNX Runtime.
//!
//! Expects one graph input per frame column (shape `[1, 1]`), as produced by
//! the usual tabular pipeline exporters. The graph is probability-capable when
//! it exposes an output whose name contains `prob`.

use crate::error::{PredictError, PredictResult};
use crate::features::{FeatureFrame, FeatureValue};
use crate::models::classifier::{Capability, Classifier};
use anyhow::{Context, Result};
use ndarray::Array2;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::tensor::TensorElementType;
use ort::value::{
    DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor, ValueType,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// ONNX Runtime session wrapped as a [`Classifier`]
pub struct OnnxClassifier {
    /// Model name (file stem)
    name: String,
    /// Session; running it needs exclusive access
    session: RwLock<Session>,
    /// Graph inputs with their element types
    inputs: Vec<(String, TensorElementType)>,
    /// Output carrying hard labels
    label_output: Option<String>,
    /// Output carrying class probabilities
    probability_output: Option<String>,
}

impl OnnxClassifier {
    /// Load an ONNX model from file
    pub fn load<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        ort::init().with_name("deposit-predictor").commit()?;

        info!(model = %name, path = %path.display(), threads = onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let inputs = session
            .inputs
            .iter()
            .map(|input| match &input.input_type {
                ValueType::Tensor { ty, .. } => Ok((input.name.clone(), *ty)),
                other => Err(anyhow::anyhow!(
                    "input '{}' is not a tensor ({:?})",
                    input.name,
                    other
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone());

        if label_output.is_none() && probability_output.is_none() {
            anyhow::bail!("model {} has no outputs", name);
        }

        info!(
            model = %name,
            inputs = inputs.len(),
            label_output = ?label_output,
            probability_output = ?probability_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name,
            session: RwLock::new(session),
            inputs,
            label_output,
            probability_output,
        })
    }

    /// Build one `[1, 1]` tensor per graph input from the frame.
    fn build_inputs(&self, frame: &FeatureFrame) -> PredictResult<Vec<(String, DynValue)>> {
        check_input_names(&self.name, &self.inputs, frame)?;

        let mut values = Vec::with_capacity(self.inputs.len());
        for (name, ty) in &self.inputs {
            let value = frame
                .get(name)
                .ok_or_else(|| PredictError::SchemaMismatch(format!("missing column '{}'", name)))?;
            let tensor = input_tensor(name, *ty, value)?;
            values.push((name.clone(), tensor));
        }
        Ok(values)
    }
}

/// The frame must carry exactly the graph's inputs; order does not matter.
fn check_input_names(
    model: &str,
    inputs: &[(String, TensorElementType)],
    frame: &FeatureFrame,
) -> PredictResult<()> {
    let expected: HashSet<&str> = inputs.iter().map(|(n, _)| n.as_str()).collect();
    let got: HashSet<&str> = frame.column_names().into_iter().collect();
    if expected == got {
        return Ok(());
    }

    let mut unseen: Vec<&str> = got.difference(&expected).copied().collect();
    let mut missing: Vec<&str> = expected.difference(&got).copied().collect();
    unseen.sort_unstable();
    missing.sort_unstable();
    Err(PredictError::SchemaMismatch(format!(
        "model {} expects different inputs (unexpected: [{}], missing: [{}])",
        model,
        unseen.join(", "),
        missing.join(", ")
    )))
}

fn ort_error(e: ort::Error) -> PredictError {
    PredictError::Inference(e.to_string())
}

fn numeric(name: &str, value: &FeatureValue) -> PredictResult<f64> {
    value.as_f64().ok_or_else(|| {
        PredictError::Inference(format!(
            "could not convert '{}' to a number for input '{}'",
            value, name
        ))
    })
}

/// Convert a frame cell into a tensor of the element type the graph declares.
fn input_tensor(name: &str, ty: TensorElementType, value: &FeatureValue) -> PredictResult<DynValue> {
    let shape = vec![1_i64, 1];
    let tensor = match ty {
        TensorElementType::String => {
            Tensor::from_string_array((shape, &[value.as_category()][..])).map(|t| t.into_dyn())
        }
        TensorElementType::Float32 => {
            let x = numeric(name, value)? as f32;
            Tensor::from_array((shape, vec![x])).map(|t| t.into_dyn())
        }
        TensorElementType::Float64 => {
            let x = numeric(name, value)?;
            Tensor::from_array((shape, vec![x])).map(|t| t.into_dyn())
        }
        TensorElementType::Int64 => {
            let x = match value {
                FeatureValue::Int(v) => *v,
                FeatureValue::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
                other => {
                    return Err(PredictError::Inference(format!(
                        "input '{}' expects an integer, got '{}'",
                        name, other
                    )))
                }
            };
            Tensor::from_array((shape, vec![x])).map(|t| t.into_dyn())
        }
        other => {
            return Err(PredictError::Inference(format!(
                "input '{}' has unsupported element type {:?}",
                name, other
            )))
        }
    };
    tensor.map_err(ort_error)
}

/// Read class probabilities from a `[batch, classes]` (or `[classes]`) tensor.
fn probabilities_from_tensor(dims: &[i64], data: &[f32]) -> PredictResult<Array2<f64>> {
    let (rows, classes) = match dims {
        [rows, classes] => (*rows as usize, *classes as usize),
        [classes] => (1, *classes as usize),
        _ => {
            return Err(PredictError::Inference(format!(
                "unexpected probability shape {:?}",
                dims
            )))
        }
    };

    let values: Vec<f64> = if classes == 1 {
        // single positive-class column
        data.iter().flat_map(|&p| [1.0 - p as f64, p as f64]).collect()
    } else {
        data.iter().map(|&p| p as f64).collect()
    };
    let classes = classes.max(2);

    Array2::from_shape_vec((rows, classes), values)
        .map_err(|e| PredictError::Inference(format!("malformed probability output: {}", e)))
}

/// Read class probabilities from a `seq(map(int64, float))` output.
fn probabilities_from_sequence_map(output: &DynValue) -> PredictResult<Array2<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| PredictError::Inference(format!("Failed to downcast to sequence: {}", e)))?;
    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(ort_error)?;

    let rows = maps
        .iter()
        .map(|map_value| map_value.try_extract_key_values::<i64, f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(ort_error)?;

    probabilities_from_class_maps(&rows)
}

/// Turn one `{class_id: probability}` map per row into a `[rows, 2]` matrix.
///
/// A class missing from a map is filled in as the complement of the other.
fn probabilities_from_class_maps(rows: &[Vec<(i64, f32)>]) -> PredictResult<Array2<f64>> {
    if rows.is_empty() {
        return Err(PredictError::Inference("Empty sequence".to_string()));
    }

    let mut proba = Array2::zeros((rows.len(), 2));
    for (row, pairs) in rows.iter().enumerate() {
        let lookup = |class: i64| {
            pairs
                .iter()
                .find(|(class_id, _)| *class_id == class)
                .map(|(_, p)| *p as f64)
        };
        let (p0, p1) = match (lookup(0), lookup(1)) {
            (Some(p0), Some(p1)) => (p0, p1),
            (Some(p0), None) => (p0, 1.0 - p0),
            (None, Some(p1)) => (1.0 - p1, p1),
            (None, None) => {
                return Err(PredictError::Inference(format!(
                    "probability map for row {} has neither class 0 nor class 1",
                    row
                )))
            }
        };
        proba[[row, 0]] = p0;
        proba[[row, 1]] = p1;
    }
    Ok(proba)
}

impl Classifier for OnnxClassifier {
    fn describe(&self) -> String {
        format!("ONNX model ({})", self.name)
    }

    fn capability(&self) -> Capability {
        if self.probability_output.is_some() {
            Capability::Probability
        } else {
            Capability::LabelOnly
        }
    }

    fn predict(&self, frame: &FeatureFrame) -> PredictResult<Vec<i64>> {
        let output_name = self
            .label_output
            .as_deref()
            .ok_or_else(|| PredictError::Inference(format!("model {} has no label output", self.name)))?;
        let inputs = self.build_inputs(frame)?;

        let mut session = self
            .session
            .write()
            .map_err(|e| PredictError::Inference(format!("Lock error: {}", e)))?;
        let outputs = session.run(inputs).map_err(ort_error)?;

        let output = outputs.get(output_name).ok_or_else(|| {
            PredictError::Inference(format!("output '{}' missing from run", output_name))
        })?;
        let (_, labels) = output.try_extract_tensor::<i64>().map_err(ort_error)?;

        debug!(model = %self.name, labels = ?labels, "Extracted labels");
        Ok(labels.to_vec())
    }

    fn predict_proba(&self, frame: &FeatureFrame) -> PredictResult<Array2<f64>> {
        let output_name = self.probability_output.as_deref().ok_or_else(|| {
            PredictError::Inference(format!("model {} does not produce probabilities", self.name))
        })?;
        let inputs = self.build_inputs(frame)?;

        let mut session = self
            .session
            .write()
            .map_err(|e| PredictError::Inference(format!("Lock error: {}", e)))?;
        let outputs = session.run(inputs).map_err(ort_error)?;

        let output = outputs.get(output_name).ok_or_else(|| {
            PredictError::Inference(format!("output '{}' missing from run", output_name))
        })?;

        // Tensor outputs first, then seq(map) as exported for zipmap classifiers
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let proba = probabilities_from_tensor(&dims, data)?;
            debug!(model = %self.name, proba = ?proba, "Extracted from tensor");
            return Ok(proba);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            let proba = probabilities_from_sequence_map(output)?;
            debug!(model = %self.name, proba = ?proba, "Extracted from seq(map)");
            return Ok(proba);
        }

        Err(PredictError::Inference(format!(
            "output '{}' of model {} is neither a tensor nor seq(map)",
            output_name, self.name
        )))
    }
}
