//! Model artifact loader and process-wide artifact cache

use crate::error::{PredictError, PredictResult};
use crate::models::classifier::{Capability, Classifier};
use crate::models::linear::{LinearPipeline, LinearPipelineSpec};
use crate::models::onnx::OnnxClassifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{debug, info, warn};

/// Threshold used when the artifact does not carry one
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Classifier description stored in an artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Linear pipeline stored inline
    LinearPipeline(LinearPipelineSpec),
    /// ONNX graph stored next to the artifact
    Onnx { path: PathBuf },
}

/// Shape the artifact was stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactShape {
    /// Mapping with `model` and optional `threshold`
    Bundle,
    /// Classifier stored directly, predates threshold bundling
    BareModel,
}

/// Classifier and decision threshold extracted from an artifact
pub struct LoadedArtifact {
    /// Where the artifact was read from
    pub path: PathBuf,
    /// The classifier
    pub classifier: Arc<dyn Classifier>,
    /// Decision threshold for the positive class
    pub threshold: f64,
    /// Capability resolved once at load time
    pub capability: Capability,
    /// Stored shape
    pub shape: ArtifactShape,
    /// Degraded-compatibility warning raised while loading
    pub warning: Option<PredictError>,
}

impl LoadedArtifact {
    /// True when the artifact was loaded in bare-model mode.
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }

    pub fn describe(&self) -> String {
        self.classifier.describe()
    }
}

impl std::fmt::Debug for LoadedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedArtifact")
            .field("path", &self.path)
            .field("classifier", &self.classifier.describe())
            .field("threshold", &self.threshold)
            .field("capability", &self.capability)
            .field("shape", &self.shape)
            .field("warning", &self.warning)
            .finish()
    }
}

/// Reads artifacts from disk
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ArtifactLoader {
    /// Create a loader with default settings (1 ONNX thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a loader with the given number of ONNX threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load an artifact and extract its `(classifier, threshold)` pair.
    ///
    /// Not cached; see [`ArtifactCache`].
    pub fn load<P: AsRef<Path>>(&self, path: P) -> PredictResult<LoadedArtifact> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PredictError::ArtifactNotFound {
                path: path.to_path_buf(),
            });
        }

        info!(path = %path.display(), "Loading model artifact");

        if is_onnx(path) {
            let classifier = self.build(path, ModelSpec::Onnx { path: path.to_path_buf() })?;
            return Ok(self.bare(path, classifier));
        }

        let bytes = fs::read(path).map_err(|e| PredictError::corrupt(path, e.to_string()))?;
        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| PredictError::corrupt(path, format!("not a valid artifact: {}", e)))?;

        match document {
            Value::Object(mut bundle) if bundle.contains_key("model") => {
                let threshold = coerce_threshold(path, bundle.get("threshold"))?;
                let spec: ModelSpec = bundle
                    .remove("model")
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| PredictError::corrupt(path, format!("invalid model entry: {}", e)))?
                    .ok_or_else(|| PredictError::corrupt(path, "missing model entry"))?;
                let classifier = self.build(path, spec)?;
                let capability = classifier.capability();

                info!(
                    path = %path.display(),
                    model = %classifier.describe(),
                    threshold = threshold,
                    capability = ?capability,
                    "Model bundle loaded"
                );

                Ok(LoadedArtifact {
                    path: path.to_path_buf(),
                    classifier,
                    threshold,
                    capability,
                    shape: ArtifactShape::Bundle,
                    warning: None,
                })
            }
            other => {
                let spec: ModelSpec = serde_json::from_value(other).map_err(|e| {
                    PredictError::corrupt(path, format!("neither a bundle nor a model: {}", e))
                })?;
                let classifier = self.build(path, spec)?;
                Ok(self.bare(path, classifier))
            }
        }
    }

    fn bare(&self, path: &Path, classifier: Arc<dyn Classifier>) -> LoadedArtifact {
        let warning = PredictError::ArtifactSchema {
            path: path.to_path_buf(),
            default_threshold: DEFAULT_THRESHOLD,
        };
        warn!(
            path = %path.display(),
            model = %classifier.describe(),
            threshold = DEFAULT_THRESHOLD,
            "Threshold not found in model artifact, using default"
        );

        LoadedArtifact {
            path: path.to_path_buf(),
            capability: classifier.capability(),
            classifier,
            threshold: DEFAULT_THRESHOLD,
            shape: ArtifactShape::BareModel,
            warning: Some(warning),
        }
    }

    fn build(&self, artifact_path: &Path, spec: ModelSpec) -> PredictResult<Arc<dyn Classifier>> {
        match spec {
            ModelSpec::LinearPipeline(spec) => LinearPipeline::from_spec(spec)
                .map(|p| Arc::new(p) as Arc<dyn Classifier>)
                .map_err(|reason| PredictError::corrupt(artifact_path, reason)),
            ModelSpec::Onnx { path } => {
                let model_path = if path.is_relative() && !is_onnx(artifact_path) {
                    artifact_path
                        .parent()
                        .map(|dir| dir.join(&path))
                        .unwrap_or(path)
                } else {
                    path
                };
                if !model_path.exists() {
                    return Err(PredictError::ArtifactNotFound { path: model_path });
                }
                OnnxClassifier::load(&model_path, self.onnx_threads)
                    .map(|m| Arc::new(m) as Arc<dyn Classifier>)
                    .map_err(|e| PredictError::corrupt(&model_path, format!("{:#}", e)))
            }
        }
    }
}

impl Default for ArtifactLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_onnx(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false)
}

/// Coerce the bundled threshold to a real number in [0, 1].
///
/// Numbers and numeric strings are accepted; absent or null means default.
fn coerce_threshold(path: &Path, raw: Option<&Value>) -> PredictResult<f64> {
    let threshold = match raw {
        None | Some(Value::Null) => return Ok(DEFAULT_THRESHOLD),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| {
        PredictError::corrupt(path, format!("threshold {} is not a number", raw.unwrap_or(&Value::Null)))
    })?;

    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(PredictError::corrupt(
            path,
            format!("threshold {} is outside [0, 1]", threshold),
        ));
    }
    Ok(threshold)
}

/// Loads each artifact at most once and hands out shared references.
///
/// Entries are never invalidated; a new artifact needs a new process.
pub struct ArtifactCache {
    loader: ArtifactLoader,
    entries: RwLock<HashMap<PathBuf, Arc<LoadedArtifact>>>,
    loads: AtomicUsize,
}

static GLOBAL_CACHE: OnceLock<ArtifactCache> = OnceLock::new();

impl ArtifactCache {
    /// Create an empty cache
    pub fn new(loader: ArtifactLoader) -> Self {
        Self {
            loader,
            entries: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Install the process-wide cache; later calls return the first one.
    pub fn install_global(loader: ArtifactLoader) -> &'static ArtifactCache {
        GLOBAL_CACHE.get_or_init(|| ArtifactCache::new(loader))
    }

    /// Return the cached artifact for `path`, loading it on first use.
    ///
    /// A failed load leaves no entry behind.
    pub fn get_or_load<P: AsRef<Path>>(&self, path: P) -> PredictResult<Arc<LoadedArtifact>> {
        let path = path.as_ref();
        let key = cache_key(path);

        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = entries.get(&key) {
                debug!(path = %path.display(), "Model artifact cache hit");
                return Ok(hit.clone());
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = entries.get(&key) {
            return Ok(hit.clone());
        }

        let artifact = Arc::new(self.loader.load(path)?);
        self.loads.fetch_add(1, Ordering::Relaxed);
        entries.insert(key, artifact.clone());
        Ok(artifact)
    }

    /// Whether `path` already has a cached artifact
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        let key = cache_key(path.as_ref());
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&key)
    }

    /// Number of artifacts actually read from storage
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

fn cache_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn pipeline_json(estimator: &str) -> Value {
        json!({
            "type": "linear_pipeline",
            "name": "tiny",
            "feature_names_in": ["age"],
            "numeric": [{"column": "age", "mean": 40.0, "scale": 10.0}],
            "estimator": {"type": estimator, "coef": [1.0], "intercept": 0.0}
        })
    }

    fn write(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_bundle_with_threshold() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "bundle.json",
            &json!({"model": pipeline_json("logistic_regression"), "threshold": 0.3}),
        );

        let artifact = ArtifactLoader::new().load(&path).unwrap();
        assert_eq!(artifact.threshold, 0.3);
        assert_eq!(artifact.shape, ArtifactShape::Bundle);
        assert_eq!(artifact.capability, Capability::Probability);
        assert!(!artifact.is_degraded());
    }

    #[test]
    fn test_bundle_without_threshold_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "bundle.json",
            &json!({"model": pipeline_json("logistic_regression")}),
        );

        let artifact = ArtifactLoader::new().load(&path).unwrap();
        assert_eq!(artifact.threshold, DEFAULT_THRESHOLD);
        assert_eq!(artifact.shape, ArtifactShape::Bundle);
        assert!(!artifact.is_degraded());
    }

    #[test]
    fn test_string_threshold_is_coerced() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "bundle.json",
            &json!({"model": pipeline_json("logistic_regression"), "threshold": " 0.42 "}),
        );

        let artifact = ArtifactLoader::new().load(&path).unwrap();
        assert_eq!(artifact.threshold, 0.42);
    }

    #[test]
    fn test_invalid_thresholds_are_corrupt() {
        let dir = TempDir::new().unwrap();
        for (i, threshold) in [json!("high"), json!(1.5), json!(-0.1), json!([0.5])]
            .into_iter()
            .enumerate()
        {
            let path = write(
                &dir,
                &format!("bundle_{}.json", i),
                &json!({"model": pipeline_json("logistic_regression"), "threshold": threshold}),
            );
            let err = ArtifactLoader::new().load(&path).unwrap_err();
            assert!(
                matches!(err, PredictError::ArtifactCorrupt { .. }),
                "threshold {} gave {:?}",
                threshold,
                err
            );
        }
    }

    #[test]
    fn test_bare_model_degrades() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "legacy.json", &pipeline_json("linear_svc"));

        let artifact = ArtifactLoader::new().load(&path).unwrap();
        assert_eq!(artifact.threshold, DEFAULT_THRESHOLD);
        assert_eq!(artifact.shape, ArtifactShape::BareModel);
        assert_eq!(artifact.capability, Capability::LabelOnly);
        assert!(matches!(
            artifact.warning,
            Some(PredictError::ArtifactSchema { .. })
        ));
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let err = ArtifactLoader::new()
            .load(dir.path().join("nope.json"))
            .unwrap_err();
        assert!(matches!(err, PredictError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_corrupt_artifacts() {
        let dir = TempDir::new().unwrap();

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, b"\x80\x04\x95 not json").unwrap();
        assert!(matches!(
            ArtifactLoader::new().load(&garbage),
            Err(PredictError::ArtifactCorrupt { .. })
        ));

        let unknown = write(&dir, "unknown.json", &json!({"weights": [1, 2, 3]}));
        assert!(matches!(
            ArtifactLoader::new().load(&unknown),
            Err(PredictError::ArtifactCorrupt { .. })
        ));

        let bad_model = write(&dir, "bad_model.json", &json!({"model": {"type": "forest"}}));
        assert!(matches!(
            ArtifactLoader::new().load(&bad_model),
            Err(PredictError::ArtifactCorrupt { .. })
        ));
    }

    #[test]
    fn test_bundle_referencing_missing_onnx() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "bundle.json",
            &json!({"model": {"type": "onnx", "path": "absent.onnx"}, "threshold": 0.4}),
        );

        match ArtifactLoader::new().load(&path) {
            Err(PredictError::ArtifactNotFound { path }) => {
                assert_eq!(path, dir.path().join("absent.onnx"));
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_cache_loads_once() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "bundle.json",
            &json!({"model": pipeline_json("logistic_regression"), "threshold": 0.3}),
        );

        let cache = ArtifactCache::new(ArtifactLoader::new());
        let first = cache.get_or_load(&path).unwrap();
        let second = cache.get_or_load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.load_count(), 1);
    }

    #[test]
    fn test_cache_keeps_nothing_on_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let cache = ArtifactCache::new(ArtifactLoader::new());
        assert!(cache.get_or_load(&path).is_err());
        assert!(!cache.contains(&path));
        assert_eq!(cache.load_count(), 0);
    }
}
