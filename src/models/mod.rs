//! Model artifact loading and inference components

pub mod classifier;
pub mod inference;
pub mod linear;
pub mod loader;
pub mod onnx;

pub use classifier::{Capability, Classifier};
pub use inference::{InferenceEngine, PredictionResult};
pub use loader::{ArtifactCache, ArtifactLoader, LoadedArtifact};
