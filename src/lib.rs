//! Bank Term Deposit Predictor Library
//!
//! Loads a pre-trained subscription classifier artifact once per process
//! and turns single customer records into yes/no predictions with the
//! probability when the classifier provides one.

pub mod config;
pub mod consumer;
pub mod error;
pub mod features;
pub mod models;
pub mod producer;
pub mod report;
pub mod service;
pub mod stats;
pub mod types;

pub use config::AppConfig;
pub use error::{PredictError, PredictResult};
pub use features::FeatureFrame;
pub use models::inference::{predict, InferenceEngine, PredictionResult};
pub use models::loader::{ArtifactCache, ArtifactLoader, LoadedArtifact};
pub use types::{CustomerRecord, PredictionResponse};
