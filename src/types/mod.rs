//! Type definitions for the prediction service

pub mod prediction;
pub mod record;

pub use prediction::{Decision, PredictionRequest, PredictionResponse};
pub use record::CustomerRecord;
