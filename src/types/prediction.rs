//! Prediction request and response messages

use crate::error::PredictError;
use crate::models::inference::PredictionResult;
use crate::types::record::CustomerRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prediction request received by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Caller-supplied identifier echoed in the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// The customer to score
    #[serde(flatten)]
    pub record: CustomerRecord,
}

/// Subscription decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Yes,
    No,
}

impl From<bool> for Decision {
    fn from(subscribe: bool) -> Self {
        if subscribe {
            Decision::Yes
        } else {
            Decision::No
        }
    }
}

/// Error details returned instead of a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&PredictError> for ErrorBody {
    fn from(err: &PredictError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Prediction response published by the service and printed by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Unique prediction identifier
    pub prediction_id: String,

    /// Echo of the request identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Predicted decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,

    /// Probability of subscribing (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,

    /// Decision threshold in effect
    pub threshold: f64,

    /// Classifier description
    pub model: String,

    /// Artifact was loaded without a bundled threshold
    pub degraded: bool,

    /// Failure details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,

    /// Response generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl PredictionResponse {
    fn base(request_id: Option<String>, threshold: f64, model: String, degraded: bool) -> Self {
        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            request_id,
            decision: None,
            probability: None,
            threshold,
            model,
            degraded,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Response for a successful prediction
    pub fn success(
        request_id: Option<String>,
        result: &PredictionResult,
        threshold: f64,
        model: String,
        degraded: bool,
    ) -> Self {
        let mut response = Self::base(request_id, threshold, model, degraded);
        response.decision = Some(Decision::from(result.decision));
        response.probability = result.probability;
        response
    }

    /// Response for a failed request
    pub fn failure(
        request_id: Option<String>,
        error: ErrorBody,
        threshold: f64,
        model: String,
        degraded: bool,
    ) -> Self {
        let mut response = Self::base(request_id, threshold, model, degraded);
        response.error = Some(error);
        response
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_flat_record() {
        let mut json = serde_json::to_value(CustomerRecord::default()).unwrap();
        json["request_id"] = serde_json::json!("req-1");

        let request: PredictionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.request_id.as_deref(), Some("req-1"));
        assert_eq!(request.record, CustomerRecord::default());
    }

    #[test]
    fn test_success_response_serialization() {
        let result = PredictionResult {
            probability: Some(0.42),
            decision: true,
        };
        let response =
            PredictionResponse::success(Some("req-1".into()), &result, 0.3, "test".into(), false);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["decision"], "yes");
        assert_eq!(json["probability"], 0.42);
        assert!(json.get("error").is_none());

        let back: PredictionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.decision, Some(Decision::Yes));
        assert!(back.is_success());
    }

    #[test]
    fn test_failure_response_omits_decision() {
        let err = PredictError::SchemaMismatch("job".into());
        let response =
            PredictionResponse::failure(None, ErrorBody::from(&err), 0.5, "test".into(), true);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("decision").is_none());
        assert!(json.get("probability").is_none());
        assert_eq!(json["error"]["kind"], "schema_mismatch");
        assert_eq!(json["degraded"], true);
    }
}
