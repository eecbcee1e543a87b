//! Request/reply prediction service.
//!
//! Requests are handled strictly one at a time; a bad request or failed
//! prediction produces an error response and the loop moves on.

use crate::config::AppConfig;
use crate::consumer::RequestConsumer;
use crate::models::inference::InferenceEngine;
use crate::producer::PredictionProducer;
use crate::stats::ServiceStats;
use crate::types::prediction::{ErrorBody, PredictionRequest, PredictionResponse};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Log a stats summary every this many requests
const SUMMARY_EVERY: u64 = 100;

/// Decode and score one request payload.
pub fn handle_payload(
    engine: &InferenceEngine,
    stats: &ServiceStats,
    payload: &[u8],
) -> PredictionResponse {
    let model = engine.describe();
    let threshold = engine.threshold();
    let degraded = engine.artifact().is_degraded();

    let request: PredictionRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Failed to deserialize prediction request");
            stats.record_failure("invalid_request");
            let body = ErrorBody {
                kind: "invalid_request".to_string(),
                message: e.to_string(),
            };
            return PredictionResponse::failure(None, body, threshold, model, degraded);
        }
    };

    if let Err(message) = request.record.check_form_bounds() {
        stats.record_failure("invalid_request");
        let body = ErrorBody {
            kind: "invalid_request".to_string(),
            message,
        };
        return PredictionResponse::failure(request.request_id, body, threshold, model, degraded);
    }

    let start = Instant::now();
    match engine.predict(&request.record) {
        Ok(result) => {
            let latency = start.elapsed();
            stats.record_prediction(latency, result.decision, result.probability);
            debug!(
                request_id = ?request.request_id,
                decision = result.label(),
                probability = ?result.probability,
                latency_us = latency.as_micros(),
                "Request scored"
            );
            PredictionResponse::success(request.request_id, &result, threshold, model, degraded)
        }
        Err(e) => {
            error!(request_id = ?request.request_id, error = %e, "Inference failed");
            stats.record_failure(e.kind());
            PredictionResponse::failure(
                request.request_id,
                ErrorBody::from(&e),
                threshold,
                model,
                degraded,
            )
        }
    }
}

/// Serve predictions over NATS until Ctrl-C.
pub async fn run(config: &AppConfig, engine: InferenceEngine) -> Result<()> {
    let client = async_nats::connect(&config.nats.url)
        .await
        .context(format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = RequestConsumer::new(
        client.clone(),
        &config.nats.request_subject,
        config.nats.queue_group.as_deref(),
    );
    let producer = PredictionProducer::new(client.clone(), &config.nats.result_subject);
    let stats = ServiceStats::new();

    info!(
        requests = %consumer.subject(),
        results = %producer.subject(),
        model = %engine.describe(),
        threshold = engine.threshold(),
        "Prediction service ready"
    );

    let mut subscription = consumer.subscribe().await?;

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        };

        let response = handle_payload(&engine, &stats, &message.payload);

        if let Err(e) = producer.publish(&response, message.reply.clone()).await {
            error!(
                prediction_id = %response.prediction_id,
                error = %e,
                "Failed to publish prediction response"
            );
        }

        let handled = stats.predictions.load(Ordering::Relaxed) + stats.total_failures();
        if handled % SUMMARY_EVERY == 0 {
            stats.log_summary();
        }
    }

    info!("Prediction service shutting down...");
    stats.log_summary();
    client.flush().await.context("Failed to flush NATS client")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictError;
    use crate::models::loader::ArtifactLoader;
    use crate::types::prediction::Decision;
    use crate::types::record::CustomerRecord;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn demo_engine() -> InferenceEngine {
        let path =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models/final_logreg_threshold.json");
        InferenceEngine::new(Arc::new(ArtifactLoader::new().load(path).unwrap()))
    }

    #[test]
    fn test_handle_valid_request() {
        let engine = demo_engine();
        let stats = ServiceStats::new();

        let mut json = serde_json::to_value(CustomerRecord::default()).unwrap();
        json["request_id"] = serde_json::json!("req-7");
        let payload = serde_json::to_vec(&json).unwrap();

        let response = handle_payload(&engine, &stats, &payload);
        assert!(response.is_success());
        assert_eq!(response.request_id.as_deref(), Some("req-7"));
        assert!(response.probability.is_some());
        assert_eq!(response.threshold, 0.35);
        assert!(!response.degraded);

        let p = response.probability.unwrap();
        let expected = if p >= 0.35 { Decision::Yes } else { Decision::No };
        assert_eq!(response.decision, Some(expected));
        assert_eq!(stats.predictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_handle_malformed_request() {
        let engine = demo_engine();
        let stats = ServiceStats::new();

        let response = handle_payload(&engine, &stats, b"{\"age\": \"old\"}");
        assert!(!response.is_success());
        assert_eq!(response.error.as_ref().map(|e| e.kind.as_str()), Some("invalid_request"));
        assert_eq!(stats.total_failures(), 1);
    }

    #[test]
    fn test_handle_out_of_bounds_request() {
        let engine = demo_engine();
        let stats = ServiceStats::new();

        let record = CustomerRecord {
            age: 120,
            ..CustomerRecord::default()
        };
        let payload = serde_json::to_vec(&record).unwrap();

        let response = handle_payload(&engine, &stats, &payload);
        assert!(response.decision.is_none());
        assert!(response
            .error
            .as_ref()
            .map(|e| e.message.contains("age"))
            .unwrap_or(false));
    }

    #[test]
    fn test_non_finite_indicator_fails_inference() {
        let engine = demo_engine();

        // JSON cannot carry NaN, so go through the engine directly
        let record = CustomerRecord {
            euribor3m: f64::NAN,
            ..CustomerRecord::default()
        };
        assert!(matches!(
            engine.predict(&record),
            Err(PredictError::Inference(_))
        ));
    }
}
