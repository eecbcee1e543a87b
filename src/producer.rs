//! NATS message producer for prediction responses

use crate::types::prediction::PredictionResponse;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Producer for publishing prediction responses to NATS
#[derive(Clone)]
pub struct PredictionProducer {
    client: Client,
    subject: String,
}

impl PredictionProducer {
    /// Create a new producer publishing to `subject` by default
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a response to the request's reply subject, or the default subject.
    pub async fn publish(
        &self,
        response: &PredictionResponse,
        reply: Option<Subject>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(response)?;
        let subject = reply.unwrap_or_else(|| Subject::from(self.subject.as_str()));

        self.client
            .publish(subject.clone(), payload.into())
            .await?;

        debug!(
            prediction_id = %response.prediction_id,
            subject = %subject,
            decision = ?response.decision,
            probability = ?response.probability,
            "Published prediction response"
        );

        Ok(())
    }

    /// Get the default subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
