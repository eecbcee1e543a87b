//! NATS subscription for incoming prediction requests

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Receives prediction requests on one subject, optionally as part of a queue group
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    pub fn new(client: Client, subject: &str, queue_group: Option<&str>) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: queue_group.map(str::to_string),
        }
    }

    /// Subscribe to the request subject.
    ///
    /// With a queue group, each request goes to exactly one member of the group.
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await
            }
            None => self.client.subscribe(self.subject.clone()).await,
        }
        .context(format!("Failed to subscribe to {}", self.subject))?;

        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Listening for prediction requests"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
