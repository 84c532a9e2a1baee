use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Settings;

/// Push-subscription envelope delivered to the processing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubEnvelope {
    pub message: PubSubMessage,
    #[serde(default)]
    pub subscription: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubMessage {
    pub data: String,
    #[serde(rename = "messageId", default)]
    pub message_id: String,
    #[serde(rename = "publishTime", default)]
    pub publish_time: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl PubSubMessage {
    /// Decode the base64 payload back into the gateway's JSON bytes.
    pub fn decoded_data(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.data)
            .map_err(|e| anyhow!("invalid base64 message data: {}", e))
    }
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Serialize)]
struct OutgoingMessage {
    data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

#[derive(Deserialize)]
struct PublishResponse {
    #[serde(rename = "messageIds", default)]
    message_ids: Vec<String>,
}

/// Publishes ticket events to the Pub/Sub topic over REST, with bounded
/// retries and a per-publish timeout.
pub struct TicketPublisher {
    client: Client,
    topic_url: String,
    access_token: Option<String>,
    max_retries: u32,
}

impl TicketPublisher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs_f64(settings.publish_timeout_secs))
            .build()?;

        // An emulator host switches the endpoint and drops authentication.
        let topic_url = match std::env::var("PUBSUB_EMULATOR_HOST") {
            Ok(host) => format!(
                "http://{}/v1/projects/{}/topics/{}:publish",
                host, settings.gcp_project_id, settings.pubsub_topic_id
            ),
            Err(_) => format!(
                "https://pubsub.googleapis.com/v1/projects/{}/topics/{}:publish",
                settings.gcp_project_id, settings.pubsub_topic_id
            ),
        };

        let access_token = std::env::var("GCP_ACCESS_TOKEN").ok();
        if settings.is_production() && access_token.is_none() {
            log::warn!("GCP_ACCESS_TOKEN is not set; publishes depend on ambient credentials");
        }

        log::info!(
            "TicketPublisher initialized - Project: {}, Topic: {}",
            settings.gcp_project_id,
            settings.pubsub_topic_id
        );

        Ok(Self {
            client,
            topic_url,
            access_token,
            max_retries: settings.max_retries,
        })
    }

    /// Publish the raw gateway payload verbatim. Returns the message id.
    pub async fn publish_ticket(&self, payload: &[u8], webhook_id: &str) -> Result<String> {
        let mut attributes = HashMap::new();
        attributes.insert("webhook_id".to_string(), webhook_id.to_string());

        let request = PublishRequest {
            messages: vec![OutgoingMessage {
                data: BASE64.encode(payload),
                attributes,
            }],
        };

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                log::warn!("[{}] Retrying Pub/Sub publish (attempt {})", webhook_id, attempt + 1);
            }

            match self.try_publish(&request).await {
                Ok(message_id) => {
                    log::info!(
                        "[{}] Successfully published ticket event with message ID: {}",
                        webhook_id,
                        message_id
                    );
                    return Ok(message_id);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(anyhow!(
            "failed to publish after {} attempts: {}",
            self.max_retries + 1,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ))
    }

    async fn try_publish(&self, request: &PublishRequest) -> Result<String> {
        let mut builder = self.client.post(&self.topic_url).json(request);
        if let Some(token) = &self.access_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = builder.send().await?;

        if response.status().is_success() {
            let result: PublishResponse = response.json().await?;
            result
                .message_ids
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("publish response carried no message id"))
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(anyhow!("Pub/Sub publish failed ({}): {}", status, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_push_subscription_shape() {
        let json = r#"{
            "message": {
                "data": "eyJ0aWNrZXRfaWQiOiAiSU5DMDAxIn0=",
                "messageId": "1234567890",
                "publishTime": "2025-11-03T08:00:00.000Z",
                "attributes": {"webhook_id": "webhook_20251103_INC001"}
            },
            "subscription": "projects/p/subscriptions/s"
        }"#;

        let envelope: PubSubEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.message.message_id, "1234567890");
        assert_eq!(
            envelope.message.attributes.get("webhook_id").unwrap(),
            "webhook_20251103_INC001"
        );

        let decoded = envelope.message.decoded_data().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["ticket_id"], "INC001");
    }

    #[test]
    fn envelope_tolerates_missing_optional_fields() {
        let json = r#"{"message": {"data": ""}}"#;
        let envelope: PubSubEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.subscription.is_empty());
        assert!(envelope.message.attributes.is_empty());
    }

    #[test]
    fn bad_base64_is_reported() {
        let message = PubSubMessage {
            data: "not-base64!!!".to_string(),
            message_id: String::new(),
            publish_time: String::new(),
            attributes: HashMap::new(),
        };
        assert!(message.decoded_data().is_err());
    }
}
