use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;
use url::Url;

use crate::traits::NotifySink;
use crate::types::{RelayError, Result};

/// Incoming-webhook endpoint that takes `{ "text": ... }`.
pub struct WebhookSink {
    webhook_url: String,
    label: String,
    http: Client,
}

impl WebhookSink {
    pub fn new(webhook_url: String, http: Client) -> Result<Self> {
        let parsed = Url::parse(&webhook_url)?;
        // Webhook paths usually embed a secret token; log the host only.
        let label = parsed.host_str().unwrap_or("webhook").to_string();
        Ok(Self {
            webhook_url,
            label,
            http,
        })
    }
}

#[async_trait]
impl NotifySink for WebhookSink {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        let payload = json!({ "text": text });

        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(endpoint = %self.label, status = %status, body = %body, "Webhook returned non-success");
            return Err(RelayError::Notify(format!("webhook {} returned {status}", self.label)));
        }

        Ok(())
    }
}
