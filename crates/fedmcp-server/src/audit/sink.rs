//! External audit sinks.

use std::time::Duration;

use async_trait::async_trait;

use super::{AuditError, AuditSink};
use crate::models::AuditEvent;

/// Emits each event as a structured `tracing` record on the `fedmcp::audit`
/// target, for log shippers that already collect process output.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "fedmcp::audit",
            event_id = %event.event_id,
            sequence = event.sequence,
            action = %event.action,
            actor = %event.actor,
            artifact_id = event.artifact_id.as_deref().unwrap_or(""),
            workspace_id = %event.workspace_id,
            timestamp = %event.timestamp.to_rfc3339(),
            "audit event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// POSTs each event as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuditError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Delivery {
                sink: "webhook".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AuditSink for WebhookSink {
    async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let failed = |reason: String| AuditError::Delivery {
            sink: "webhook".into(),
            reason,
        };

        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
