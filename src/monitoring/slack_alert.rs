//! Slack alert service for watcher notifications
//!
//! Sends alerts to a Slack channel via incoming webhook, as a single
//! color-coded attachment. Without a webhook, alerts are only logged.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::alert::AlertEvent;
use crate::utils::AppError;

const FOOTER: &str = "Blue/Green Monitor";
/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination for alerts admitted by the watcher
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, alert: &AlertEvent) -> Result<(), AppError>;
}

/// Slack webhook message payload
#[derive(Debug, Serialize)]
pub struct SlackMessage {
    pub attachments: Vec<SlackAttachment>,
}

/// Slack legacy attachment
#[derive(Debug, Clone, Serialize)]
pub struct SlackAttachment {
    /// Hex color of the side bar
    pub color: String,
    pub title: String,
    pub text: String,
    pub footer: String,
    /// Unix timestamp (seconds)
    pub ts: i64,
}

/// Slack alert service
#[derive(Debug, Clone)]
pub struct SlackAlert {
    webhook_url: String,
    client: Client,
}

impl SlackAlert {
    /// Create a service posting to `webhook_url` with the given request timeout
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::alert_dispatch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
        })
    }

    /// Service that only logs alerts
    pub fn disabled() -> Self {
        Self {
            webhook_url: String::new(),
            client: Client::new(),
        }
    }

    /// Build from an optional URL; `None` yields a console-only service
    pub fn from_config(webhook_url: Option<&str>, timeout: Duration) -> Result<Self, AppError> {
        match webhook_url {
            Some(url) => Self::new(url, timeout),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Slack payload for an alert
    pub fn build_payload(alert: &AlertEvent) -> SlackMessage {
        SlackMessage {
            attachments: vec![SlackAttachment {
                color: alert.category.color().to_string(),
                title: alert.title(),
                text: alert.message.clone(),
                footer: FOOTER.to_string(),
                ts: alert.created_at.timestamp(),
            }],
        }
    }

    async fn send_payload(&self, payload: &SlackMessage) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                // The webhook URL carries the token
                let e = e.without_url();
                error!(error = %e, "Failed to send Slack webhook");
                AppError::alert_dispatch(format!("Failed to send Slack webhook: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Slack webhook returned error");
            return Err(AppError::alert_dispatch(format!(
                "Slack webhook error: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

impl Default for SlackAlert {
    fn default() -> Self {
        Self::disabled()
    }
}

#[async_trait]
impl AlertSink for SlackAlert {
    #[instrument(skip(self, alert), fields(alert_id = %alert.id, category = %alert.category))]
    async fn dispatch(&self, alert: &AlertEvent) -> Result<(), AppError> {
        if !self.is_enabled() {
            warn!(message = %alert.message, "No Slack webhook configured, alert logged only");
            return Ok(());
        }

        self.send_payload(&Self::build_payload(alert)).await?;
        info!(message = %alert.message, "Slack alert sent");
        Ok(())
    }
}
