//! Operator alerting over incoming webhooks
//!
//! The payload shape follows the destination: URLs on `discord.com`
//! get an embeds document, everything else gets a Slack-compatible
//! attachments document. An unconfigured webhook drops alerts
//! silently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use crate::error::{RecoveryError, Result};

/// How loud the alert should be at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    /// Discord embed color.
    pub fn discord_color(&self) -> u32 {
        match self {
            AlertSeverity::Info => 0x00FF00,
            AlertSeverity::Warning => 0xFFFF00,
            AlertSeverity::Critical => 0xFF0000,
        }
    }

    /// Slack attachment color name.
    pub fn slack_color(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "good",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "danger",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// One operator notification about a supervised node.
#[derive(Debug, Clone)]
pub struct Alert {
    pub node: String,
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub action_taken: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(node: &str, title: &str, message: &str, severity: AlertSeverity) -> Self {
        Self {
            node: node.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            severity,
            action_taken: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action_taken = Some(action.to_string());
        self
    }
}

/// Alert delivery seam.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Discord embeds document.
pub fn discord_payload(alert: &Alert) -> serde_json::Value {
    let mut fields = vec![
        json!({"name": "Node", "value": alert.node, "inline": true}),
        json!({"name": "Severity", "value": alert.severity.to_string(), "inline": true}),
        json!({"name": "Time", "value": alert.timestamp.to_rfc3339()}),
    ];
    if let Some(action) = &alert.action_taken {
        fields.push(json!({"name": "ActionTaken", "value": action}));
    }

    json!({
        "embeds": [{
            "title": alert.title,
            "description": alert.message,
            "color": alert.severity.discord_color(),
            "fields": fields,
        }]
    })
}

/// Slack attachments document.
pub fn slack_payload(alert: &Alert) -> serde_json::Value {
    let mut fields = vec![
        json!({"title": "Node", "value": alert.node, "short": true}),
        json!({"title": "Severity", "value": alert.severity.to_string(), "short": true}),
        json!({"title": "Time", "value": alert.timestamp.to_rfc3339()}),
    ];
    if let Some(action) = &alert.action_taken {
        fields.push(json!({"title": "ActionTaken", "value": action}));
    }

    json!({
        "attachments": [{
            "color": alert.severity.slack_color(),
            "title": alert.title,
            "text": alert.message,
            "fields": fields,
            "ts": alert.timestamp.timestamp(),
        }]
    })
}

/// `AlertSink` posting to a configured webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookAlerter {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookAlerter {
    /// An empty URL disables delivery.
    pub fn new(url: Option<String>) -> Self {
        let url = url.filter(|u| !u.trim().is_empty());
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl AlertSink for WebhookAlerter {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let url = match &self.url {
            Some(url) => url,
            None => {
                debug!("No webhook configured, dropping alert for {}", alert.node);
                return Ok(());
            }
        };

        let payload = if url.contains("discord.com") {
            discord_payload(alert)
        } else {
            slack_payload(alert)
        };

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| RecoveryError::Webhook(err.to_string()))?;

        if !response.status().is_success() {
            return Err(RecoveryError::Webhook(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
