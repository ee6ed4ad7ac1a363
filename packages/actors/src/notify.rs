//! Change notification delivery.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use watch_core::{Change, ChangeType, MonitoringTarget, TargetId};

use crate::handler::Notifier;

/// Body POSTed to a target's webhook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    /// The target id. Receivers key on `jobId`.
    pub job_id: TargetId,
    pub job_name: &'a str,
    pub url: &'a str,
    pub changes: Vec<WebhookChange<'a>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChange<'a> {
    pub selector: &'a str,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<&'a str>,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(
        target: &'a MonitoringTarget,
        changes: &'a [Change],
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: target.id,
            job_name: &target.name,
            url: &target.url,
            changes: changes
                .iter()
                .map(|c| WebhookChange {
                    selector: &c.selector,
                    change_type: c.change_type,
                    old_content: c.old_content.as_deref(),
                    new_content: c.new_content.as_deref(),
                })
                .collect(),
            timestamp,
        }
    }
}

/// Posts changes to the target's webhook and logs email requests.
///
/// Email delivery is not wired to a mail transport; the request is logged
/// so operators can see it was asked for.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    async fn post_webhook(&self, endpoint: &str, target: &MonitoringTarget, changes: &[Change]) {
        let payload = WebhookPayload::new(target, changes, Utc::now());
        match self.client.post(endpoint).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(
                    "Webhook delivered for {} ({} changes)",
                    target.id,
                    changes.len()
                );
            }
            Ok(response) => {
                tracing::warn!(
                    "Webhook for {} rejected with HTTP {}",
                    target.id,
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!("Webhook for {} failed: {}", target.id, e);
            }
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(
        &'a self,
        target: &'a MonitoringTarget,
        changes: &'a [Change],
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(endpoint) = target.notifications.webhook.as_deref() {
                self.post_webhook(endpoint, target, changes).await;
            }
            if let Some(email) = target.notifications.email.as_deref() {
                tracing::info!(
                    "Email notification for {} to {} requested ({} changes); no mail transport configured",
                    target.id,
                    email,
                    changes.len()
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_core::{NewTarget, NotificationSettings};

    #[test]
    fn payload_uses_receiver_field_names() -> Result<(), serde_json::Error> {
        let target = MonitoringTarget::new(
            NewTarget::new("https://example.com", "Prices", "alice", vec!["h1".into()])
                .with_notifications(
                    NotificationSettings::webhook("https://hooks.example.com")
                        .with_email("ops@example.com"),
                ),
        );
        assert_eq!(target.notifications.email.as_deref(), Some("ops@example.com"));
        let changes = vec![Change::modified("h1", "Old", "New")];

        let value = serde_json::to_value(WebhookPayload::new(&target, &changes, Utc::now()))?;

        assert_eq!(value["jobId"], serde_json::json!(target.id.to_string()));
        assert_eq!(value["jobName"], "Prices");
        assert_eq!(value["url"], "https://example.com");
        assert_eq!(value["changes"][0]["selector"], "h1");
        assert_eq!(value["changes"][0]["type"], "modified");
        assert_eq!(value["changes"][0]["oldContent"], "Old");
        assert_eq!(value["changes"][0]["newContent"], "New");
        assert!(value["timestamp"].is_string());
        Ok(())
    }
}
