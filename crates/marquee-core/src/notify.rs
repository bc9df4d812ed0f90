//! Notifications about saved artwork.
//!
//! Delivery is fire-and-forget: the mutation service spawns the call and
//! only logs a failure.

use crate::config::NetworkConfig;
use crate::error::{MarqueeError, Result};
use crate::identity::{IdentityKey, MediaIdentity};
use crate::inventory::{ArtworkKind, MediaCategory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Emitted after artwork has been written and the ledger updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkSavedEvent {
    pub identity: MediaIdentity,
    pub key: IdentityKey,
    pub category: MediaCategory,
    pub folder: String,
    pub kind: ArtworkKind,
    pub path: PathBuf,
    pub saved_at: DateTime<Utc>,
    /// Where the artwork was downloaded from, when known.
    pub source_url: Option<String>,
}

#[async_trait]
pub trait ArtworkNotifier: Send + Sync {
    async fn artwork_saved(&self, event: &ArtworkSavedEvent) -> Result<()>;
}

/// Posts to a Slack incoming webhook.
pub struct SlackWebhookNotifier {
    client: Client,
    webhook_url: Url,
}

impl std::fmt::Debug for SlackWebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebhookNotifier")
            .field("host", &self.webhook_url.host_str())
            .finish()
    }
}

impl SlackWebhookNotifier {
    pub fn new(webhook_url: &str) -> Result<Self> {
        let webhook_url = Url::parse(webhook_url).map_err(|e| MarqueeError::Config {
            message: format!("Invalid Slack webhook URL: {}", e),
        })?;
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MarqueeError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

/// Slack message body for an event.
pub fn slack_payload(event: &ArtworkSavedEvent) -> serde_json::Value {
    let mut attachment = json!({
        "text": format!("{} saved to: {}", capitalize(event.kind.as_str()), event.path.display()),
    });
    if let Some(url) = &event.source_url {
        attachment["image_url"] = json!(url);
    }
    json!({
        "text": format!(
            "{} for '{}' has been downloaded!",
            capitalize(event.kind.as_str()),
            event.folder
        ),
        "attachments": [attachment],
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl ArtworkNotifier for SlackWebhookNotifier {
    async fn artwork_saved(&self, event: &ArtworkSavedEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&slack_payload(event))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarqueeError::Network {
                message: format!("Slack webhook returned {}", status),
                cause: None,
            });
        }
        debug!("Slack notified for {} {}", event.folder, event.kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::parse_directory_name;

    fn event(source_url: Option<&str>) -> ArtworkSavedEvent {
        let identity = parse_directory_name("Heat (1995)").identity;
        ArtworkSavedEvent {
            key: identity.key(),
            identity,
            category: MediaCategory::Movies,
            folder: "Heat (1995)".to_string(),
            kind: ArtworkKind::Backdrop,
            path: PathBuf::from("/m/Heat (1995)/backdrop.jpg"),
            saved_at: Utc::now(),
            source_url: source_url.map(str::to_string),
        }
    }

    #[test]
    fn test_slack_payload_shape() {
        let payload = slack_payload(&event(Some("https://img.test/a.jpg")));
        assert_eq!(payload["text"], "Backdrop for 'Heat (1995)' has been downloaded!");
        assert_eq!(
            payload["attachments"][0]["text"],
            "Backdrop saved to: /m/Heat (1995)/backdrop.jpg"
        );
        assert_eq!(payload["attachments"][0]["image_url"], "https://img.test/a.jpg");
    }

    #[test]
    fn test_payload_without_source_has_no_image() {
        let payload = slack_payload(&event(None));
        assert!(payload["attachments"][0].get("image_url").is_none());
    }

    #[test]
    fn test_invalid_webhook_url() {
        assert!(matches!(
            SlackWebhookNotifier::new("not a url"),
            Err(MarqueeError::Config { .. })
        ));
    }
}
