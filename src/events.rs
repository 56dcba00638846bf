use crate::error::{RegistryWatchError, Result};
use crate::registry::TaggedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Change notification delivered to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub account: String,
    pub registry: String,
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
    /// Normalized artifact reference: "<repository>:<tag>".
    pub artifact: String,
    /// Qualified location: "<registry>/<repository>:<tag>".
    pub location: String,
}

impl ChangeEvent {
    pub fn from_image(image: &TaggedImage) -> Self {
        Self {
            account: image.account.clone(),
            registry: image.registry.clone(),
            repository: image.repository.clone(),
            tag: image.tag.clone(),
            digest: image.digest.clone(),
            artifact: format!("{}:{}", image.repository, image.tag),
            location: format!("{}/{}:{}", image.registry, image.repository, image.tag),
        }
    }
}

/// Delivery transport for change events. May be absent entirely, in which
/// case decisions still update the snapshot but nothing is sent.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: &ChangeEvent) -> Result<()>;
}

/// Emitter that POSTs each event as JSON to a webhook endpoint.
pub struct WebhookEmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookEmitter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(RegistryWatchError::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl EventEmitter for WebhookEmitter {
    async fn emit(&self, event: &ChangeEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| RegistryWatchError::Event(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RegistryWatchError::Event(format!(
                "Webhook returned HTTP {} for {}",
                response.status(),
                event.location
            )));
        }

        debug!("[events] Delivered change event for {}", event.location);
        Ok(())
    }
}
