use crate::config::{AccountConfig, DEFAULT_MANIFEST_ACCEPT_HEADER};
use crate::error::{RegistryWatchError, Result};
use crate::key::ImageKey;
use crate::registry::upstream::RegistryClient;
use async_trait::async_trait;
use futures::future;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

/// One registry observation: a tag and the digest it currently points at.
/// Produced fresh each poll cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedImage {
    pub account: String,
    pub registry: String,
    pub repository: String,
    pub tag: String,
    /// None means the manifest fetch failed this cycle, not that the tag has
    /// no content.
    pub digest: Option<String>,
}

impl TaggedImage {
    pub fn key(&self) -> ImageKey {
        ImageKey::new(&self.account, &self.registry, &self.repository, &self.tag)
    }
}

/// Enumerates the current tagged images of one account's registry.
#[async_trait]
pub trait RegistryLister: Send + Sync {
    /// Registry host as it appears in keys and events.
    fn registry(&self) -> &str;

    /// Full current set of tagged images with their digests. Errors here fail
    /// the account for this cycle only.
    async fn list_images(&self, account: &str) -> Result<Vec<TaggedImage>>;
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    #[allow(dead_code)]
    name: String,
    /// Registries return "tags": null for repositories with no tags left.
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    repositories: Vec<String>,
}

/// Docker Registry HTTP API v2 lister.
pub struct V2RegistryLister {
    registry: String,
    client: Arc<RegistryClient>,
    repositories: Vec<String>,
    digest_concurrency: usize,
}

impl V2RegistryLister {
    pub fn new(account: &AccountConfig) -> Result<Self> {
        Ok(Self {
            registry: account.registry_host(),
            client: Arc::new(RegistryClient::new(account)?),
            repositories: account.repositories.clone(),
            digest_concurrency: account.digest_concurrency.max(1),
        })
    }

    /// Configured repository list, or /v2/_catalog discovery when none is
    /// configured.
    async fn discover_repositories(&self) -> Result<Vec<String>> {
        if !self.repositories.is_empty() {
            return Ok(self.repositories.clone());
        }

        let response = self.client.get("/v2/_catalog", None).await?;
        if !response.status().is_success() {
            return Err(RegistryWatchError::Registry(format!(
                "Catalog listing failed for {}: HTTP {}",
                self.registry,
                response.status()
            )));
        }

        let catalog: Catalog = response.json().await.map_err(RegistryWatchError::Http)?;
        debug!(
            "[lister] Catalog for {} returned {} repositories",
            self.registry,
            catalog.repositories.len()
        );
        Ok(catalog.repositories)
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&format!("/v2/{}/tags/list", repository), None)
            .await?;
        if !response.status().is_success() {
            return Err(RegistryWatchError::Registry(format!(
                "Tag listing failed for {}/{}: HTTP {}",
                self.registry,
                repository,
                response.status()
            )));
        }

        let list: TagList = response.json().await.map_err(RegistryWatchError::Http)?;
        Ok(list.tags.unwrap_or_default())
    }
}

#[async_trait]
impl RegistryLister for V2RegistryLister {
    fn registry(&self) -> &str {
        &self.registry
    }

    async fn list_images(&self, account: &str) -> Result<Vec<TaggedImage>> {
        let repositories = self.discover_repositories().await?;

        // Resolve digests in parallel with a concurrency limit. A failed
        // resolution yields a null digest for that tag; only listing failures
        // fail the whole account.
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.digest_concurrency));
        let mut handles = Vec::new();

        for repository in repositories {
            let tags = self.list_tags(&repository).await?;
            debug!(
                "[lister] {}/{} has {} tags",
                self.registry,
                repository,
                tags.len()
            );

            for tag in tags {
                let client = self.client.clone();
                let semaphore = semaphore.clone();
                let account = account.to_string();
                let registry = self.registry.clone();
                let repository = repository.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.unwrap();
                    let digest = resolve_digest(&client, &repository, &tag).await;
                    TaggedImage {
                        account,
                        registry,
                        repository,
                        tag,
                        digest,
                    }
                }));
            }
        }

        let mut images = Vec::new();
        for result in future::join_all(handles).await {
            match result {
                Ok(image) => images.push(image),
                Err(e) => {
                    return Err(RegistryWatchError::Registry(format!(
                        "Digest resolution task panicked: {}",
                        e
                    )));
                }
            }
        }

        Ok(images)
    }
}

/// Resolve the manifest digest for one tag. Any failure maps to None so a
/// transient registry error is recorded as "unknown" rather than surfacing as
/// a digest change.
async fn resolve_digest(client: &RegistryClient, repository: &str, tag: &str) -> Option<String> {
    let path = format!("/v2/{}/manifests/{}", repository, tag);

    match client.head(&path, Some(DEFAULT_MANIFEST_ACCEPT_HEADER)).await {
        Ok(response) if response.status().is_success() => {
            // Try both lowercase and canonical case (HTTP headers are
            // case-insensitive but some servers use canonical case)
            let header_digest = response
                .headers()
                .get("docker-content-digest")
                .or_else(|| response.headers().get("Docker-Content-Digest"))
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string());

            if let Some(digest) = header_digest {
                return Some(digest);
            }
            debug!(
                "[lister] No Docker-Content-Digest header for {}:{}, hashing manifest body",
                repository, tag
            );
        }
        Ok(response) => {
            warn!(
                "[lister] Manifest HEAD failed for {}:{}: HTTP {}",
                repository,
                tag,
                response.status()
            );
            return None;
        }
        Err(e) => {
            warn!("[lister] Manifest HEAD failed for {}:{}: {}", repository, tag, e);
            return None;
        }
    }

    // Header was absent - fetch the manifest and hash it ourselves.
    match client.get(&path, Some(DEFAULT_MANIFEST_ACCEPT_HEADER)).await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(body) => Some(format!("sha256:{:x}", Sha256::digest(&body))),
            Err(e) => {
                warn!(
                    "[lister] Failed to read manifest body for {}:{}: {}",
                    repository, tag, e
                );
                None
            }
        },
        Ok(response) => {
            warn!(
                "[lister] Manifest GET failed for {}:{}: HTTP {}",
                repository,
                tag,
                response.status()
            );
            None
        }
        Err(e) => {
            warn!("[lister] Manifest GET failed for {}:{}: {}", repository, tag, e);
            None
        }
    }
}
