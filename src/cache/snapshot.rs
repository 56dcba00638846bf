use crate::error::{RegistryWatchError, Result};
use crate::key::ImageKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

/// One persisted observation: the encoded key and the digest it last pointed
/// at. The digest is recorded for every account but only trusted for
/// comparison when the account tracks digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub digest: Option<String>,
}

/// Durable projection of which image keys have been observed per account,
/// plus their last known digests.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// All keys previously observed for an account. Missing account means an
    /// empty set, not an error.
    async fn keys_for_account(&self, account: &str) -> Result<HashSet<ImageKey>>;

    /// Last recorded digest for a key. None when the key is unknown or its
    /// last manifest fetch failed.
    async fn get_digest(&self, key: &ImageKey) -> Result<Option<String>>;

    /// Record the digest (possibly null) as the new baseline for a key.
    async fn set_digest(&self, key: &ImageKey, digest: Option<&str>) -> Result<()>;
}

/// File-backed snapshot store: one JSON entry file per image key, named by
/// the SHA-256 of the encoded key, grouped per account.
///
/// Entries are never evicted here; removal of stale keys is an external
/// operation.
pub struct FileSnapshotStore {
    snapshots_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let snapshots_dir = base_dir.join("snapshots");

        std::fs::create_dir_all(&snapshots_dir).map_err(|e| {
            RegistryWatchError::Cache(format!("Failed to create snapshots dir: {}", e))
        })?;

        Ok(Self { snapshots_dir })
    }

    /// Directory holding one account's entries.
    pub fn account_dir(&self, account: &str) -> PathBuf {
        self.snapshots_dir.join(sanitize(account))
    }

    /// Entry file path for a key.
    pub fn entry_path(&self, key: &ImageKey) -> PathBuf {
        self.account_dir(&key.account)
            .join(format!("{}.json", key.file_stem()))
    }

    async fn read_entry(&self, key: &ImageKey) -> Result<Option<SnapshotEntry>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read(&path).await.map_err(|e| {
            RegistryWatchError::Cache(format!("Failed to read snapshot entry {}: {}", key, e))
        })?;
        let entry: SnapshotEntry = serde_json::from_slice(&content)?;
        Ok(Some(entry))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn keys_for_account(&self, account: &str) -> Result<HashSet<ImageKey>> {
        let dir = self.account_dir(account);
        if !dir.exists() {
            return Ok(HashSet::new());
        }

        let mut keys = HashSet::new();
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            RegistryWatchError::Cache(format!("Failed to list snapshots for {}: {}", account, e))
        })?;

        while let Some(file) = entries.next_entry().await.map_err(|e| {
            RegistryWatchError::Cache(format!("Failed to list snapshots for {}: {}", account, e))
        })? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let content = match fs::read(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("[snapshot] Unreadable entry {:?}: {}", path, e);
                    continue;
                }
            };

            // A corrupt entry must not fail the account: it simply drops out
            // of the known set and will be re-observed as new.
            match serde_json::from_slice::<SnapshotEntry>(&content) {
                Ok(entry) => match ImageKey::parse(&entry.key) {
                    Ok(key) => {
                        keys.insert(key);
                    }
                    Err(e) => warn!("[snapshot] Skipping malformed key in {:?}: {}", path, e),
                },
                Err(e) => warn!("[snapshot] Skipping corrupt entry {:?}: {}", path, e),
            }
        }

        Ok(keys)
    }

    async fn get_digest(&self, key: &ImageKey) -> Result<Option<String>> {
        Ok(self.read_entry(key).await?.and_then(|entry| entry.digest))
    }

    async fn set_digest(&self, key: &ImageKey, digest: Option<&str>) -> Result<()> {
        let path = self.entry_path(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                RegistryWatchError::Cache(format!("Failed to create account dir: {}", e))
            })?;
        }

        let entry = SnapshotEntry {
            key: key.encode(),
            digest: digest.map(|d| d.to_string()),
        };
        let data = serde_json::to_vec(&entry)?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &data).await.map_err(|e| {
            RegistryWatchError::Cache(format!("Failed to write snapshot entry {}: {}", key, e))
        })?;

        fs::rename(&temp_path, &path).await.map_err(|e| {
            RegistryWatchError::Cache(format!("Failed to rename snapshot entry {}: {}", key, e))
        })?;

        Ok(())
    }
}

/// Account names become directory names; keep them path-safe.
fn sanitize(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // "." and ".." are valid by the character rules but escape the dir
    if safe == "." || safe == ".." || safe.is_empty() {
        return "_".to_string();
    }
    safe
}
