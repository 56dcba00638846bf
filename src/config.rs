use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default manifest Accept header for Docker registry API.
/// Manifest list types come first so multi-arch repositories resolve to the
/// index digest (the digest `docker pull` reports) rather than a platform one.
pub const DEFAULT_MANIFEST_ACCEPT_HEADER: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub events: EventsConfig,
    /// Registry accounts to watch, keyed by account name.
    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Concurrent per-image evaluations within one account.
    #[serde(default = "default_image_concurrency")]
    pub image_concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            image_concurrency: default_image_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Snapshot directory.
    #[serde(default = "default_cache_directory")]
    pub directory: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Where change events are POSTed. When unset, decisions still update the
    /// snapshot but nothing is delivered.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_event_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_event_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// REQUIRED: Registry base URL, e.g. "https://registry-1.docker.io".
    pub address: String,
    /// Repositories to enumerate. Empty means discover via /v2/_catalog.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Detect digest changes on already-known tags, not just new tags.
    #[serde(default)]
    pub track_digests: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Concurrent digest resolutions while listing one account.
    #[serde(default = "default_digest_concurrency")]
    pub digest_concurrency: usize,
    #[serde(default)]
    pub auth: Option<RegistryAuth>,
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_image_concurrency() -> usize {
    16
}

fn default_cache_directory() -> String {
    "cache/regwatch".to_string()
}

fn default_event_timeout_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_digest_concurrency() -> usize {
    6
}

impl AccountConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.address.is_empty() {
            return Err("AccountConfig must have a registry address".to_string());
        }
        Ok(())
    }

    /// Registry host as it appears in keys and events ("quay.io",
    /// "localhost:5000"), derived from the address.
    pub fn registry_host(&self) -> String {
        let host = self
            .address
            .strip_prefix("https://")
            .or_else(|| self.address.strip_prefix("http://"))
            .unwrap_or(&self.address);
        host.trim_end_matches('/').to_string()
    }
}

impl Config {
    /// Load configuration from file, trying the explicit path first and then
    /// the conventional locations. Falls back to defaults when nothing is
    /// found so the watcher can start with an empty account set.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        let mut config_paths: Vec<PathBuf> = Vec::new();
        if let Some(path) = explicit {
            config_paths.push(path.to_path_buf());
        }
        config_paths.push(PathBuf::from("regwatch.toml"));
        config_paths.push(PathBuf::from("config/regwatch.toml"));

        for path in config_paths {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        tracing::warn!("No regwatch.toml found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {:?}: {}", path, e))?;

        for (name, account) in &config.accounts {
            account
                .validate()
                .map_err(|e| format!("Invalid account '{}': {}", name, e))?;
        }

        tracing::info!("Loaded watcher config from {:?}", path);
        Ok(config)
    }
}
