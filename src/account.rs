use crate::config::Config;
use crate::error::{RegistryWatchError, Result};
use crate::registry::{RegistryLister, V2RegistryLister};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// One registry account as seen by the core: name, digest-tracking flag and a
/// shared handle to its lister. Read-only to the reconciler.
#[derive(Clone)]
pub struct Account {
    pub name: String,
    pub track_digests: bool,
    pub lister: Arc<dyn RegistryLister>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("track_digests", &self.track_digests)
            .field("registry", &self.lister.registry())
            .finish()
    }
}

/// Provider of the current account set. `refresh` re-reads whatever backs the
/// source; `accounts` returns the last successfully materialized set.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn refresh(&self) -> Result<()>;
    fn accounts(&self) -> Vec<Account>;
}

/// Account source backed by the watcher's TOML config file. Every refresh
/// re-reads the file, so account edits are picked up on the next poll cycle
/// without a restart.
pub struct FileAccountSource {
    config_path: PathBuf,
    accounts: RwLock<Vec<Account>>,
}

impl FileAccountSource {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            accounts: RwLock::new(Vec::new()),
        }
    }

    /// Build a source from an already-loaded config (no file re-reads).
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Self::new(PathBuf::new());
        *source.accounts.write().unwrap() = build_accounts(config)?;
        Ok(source)
    }
}

#[async_trait]
impl AccountSource for FileAccountSource {
    async fn refresh(&self) -> Result<()> {
        // A source built from an in-memory config has nothing to re-read.
        if self.config_path.as_os_str().is_empty() {
            return Ok(());
        }

        let config = Config::load_from(&self.config_path).map_err(RegistryWatchError::Config)?;
        let accounts = build_accounts(&config)?;
        debug!("[accounts] Refreshed {} accounts", accounts.len());
        *self.accounts.write().unwrap() = accounts;
        Ok(())
    }

    fn accounts(&self) -> Vec<Account> {
        self.accounts.read().unwrap().clone()
    }
}

/// Materialize accounts from config: one lister per account, sharing nothing
/// across accounts.
pub fn build_accounts(config: &Config) -> Result<Vec<Account>> {
    let mut accounts = Vec::with_capacity(config.accounts.len());

    for (name, account_config) in &config.accounts {
        account_config
            .validate()
            .map_err(|e| RegistryWatchError::Config(format!("Account '{}': {}", name, e)))?;

        let lister = V2RegistryLister::new(account_config)?;
        debug!(
            "[accounts] Watching {} at {} (track_digests: {})",
            name,
            account_config.address,
            account_config.track_digests
        );

        accounts.push(Account {
            name: name.clone(),
            track_digests: account_config.track_digests,
            lister: Arc::new(lister),
        });
    }

    Ok(accounts)
}
