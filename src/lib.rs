pub mod account;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod key;
pub mod poller;
pub mod reconcile;
pub mod registry;

pub use account::{Account, AccountSource, FileAccountSource};
pub use cache::{FileSnapshotStore, SnapshotStore};
pub use config::Config;
pub use error::{RegistryWatchError, Result};
pub use events::{ChangeEvent, EventEmitter, WebhookEmitter};
pub use key::ImageKey;
pub use poller::Poller;
pub use reconcile::{CycleStats, Reconciler};
pub use registry::{RegistryLister, TaggedImage, V2RegistryLister};

use std::path::PathBuf;
use std::sync::Arc;

/// Build a poller wired from configuration: file-backed snapshots, optional
/// webhook emitter, and a config-file account source.
pub fn build_poller(config_path: Option<PathBuf>, config: &Config) -> Result<Poller> {
    let store = Arc::new(FileSnapshotStore::new(PathBuf::from(&config.cache.directory))?);

    let emitter: Option<Arc<dyn EventEmitter>> = match &config.events.webhook_url {
        Some(url) => Some(Arc::new(WebhookEmitter::new(
            url.clone(),
            config.events.timeout_secs,
        )?)),
        None => None,
    };

    let reconciler = Arc::new(Reconciler::new(
        store,
        emitter,
        config.poll.image_concurrency,
    ));

    let source: Arc<dyn AccountSource> = match config_path {
        Some(path) => Arc::new(FileAccountSource::new(path)),
        None => Arc::new(FileAccountSource::from_config(config)?),
    };

    Ok(Poller::new(source, reconciler))
}
