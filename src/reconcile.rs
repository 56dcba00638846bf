use crate::account::Account;
use crate::cache::SnapshotStore;
use crate::error::Result;
use crate::events::{ChangeEvent, EventEmitter};
use crate::key::ImageKey;
use crate::registry::TaggedImage;
use futures::future;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-account outcome counts for one reconcile run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    /// Distinct images observed this cycle (after de-duplication).
    pub observed: usize,
    /// Images whose snapshot entry was written.
    pub updated: usize,
    /// Change events actually delivered.
    pub emitted: usize,
    /// Images whose evaluation failed (cache IO, panic).
    pub failed: usize,
}

/// The core decision engine: diffs one account's current registry state
/// against its snapshot and fires update/emit per image.
pub struct Reconciler {
    store: Arc<dyn SnapshotStore>,
    emitter: Option<Arc<dyn EventEmitter>>,
    image_concurrency: usize,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        emitter: Option<Arc<dyn EventEmitter>>,
        image_concurrency: usize,
    ) -> Self {
        Self {
            store,
            emitter,
            image_concurrency: image_concurrency.max(1),
        }
    }

    /// Run one reconcile pass for one account. Listing or snapshot-set errors
    /// fail the account; per-image failures are contained and counted.
    pub async fn reconcile_account(&self, account: &Account) -> Result<CycleStats> {
        let images = account.lister.list_images(&account.name).await?;
        let cached = self.store.keys_for_account(&account.name).await?;

        // An empty cached key set means first sighting or a flushed cache.
        // Either way, notifying for every image as "new" would be wrong, so
        // emissions are suppressed for this cycle while writes proceed.
        let suppress_emissions = cached.is_empty();
        if suppress_emissions && !images.is_empty() {
            debug!(
                "[reconcile] No cached keys for {}, suppressing emissions this cycle",
                account.name
            );
        }

        // Duplicate keys within one listing are unexpected but must not
        // crash: last write wins, and keys are unique from here on.
        let mut current: HashMap<ImageKey, TaggedImage> = HashMap::with_capacity(images.len());
        for image in images {
            if let Some(previous) = current.insert(image.key(), image) {
                debug!(
                    "[reconcile] Duplicate observation for {}/{}:{} in one cycle",
                    previous.registry, previous.repository, previous.tag
                );
            }
        }

        let mut stats = CycleStats {
            observed: current.len(),
            ..Default::default()
        };

        // Per-image decisions are independent; evaluate them in parallel with
        // a concurrency limit. Keys are unique per cycle, so no two tasks
        // write the same snapshot entry.
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.image_concurrency));
        let mut handles = Vec::new();

        for (key, image) in current {
            let known = cached.contains(&key);
            let store = self.store.clone();
            let emitter = if suppress_emissions {
                None
            } else {
                self.emitter.clone()
            };
            let track_digests = account.track_digests;
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.unwrap();
                evaluate_image(store, emitter, track_digests, known, key, image).await
            }));
        }

        for result in future::join_all(handles).await {
            match result {
                Ok(Ok(outcome)) => {
                    if outcome.updated {
                        stats.updated += 1;
                    }
                    if outcome.emitted {
                        stats.emitted += 1;
                    }
                }
                Ok(Err(e)) => {
                    warn!(
                        "[reconcile] Image evaluation failed for {}: {}",
                        account.name, e
                    );
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("[reconcile] Image evaluation task panicked: {}", e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy)]
struct ImageOutcome {
    updated: bool,
    emitted: bool,
}

/// Decide and apply the update for a single image.
async fn evaluate_image(
    store: Arc<dyn SnapshotStore>,
    emitter: Option<Arc<dyn EventEmitter>>,
    track_digests: bool,
    known: bool,
    key: ImageKey,
    image: TaggedImage,
) -> Result<ImageOutcome> {
    let update = if !known {
        // Never seen under this key: always a change.
        true
    } else if track_digests {
        let last = store.get_digest(&key).await?;
        // A null on either side means a manifest fetch failed in this or a
        // previous cycle: insufficient information, not a change.
        match (&last, &image.digest) {
            (Some(last), Some(current)) => last != current,
            _ => false,
        }
    } else {
        false
    };

    if !update {
        return Ok(ImageOutcome {
            updated: false,
            emitted: false,
        });
    }

    // Emission is best-effort; a delivery failure must not prevent the
    // snapshot write below.
    let mut emitted = false;
    if let Some(emitter) = &emitter {
        let event = ChangeEvent::from_image(&image);
        match emitter.emit(&event).await {
            Ok(()) => {
                info!(
                    "[reconcile] Change event for {} (digest: {})",
                    event.location,
                    event.digest.as_deref().unwrap_or("unknown")
                );
                emitted = true;
            }
            Err(e) => {
                warn!(
                    "[reconcile] Failed to deliver change event for {}: {}",
                    event.location, e
                );
            }
        }
    }

    // The current digest, null included, becomes the new baseline even when
    // digest tracking is disabled for the account.
    store.set_digest(&key, image.digest.as_deref()).await?;
    debug!("[reconcile] Updated snapshot for {}", key);

    Ok(ImageOutcome {
        updated: true,
        emitted,
    })
}
