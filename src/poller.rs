use crate::account::AccountSource;
use crate::reconcile::Reconciler;
use futures::future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Drives one poll cycle across all accounts with per-account failure
/// isolation. Cycles of one poller are serialized; a cycle must finish before
/// the next one touches the same accounts.
pub struct Poller {
    source: Arc<dyn AccountSource>,
    reconciler: Arc<Reconciler>,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl Poller {
    pub fn new(source: Arc<dyn AccountSource>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            source,
            reconciler,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one poll cycle: refresh the account set, then reconcile every
    /// account independently. Communicates outcomes only via the emitter and
    /// logging; failures never propagate past the account boundary, and there
    /// is no within-cycle retry - the next scheduled cycle is the retry.
    pub async fn poll_once(&self) {
        let _cycle = self.cycle_lock.lock().await;
        let cycle_start = Instant::now();

        // A refresh failure leaves the previously materialized account set
        // in place so the cycle still runs.
        if let Err(e) = self.source.refresh().await {
            warn!("[poll] Failed to refresh accounts, using previous set: {}", e);
        }

        let accounts = self.source.accounts();
        if accounts.is_empty() {
            info!("[poll] No accounts configured, nothing to do");
            return;
        }

        debug!("[poll] Starting cycle over {} accounts", accounts.len());

        let mut handles = Vec::new();
        for account in accounts {
            let reconciler = self.reconciler.clone();
            handles.push(tokio::spawn(async move {
                match reconciler.reconcile_account(&account).await {
                    Ok(stats) => {
                        info!(
                            "[poll] Account {}: {} observed, {} updated, {} emitted, {} failed",
                            account.name,
                            stats.observed,
                            stats.updated,
                            stats.emitted,
                            stats.failed
                        );
                        Ok(())
                    }
                    Err(e) => {
                        error!("[poll] Account {} failed: {}", account.name, e);
                        Err(e)
                    }
                }
            }));
        }

        let results = future::join_all(handles).await;
        let mut success_count = 0;
        let mut fail_count = 0;

        for result in results {
            match result {
                Ok(Ok(())) => success_count += 1,
                Ok(Err(_)) => fail_count += 1,
                Err(e) => {
                    error!("[poll] Account task panicked: {}", e);
                    fail_count += 1;
                }
            }
        }

        info!(
            "[poll] Cycle completed: {} accounts succeeded, {} failed in {}ms",
            success_count,
            fail_count,
            cycle_start.elapsed().as_millis()
        );
    }
}
