use regwatch::{build_poller, Config};
use std::path::PathBuf;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    tracing::info!(
        "Starting registry watcher ({} accounts, interval {}s)",
        config.accounts.len(),
        config.poll.interval_secs
    );
    tracing::info!("Snapshot directory: {}", config.cache.directory);
    match &config.events.webhook_url {
        Some(url) => tracing::info!("Delivering change events to {}", url),
        None => tracing::info!("No webhook configured, change events are disabled"),
    }
    tracing::info!("Press Ctrl+C to stop the watcher.");

    let interval = Duration::from_secs(config.poll.interval_secs);
    let poller = build_poller(config_path, &config)?;

    // Poll on a fixed cadence; each cycle is its own retry boundary
    loop {
        poller.poll_once().await;
        sleep(interval).await;
    }
}
