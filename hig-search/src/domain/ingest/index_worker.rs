//! Background worker for periodic index syncing.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, instrument};

use super::indexer::SectionIndexer;

/// Re-syncs all sources on a fixed interval and persists the snapshot after
/// every cycle.
///
/// The first tick is skipped; callers run the initial sync themselves before
/// serving traffic. Failures are logged and the next cycle proceeds.
#[instrument(name = "index_worker", skip_all, fields(interval_secs = interval.as_secs()))]
pub async fn run_index_worker(
    indexer: SectionIndexer,
    interval: Duration,
    snapshot_path: Option<PathBuf>,
) {
    info!("Index worker started");

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        info!("Starting index sync cycle");
        let stats = indexer.sync().await;

        if let Some(path) = &snapshot_path {
            if let Err(e) = indexer.store().save_snapshot(path).await {
                error!(path = %path.display(), error = %e, "Failed to save index snapshot");
            }
        }

        info!(
            indexed = stats.indexed,
            errors = stats.errors,
            total = stats.total,
            "Index sync cycle completed"
        );
    }
}
