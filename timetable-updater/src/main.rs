use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use timetable_updater::timetable::{TimetableSnapshotSource, TransitSchedule};
use timetable_updater::updater::{ReplaySource, TimetableUpdater, UpdaterConfig, UpdaterError};

/// Schedule file used when `SCHEDULE_PATH` is not set.
const DEFAULT_SCHEDULE_PATH: &str = "data/schedule.json";

/// Batch directory used when `REPLAY_DIRS` is not set.
const DEFAULT_REPLAY_DIR: &str = "data/updates";

#[tokio::main]
async fn main() -> Result<(), UpdaterError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = UpdaterConfig::from_env();
    let schedule_path =
        std::env::var("SCHEDULE_PATH").unwrap_or_else(|_| DEFAULT_SCHEDULE_PATH.to_string());
    // Comma-separated; each directory is replayed as its own writer.
    let replay_dirs = std::env::var("REPLAY_DIRS").unwrap_or_else(|_| DEFAULT_REPLAY_DIR.to_string());

    let schedule = Arc::new(TransitSchedule::load(&schedule_path).await?);
    info!(
        path = %schedule_path,
        feed = schedule.feed_id(),
        patterns = schedule.num_patterns(),
        trips = schedule.num_trips(),
        "loaded schedule"
    );

    let snapshots = Arc::new(TimetableSnapshotSource::new());
    let mut feeds = Vec::new();
    for dir in replay_dirs.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let source = ReplaySource::open(dir).await?;
        let updater = TimetableUpdater::new(config.clone(), schedule.clone(), snapshots.clone());
        feeds.push(async move { (dir, updater.run(source).await) });
    }

    for (dir, result) in join_all(feeds).await {
        match result {
            Ok(summary) => info!(
                dir,
                applied = summary.applied,
                rejected = summary.rejected_total(),
                purged = summary.purged,
                "replay finished"
            ),
            Err(e) => error!(dir, error = %e, "replay failed"),
        }
    }

    let snapshot = snapshots.snapshot();
    info!(
        version = snapshot.version(),
        timetables = snapshot.len(),
        "final snapshot"
    );
    Ok(())
}
