//! Update loop error types.

use std::path::PathBuf;
use std::time::Duration;

use crate::timetable::ScheduleError;

/// Errors of the update loop and its message sources.
///
/// Rejected messages are not errors at this level; they are counted in the
/// cycle's summary.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// A message batch or directory could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A message batch is not valid JSON
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The baseline schedule could not be loaded
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A cycle took longer than the configured timeout
    #[error("update cycle exceeded {0:?}")]
    Timeout(Duration),

    /// The worker applying a batch panicked or was cancelled
    #[error("update worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
