//! Schedule loading errors.

use std::path::PathBuf;

use crate::domain::DomainError;

/// Errors while loading the baseline schedule.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The schedule file could not be read
    #[error("failed to read schedule {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schedule file is not valid JSON for the expected layout
    #[error("failed to parse schedule: {0}")]
    Json(#[from] serde_json::Error),

    /// The schedule content is inconsistent
    #[error(transparent)]
    Domain(#[from] DomainError),
}
