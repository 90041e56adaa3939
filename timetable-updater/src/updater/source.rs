//! Sources of message batches.
//!
//! Wire formats are parsed elsewhere; a source yields batches of already
//! normalized [`UpdateMessage`](crate::domain::UpdateMessage)s.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::UpdateBatch;

use super::UpdaterError;

/// Something that produces one batch per poll.
pub trait UpdateSource: Send {
    /// The next batch, or `None` once the source is exhausted.
    fn next_batch(&mut self) -> impl Future<Output = Result<Option<UpdateBatch>, UpdaterError>> + Send;
}

/// Replays recorded batches from a directory.
///
/// Every `*.json` file holds one [`UpdateBatch`]; files are applied in file
/// name order, one per poll.
#[derive(Debug)]
pub struct ReplaySource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
}

impl ReplaySource {
    /// List the batch files in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, UpdaterError> {
        let dir = dir.as_ref().to_path_buf();
        let io_err = |source| UpdaterError::Io {
            path: dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        debug!(dir = %dir.display(), batches = files.len(), "opened replay source");
        Ok(Self {
            dir,
            pending: files.into(),
        })
    }

    /// Directory the batches are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of batches not yet returned.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl UpdateSource for ReplaySource {
    /// A file that cannot be read or parsed is consumed and reported; the
    /// next call moves on to the following file.
    async fn next_batch(&mut self) -> Result<Option<UpdateBatch>, UpdaterError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| UpdaterError::Io {
                path: path.clone(),
                source,
            })?;
        let batch: UpdateBatch =
            serde_json::from_str(&json).map_err(|source| UpdaterError::Json { path: path.clone(), source })?;

        debug!(file = %path.display(), messages = batch.messages.len(), "read batch");
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UpdateMessage;

    const BATCH: &str = r#"{ "messages": [
        { "type": "vehicle_position", "tripRef": "T1", "serviceDate": "2024-03-15",
          "stopRef": "Q1", "delaySecs": 60 }
    ]}"#;

    #[tokio::test]
    async fn replays_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("002.json"), r#"{ "messages": [] }"#).unwrap();
        std::fs::write(dir.path().join("001.json"), BATCH).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ReplaySource::open(dir.path()).await.unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.next_batch().await.unwrap().unwrap();
        assert!(matches!(
            first.messages.as_slice(),
            [UpdateMessage::VehiclePosition(vp)] if vp.delay_secs == 60
        ));

        let second = source.next_batch().await.unwrap().unwrap();
        assert!(second.messages.is_empty());

        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_file_is_skipped_after_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("001.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("002.json"), BATCH).unwrap();

        let mut source = ReplaySource::open(dir.path()).await.unwrap();
        assert!(matches!(
            source.next_batch().await,
            Err(UpdaterError::Json { .. })
        ));
        assert_eq!(source.next_batch().await.unwrap().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReplaySource::open(dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, UpdaterError::Io { .. }));
    }
}
