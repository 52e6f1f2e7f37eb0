use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by `SnapshotStore`.
///
/// Clone so one refresh outcome can be shared with every caller that
/// joined it.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] ApiError),

    #[error("Storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("Corrupt snapshot at {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("Upstream document is not a network snapshot: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] Arc<serde_json::Error>),

    #[error("Refresh task failed: {0}")]
    Task(String),
}

impl CacheError {
    pub(crate) fn storage(path: &Path, source: io::Error) -> Self {
        CacheError::Storage {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn corrupt(path: &Path, source: serde_json::Error) -> Self {
        CacheError::Corrupt {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// True for failures reaching or reading the upstream feed.
    pub fn is_fetch(&self) -> bool {
        matches!(self, CacheError::Fetch(_))
    }
}
