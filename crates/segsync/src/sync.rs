use std::path::PathBuf;

use crate::fetch::FetchError;

/// How a segment ended up updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    UpdatedViaDelta,
    UpdatedViaFullDownload,
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdatedViaDelta => write!(f, "updated via delta"),
            Self::UpdatedViaFullDownload => write!(f, "updated via full download"),
        }
    }
}

/// Errors that can occur while synchronizing one segment or ancillary file.
///
/// Whatever the variant, the previously committed live file is untouched.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("download interrupted")]
    Interrupted,

    /// Best-effort delta branch failed; the synchronizer downgrades this to
    /// a full download.
    #[error("failed to download & apply delta update: {0}")]
    Delta(String),

    #[error("integrity check failed for {}: {reason}", path.display())]
    Integrity { path: PathBuf, reason: String },

    #[error("failed to delete existing {}: {reason}", path.display())]
    Delete { path: PathBuf, reason: String },

    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("invalid segment name: {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl SyncError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Interrupted => Self::Interrupted,
            FetchError::Io(msg) => Self::Io(msg),
            other => Self::Network(other.to_string()),
        }
    }
}
