use std::path::Path;
use std::sync::Arc;

/// Errors that can occur while talking to the segment server.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connect timeout or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with something other than 200 OK.
    #[error("HTTP request failed: status {0}")]
    Status(u16),

    /// Cancellation was observed between chunks.
    #[error("download interrupted")]
    Interrupted,

    /// Writing the destination file failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl FetchError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// How a download should be paced and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// Large files: capped throughput, per-chunk progress, status lines.
    Throttled,
    /// Many small files: full speed, only a final progress report.
    Quiet,
}

impl DownloadMode {
    pub fn is_throttled(self) -> bool {
        matches!(self, Self::Throttled)
    }
}

/// Transport for segment, delta and ancillary files.
///
/// Implementations report through the progress channel they were
/// constructed with and must honour its cancellation flag between chunks.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Stream `url` into `destination`, returning the number of bytes written.
    ///
    /// On [`FetchError::Interrupted`] the destination may be partially
    /// written; removing it is the caller's job.
    async fn download(
        &self,
        url: &str,
        destination: &Path,
        mode: DownloadMode,
    ) -> Result<u64, FetchError>;

    /// Metadata-only probe. `Ok(false)` means the server answered and the
    /// object is absent; transport failures are errors.
    async fn exists(&self, url: &str) -> Result<bool, FetchError>;
}

#[async_trait::async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn download(
        &self,
        url: &str,
        destination: &Path,
        mode: DownloadMode,
    ) -> Result<u64, FetchError> {
        (**self).download(url, destination, mode).await
    }

    async fn exists(&self, url: &str) -> Result<bool, FetchError> {
        (**self).exists(url).await
    }
}
