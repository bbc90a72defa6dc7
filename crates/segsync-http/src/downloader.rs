use std::path::Path;

use reqwest::StatusCode;
use segsync::{DownloadMode, FetchError, Fetcher, ProgressChannel};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::config::DownloaderConfig;

/// Bandwidth-limited HTTP downloader and existence probe.
///
/// Bodies are written in `chunk_size` pieces. Before each piece the
/// cancellation flag is polled; after each piece progress is reported and,
/// for throttled downloads, the task sleeps until the elapsed time covers
/// `bytes_so_far / target_bytes_per_ms`.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: DownloaderConfig,
    channel: ProgressChannel,
}

impl HttpFetcher {
    pub fn new(config: DownloaderConfig, channel: ProgressChannel) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            channel,
        })
    }

    async fn throttle(&self, started: Instant, written: u64) {
        let due = started + self.config.throttle_budget(written);
        if due > Instant::now() {
            tokio::time::sleep_until(due).await;
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn download(
        &self,
        url: &str,
        destination: &Path,
        mode: DownloadMode,
    ) -> Result<u64, FetchError> {
        let verbose = mode.is_throttled();
        tracing::debug!(url, destination = %destination.display(), ?mode, "downloading");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("{url}: {e}")))?;

        if verbose {
            self.channel.status("Connecting...");
        }

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| FetchError::Io(format!("{}: {e}", destination.display())))?;

        let chunk_size = self.config.chunk_size.max(1);
        let started = Instant::now();
        let mut written = 0u64;

        while let Some(bytes) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(format!("{url}: {e}")))?
        {
            for piece in bytes.chunks(chunk_size) {
                if self.channel.is_cancelled() {
                    tracing::info!(url, written, "download interrupted");
                    return Err(FetchError::Interrupted);
                }

                file.write_all(piece)
                    .await
                    .map_err(|e| FetchError::Io(format!("{}: {e}", destination.display())))?;
                written += piece.len() as u64;

                if verbose {
                    self.channel.transfer(written, total);
                    self.throttle(started, written).await;
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| FetchError::Io(format!("{}: {e}", destination.display())))?;

        if !verbose {
            self.channel.transfer(written, total);
        }
        self.channel.finished();

        tracing::debug!(
            url,
            written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "download complete"
        );
        Ok(written)
    }

    async fn exists(&self, url: &str) -> Result<bool, FetchError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("{url}: {e}")))?;

        let found = response.status() == StatusCode::OK;
        tracing::debug!(url, status = response.status().as_u16(), found, "probed");
        Ok(found)
    }
}
