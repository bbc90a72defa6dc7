use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use crate::{
    ContentHasher, DeltaApplier, DownloadMode, FetchError, Fetcher, IntegrityError,
    IntegrityVerifier, ProgressChannel, ProgressEvent, ProgressSink,
};

/// Sink that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.message().map(str::to_owned))
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A request observed by [`InMemoryFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Download { url: String, mode: DownloadMode },
    Exists(String),
}

/// In-memory server for testing. Unknown URLs answer 404.
#[derive(Default)]
pub struct InMemoryFetcher {
    objects: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    truncated: HashSet<String>,
    unreachable: HashSet<String>,
    channel: Option<ProgressChannel>,
    requests: Mutex<Vec<Request>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report progress and observe cancellation through `channel`.
    pub fn with_channel(mut self, channel: ProgressChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn add(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects.insert(url.into(), body.into());
    }

    /// Downloads of `url` answer 500; probes still see it.
    pub fn fail(&mut self, url: impl Into<String>) {
        self.failing.insert(url.into());
    }

    /// Downloads of `url` write half the body, then fail.
    pub fn truncate(&mut self, url: impl Into<String>) {
        self.truncated.insert(url.into());
    }

    /// Every request for `url` fails at the transport level.
    pub fn unreachable(&mut self, url: impl Into<String>) {
        self.unreachable.insert(url.into());
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Download { url, .. } => Some(url),
                Request::Exists(_) => None,
            })
            .collect()
    }

    fn record(&self, request: Request) {
        self.requests.lock().unwrap().push(request);
    }
}

#[async_trait::async_trait]
impl Fetcher for InMemoryFetcher {
    async fn download(
        &self,
        url: &str,
        destination: &Path,
        mode: DownloadMode,
    ) -> Result<u64, FetchError> {
        self.record(Request::Download {
            url: url.to_owned(),
            mode,
        });

        if self.unreachable.contains(url) {
            return Err(FetchError::Network(format!("connection refused: {url}")));
        }
        if self.failing.contains(url) {
            return Err(FetchError::Status(500));
        }
        let body = self.objects.get(url).ok_or(FetchError::Status(404))?;

        std::fs::write(destination, b"").map_err(|e| FetchError::Io(e.to_string()))?;
        if self.channel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Err(FetchError::Interrupted);
        }

        if self.truncated.contains(url) {
            std::fs::write(destination, &body[..body.len() / 2])
                .map_err(|e| FetchError::Io(e.to_string()))?;
            return Err(FetchError::Network("connection reset".into()));
        }

        std::fs::write(destination, body).map_err(|e| FetchError::Io(e.to_string()))?;
        if let Some(channel) = &self.channel {
            channel.transfer(body.len() as u64, Some(body.len() as u64));
            channel.finished();
        }
        Ok(body.len() as u64)
    }

    async fn exists(&self, url: &str) -> Result<bool, FetchError> {
        self.record(Request::Exists(url.to_owned()));

        if self.unreachable.contains(url) {
            return Err(FetchError::Network(format!("connection refused: {url}")));
        }
        Ok(self.objects.contains_key(url))
    }
}

/// Hasher returning a fixed digest regardless of content.
#[derive(Debug, Clone)]
pub struct FixedHasher(pub String);

impl ContentHasher for FixedHasher {
    fn hash_file(&self, path: &Path) -> io::Result<String> {
        std::fs::metadata(path)?;
        Ok(self.0.clone())
    }
}

/// Treats the delta as the complete new file: output = delta bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyDeltaApplier;

#[async_trait::async_trait]
impl DeltaApplier for CopyDeltaApplier {
    async fn apply(
        &self,
        base: &Path,
        delta: &Path,
        output: &Path,
        channel: &ProgressChannel,
    ) -> io::Result<()> {
        std::fs::metadata(base)?;
        if channel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"));
        }
        std::fs::copy(delta, output)?;
        Ok(())
    }
}

/// Writes garbage to the output, then fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingDeltaApplier;

#[async_trait::async_trait]
impl DeltaApplier for FailingDeltaApplier {
    async fn apply(
        &self,
        _base: &Path,
        _delta: &Path,
        output: &Path,
        _channel: &ProgressChannel,
    ) -> io::Result<()> {
        std::fs::write(output, b"partial")?;
        Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt delta"))
    }
}

/// Rejects files whose content contains a marker (or every file).
#[derive(Debug, Clone)]
pub struct RejectingVerifier {
    marker: Option<Vec<u8>>,
}

impl RejectingVerifier {
    pub fn always() -> Self {
        Self { marker: None }
    }

    pub fn when_contains(marker: impl Into<Vec<u8>>) -> Self {
        Self {
            marker: Some(marker.into()),
        }
    }
}

#[async_trait::async_trait]
impl IntegrityVerifier for RejectingVerifier {
    async fn verify(&self, path: &Path) -> Result<(), IntegrityError> {
        let content = std::fs::read(path)?;
        let rejected = match &self.marker {
            None => true,
            Some(marker) => content.windows(marker.len()).any(|w| w == marker.as_slice()),
        };
        if rejected {
            return Err(IntegrityError::Invalid("structurally invalid".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::CancelFlag;

    use super::*;

    #[tokio::test]
    async fn unknown_url_is_not_found() {
        let fetcher = InMemoryFetcher::new();
        let dir = tempfile::tempdir().unwrap();

        let result = fetcher
            .download("http://x/missing", &dir.path().join("f"), DownloadMode::Quiet)
            .await;
        assert!(matches!(result, Err(FetchError::Status(404))));
        assert!(!fetcher.exists("http://x/missing").await.unwrap());
    }

    #[tokio::test]
    async fn download_writes_body_and_records_request() {
        let mut fetcher = InMemoryFetcher::new();
        fetcher.add("http://x/a", b"abc".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a");

        let n = fetcher
            .download("http://x/a", &dest, DownloadMode::Throttled)
            .await
            .unwrap();

        assert_eq!(n, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abc");
        assert_eq!(fetcher.downloaded(), vec!["http://x/a".to_owned()]);
    }

    #[tokio::test]
    async fn cancelled_channel_interrupts_download() {
        let flag = CancelFlag::new();
        flag.cancel();
        let channel = ProgressChannel::new(Arc::new(RecordingSink::default()), Arc::new(flag));
        let mut fetcher = InMemoryFetcher::new().with_channel(channel);
        fetcher.add("http://x/a", b"abc".to_vec());
        let dir = tempfile::tempdir().unwrap();

        let result = fetcher
            .download("http://x/a", &dir.path().join("a"), DownloadMode::Throttled)
            .await;
        assert!(matches!(result, Err(FetchError::Interrupted)));
    }

    #[tokio::test]
    async fn rejecting_verifier_matches_marker() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good");
        let bad = dir.path().join("bad");
        std::fs::write(&good, b"fine").unwrap();
        std::fs::write(&bad, b"xxBADxx").unwrap();

        let verifier = RejectingVerifier::when_contains(b"BAD".to_vec());
        assert!(verifier.verify(&good).await.is_ok());
        assert!(verifier.verify(&bad).await.is_err());
    }
}
