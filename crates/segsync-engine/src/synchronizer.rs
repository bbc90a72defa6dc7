use std::io;
use std::path::Path;
use std::sync::Arc;

use segsync::layout::{self, SegmentPaths};
use segsync::{
    ContentHasher, DeltaApplier, DeltaReference, DownloadMode, FetchError, Fetcher,
    IntegrityVerifier, LocalLayout, Md5Hasher, ProgressChannel, RemoteLayout, SyncError,
    SyncOutcome,
};

use crate::cleanup::{RemoveOnDrop, remove_if_exists};

/// Updates one segment at a time, preferring a delta over a full download.
///
/// The live file is only ever replaced by a verified temporary file. Both
/// transient files are removed when an attempt ends, whatever the outcome.
pub struct SegmentSynchronizer {
    fetcher: Arc<dyn Fetcher>,
    hasher: Arc<dyn ContentHasher>,
    applier: Option<Arc<dyn DeltaApplier>>,
    verifier: Arc<dyn IntegrityVerifier>,
    local: LocalLayout,
    remote: RemoteLayout,
    channel: ProgressChannel,
}

impl SegmentSynchronizer {
    /// Without a delta applier every segment is downloaded in full.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        verifier: Arc<dyn IntegrityVerifier>,
        local: LocalLayout,
        remote: RemoteLayout,
        channel: ProgressChannel,
    ) -> Self {
        Self {
            fetcher,
            hasher: Arc::new(Md5Hasher),
            applier: None,
            verifier,
            local,
            remote,
            channel,
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_delta_applier(mut self, applier: Arc<dyn DeltaApplier>) -> Self {
        self.applier = Some(applier);
        self
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn local(&self) -> &LocalLayout {
        &self.local
    }

    pub fn remote(&self) -> &RemoteLayout {
        &self.remote
    }

    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }

    /// Bring `segments4/<name>.rd5` up to date with the server.
    ///
    /// `name` may carry the `.rd5` suffix. On error the live file is left
    /// exactly as it was, except when the final rename itself fails after
    /// the old file was deleted.
    pub async fn sync_segment(&self, name: &str) -> Result<SyncOutcome, SyncError> {
        let name = layout::segment_name(name)?;
        let paths = self.local.segment(name);

        let dir = self.local.segments_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        for stale in [&paths.temp, &paths.delta] {
            if remove_if_exists(stale).map_err(|e| io_error(stale, e))? {
                tracing::debug!(path = %stale.display(), "removed stale artefact");
            }
        }
        let _temp = RemoveOnDrop::new(&paths.temp);

        if let Some(applier) = &self.applier
            && paths.live.exists()
        {
            match self.try_delta(applier.as_ref(), &paths).await {
                Ok(true) if !paths.temp.exists() => {
                    tracing::warn!(
                        segment = name,
                        "delta tool wrote no output, downloading in full"
                    );
                }
                Ok(_) => {}
                Err(SyncError::Delta(reason)) => {
                    tracing::warn!(
                        segment = name,
                        %reason,
                        "delta update failed, downloading in full"
                    );
                    remove_if_exists(&paths.temp).map_err(|e| io_error(&paths.temp, e))?;
                }
                Err(e) => return Err(e),
            }
        }

        let outcome = if paths.temp.exists() {
            SyncOutcome::UpdatedViaDelta
        } else {
            let url = self.remote.segment(name);
            let bytes = self
                .fetcher
                .download(&url, &paths.temp, DownloadMode::Throttled)
                .await?;
            tracing::debug!(segment = name, bytes, "downloaded full segment");
            SyncOutcome::UpdatedViaFullDownload
        };

        self.verifier
            .verify(&paths.temp)
            .await
            .map_err(|e| SyncError::Integrity {
                path: paths.temp.clone(),
                reason: e.to_string(),
            })?;

        commit(&paths).await?;
        tracing::info!(segment = name, %outcome, "segment committed");
        Ok(outcome)
    }

    /// Best-effort delta branch. The downloaded delta is removed before this
    /// returns.
    ///
    /// `Ok(false)` means no delta exists for the local version. Failures that
    /// should fall back to a full download are reported as
    /// [`SyncError::Delta`]; probe transport errors and cancellation are not.
    async fn try_delta(
        &self,
        applier: &dyn DeltaApplier,
        paths: &SegmentPaths,
    ) -> Result<bool, SyncError> {
        self.channel.status("Calculating local checksum...");
        let hash = self.hash(&paths.live).await?;

        let reference = DeltaReference::new(paths.name.as_str(), hash);
        let url = self.remote.delta(&reference);
        if !self.fetcher.exists(&url).await? {
            tracing::debug!(
                segment = %paths.name,
                hash = %reference.hash,
                "no delta for local version"
            );
            return Ok(false);
        }

        let _delta = RemoveOnDrop::new(&paths.delta);
        match self
            .fetcher
            .download(&url, &paths.delta, DownloadMode::Throttled)
            .await
        {
            Ok(_) => {}
            Err(FetchError::Interrupted) => return Err(SyncError::Interrupted),
            Err(e) => return Err(SyncError::Delta(e.to_string())),
        }

        self.channel.status("Applying delta...");
        applier
            .apply(&paths.live, &paths.delta, &paths.temp, &self.channel)
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::Interrupted || self.channel.is_cancelled() {
                    SyncError::Interrupted
                } else {
                    SyncError::Delta(e.to_string())
                }
            })?;

        tracing::debug!(segment = %paths.name, "delta applied");
        Ok(true)
    }

    async fn hash(&self, path: &Path) -> Result<String, SyncError> {
        let hasher = Arc::clone(&self.hasher);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || hasher.hash_file(&owned))
            .await
            .map_err(|e| SyncError::Delta(format!("checksum task failed: {e}")))?
            .map_err(|e| SyncError::Delta(format!("checksum of {}: {e}", path.display())))
    }
}

/// Delete-then-rename. The delete is skipped when there is no live file.
async fn commit(paths: &SegmentPaths) -> Result<(), SyncError> {
    match tokio::fs::remove_file(&paths.live).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SyncError::Delete {
                path: paths.live.clone(),
                reason: e.to_string(),
            });
        }
    }

    tokio::fs::rename(&paths.temp, &paths.live)
        .await
        .map_err(|e| SyncError::Write {
            path: paths.live.clone(),
            reason: e.to_string(),
        })
}

fn io_error(path: &Path, err: io::Error) -> SyncError {
    SyncError::Io(format!("{}: {err}", path.display()))
}
