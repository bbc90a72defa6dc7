use std::path::Path;

use segsync::layout::{self, TEMP_SUFFIX};
use segsync::{AncillaryFiles, DownloadMode, SyncError, SyncOutcome};

use crate::cleanup::RemoveOnDrop;
use crate::synchronizer::SegmentSynchronizer;

/// Why a batch stopped early.
///
/// Both variants are a failed batch for the caller; they are kept apart so
/// that a user-requested stop is not logged as an error.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("cancelled while updating {item}")]
    Cancelled { item: String },

    #[error("failed to update {item}: {source}")]
    Failed {
        item: String,
        #[source]
        source: SyncError,
    },
}

impl BatchError {
    pub fn item(&self) -> &str {
        match self {
            Self::Cancelled { item } | Self::Failed { item, .. } => item,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// What a successful batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Lookup and profile files that were refetched, in order.
    pub ancillary_updated: Vec<String>,
    /// Every requested segment with how it was updated, in request order.
    pub segments: Vec<(String, SyncOutcome)>,
}

/// Runs a whole update: ancillary files first, then segments in order.
///
/// Strictly sequential and fail-fast: the first failure ends the batch and
/// later items are never attempted.
pub struct BatchOrchestrator {
    synchronizer: SegmentSynchronizer,
}

impl BatchOrchestrator {
    pub fn new(synchronizer: SegmentSynchronizer) -> Self {
        Self { synchronizer }
    }

    pub async fn run(
        &self,
        ancillary: &AncillaryFiles,
        segments: &[String],
    ) -> Result<BatchReport, BatchError> {
        let channel = self.synchronizer.channel();
        let local = self.synchronizer.local();
        let remote = self.synchronizer.remote();

        channel.percent(Some(0));
        channel.status("Starting download");
        tracing::info!(segments = segments.len(), "starting batch");

        for dir in [local.profiles_dir(), local.segments_dir()] {
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                self.failure(
                    &dir.display().to_string(),
                    SyncError::Io(format!("{}: {e}", dir.display())),
                )
            })?;
        }

        let mut report = BatchReport::default();

        channel.status("Updating profiles");
        for file in ancillary.lookups() {
            self.refresh(file, &remote.lookup(file)).await?;
            report.ancillary_updated.push(file.to_owned());
        }
        for file in ancillary.profiles() {
            let name = layout::ancillary_name(file).map_err(|e| self.failure(file, e))?;
            if !local.ancillary_path(name).exists() {
                tracing::debug!(file, "profile not installed locally, skipping");
                continue;
            }
            self.refresh(file, &remote.profile(file)).await?;
            report.ancillary_updated.push(file.to_owned());
        }

        let total = segments.len();
        for (i, name) in segments.iter().enumerate() {
            if channel.is_cancelled() {
                return Err(BatchError::Cancelled { item: name.clone() });
            }

            channel.status(format!("{name} ({}/{total})", i + 1));
            channel.begin_item(i + 1, total, name);

            let outcome = self
                .synchronizer
                .sync_segment(name)
                .await
                .map_err(|e| self.failure(name, e))?;
            report.segments.push((name.clone(), outcome));
        }

        tracing::info!(
            ancillary = report.ancillary_updated.len(),
            segments = report.segments.len(),
            "batch complete"
        );
        Ok(report)
    }

    /// Quiet download to `<file>_tmp`, then rename over the target.
    async fn refresh(&self, file: &str, url: &str) -> Result<(), BatchError> {
        if self.synchronizer.channel().is_cancelled() {
            return Err(BatchError::Cancelled {
                item: file.to_owned(),
            });
        }
        let name = layout::ancillary_name(file).map_err(|e| self.failure(file, e))?;

        let target = self.synchronizer.local().ancillary_path(name);
        let temp = layout::with_suffix(&target, TEMP_SUFFIX);
        let _guard = RemoveOnDrop::new(&temp);

        self.synchronizer
            .fetcher()
            .download(url, &temp, DownloadMode::Quiet)
            .await
            .map_err(|e| self.failure(file, e.into()))?;

        replace(&temp, &target)
            .await
            .map_err(|e| self.failure(file, e))?;
        tracing::debug!(file, "ancillary file updated");
        Ok(())
    }

    fn failure(&self, item: &str, err: SyncError) -> BatchError {
        let item = item.to_owned();
        if err.is_interrupted() || self.synchronizer.channel().is_cancelled() {
            tracing::info!(%item, "batch cancelled");
            BatchError::Cancelled { item }
        } else {
            tracing::error!(%item, error = %err, "batch failed");
            BatchError::Failed { item, source: err }
        }
    }
}

async fn replace(temp: &Path, target: &Path) -> Result<(), SyncError> {
    tokio::fs::rename(temp, target)
        .await
        .map_err(|e| SyncError::Write {
            path: target.to_path_buf(),
            reason: e.to_string(),
        })
}
