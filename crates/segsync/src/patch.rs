use std::path::Path;

use crate::progress::ProgressChannel;

/// Reconstructs an updated segment from the current one and a delta.
///
/// Implementations report through `channel` and should stop early when it
/// is cancelled. Any failure is treated by the caller as "delta application
/// failed" and downgraded to a full download.
#[async_trait::async_trait]
pub trait DeltaApplier: Send + Sync {
    async fn apply(
        &self,
        base: &Path,
        delta: &Path,
        output: &Path,
        channel: &ProgressChannel,
    ) -> std::io::Result<()>;
}
