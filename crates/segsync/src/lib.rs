pub mod checksum;
pub mod fetch;
pub mod integrity;
pub mod layout;
pub mod patch;
pub mod progress;
pub mod sync;

pub use checksum::{ContentHasher, Md5Hasher};
pub use fetch::{DownloadMode, FetchError, Fetcher};
pub use integrity::{IntegrityError, IntegrityVerifier, MinSizeVerifier};
pub use layout::{AncillaryFiles, DeltaReference, LocalLayout, RemoteLayout, SegmentPaths};
pub use patch::DeltaApplier;
pub use progress::{
    CancelFlag, Cancellation, NullSink, ProgressChannel, ProgressEvent, ProgressSink,
    SegmentPercent,
};
pub use sync::{SyncError, SyncOutcome};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
