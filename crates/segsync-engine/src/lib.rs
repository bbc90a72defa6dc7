pub mod batch;
pub mod cleanup;
pub mod synchronizer;
pub mod tool;

pub use batch::{BatchError, BatchOrchestrator, BatchReport};
pub use cleanup::RemoveOnDrop;
pub use synchronizer::SegmentSynchronizer;
pub use tool::{CommandDeltaApplier, CommandVerifier};
