use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Structured progress emitted while a batch runs.
///
/// Every component publishes through a [`ProgressChannel`] rather than
/// printing, so callers decide how to present it (the CLI draws a progress
/// bar, tests record the events, library consumers can ignore them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Human-readable status line ("Calculating local checksum...").
    Status(String),
    /// Bytes transferred so far. `total` is `None` when the server did not
    /// report a length, which surfaces must render as indeterminate.
    Transfer { current: u64, total: Option<u64> },
    /// A batch item is about to start. `index` is 1-based.
    Item {
        index: usize,
        total: usize,
        name: String,
    },
    /// Per-segment percentage record for external progress surfaces.
    Percent(SegmentPercent),
}

/// `(name, percent)` record. A `None` percent means indeterminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPercent {
    pub name: Option<String>,
    pub percent: Option<u8>,
}

impl SegmentPercent {
    /// Integer form used by surfaces that cannot express "unknown": -1.
    pub fn as_i32(&self) -> i32 {
        self.percent.map_or(-1, i32::from)
    }
}

impl ProgressEvent {
    pub fn status(msg: impl Into<String>) -> Self {
        Self::Status(msg.into())
    }

    pub fn transfer(current: u64, total: Option<u64>) -> Self {
        Self::Transfer {
            current,
            total: total.filter(|t| *t > 0),
        }
    }

    /// Percentage for a `Transfer` event with a known total.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Transfer {
                current,
                total: Some(total),
            } if *total > 0 => Some(((*current).min(*total) * 100 / *total) as u8),
            Self::Percent(record) => record.percent,
            _ => None,
        }
    }

    /// Get the status text, if this is a status line.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Status(msg) => Some(msg),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(msg) => write!(f, "{msg}"),
            Self::Transfer {
                current,
                total: Some(total),
            } => write!(f, "{current}/{total} bytes"),
            Self::Transfer {
                current,
                total: None,
            } => write!(f, "{current} bytes"),
            Self::Item { index, total, name } => write!(f, "{name} ({index}/{total})"),
            Self::Percent(record) => write!(
                f,
                "{}: {}%",
                record.name.as_deref().unwrap_or("-"),
                record.as_i32()
            ),
        }
    }
}

/// Receives progress events. Implementations must be cheap; they are called
/// once per downloaded chunk.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// A poll-able cancellation source, checked at chunk granularity.
pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: ProgressEvent) {}
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Cancellation for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The single conduit every component reports through.
///
/// Cloning is cheap and clones share the sink, the cancellation source and
/// the current item name.
#[derive(Clone)]
pub struct ProgressChannel {
    sink: Arc<dyn ProgressSink>,
    cancel: Arc<dyn Cancellation>,
    current: Arc<Mutex<Option<String>>>,
}

impl ProgressChannel {
    pub fn new(sink: Arc<dyn ProgressSink>, cancel: Arc<dyn Cancellation>) -> Self {
        Self {
            sink,
            cancel,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// A channel that reports nowhere and is never cancelled.
    pub fn silent() -> Self {
        Self::new(Arc::new(NullSink), Arc::new(CancelFlag::new()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self, msg: impl Into<String>) {
        self.sink.report(ProgressEvent::status(msg));
    }

    /// Announce the next batch item and remember its name for percent records.
    pub fn begin_item(&self, index: usize, total: usize, name: &str) {
        *self.lock_current() = Some(name.to_owned());
        self.sink.report(ProgressEvent::Item {
            index,
            total,
            name: name.to_owned(),
        });
    }

    /// Byte progress for the running transfer, mirrored as a percent record.
    pub fn transfer(&self, current: u64, total: Option<u64>) {
        let event = ProgressEvent::transfer(current, total);
        let percent = event.percent();
        self.sink.report(event);
        self.percent(percent);
    }

    /// Explicit completion signal. Independent of the byte loop so that
    /// zero-length transfers still reach 100%.
    pub fn finished(&self) {
        self.percent(Some(100));
    }

    pub fn percent(&self, percent: Option<u8>) {
        let name = self.lock_current().clone();
        self.sink
            .report(ProgressEvent::Percent(SegmentPercent { name, percent }));
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned name slot only loses a label; keep reporting.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("cancelled", &self.is_cancelled())
            .field("current", &*self.lock_current())
            .finish()
    }
}
