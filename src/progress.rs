//! Progress events, sinks and cooperative cancellation.
//!
//! The engine never talks to a UI directly. It reports through an
//! [`EventSink`]: one call per file with a [`FileStatus`], and one progress
//! tick `(current, total)` after each file. Callers that want a stream
//! instead of callbacks can hand the engine a
//! [`crossbeam_channel::Sender<OrganizeEvent>`], which implements the trait.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use crate::organizer::OrganizeOutcome;

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Left in place because it has no extension.
    SkippedNoExtension,
    /// Moved into the named category folder.
    Moved { category: String },
    /// Moved back to its original location by a revert.
    Reverted { restored_to: PathBuf },
    /// Could not be processed.
    Error { message: String },
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedNoExtension => write!(f, "Skipped (no extension)"),
            Self::Moved { category } => write!(f, "Moved to {}", category),
            Self::Reverted { .. } => write!(f, "Reverted successfully"),
            Self::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Receives per-file and progress notifications from the engine.
///
/// Both methods default to no-ops so a sink only implements what it shows.
/// Sinks are called from the worker thread, hence `Send + Sync`.
pub trait EventSink: Send + Sync {
    fn file_processed(&self, _filename: &str, _status: &FileStatus) {}
    fn progress(&self, _current: usize, _total: usize) {}
}

/// Sink that drops everything.
pub struct SilentSink;

impl EventSink for SilentSink {}

/// A message sent from a running organize task to its controller.
#[derive(Debug, Clone)]
pub enum OrganizeEvent {
    /// A file finished processing.
    File { filename: String, status: FileStatus },
    /// `current` of `total` files have been handled.
    Progress { current: usize, total: usize },
    /// The run ended, either completed or stopped. Always the last event of a
    /// run that got past its preconditions.
    Finished(OrganizeOutcome),
    /// The run could not start (bad source or destination root).
    Failed(String),
}

impl EventSink for Sender<OrganizeEvent> {
    fn file_processed(&self, filename: &str, status: &FileStatus) {
        // A dropped receiver means nobody is listening anymore; keep working.
        let _ = self.send(OrganizeEvent::File {
            filename: filename.to_string(),
            status: status.clone(),
        });
    }

    fn progress(&self, current: usize, total: usize) {
        let _ = self.send(OrganizeEvent::Progress { current, total });
    }
}

/// Cooperative stop flag shared between a controller and a worker.
///
/// Cloning yields a handle to the same flag. The engine polls it once per
/// file boundary; a move already in flight always completes.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    /// Creates a signal that has not been stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the current run stop before its next file.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether [`StopSignal::stop`] has been called on any clone.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
