//! Runs an organize on its own thread so the controller stays free to render
//! progress and request a stop.

use std::io;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, unbounded};
use thiserror::Error;
use tracing::debug;

use crate::organizer::{FileOrganizer, OrganizeError, OrganizeOptions, OrganizeOutcome};
use crate::progress::{OrganizeEvent, StopSignal};

/// Errors from running an organize on the worker thread.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not start organize worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("Organize worker panicked")]
    Panicked,

    #[error(transparent)]
    Organize(#[from] OrganizeError),
}

/// Handle to an organize running on a dedicated thread.
///
/// Events arrive on [`OrganizeTask::events`] in order; the channel closes
/// after the terminal [`OrganizeEvent::Finished`] or [`OrganizeEvent::Failed`].
///
/// ```no_run
/// use filesort::organizer::{FileOrganizer, OrganizeOptions};
/// use filesort::progress::{OrganizeEvent, StopSignal};
/// use filesort::worker::OrganizeTask;
///
/// let stop = StopSignal::new();
/// let task = OrganizeTask::spawn(
///     FileOrganizer::default(),
///     "/home/me/Downloads".into(),
///     "/home/me/Sorted".into(),
///     OrganizeOptions::default(),
///     stop.clone(),
/// )
/// .expect("worker thread");
///
/// for event in task.events().iter() {
///     if let OrganizeEvent::Progress { current, total } = event {
///         println!("{current}/{total}");
///     }
/// }
/// let outcome = task.join().expect("organize");
/// println!("{} moved", outcome.result().processed);
/// ```
pub struct OrganizeTask {
    events: Receiver<OrganizeEvent>,
    handle: JoinHandle<Result<OrganizeOutcome, OrganizeError>>,
}

impl OrganizeTask {
    /// Starts organizing `source` into `destination` on a new thread.
    ///
    /// # Arguments
    ///
    /// * `stop` - Checked by the worker before each file; keep a clone to
    ///   stop the run from another thread or a signal handler.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if the thread cannot be created.
    pub fn spawn(
        organizer: FileOrganizer,
        source: PathBuf,
        destination: PathBuf,
        options: OrganizeOptions,
        stop: StopSignal,
    ) -> Result<Self, WorkerError> {
        let (tx, rx) = unbounded();

        let handle = thread::Builder::new()
            .name("filesort-organize".to_string())
            .spawn(move || {
                debug!(source = %source.display(), "Organize worker started");
                let outcome =
                    organizer.organize(&source, &destination, &options, &stop, &tx);

                let terminal = match &outcome {
                    Ok(outcome) => OrganizeEvent::Finished(outcome.clone()),
                    Err(e) => OrganizeEvent::Failed(e.to_string()),
                };
                let _ = tx.send(terminal);
                outcome
            })
            .map_err(WorkerError::Spawn)?;

        Ok(Self { events: rx, handle })
    }

    /// The worker's event stream. Iterating it ends after the terminal event.
    pub fn events(&self) -> &Receiver<OrganizeEvent> {
        &self.events
    }

    /// Waits for the worker and returns its outcome.
    pub fn join(self) -> Result<OrganizeOutcome, WorkerError> {
        match self.handle.join() {
            Ok(result) => result.map_err(WorkerError::from),
            Err(_) => Err(WorkerError::Panicked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryTable;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_task_streams_events_and_finishes() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("src");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.pdf"), "a").unwrap();
        fs::write(source.join("b.jpg"), "b").unwrap();

        let task = OrganizeTask::spawn(
            FileOrganizer::new(CategoryTable::default()),
            source.clone(),
            dir.path().join("dest"),
            OrganizeOptions::default(),
            StopSignal::new(),
        )
        .expect("Failed to spawn worker");

        let events: Vec<_> = task.events().iter().collect();
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                OrganizeEvent::Progress { current, total } => Some((*current, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
        assert!(matches!(events.last(), Some(OrganizeEvent::Finished(_))));

        let outcome = task.join().expect("Organize should succeed");
        assert!(!outcome.is_stopped());
        assert_eq!(outcome.result().processed, 2);
    }

    #[test]
    fn test_task_reports_precondition_failure() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let task = OrganizeTask::spawn(
            FileOrganizer::default(),
            dir.path().join("missing"),
            dir.path().join("dest"),
            OrganizeOptions::default(),
            StopSignal::new(),
        )
        .expect("Failed to spawn worker");

        let events: Vec<_> = task.events().iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], OrganizeEvent::Failed(_)));
        assert!(matches!(
            task.join(),
            Err(WorkerError::Organize(OrganizeError::SourceNotFound { .. }))
        ));
    }

    #[test]
    fn test_stop_leaves_unhandled_files_in_place() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("src");
        fs::create_dir(&source).unwrap();
        for i in 0..50 {
            fs::write(source.join(format!("f{:02}.pdf", i)), "x").unwrap();
        }

        let stop = StopSignal::new();
        let task = OrganizeTask::spawn(
            FileOrganizer::default(),
            source.clone(),
            dir.path().join("dest"),
            OrganizeOptions::default(),
            stop.clone(),
        )
        .expect("Failed to spawn worker");
        stop.stop();

        let outcome = task.join().expect("Organize should succeed");
        let result = outcome.result();
        let left_behind = fs::read_dir(&source).unwrap().count();
        assert_eq!(result.total_files, 50);
        assert_eq!(result.processed + left_behind, 50);
        if outcome.is_stopped() {
            assert!(result.handled() < 50);
        }
    }
}
