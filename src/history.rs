//! Persisted move log, so an organize can be reverted by a later invocation.
//!
//! The log lives in the destination root as `.filesort_history.json` and holds
//! exactly one run. It is single use: the CLI deletes it after reverting,
//! whether or not every entry came back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::organizer::{MoveRecord, OrganizeOutcome};

/// File name of the move log inside the destination root.
pub const HISTORY_FILE: &str = ".filesort_history.json";

/// Errors reading, writing or parsing the history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to write history file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read history file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid history file format in {}: {source}", path.display())]
    InvalidFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Counts from the run that produced a history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_files: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub stopped: bool,
    pub categories: Vec<String>,
}

/// One organize run, as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveHistory {
    pub timestamp: DateTime<Utc>,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub summary: RunSummary,
    pub moves: Vec<MoveRecord>,
}

impl MoveHistory {
    /// Captures a finished run.
    pub fn from_outcome(
        source_root: &Path,
        destination_root: &Path,
        outcome: &OrganizeOutcome,
    ) -> Self {
        let result = outcome.result();
        Self {
            timestamp: Utc::now(),
            source_root: source_root.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
            summary: RunSummary {
                total_files: result.total_files,
                processed: result.processed,
                skipped: result.skipped,
                errors: result.errors,
                stopped: outcome.is_stopped(),
                categories: result.categories_touched.iter().cloned().collect(),
            },
            moves: result.moves.clone(),
        }
    }

    /// Path of the history file for a destination root.
    pub fn history_file_path(destination_root: &Path) -> PathBuf {
        destination_root.join(HISTORY_FILE)
    }

    /// Writes this run to the destination root, replacing any older log.
    pub fn save(&self, destination_root: &Path) -> Result<(), HistoryError> {
        let path = Self::history_file_path(destination_root);
        let json =
            serde_json::to_string_pretty(self).map_err(|source| HistoryError::InvalidFormat {
                path: path.clone(),
                source,
            })?;

        fs::write(&path, json).map_err(|source| HistoryError::Write { path, source })
    }

    /// Loads the log for a destination root; `None` if there is none.
    pub fn load(destination_root: &Path) -> Result<Option<Self>, HistoryError> {
        let path = Self::history_file_path(destination_root);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(|source| HistoryError::Read {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| HistoryError::InvalidFormat { path, source })
    }

    /// Removes the log for a destination root, if present.
    pub fn delete(destination_root: &Path) -> Result<(), HistoryError> {
        let path = Self::history_file_path(destination_root);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| HistoryError::Write { path, source })?;
        }
        Ok(())
    }

    /// Consumes the history, yielding its move records in the order they
    /// were made.
    pub fn into_moves(self) -> Vec<MoveRecord> {
        self.moves
    }
}
