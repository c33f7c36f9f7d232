//! filesort - sort the files of a folder into category folders by extension
//!
//! This library classifies files by extension, moves them into per-category
//! folders (optionally under a date folder), resolves name collisions, keeps
//! a move log so a run can be reverted, and reports progress through an
//! [`progress::EventSink`] while supporting cooperative cancellation.

pub mod category;
pub mod cli;
pub mod config;
pub mod history;
pub mod logging;
pub mod organizer;
pub mod output;
pub mod progress;
pub mod worker;

pub use category::{CategoryTable, normalize_extension};
pub use config::{CompiledFilters, ConfigError, FileSortConfig};
pub use history::{HistoryError, MoveHistory};
pub use organizer::{
    DuplicatePolicy, FileOrganizer, MoveRecord, OperationResult, OrganizeError, OrganizeOptions,
    OrganizeOutcome, RevertResult,
};
pub use progress::{EventSink, FileStatus, StopSignal};
pub use worker::OrganizeTask;

pub use cli::{SortCommand, run_cli};
