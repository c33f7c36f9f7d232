//! Command-line interface module for filesort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing with `clap`
//! - Merging flags over the loaded configuration
//! - Running the organize worker and rendering its events
//! - Dry runs and reverting the last run from its history file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use crossbeam_channel::Receiver;
use thiserror::Error;
use tracing::warn;

use crate::config::{ConfigError, FileSortConfig};
use crate::history::{HISTORY_FILE, HistoryError, MoveHistory};
use crate::organizer::{
    FileOrganizer, OperationResult, OrganizeError, OrganizeOptions, absolute_root,
};
use crate::output::{OutputFormatter, ProgressBarSink};
use crate::progress::{EventSink, OrganizeEvent, StopSignal};
use crate::worker::{OrganizeTask, WorkerError};

/// Sort files into category folders by extension.
#[derive(Debug, Clone, Parser)]
#[command(name = "filesort", version, about)]
pub struct Cli {
    /// Folder to organize (defaults to the current directory)
    pub source: Option<PathBuf>,

    /// Folder that receives the category folders (defaults to the source)
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Descend into subfolders of the source
    #[arg(short, long, overrides_with = "no_recursive")]
    pub recursive: bool,

    /// Only organize direct children of the source
    #[arg(long)]
    pub no_recursive: bool,

    /// Add a YYYY-MM-DD folder under each category
    #[arg(long)]
    pub date_folders: bool,

    /// Send name collisions to a duplicates/ folder instead of renaming them
    #[arg(long)]
    pub skip_duplicates: bool,

    /// Also move files that have no extension (into Misc)
    #[arg(long)]
    pub keep_no_extension: bool,

    /// Show where files would go without moving anything
    #[arg(long, conflicts_with = "undo")]
    pub dry_run: bool,

    /// Move the files of the last run back where they came from
    #[arg(long)]
    pub undo: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print only the summary, not one line per file
    #[arg(short, long)]
    pub quiet: bool,

    /// Log engine activity at the configured log level
    #[arg(short, long)]
    pub verbose: bool,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCommand {
    Organize { dry_run: bool },
    Undo,
}

impl Cli {
    /// The command selected by `--undo` / `--dry-run`.
    pub fn command(&self) -> SortCommand {
        if self.undo {
            SortCommand::Undo
        } else {
            SortCommand::Organize {
                dry_run: self.dry_run,
            }
        }
    }

    /// Source folder, defaulting to the current directory.
    pub fn source_dir(&self) -> PathBuf {
        self.source.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Destination folder, defaulting to the source folder.
    pub fn dest_dir(&self) -> PathBuf {
        self.dest.clone().unwrap_or_else(|| self.source_dir())
    }

    /// Applies command-line flags on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut FileSortConfig) {
        let settings = &mut config.settings;
        if self.recursive {
            settings.recursive = true;
        }
        if self.no_recursive {
            settings.recursive = false;
        }
        if self.date_folders {
            settings.create_date_folders = true;
        }
        if self.skip_duplicates {
            settings.skip_duplicates = true;
        }
        if self.keep_no_extension {
            settings.skip_no_extension = false;
        }
    }

    /// Tracing filter for this invocation.
    pub fn log_level<'a>(&self, config: &'a FileSortConfig) -> &'a str {
        if self.quiet {
            "error"
        } else if self.verbose {
            &config.settings.log_level
        } else {
            "warn"
        }
    }
}

/// Errors surfaced to the user by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Error loading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Organize(#[from] OrganizeError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("No previous organization found to undo in {}", .0.display())]
    NothingToUndo(PathBuf),
}

/// Runs a command against an already-loaded configuration.
///
/// # Arguments
///
/// * `command` - What to do
/// * `source` - Folder whose files get organized
/// * `dest` - Folder that receives the category folders and the history file
/// * `config` - Settings, category table and filters
/// * `quiet` - Suppress per-file lines
/// * `stop` - Stops an organize at the next file boundary when set
///
/// # Examples
///
/// ```no_run
/// use filesort::cli::{run_cli, SortCommand};
/// use filesort::config::FileSortConfig;
/// use filesort::progress::StopSignal;
/// use std::path::Path;
///
/// let config = FileSortConfig::default();
/// let result = run_cli(
///     SortCommand::Organize { dry_run: false },
///     Path::new("/home/me/Downloads"),
///     Path::new("/home/me/Sorted"),
///     &config,
///     false,
///     &StopSignal::new(),
/// );
/// if let Err(e) = result {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(
    command: SortCommand,
    source: &Path,
    dest: &Path,
    config: &FileSortConfig,
    quiet: bool,
    stop: &StopSignal,
) -> Result<(), CliError> {
    match command {
        SortCommand::Organize { dry_run: true } => preview_directory(source, dest, config),
        SortCommand::Organize { dry_run: false } => {
            organize_directory(source, dest, config, quiet, stop).map(|_| ())
        }
        SortCommand::Undo => undo_organization(dest, quiet),
    }
}

/// Organize options from the configuration, with the history file excluded.
fn options_for(config: &FileSortConfig) -> Result<OrganizeOptions, CliError> {
    let mut options = config.organize_options()?;
    options
        .filters
        .get_or_insert_with(Default::default)
        .exclude_filename(HISTORY_FILE);
    Ok(options)
}

/// Organizes `source` into `dest` on a worker thread and saves the move log.
///
/// Both roots are made absolute first, so the saved log can be reverted from
/// any working directory. A stopped run still saves the moves it made.
/// Returns the run's result so callers can inspect it.
pub fn organize_directory(
    source: &Path,
    dest: &Path,
    config: &FileSortConfig,
    quiet: bool,
    stop: &StopSignal,
) -> Result<OperationResult, CliError> {
    let source = &absolute_root(source)?;
    let dest = &absolute_root(dest)?;
    let options = options_for(config)?;
    OutputFormatter::info(&format!(
        "Organizing {} into {}",
        source.display(),
        dest.display()
    ));

    let task = OrganizeTask::spawn(
        FileOrganizer::new(config.categories.clone()),
        source.to_path_buf(),
        dest.to_path_buf(),
        options,
        stop.clone(),
    )?;

    // Length is set by the first progress event.
    let bar = ProgressBarSink::new(0, !quiet);
    relay_events(task.events(), &bar);
    bar.finish("done");

    let outcome = task.join()?;
    let stopped = outcome.is_stopped();
    let result = outcome.result();

    OutputFormatter::organize_summary(result, stopped);
    if !result.moves.is_empty() {
        OutputFormatter::summary_table(&category_counts(result, dest), result.processed);
        MoveHistory::from_outcome(source, dest, &outcome).save(dest)?;
        OutputFormatter::success(&format!(
            "History saved. Run 'filesort {} --dest {} --undo' to revert.",
            source.display(),
            dest.display()
        ));
    }

    Ok(outcome.into_result())
}

/// Forwards worker events to `sink` until the terminal event.
fn relay_events(events: &Receiver<OrganizeEvent>, sink: &dyn EventSink) {
    for event in events.iter() {
        match event {
            OrganizeEvent::File { filename, status } => sink.file_processed(&filename, &status),
            OrganizeEvent::Progress { current, total } => sink.progress(current, total),
            OrganizeEvent::Finished(_) | OrganizeEvent::Failed(_) => break,
        }
    }
}

/// Counts moved files by the top-level folder they landed in.
fn category_counts(result: &OperationResult, dest: &Path) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in &result.moves {
        let category = record
            .destination_path
            .strip_prefix(dest)
            .ok()
            .and_then(|relative| relative.components().next())
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_default();
        *counts.entry(category).or_insert(0) += 1;
    }
    counts
}

/// Prints where each file would go without moving anything.
pub fn preview_directory(
    source: &Path,
    dest: &Path,
    config: &FileSortConfig,
) -> Result<(), CliError> {
    let source = &absolute_root(source)?;
    let dest = &absolute_root(dest)?;
    let options = options_for(config)?;
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of {}", source.display()));

    let preview = FileOrganizer::new(config.categories.clone()).preview(source, dest, &options)?;
    if preview.total_files == 0 {
        OutputFormatter::plain("No files found to organize.");
        return Ok(());
    }

    for planned in &preview.planned {
        let target = planned
            .destination
            .strip_prefix(dest)
            .unwrap_or(&planned.destination);
        OutputFormatter::plain(&format!(
            " - {} → {}",
            planned.source.display(),
            target.display()
        ));
    }
    for skipped in &preview.skipped {
        OutputFormatter::warning(&format!("{}: Skipped (no extension)", skipped.display()));
    }

    OutputFormatter::summary_table(&preview.category_counts(), preview.planned.len());
    OutputFormatter::success("Dry run complete. No files were modified.");
    Ok(())
}

/// Reverts the run recorded in `dest`'s history file, then deletes the file.
fn undo_organization(dest: &Path, quiet: bool) -> Result<(), CliError> {
    let history =
        MoveHistory::load(dest)?.ok_or_else(|| CliError::NothingToUndo(dest.to_path_buf()))?;
    OutputFormatter::info(&format!(
        "Reverting {} moves from {}",
        history.moves.len(),
        history.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let moves = history.into_moves();
    let sink = ProgressBarSink::new(moves.len(), !quiet);
    let result = FileOrganizer::revert(moves, &sink);
    sink.finish("done");

    // The log is single use, whatever the per-entry outcomes were.
    if let Err(e) = MoveHistory::delete(dest) {
        warn!(error = %e, "Could not delete history file");
        OutputFormatter::warning(&format!("Could not delete history file: {}", e));
    }

    OutputFormatter::revert_summary(&result);
    Ok(())
}
