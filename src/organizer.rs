//! The organize engine: enumerate a source tree, sort every file into a
//! category folder under the destination, and undo that from the move log.
//!
//! Files are handled strictly one at a time in enumeration order. A failure on
//! one file is recorded in the [`OperationResult`] and never aborts the run;
//! only bad root paths are reported as an [`OrganizeError`], before any file
//! is touched.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::category::{CategoryTable, DUPLICATES_CATEGORY};
use crate::config::CompiledFilters;
use crate::progress::{EventSink, FileStatus, StopSignal};

/// What to do when a file's destination is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Send the file to `<destination>/duplicates/` instead.
    Quarantine,
    /// Keep the category folder and add a `_N` suffix to the name.
    #[default]
    RenameUnique,
}

/// Options for one organize run.
#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    /// Descend into subdirectories of the source root.
    pub recursive: bool,
    /// Put files under `<category>/YYYY-MM-DD/` (local date).
    pub create_date_folders: bool,
    pub duplicate_policy: DuplicatePolicy,
    /// Leave files without an extension in place and count them as skipped.
    pub skip_no_extension: bool,
    /// Files rejected here are never enumerated, so they are not counted.
    pub filters: Option<CompiledFilters>,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            create_date_folders: false,
            duplicate_policy: DuplicatePolicy::RenameUnique,
            skip_no_extension: true,
            filters: None,
        }
    }
}

/// One successfully moved file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub filename: String,
}

/// Summary of an organize run, including the log needed to revert it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResult {
    /// Number of files enumerated before processing started.
    pub total_files: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Category folders that received at least one file.
    pub categories_touched: BTreeSet<String>,
    /// `"Failed to move <filename>: <cause>"`, in processing order.
    pub error_messages: Vec<String>,
    /// Moves in processing order. Hand these to [`FileOrganizer::revert`].
    pub moves: Vec<MoveRecord>,
}

impl OperationResult {
    /// Files handled so far, whatever the outcome.
    pub fn handled(&self) -> usize {
        self.processed + self.skipped + self.errors
    }

    /// Whether any file failed to move.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// How an organize run ended once it got past its preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizeOutcome {
    /// Every enumerated file was handled.
    Completed(OperationResult),
    /// The stop signal was observed; holds whatever was done before that.
    Stopped(OperationResult),
}

impl OrganizeOutcome {
    /// The accumulated result, whether the run completed or stopped.
    pub fn result(&self) -> &OperationResult {
        match self {
            Self::Completed(result) | Self::Stopped(result) => result,
        }
    }

    /// Consumes the outcome, yielding its result.
    pub fn into_result(self) -> OperationResult {
        match self {
            Self::Completed(result) | Self::Stopped(result) => result,
        }
    }

    /// True if the run ended early because a stop was requested.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }
}

/// Failures that prevent a run from starting.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Source folder does not exist: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Source is not a folder: {}", path.display())]
    SourceNotDirectory { path: PathBuf },

    #[error("Cannot resolve {} to an absolute path: {source}", path.display())]
    RootUnresolvable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot create destination folder {}: {source}", path.display())]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for organize operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Per-entry outcome of a revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertOutcome {
    /// Moved back; `restored_to` differs from the original path when that
    /// path had been taken in the meantime.
    Reverted { restored_to: PathBuf },
    /// The organized copy was no longer where the log said it was.
    Missing { expected_at: PathBuf },
    Failed { message: String },
}

impl fmt::Display for RevertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reverted { restored_to } => write!(f, "Reverted to {}", restored_to.display()),
            Self::Missing { expected_at } => {
                write!(f, "File not found at {}", expected_at.display())
            }
            Self::Failed { message } => write!(f, "{}", message),
        }
    }
}

/// Outcome of reverting one move record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertEntry {
    pub filename: String,
    pub outcome: RevertOutcome,
}

/// Summary of a revert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevertResult {
    pub reverted: usize,
    pub errors: usize,
    /// One entry per move record, in log order.
    pub per_file: Vec<RevertEntry>,
}

impl RevertResult {
    pub fn is_complete_success(&self) -> bool {
        self.errors == 0
    }
}

/// A move the organizer would make, as computed by [`FileOrganizer::preview`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: String,
}

/// Dry-run result: where every file would go, and which ones would be skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    pub total_files: usize,
    pub planned: Vec<PlannedMove>,
    pub skipped: Vec<PathBuf>,
}

impl Preview {
    /// Number of planned files per category.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for planned in &self.planned {
            *counts.entry(planned.category.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Sorts files into category folders using an explicit [`CategoryTable`].
#[derive(Debug, Clone, Default)]
pub struct FileOrganizer {
    categories: CategoryTable,
}

impl FileOrganizer {
    /// Creates an organizer that classifies with `categories`.
    ///
    /// # Arguments
    ///
    /// * `categories` - Table consulted for every file; nothing global is read
    ///
    /// # Example
    ///
    /// ```
    /// use filesort::category::CategoryTable;
    /// use filesort::organizer::FileOrganizer;
    ///
    /// let mut table = CategoryTable::empty();
    /// table.add_extensions("Books", [".epub"]);
    /// let organizer = FileOrganizer::new(table);
    /// assert_eq!(organizer.categories().classify(".epub"), "Books");
    /// ```
    pub fn new(categories: CategoryTable) -> Self {
        Self { categories }
    }

    /// The category table this organizer classifies with.
    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// Organizes every file under `source_root` into `destination_root`.
    ///
    /// The source is enumerated once up front; that list fixes
    /// `total_files` and the processing order. `stop` is checked before each
    /// file. Per-file failures end up in the returned result, never in `Err`.
    ///
    /// # Errors
    ///
    /// Fails before touching any file if the source root is missing or not a
    /// directory, or if the destination root cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use filesort::category::CategoryTable;
    /// use filesort::organizer::{FileOrganizer, OrganizeOptions};
    /// use filesort::progress::{SilentSink, StopSignal};
    /// use std::path::Path;
    ///
    /// let organizer = FileOrganizer::new(CategoryTable::default());
    /// let outcome = organizer.organize(
    ///     Path::new("/home/me/Downloads"),
    ///     Path::new("/home/me/Sorted"),
    ///     &OrganizeOptions::default(),
    ///     &StopSignal::new(),
    ///     &SilentSink,
    /// );
    ///
    /// match outcome {
    ///     Ok(outcome) => println!("Moved {} files", outcome.result().processed),
    ///     Err(e) => eprintln!("Organization failed: {}", e),
    /// }
    /// ```
    pub fn organize(
        &self,
        source_root: &Path,
        destination_root: &Path,
        options: &OrganizeOptions,
        stop: &StopSignal,
        sink: &dyn EventSink,
    ) -> OrganizeResult<OrganizeOutcome> {
        check_source(source_root)?;
        let source_root = &absolute_root(source_root)?;
        let destination_root = &absolute_root(destination_root)?;
        fs::create_dir_all(destination_root).map_err(|source| {
            OrganizeError::DestinationUnavailable {
                path: destination_root.to_path_buf(),
                source,
            }
        })?;

        let files = collect_files(source_root, options);
        let total = files.len();
        let today = today_folder();
        info!(
            source = %source_root.display(),
            destination = %destination_root.display(),
            categories = self.categories.len(),
            total,
            "Starting organize"
        );

        let mut result = OperationResult {
            total_files: total,
            ..Default::default()
        };

        for (index, path) in files.iter().enumerate() {
            if stop.is_stopped() {
                info!(handled = index, total, "Organize stopped");
                return Ok(OrganizeOutcome::Stopped(result));
            }

            self.process_file(path, destination_root, options, &today, &mut result, sink);
            sink.progress(index + 1, total);
        }

        info!(
            processed = result.processed,
            skipped = result.skipped,
            errors = result.errors,
            "Organize complete"
        );
        Ok(OrganizeOutcome::Completed(result))
    }

    /// Handles one file: skip, or resolve a destination and move it.
    fn process_file(
        &self,
        path: &Path,
        destination_root: &Path,
        options: &OrganizeOptions,
        today: &str,
        result: &mut OperationResult,
        sink: &dyn EventSink,
    ) {
        let filename = file_name_of(path);
        let extension = extension_of(path);

        if extension.is_none() && options.skip_no_extension {
            result.skipped += 1;
            info!(path = %path.display(), "Skipped file (no extension)");
            sink.file_processed(&filename, &FileStatus::SkippedNoExtension);
            return;
        }

        let category = self.categories.classify(extension.as_deref().unwrap_or(""));
        let (destination, category) = resolve_destination(
            destination_root,
            &filename,
            category,
            options,
            today,
            path_occupied,
        );

        match move_file(path, &destination) {
            Ok(()) => {
                info!(
                    source = %path.display(),
                    destination = %destination.display(),
                    "Moved file"
                );
                sink.file_processed(
                    &filename,
                    &FileStatus::Moved {
                        category: category.clone(),
                    },
                );
                result.moves.push(MoveRecord {
                    source_path: path.to_path_buf(),
                    destination_path: destination,
                    filename,
                });
                result.processed += 1;
                result.categories_touched.insert(category);
            }
            Err(e) => {
                let message = format!("Failed to move {}: {}", filename, e);
                error!("{}", message);
                sink.file_processed(
                    &filename,
                    &FileStatus::Error {
                        message: e.to_string(),
                    },
                );
                result.errors += 1;
                result.error_messages.push(message);
            }
        }
    }

    /// Computes where every file would go without touching the filesystem.
    ///
    /// Files that would collide with each other inside the same run are
    /// resolved as if the earlier ones had already been moved.
    pub fn preview(
        &self,
        source_root: &Path,
        destination_root: &Path,
        options: &OrganizeOptions,
    ) -> OrganizeResult<Preview> {
        check_source(source_root)?;
        let source_root = &absolute_root(source_root)?;
        let destination_root = &absolute_root(destination_root)?;

        let files = collect_files(source_root, options);
        let today = today_folder();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut preview = Preview {
            total_files: files.len(),
            ..Default::default()
        };

        for path in files {
            let extension = extension_of(&path);
            if extension.is_none() && options.skip_no_extension {
                preview.skipped.push(path);
                continue;
            }

            let filename = file_name_of(&path);
            let category = self.categories.classify(extension.as_deref().unwrap_or(""));
            let (destination, category) = resolve_destination(
                destination_root,
                &filename,
                category,
                options,
                &today,
                |candidate: &Path| path_occupied(candidate) || claimed.contains(candidate),
            );

            claimed.insert(destination.clone());
            preview.planned.push(PlannedMove {
                source: path,
                destination,
                category,
            });
        }

        Ok(preview)
    }

    /// Moves every logged file back to where it came from.
    ///
    /// Consumes the log: each record is attempted exactly once, in order, and
    /// a failed entry never stops the rest. If the original path has been
    /// taken since, the file comes back under a `_N` name next to it.
    pub fn revert(moves: Vec<MoveRecord>, sink: &dyn EventSink) -> RevertResult {
        let total = moves.len();
        let mut result = RevertResult::default();

        for (index, record) in moves.into_iter().enumerate() {
            let outcome = revert_one(&record);

            match &outcome {
                RevertOutcome::Reverted { restored_to } => {
                    result.reverted += 1;
                    info!(
                        from = %record.destination_path.display(),
                        to = %restored_to.display(),
                        "Reverted file"
                    );
                    sink.file_processed(
                        &record.filename,
                        &FileStatus::Reverted {
                            restored_to: restored_to.clone(),
                        },
                    );
                }
                RevertOutcome::Missing { .. } | RevertOutcome::Failed { .. } => {
                    result.errors += 1;
                    warn!(file = %record.filename, reason = %outcome, "Could not revert file");
                    sink.file_processed(
                        &record.filename,
                        &FileStatus::Error {
                            message: outcome.to_string(),
                        },
                    );
                }
            }

            result.per_file.push(RevertEntry {
                filename: record.filename,
                outcome,
            });
            sink.progress(index + 1, total);
        }

        result
    }
}

fn revert_one(record: &MoveRecord) -> RevertOutcome {
    if !path_occupied(&record.destination_path) {
        return RevertOutcome::Missing {
            expected_at: record.destination_path.clone(),
        };
    }

    let target = unique_path(&record.source_path);
    match move_file(&record.destination_path, &target) {
        Ok(()) => RevertOutcome::Reverted {
            restored_to: target,
        },
        Err(e) => RevertOutcome::Failed {
            message: format!("Failed to revert {}: {}", record.filename, e),
        },
    }
}

/// Lists the files under `source_root`.
///
/// Non-recursive walks only look at direct children. Entries come back sorted
/// by name within each directory, so two walks of an unchanged tree agree.
/// Unreadable directories are logged and skipped. Calling this again starts a
/// fresh walk. Paths come back absolute, even for a relative `source_root`.
pub fn enumerate_files(source_root: &Path, recursive: bool) -> impl Iterator<Item = PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let root = std::path::absolute(source_root).unwrap_or_else(|_| source_root.to_path_buf());

    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(
                    path = ?err.path(),
                    error = %err,
                    "Skipping unreadable directory entry"
                );
                None
            }
        })
        .filter(is_file_entry)
        .map(DirEntry::into_path)
}

/// Regular files and symlinks to anything but a directory.
fn is_file_entry(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return false;
    }
    !(file_type.is_symlink() && entry.path().is_dir())
}

fn collect_files(source_root: &Path, options: &OrganizeOptions) -> Vec<PathBuf> {
    enumerate_files(source_root, options.recursive)
        .filter(|path| match &options.filters {
            Some(filters) => {
                let relative = path.strip_prefix(source_root).unwrap_or(path);
                filters.should_include(relative)
            }
            None => true,
        })
        .collect()
}

/// `path` joined onto the working directory when relative, so logged moves
/// stay valid from anywhere.
///
/// # Errors
///
/// Returns [`OrganizeError::RootUnresolvable`] if the working directory
/// cannot be read.
pub fn absolute_root(path: &Path) -> OrganizeResult<PathBuf> {
    std::path::absolute(path).map_err(|source| OrganizeError::RootUnresolvable {
        path: path.to_path_buf(),
        source,
    })
}

fn check_source(source_root: &Path) -> OrganizeResult<()> {
    if !source_root.exists() {
        return Err(OrganizeError::SourceNotFound {
            path: source_root.to_path_buf(),
        });
    }
    if !source_root.is_dir() {
        return Err(OrganizeError::SourceNotDirectory {
            path: source_root.to_path_buf(),
        });
    }
    Ok(())
}

/// Picks the final destination and the category it is reported under.
fn resolve_destination<F>(
    destination_root: &Path,
    filename: &str,
    category: &str,
    options: &OrganizeOptions,
    today: &str,
    is_taken: F,
) -> (PathBuf, String)
where
    F: Fn(&Path) -> bool,
{
    let mut base = destination_root.join(category);
    if options.create_date_folders {
        base.push(today);
    }

    let candidate = base.join(filename);
    if !is_taken(&candidate) {
        return (candidate, category.to_string());
    }

    match options.duplicate_policy {
        DuplicatePolicy::Quarantine => {
            let quarantined = destination_root.join(DUPLICATES_CATEGORY).join(filename);
            (
                unique_path_with(&quarantined, &is_taken),
                DUPLICATES_CATEGORY.to_string(),
            )
        }
        DuplicatePolicy::RenameUnique => (
            unique_path_with(&candidate, &is_taken),
            category.to_string(),
        ),
    }
}

/// Returns `path` if nothing exists there, otherwise the first free
/// `<stem>_<n>.<ext>` next to it, counting from 1.
///
/// # Examples
///
/// ```
/// use filesort::organizer::unique_path;
/// use std::path::Path;
///
/// let free = Path::new("/definitely/not/here/report.pdf");
/// assert_eq!(unique_path(free), free);
/// ```
pub fn unique_path(path: &Path) -> PathBuf {
    unique_path_with(path, path_occupied)
}

fn unique_path_with<F>(path: &Path, is_taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    if !is_taken(path) {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter: u64 = 1;
    loop {
        let name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = parent.join(name);
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// True if anything, including a dangling symlink, sits at `path`.
fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Creates the parent directories of `to`, then renames `from` onto it.
///
/// Falls back to copy and delete when the rename would cross filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to),
        Err(e) => Err(e),
    }
}

/// Copies `from` to `to` keeping its modification time, then deletes `from`.
///
/// If `from` cannot be deleted the copy is removed again, so a failed move
/// never leaves the file in two places.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;

    let finish = || -> io::Result<()> {
        if let Ok(modified) = fs::metadata(from).and_then(|meta| meta.modified()) {
            fs::File::options().write(true).open(to)?.set_modified(modified)?;
        }
        fs::remove_file(from)
    };

    finish().inspect_err(|_| {
        if let Err(cleanup) = fs::remove_file(to) {
            warn!(path = %to.display(), error = %cleanup, "Could not remove partial copy");
        }
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The text after the last `.` of the file name, if there is any.
///
/// Dot-files like `.bashrc` and names ending in `.` have no extension.
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|e| !e.is_empty())
}

fn today_folder() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
