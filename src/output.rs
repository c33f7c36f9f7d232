//! Console rendering for the CLI.
//!
//! Everything the CLI prints goes through here: coloured status lines, the
//! progress bar, and the end-of-run summaries.

use std::collections::BTreeMap;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::organizer::{OperationResult, RevertOutcome, RevertResult};
use crate::progress::{EventSink, FileStatus};

/// How many error messages the organize summary lists before truncating.
const MAX_LISTED_ERRORS: usize = 5;

/// Prints every user-facing line of the CLI. Diagnostics go through
/// `tracing` instead.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Errors go to stderr so they survive `> out.txt`.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Prints a warning in yellow.
    pub fn warning(message: &str) {
        println!("{} {}", "!".yellow().bold(), message.yellow());
    }

    /// Prints an informational message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a bold section header preceded by a blank line.
    pub fn header(title: &str) {
        println!("\n{}", title.bold().underline());
    }

    /// Prints a message tagged as a dry run.
    pub fn dry_run_notice(message: &str) {
        println!("{} {}", "[dry run]".yellow().bold(), message);
    }

    /// Progress bar over `total` files, with the current file name as message.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let style = ProgressStyle::with_template(
            "{spinner:.green} {pos:>5}/{len:5} [{bar:40.green/white}] {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        ProgressBar::new(total).with_style(style)
    }

    /// Renders one per-file status line, coloured by outcome.
    pub fn file_line(filename: &str, status: &FileStatus) -> String {
        let status_text = status.to_string();
        let styled = match status {
            FileStatus::Moved { .. } | FileStatus::Reverted { .. } => status_text.green(),
            FileStatus::SkippedNoExtension => status_text.yellow(),
            FileStatus::Error { .. } => status_text.red(),
        };
        format!("{}: {}", filename, styled)
    }

    /// Prints the end-of-run counts and up to five error messages.
    pub fn organize_summary(result: &OperationResult, stopped: bool) {
        if stopped {
            Self::header("ORGANIZATION STOPPED");
        } else {
            Self::header("ORGANIZATION COMPLETE");
        }
        println!("Total files: {}", result.total_files);
        println!("Processed:   {}", result.processed.to_string().green());
        println!("Skipped:     {}", result.skipped.to_string().yellow());
        println!("Errors:      {}", result.errors.to_string().red());

        if result.has_errors() {
            Self::header("Errors");
            for message in result.error_messages.iter().take(MAX_LISTED_ERRORS) {
                Self::error(message);
            }
            if result.error_messages.len() > MAX_LISTED_ERRORS {
                println!(
                    "... and {} more errors",
                    result.error_messages.len() - MAX_LISTED_ERRORS
                );
            }
        }
    }

    /// Prints the revert counts and every entry that did not come back.
    pub fn revert_summary(result: &RevertResult) {
        Self::header("REVERT COMPLETE");
        println!("Reverted: {}", result.reverted.to_string().green());
        println!("Errors:   {}", result.errors.to_string().red());

        for entry in &result.per_file {
            if !matches!(entry.outcome, RevertOutcome::Reverted { .. }) {
                Self::error(&format!("{}: {}", entry.filename, entry.outcome));
            }
        }
    }

    /// Prints how many files went to each category, then the total.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("By category");

        let width = category_counts
            .keys()
            .map(String::len)
            .chain(std::iter::once("Category".len()))
            .max()
            .unwrap_or_default();
        let rule = "=".repeat(width + 14);

        println!("{:<width$}  {:>6}", "Category".bold(), "Files".bold());
        println!("{}", rule);
        for (category, count) in category_counts {
            println!("{:<width$}  {:>6} {}", category, count, plural_files(*count));
        }
        println!("{}", rule);
        println!(
            "{:<width$}  {:>6} {}",
            "Total".bold(),
            total_files.to_string().bold(),
            plural_files(total_files)
        );
    }
}

fn plural_files(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// [`EventSink`] that drives a progress bar and prints per-file lines above it.
pub struct ProgressBarSink {
    bar: ProgressBar,
    show_files: bool,
}

impl ProgressBarSink {
    /// Creates the sink and its bar.
    ///
    /// # Arguments
    ///
    /// * `total` - Initial bar length; progress events overwrite it
    /// * `show_files` - Print a status line per file above the bar
    pub fn new(total: usize, show_files: bool) -> Self {
        Self {
            bar: OutputFormatter::create_progress_bar(total as u64),
            show_files,
        }
    }

    /// Stops the bar, leaving `message` in place of the current file name.
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl EventSink for ProgressBarSink {
    fn file_processed(&self, filename: &str, status: &FileStatus) {
        self.bar.set_message(filename.to_string());
        if self.show_files {
            self.bar.println(OutputFormatter::file_line(filename, status));
        }
    }

    fn progress(&self, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
    }
}
