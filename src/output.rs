//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status lines,
//! the progress bar, and the plan, execution and restore reports. Library
//! code never prints; everything user-facing goes through here.

use crate::backup::{BackupInfo, RestoreResult};
use crate::executor::OrganizeResult;
use crate::plan::{Plan, SkipReason};
use crate::progress::{Phase, ProgressUpdate};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Entries shown per category in a preview before the rest are summarized.
const PREVIEW_LIMIT: usize = 10;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for long operations
/// - Preview and summary reports
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for a batch of `total` entries.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Creates a spinner for work of unknown size, such as a scan.
    pub fn create_spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb
    }

    /// Applies a worker update to a bar created by this module.
    pub fn apply_progress(pb: &ProgressBar, update: &ProgressUpdate) {
        if let Some(total) = update.total {
            pb.set_length(total as u64);
        }
        pb.set_position(update.current as u64);
        let verb = match update.phase {
            Phase::Scanning => "Scanning",
            Phase::Moving => "Moving",
            Phase::Restoring => "Restoring",
        };
        pb.set_message(format!("{} {}", verb, update.name));
    }

    /// Prints the planned moves grouped by category, then the skip summary.
    pub fn plan_preview(plan: &Plan) {
        Self::header(&format!(
            "PREVIEW: {} ({})",
            plan.root.display(),
            plan.options.sort_mode
        ));

        if plan.is_empty() {
            Self::info("Nothing to organize.");
        }

        for (category, moves) in plan.moves_by_category() {
            println!(
                "\n{} {}",
                category.bold(),
                format!("({})", Self::count_word(moves.len(), "file")).dimmed()
            );
            for file_move in moves.iter().take(PREVIEW_LIMIT) {
                println!(
                    "  {} → {}",
                    Self::relative(&plan.root, &file_move.source),
                    Self::relative(&plan.root, &file_move.destination).green()
                );
            }
            if moves.len() > PREVIEW_LIMIT {
                println!("  ... and {} more", moves.len() - PREVIEW_LIMIT);
            }
        }

        if !plan.folder_moves.is_empty() {
            println!(
                "\n{} {}",
                "Folders".bold(),
                format!("({})", Self::count_word(plan.folder_moves.len(), "folder")).dimmed()
            );
            for folder_move in plan.folder_moves.iter().take(PREVIEW_LIMIT) {
                println!(
                    "  {} → {}",
                    Self::relative(&plan.root, &folder_move.source),
                    Self::relative(&plan.root, &folder_move.destination).green()
                );
            }
            if plan.folder_moves.len() > PREVIEW_LIMIT {
                println!("  ... and {} more", plan.folder_moves.len() - PREVIEW_LIMIT);
            }
        }

        Self::skip_summary(plan);
        println!(
            "\nTotal: {} to move, {} skipped",
            plan.total_moves().to_string().green().bold(),
            plan.skipped.len()
        );
    }

    /// Prints how many entries were skipped for each reason.
    pub fn skip_summary(plan: &Plan) {
        let counts = plan.skip_counts();
        if counts.is_empty() {
            return;
        }

        Self::header("SKIPPED");
        let mut reasons: Vec<(SkipReason, usize)> = counts.into_iter().collect();
        reasons.sort_by_key(|&(reason, _)| reason.description());
        for (reason, count) in reasons {
            println!("  {:<28} {}", reason.description(), count.to_string().yellow());
        }
    }

    /// Prints the outcome of an execution.
    pub fn organize_summary(result: &OrganizeResult) {
        Self::header("SUMMARY");
        println!("  Moved:         {}", result.moved().to_string().green());
        println!("  Skipped:       {}", result.skipped());
        println!("  Failed:        {}", result.failed().to_string().red());
        if result.not_attempted > 0 {
            println!("  Not attempted: {}", result.not_attempted);
        }
        if !result.removed_folders.is_empty() {
            println!("  Empty folders removed: {}", result.removed_folders.len());
        }

        for failure in &result.failures {
            Self::error(&format!("{}: {}", failure.source.display(), failure.error));
        }
        for failure in &result.cleanup_failures {
            Self::warning(&format!(
                "Could not remove {}: {}",
                failure.path.display(),
                failure.error
            ));
        }
        if result.cancelled {
            Self::warning("Cancelled before all moves were attempted.");
        }
        if let Some(reason) = &result.fatal {
            Self::error(&format!("Aborted: {}", reason));
        }
    }

    /// Prints the outcome of a restore.
    pub fn restore_summary(result: &RestoreResult) {
        Self::header("RESTORE");
        println!("  Restored: {}", result.restored.len().to_string().green());
        println!("  Failed:   {}", result.failures.len().to_string().red());
        for entry in &result.restored {
            if entry.to.file_name() != entry.from.file_name() {
                Self::warning(&format!(
                    "Original location occupied; restored as {}",
                    entry.to.display()
                ));
            }
        }
        for failure in &result.failures {
            Self::error(&format!("{}: {}", failure.path.display(), failure.error));
        }
    }

    /// Prints the backup catalog as a table.
    pub fn backup_table(backups: &[BackupInfo]) {
        if backups.is_empty() {
            Self::info("No backups found.");
            return;
        }

        let id_width = backups.iter().map(|b| b.id.len()).max().unwrap_or(0).max(2);
        println!(
            "{:<id_width$}  {:<19}  {:>7}  {}",
            "ID".bold(),
            "Created".bold(),
            "Entries".bold(),
            "Source".bold(),
            id_width = id_width
        );
        println!("{}", "-".repeat(id_width + 40));
        for backup in backups {
            println!(
                "{:<id_width$}  {:<19}  {:>7}  {}",
                backup.id,
                backup.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                backup.file_count,
                backup.source_root.display(),
                id_width = id_width
            );
        }
    }

    fn relative(root: &Path, path: &Path) -> String {
        path.strip_prefix(root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn count_word(count: usize, word: &str) -> String {
        if count == 1 {
            format!("{} {}", count, word)
        } else {
            format!("{} {}s", count, word)
        }
    }
}
