//! Command-line interface module for dirsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Merging command-line flags over configuration defaults
//! - Driving scans and executions on the background worker
//! - Backup catalog commands

use crate::backup::BackupStore;
use crate::config::AppConfig;
use crate::executor::{CancelToken, OrganizeResult};
use crate::output::OutputFormatter;
use crate::plan::{Plan, ScanOptions, SortMode};
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::scanner::Scanner;
use crate::worker::{self, WorkerMessage};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dirsort",
    about = "Sort a folder into category and date subfolders, with undo",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to ./.dirsortrc.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding backup records
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what would be moved without touching anything
    Preview(ScanArgs),

    /// Move files into place and record a backup
    Organize {
        #[command(flatten)]
        scan: ScanArgs,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List recorded backups, newest first
    Backups,

    /// Put every entry of a backup back where it came from
    Restore {
        /// Backup identifier, as shown by `backups`
        id: String,

        /// Delete the backup once every entry was restored
        #[arg(long)]
        delete: bool,
    },

    /// Remove a backup record without restoring it
    DeleteBackup {
        /// Backup identifier, as shown by `backups`
        id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Folder to organize
    pub dir: PathBuf,

    /// Folder layout to build
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Include hidden files
    #[arg(long)]
    pub hidden: bool,

    /// Include symbolic links and shortcuts
    #[arg(long)]
    pub symlinks: bool,

    /// Move subfolders as whole units (requires --mode date)
    #[arg(long)]
    pub preserve_folders: bool,

    /// Organize files from every nested subfolder
    #[arg(long, conflicts_with = "preserve_folders")]
    pub flatten: bool,

    /// Remove folders left empty after moving
    #[arg(long)]
    pub delete_empty: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Type,
    Date,
    Both,
}

impl From<ModeArg> for SortMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Type => SortMode::ByType,
            ModeArg::Date => SortMode::ByDate,
            ModeArg::Both => SortMode::ByBoth,
        }
    }
}

impl ScanArgs {
    /// Layers the flags over the configured defaults. A flag can only turn an
    /// option on.
    pub fn scan_options(&self, defaults: ScanOptions) -> ScanOptions {
        ScanOptions {
            include_hidden: defaults.include_hidden || self.hidden,
            include_symlinks: defaults.include_symlinks || self.symlinks,
            preserve_folders: defaults.preserve_folders || self.preserve_folders,
            flatten_all: defaults.flatten_all || self.flatten,
            delete_empty_folders: defaults.delete_empty_folders || self.delete_empty,
            sort_mode: self.mode.map(SortMode::from).unwrap_or(defaults.sort_mode),
        }
    }
}

/// Runs a parsed command line.
///
/// # Errors
///
/// Returns an error for configuration problems, an invalid root folder,
/// conflicting options, and backup catalog failures. Per-file problems are
/// reported in the printed summary instead.
pub fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("Error loading configuration")?;
    let store = BackupStore::new(match cli.backup_dir.or_else(|| config.backup_dir.clone()) {
        Some(dir) => dir,
        None => BackupStore::default_location()?,
    });

    match cli.command {
        Command::Preview(scan) => {
            let plan = scan_in_background(&config, &scan)?;
            OutputFormatter::plan_preview(&plan);
            Ok(())
        }
        Command::Organize { scan, yes } => organize(&config, &store, &scan, yes),
        Command::Backups => {
            OutputFormatter::backup_table(&store.list()?);
            Ok(())
        }
        Command::Restore { id, delete } => restore(&store, &id, delete),
        Command::DeleteBackup { id } => {
            store.delete(&id)?;
            OutputFormatter::success(&format!("Deleted backup {}", id));
            Ok(())
        }
    }
}

fn organize(config: &AppConfig, store: &BackupStore, scan: &ScanArgs, yes: bool) -> Result<()> {
    let plan = scan_in_background(config, scan)?;
    OutputFormatter::plan_preview(&plan);

    if plan.is_empty() {
        return Ok(());
    }
    if !yes && !confirm("\nProceed with these moves?")? {
        OutputFormatter::info("Nothing was moved.");
        return Ok(());
    }

    let result = execute_in_background(plan)?;
    OutputFormatter::organize_summary(&result);
    save_backup(store, &result)
}

/// Records `result` in the catalog. Failing to do so after files were moved
/// is an error: the run cannot be undone.
fn save_backup(store: &BackupStore, result: &OrganizeResult) -> Result<()> {
    let record = store.record(result).with_context(|| {
        format!(
            "{} entries were moved but the backup could not be saved; this run cannot be restored",
            result.moved()
        )
    })?;
    if let Some(record) = record {
        OutputFormatter::success(&format!("Backup saved: {}", record.id));
        OutputFormatter::info(&format!("Run 'dirsort restore {}' to undo.", record.id));
    }
    Ok(())
}

fn restore(store: &BackupStore, id: &str, delete: bool) -> Result<()> {
    let record = store.load(id)?;
    OutputFormatter::info(&format!(
        "Restoring {} entries into {}",
        record.moves.len(),
        record.source_root.display()
    ));

    let pb = OutputFormatter::create_progress_bar(record.moves.len() as u64);
    let result = store.restore(&record, &mut BarSink(&pb));
    pb.finish_and_clear();
    OutputFormatter::restore_summary(&result);

    if delete {
        if result.is_complete_success() {
            store.delete(id)?;
            OutputFormatter::success(&format!("Deleted backup {}", id));
        } else {
            OutputFormatter::warning("Backup kept because some entries could not be restored.");
        }
    }
    Ok(())
}

fn scan_in_background(config: &AppConfig, scan: &ScanArgs) -> Result<Plan> {
    let options = scan.scan_options(config.options.into());
    options.validate()?;

    let filters = config
        .filters
        .compile()
        .context("Error compiling filters")?;
    let scanner = Scanner::new(config.categories.build_classifier()).with_filters(filters);

    let spinner = OutputFormatter::create_spinner();
    let worker = worker::spawn_scan(scanner, scan.dir.clone(), options);
    let message = worker.wait(|update| OutputFormatter::apply_progress(&spinner, update));
    spinner.finish_and_clear();

    match message? {
        WorkerMessage::ScanFinished(plan) => Ok(plan?),
        _ => bail!("unexpected message from scan worker"),
    }
}

fn execute_in_background(plan: Plan) -> Result<OrganizeResult> {
    let pb = OutputFormatter::create_progress_bar(plan.total_moves() as u64);
    let worker = worker::spawn_execute(plan, CancelToken::new());
    let message = worker.wait(|update| OutputFormatter::apply_progress(&pb, update));
    pb.finish_and_clear();

    match message? {
        WorkerMessage::ExecutionFinished(result) => Ok(*result),
        _ => bail!("unexpected message from execution worker"),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

/// Drives a progress bar from the calling thread.
struct BarSink<'a>(&'a ProgressBar);

impl ProgressSink for BarSink<'_> {
    fn report(&mut self, update: ProgressUpdate) {
        OutputFormatter::apply_progress(self.0, &update);
    }
}
