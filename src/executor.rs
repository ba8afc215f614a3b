//! Plan execution.
//!
//! This module applies a previously computed [`Plan`] to the filesystem one
//! move at a time. It creates destination folders as needed, resolves
//! late name collisions, records each outcome for undo, honors cooperative
//! cancellation between moves, and optionally removes folders left empty.

use crate::path_planner::{next_free_folder_path, next_free_path};
use crate::plan::Plan;
use crate::platform;
use crate::progress::{Phase, ProgressSink, ProgressUpdate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Shared flag that asks a running execution to stop after the current move.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Whether a move relocated a single file or a whole folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    File,
    Folder,
}

/// A move that happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMove {
    pub source: PathBuf,
    /// Where the entry actually ended up; may differ from the planned path.
    pub destination: PathBuf,
    pub kind: MoveKind,
    /// Extension used for numbering, carried over from the plan.
    pub extension: Option<String>,
}

/// A move that was attempted and failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: MoveKind,
    pub error: String,
}

/// A folder the empty-folder pass could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of executing a plan.
#[derive(Debug, Clone)]
pub struct OrganizeResult {
    pub plan: Plan,
    /// Successful moves, in execution order.
    pub completed: Vec<CompletedMove>,
    pub failures: Vec<MoveFailure>,
    /// Moves never started because of cancellation or a fatal error.
    pub not_attempted: usize,
    pub cancelled: bool,
    /// Set when the batch was aborted because the root became unavailable.
    pub fatal: Option<String>,
    pub removed_folders: Vec<PathBuf>,
    pub cleanup_failures: Vec<CleanupFailure>,
}

impl OrganizeResult {
    pub(crate) fn new(plan: Plan) -> Self {
        Self {
            plan,
            completed: Vec::new(),
            failures: Vec::new(),
            not_attempted: 0,
            cancelled: false,
            fatal: None,
            removed_folders: Vec::new(),
            cleanup_failures: Vec::new(),
        }
    }

    pub fn moved(&self) -> usize {
        self.completed.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Entries the scan left alone.
    pub fn skipped(&self) -> usize {
        self.plan.skipped.len()
    }

    /// True when every planned move completed.
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.not_attempted == 0 && self.fatal.is_none()
    }
}

/// Applies plans to the filesystem.
pub struct Executor;

impl Executor {
    /// Executes `plan`: file moves first, then folder moves, each in plan order.
    ///
    /// A failed move is recorded and the batch continues. The cancel token is
    /// checked after every move; once set, no further move starts. If the
    /// root disappears mid-run, the remainder is abandoned and
    /// [`OrganizeResult::fatal`] says why.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::executor::{CancelToken, Executor};
    /// use dirsort::plan::ScanOptions;
    /// use dirsort::progress::NoProgress;
    /// use dirsort::scanner::Scanner;
    /// use std::path::Path;
    ///
    /// let plan = Scanner::default()
    ///     .scan(Path::new("/path/to/downloads"), ScanOptions::default())
    ///     .expect("scan failed");
    /// let result = Executor::execute(plan, &mut NoProgress, &CancelToken::new());
    /// println!("Moved {} files, {} failed", result.moved(), result.failed());
    /// ```
    pub fn execute(
        plan: Plan,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> OrganizeResult {
        let steps: Vec<Step> = plan
            .file_moves
            .iter()
            .map(|m| Step {
                source: m.source.clone(),
                planned: m.destination.clone(),
                kind: MoveKind::File,
                extension: m.extension.clone(),
            })
            .chain(plan.folder_moves.iter().map(|m| Step {
                source: m.source.clone(),
                planned: m.destination.clone(),
                kind: MoveKind::Folder,
                extension: None,
            }))
            .collect();
        let total = steps.len();
        let root = plan.root.clone();
        let delete_empty = plan.options.delete_empty_folders;
        let mut result = OrganizeResult::new(plan);

        info!(root = %root.display(), total, "Executing plan");

        for (idx, step) in steps.into_iter().enumerate() {
            let Step {
                source,
                planned,
                kind,
                extension,
            } = step;

            if !root.is_dir() {
                let reason = format!("root {} is no longer available", root.display());
                warn!("{}; abandoning {} moves", reason, total - idx);
                result.fatal = Some(reason);
                result.not_attempted = total - idx;
                break;
            }

            progress.report(ProgressUpdate {
                phase: Phase::Moving,
                current: idx + 1,
                total: Some(total),
                name: source
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            });

            match move_entry(&source, &planned, kind, extension.as_deref()) {
                Ok(destination) => {
                    debug!(source = %source.display(), destination = %destination.display(), "Moved");
                    result.completed.push(CompletedMove {
                        source,
                        destination,
                        kind,
                        extension,
                    });
                }
                Err(e) => {
                    warn!(source = %source.display(), "Move failed: {}", e);
                    result.failures.push(MoveFailure {
                        source,
                        destination: planned,
                        kind,
                        error: describe_io_error(&e),
                    });
                }
            }

            if cancel.is_cancelled() {
                info!("Execution cancelled after {} of {} moves", idx + 1, total);
                result.cancelled = true;
                result.not_attempted = total - (idx + 1);
                break;
            }
        }

        if delete_empty && !result.cancelled && result.fatal.is_none() {
            let sources: Vec<&Path> = result.completed.iter().map(|m| m.source.as_path()).collect();
            let (removed, failures) = remove_emptied_folders(&root, &sources);
            result.removed_folders = removed;
            result.cleanup_failures = failures;
        }

        info!(
            moved = result.moved(),
            failed = result.failed(),
            not_attempted = result.not_attempted,
            "Execution finished"
        );
        result
    }
}

struct Step {
    source: PathBuf,
    planned: PathBuf,
    kind: MoveKind,
    extension: Option<String>,
}

/// Moves one entry, creating the destination folder first.
///
/// Returns the final destination, numbered if the planned one became taken.
fn move_entry(
    source: &Path,
    planned: &Path,
    kind: MoveKind,
    extension: Option<&str>,
) -> io::Result<PathBuf> {
    fs::symlink_metadata(source)?;

    if let Some(parent) = planned.parent() {
        fs::create_dir_all(parent)?;
    }

    let taken = |path: &Path| fs::symlink_metadata(path).is_ok();
    let destination = match kind {
        MoveKind::File => next_free_path(planned, extension, taken),
        MoveKind::Folder => next_free_folder_path(planned, taken),
    };

    rename_or_copy(source, &destination)?;
    Ok(destination)
}

/// Renames `source` to `destination`, falling back to copy and delete when
/// a regular file has to cross filesystems.
pub(crate) fn rename_or_copy(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            if !fs::symlink_metadata(source)?.is_file() {
                return Err(e);
            }
            debug!(source = %source.display(), "Rename crosses devices, copying");
            copy_then_remove(source, destination)
        }
        Err(e) => Err(e),
    }
}

/// Either both paths end up holding the file exactly once, or only the source.
fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    if let Err(e) = fs::copy(source, destination) {
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

fn describe_io_error(error: &io::Error) -> String {
    if platform::is_in_use(error) {
        format!("file in use: {}", error)
    } else {
        error.to_string()
    }
}

/// Removes folders that moving `sources` out of them left empty, deepest
/// first. Only the former parents of moved entries and their ancestors below
/// `root` are considered; folders the run never touched stay.
fn remove_emptied_folders(root: &Path, sources: &[&Path]) -> (Vec<PathBuf>, Vec<CleanupFailure>) {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for source in sources {
        let mut folder = source.parent();
        while let Some(dir) = folder {
            if dir == root || !dir.starts_with(root) {
                break;
            }
            candidates.push(dir.to_path_buf());
            folder = dir.parent();
        }
    }
    candidates.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });
    candidates.dedup();

    let mut removed = Vec::new();
    let mut failures = Vec::new();

    for dir in candidates {
        let is_empty = match fs::read_dir(&dir) {
            Ok(mut children) => children.next().is_none(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                failures.push(CleanupFailure {
                    path: dir,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !is_empty {
            continue;
        }

        match fs::remove_dir(&dir) {
            Ok(()) => {
                debug!(path = %dir.display(), "Removed empty folder");
                removed.push(dir);
            }
            Err(e) => {
                warn!(path = %dir.display(), "Could not remove empty folder: {}", e);
                failures.push(CleanupFailure {
                    path: dir,
                    error: e.to_string(),
                });
            }
        }
    }

    (removed, failures)
}
