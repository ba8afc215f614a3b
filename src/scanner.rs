//! Directory scanning and plan construction.
//!
//! The scanner only reads: it lists directories and stats entries, then
//! decides for each entry whether to move it, move its whole folder, descend
//! into it, or skip it with a reason. Nothing on disk changes until the plan
//! is handed to the executor.

use crate::classifier::Classifier;
use crate::config::CompiledFilters;
use crate::date_resolver::{self, UNKNOWN_BUCKET, resolve_date};
use crate::error::OrganizeError;
use crate::path_planner::{DestinationIndex, MAX_PATH_LEN, PathPlanner};
use crate::plan::{FileMove, FolderMove, Plan, ScanOptions, SkipReason, SkippedFile, SortMode};
use crate::platform;
use crate::progress::{NoProgress, Phase, ProgressSink, ProgressUpdate};
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Snapshot of one filesystem entry taken during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
    pub hidden: bool,
    pub symlink: bool,
    pub system: bool,
}

impl FileEntry {
    /// Builds an entry from metadata read without following symlinks.
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let symlink = metadata.file_type().is_symlink() || platform::is_shortcut(&path);
        Self {
            hidden: platform::is_hidden(&path, metadata),
            system: platform::is_system(metadata),
            size: metadata.len(),
            created: metadata.created().ok(),
            modified: metadata.modified().ok(),
            is_dir: metadata.is_dir(),
            symlink,
            path,
        }
    }

    /// Stats `path` without following symlinks.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(Self::from_metadata(path.to_path_buf(), &metadata))
    }

    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

/// What to do with one enumerated entry.
enum Visit {
    File(FileMove),
    Folder(FolderMove),
    Skip(SkipReason),
    /// Flattening: walk into this folder.
    Descend,
    /// A folder left untouched; produces nothing.
    Leave,
}

/// Produces [`Plan`]s for a root directory.
pub struct Scanner {
    classifier: Classifier,
    filters: CompiledFilters,
    max_path_len: usize,
}

impl Scanner {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            filters: CompiledFilters::none(),
            max_path_len: MAX_PATH_LEN,
        }
    }

    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Scans `root` and returns the plan without reporting progress.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizeError::ConflictingOptions`] for invalid option
    /// combinations and [`OrganizeError::InvalidRoot`] if `root` is not a
    /// readable directory. Problems with individual entries never fail the
    /// scan; they are recorded as skipped entries.
    pub fn scan(&self, root: &Path, options: ScanOptions) -> Result<Plan, OrganizeError> {
        self.scan_with_progress(root, options, &mut NoProgress)
    }

    /// Scans `root`, reporting each enumerated entry to `progress`.
    pub fn scan_with_progress(
        &self,
        root: &Path,
        options: ScanOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<Plan, OrganizeError> {
        options.validate()?;
        let root = resolve_root(root)?;
        info!(root = %root.display(), mode = %options.sort_mode, "Scanning");

        let mut planner = PathPlanner::new(&root, &self.classifier, DestinationIndex::new())
            .with_max_path_len(self.max_path_len);
        let mut plan = Plan {
            root: root.clone(),
            options,
            file_moves: Vec::new(),
            folder_moves: Vec::new(),
            skipped: Vec::new(),
        };

        let max_depth = if options.flatten_all { usize::MAX } else { 1 };
        let mut walker = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        let mut seen = 0;

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        return Err(OrganizeError::InvalidRoot {
                            path: root.clone(),
                            reason: err.to_string(),
                        });
                    }
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    let reason = err
                        .io_error()
                        .map(platform::skip_reason_for)
                        .unwrap_or(SkipReason::UnknownError);
                    warn!(path = %path.display(), %reason, "Cannot read entry: {}", err);
                    plan.skipped.push(SkippedFile { path, reason });
                    continue;
                }
            };

            seen += 1;
            progress.report(ProgressUpdate {
                phase: Phase::Scanning,
                current: seen,
                total: None,
                name: entry.file_name().to_string_lossy().to_string(),
            });

            let is_dir = entry.file_type().is_dir();
            match self.visit(&entry, &root, options, &mut planner) {
                Visit::File(file_move) => {
                    debug!(
                        source = %file_move.source.display(),
                        destination = %file_move.destination.display(),
                        "Planned move"
                    );
                    plan.file_moves.push(file_move);
                }
                Visit::Folder(folder_move) => {
                    debug!(
                        source = %folder_move.source.display(),
                        destination = %folder_move.destination.display(),
                        "Planned folder move"
                    );
                    plan.folder_moves.push(folder_move);
                    if is_dir {
                        walker.skip_current_dir();
                    }
                }
                Visit::Skip(reason) => {
                    debug!(path = %entry.path().display(), %reason, "Skipped");
                    plan.skipped.push(SkippedFile {
                        path: entry.path().to_path_buf(),
                        reason,
                    });
                    if is_dir {
                        walker.skip_current_dir();
                    }
                }
                Visit::Descend | Visit::Leave => {}
            }
        }

        info!(
            moves = plan.file_moves.len(),
            folders = plan.folder_moves.len(),
            skipped = plan.skipped.len(),
            "Scan complete"
        );
        Ok(plan)
    }

    fn visit(
        &self,
        entry: &DirEntry,
        root: &Path,
        options: ScanOptions,
        planner: &mut PathPlanner<'_>,
    ) -> Visit {
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let is_dir = entry.file_type().is_dir();

        if is_dir && !options.preserve_folders && !options.flatten_all {
            return Visit::Leave;
        }

        let organized = if is_dir {
            options.preserve_folders && is_organized_folder(relative)
        } else {
            self.is_organized_file(relative, options.sort_mode)
        };
        if organized {
            return Visit::Skip(SkipReason::AlreadyOrganized);
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                let reason = err
                    .io_error()
                    .map(platform::skip_reason_for)
                    .unwrap_or(SkipReason::UnknownError);
                warn!(path = %path.display(), %reason, "Cannot read metadata: {}", err);
                return Visit::Skip(reason);
            }
        };
        let file_entry = FileEntry::from_metadata(path.to_path_buf(), &metadata);

        if file_entry.system {
            return Visit::Skip(SkipReason::SystemFile);
        }
        if file_entry.hidden && !options.include_hidden {
            return Visit::Skip(SkipReason::HiddenFile);
        }
        if file_entry.symlink && !options.include_symlinks {
            return Visit::Skip(SkipReason::Symlink);
        }

        if is_dir {
            if options.preserve_folders {
                let bucket = resolve_date(&file_entry);
                return match planner.plan_folder(file_entry.file_name(), bucket) {
                    Ok(destination) => Visit::Folder(FolderMove {
                        source: file_entry.path.clone(),
                        destination,
                        year: bucket.year(),
                        month: bucket.month(),
                    }),
                    Err(too_long) => {
                        warn!(path = %too_long.path.display(), len = too_long.len, "Destination too long");
                        Visit::Skip(SkipReason::PathTooLong)
                    }
                };
            }
            return Visit::Descend;
        }

        if self.filters.is_excluded(relative) {
            return Visit::Skip(SkipReason::Excluded);
        }

        let bucket = resolve_date(&file_entry);
        let name = file_entry.file_name();
        let category = self.classifier.classify(&name.to_string_lossy()).to_string();
        let extension = name
            .to_str()
            .and_then(|n| self.classifier.split_extension(n).1)
            .map(str::to_string);
        match planner.plan_file(name, &category, bucket, options.sort_mode) {
            Ok(destination) => Visit::File(FileMove {
                source: file_entry.path.clone(),
                destination,
                category,
                extension,
                year: bucket.year(),
                month: bucket.month(),
            }),
            Err(too_long) => {
                warn!(path = %too_long.path.display(), len = too_long.len, "Destination too long");
                Visit::Skip(SkipReason::PathTooLong)
            }
        }
    }

    /// True if the file already sits in the folder shape of `mode`.
    fn is_organized_file(&self, relative: &Path, mode: SortMode) -> bool {
        let Some(folders) = parent_segments(relative) else {
            return false;
        };
        match mode {
            SortMode::ByType => folders.len() == 1 && self.classifier.is_label(folders[0]),
            SortMode::ByDate => is_date_segments(&folders),
            SortMode::ByBoth => {
                folders.len() >= 2
                    && self.classifier.is_label(folders[0])
                    && is_date_segments(&folders[1..])
            }
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(Classifier::default())
    }
}

/// A top-level folder that is itself a date bucket (`2024`, `05-May`,
/// `Unknown`).
fn is_organized_folder(relative: &Path) -> bool {
    match parent_segments(relative).as_deref() {
        Some([]) => relative.to_str().is_some_and(|name| {
            date_resolver::is_year_folder(name)
                || date_resolver::is_month_folder(name)
                || name == UNKNOWN_BUCKET
        }),
        _ => false,
    }
}

fn is_date_segments(folders: &[&str]) -> bool {
    match folders {
        [year, month] => date_resolver::is_year_folder(year) && date_resolver::is_month_folder(month),
        [unknown] => *unknown == UNKNOWN_BUCKET,
        _ => false,
    }
}

/// Folder names between the root and the entry. `None` for non-UTF-8 names.
fn parent_segments(relative: &Path) -> Option<Vec<&str>> {
    relative
        .parent()
        .map(|parent| parent.iter().map(OsStr::to_str).collect())
        .unwrap_or(Some(Vec::new()))
}

fn resolve_root(root: &Path) -> Result<PathBuf, OrganizeError> {
    let invalid = |reason: String| OrganizeError::InvalidRoot {
        path: root.to_path_buf(),
        reason,
    };

    let absolute = std::path::absolute(root).map_err(|e| invalid(e.to_string()))?;
    let metadata = fs::metadata(&absolute).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    fs::read_dir(&absolute).map_err(|e| invalid(e.to_string()))?;
    Ok(absolute)
}
