//! The scan output model.
//!
//! A [`Plan`] is produced by the scanner without touching the filesystem and
//! can be inspected any number of times before it is handed to the executor.

use crate::error::OrganizeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Selects which folder levels a destination path is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// `{category}/{name}`
    ByType,
    /// `{year}/{month}/{name}`
    ByDate,
    /// `{category}/{year}/{month}/{name}`
    #[default]
    ByBoth,
}

impl SortMode {
    pub fn uses_category(self) -> bool {
        matches!(self, SortMode::ByType | SortMode::ByBoth)
    }

    pub fn uses_date(self) -> bool {
        matches!(self, SortMode::ByDate | SortMode::ByBoth)
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortMode::ByType => "by type",
            SortMode::ByDate => "by date",
            SortMode::ByBoth => "by type and date",
        };
        f.write_str(name)
    }
}

/// Configuration for a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanOptions {
    pub include_hidden: bool,
    pub include_symlinks: bool,
    /// Move whole subfolders as units instead of leaving them alone.
    pub preserve_folders: bool,
    /// Descend into every subfolder and classify each file on its own.
    pub flatten_all: bool,
    pub delete_empty_folders: bool,
    pub sort_mode: SortMode,
}

impl ScanOptions {
    /// Rejects option combinations that cannot be planned.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizeError::ConflictingOptions`] when both
    /// `preserve_folders` and `flatten_all` are set, or when
    /// `preserve_folders` is combined with a mode that classifies by type.
    pub fn validate(&self) -> Result<(), OrganizeError> {
        if self.preserve_folders && self.flatten_all {
            return Err(OrganizeError::ConflictingOptions(
                "preserve folders and flatten all cannot be combined".to_string(),
            ));
        }
        if self.preserve_folders && self.sort_mode != SortMode::ByDate {
            return Err(OrganizeError::ConflictingOptions(format!(
                "preserve folders requires sorting by date, not {}",
                self.sort_mode
            )));
        }
        Ok(())
    }
}

/// A planned move of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: String,
    /// Extension the name was split at when numbering, e.g. `tar.gz`.
    #[serde(default)]
    pub extension: Option<String>,
    /// `None` when the file landed in the `Unknown` date bucket.
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// A planned move of a whole folder, only produced in preserve-folders mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Why an entry was left where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    AlreadyOrganized,
    PermissionDenied,
    FileInUse,
    SystemFile,
    HiddenFile,
    Symlink,
    PathTooLong,
    /// Matched a user exclusion rule.
    Excluded,
    UnknownError,
}

impl SkipReason {
    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::AlreadyOrganized => "already organized",
            SkipReason::PermissionDenied => "permission denied",
            SkipReason::FileInUse => "file in use",
            SkipReason::SystemFile => "system file",
            SkipReason::HiddenFile => "hidden file",
            SkipReason::Symlink => "symbolic link or shortcut",
            SkipReason::PathTooLong => "destination path too long",
            SkipReason::Excluded => "excluded by filter",
            SkipReason::UnknownError => "unknown error",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// An entry the scan decided not to touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Complete, side-effect-free result of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub root: PathBuf,
    pub options: ScanOptions,
    pub file_moves: Vec<FileMove>,
    pub folder_moves: Vec<FolderMove>,
    pub skipped: Vec<SkippedFile>,
}

impl Plan {
    /// Number of moves the executor will attempt.
    pub fn total_moves(&self) -> usize {
        self.file_moves.len() + self.folder_moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_moves() == 0
    }

    /// Planned file moves grouped by category, categories in name order.
    pub fn moves_by_category(&self) -> Vec<(&str, Vec<&FileMove>)> {
        let mut groups: std::collections::BTreeMap<&str, Vec<&FileMove>> =
            std::collections::BTreeMap::new();
        for file_move in &self.file_moves {
            groups
                .entry(file_move.category.as_str())
                .or_default()
                .push(file_move);
        }
        groups.into_iter().collect()
    }

    /// Count of skipped entries per reason.
    pub fn skip_counts(&self) -> std::collections::HashMap<SkipReason, usize> {
        let mut counts = std::collections::HashMap::new();
        for skipped in &self.skipped {
            *counts.entry(skipped.reason).or_insert(0) += 1;
        }
        counts
    }
}
