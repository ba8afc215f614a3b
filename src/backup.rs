//! Persistent undo records.
//!
//! Every execution that moved at least one entry is written to the catalog
//! as a JSON [`BackupRecord`]. A record can later be replayed in reverse to
//! put every entry back where it came from.

use crate::error::BackupError;
use crate::executor::{self, MoveKind, OrganizeResult};
use crate::path_planner::{next_free_folder_path, next_free_path};
use crate::plan::SkippedFile;
use crate::progress::{Phase, ProgressSink, ProgressUpdate};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Version written into every new record.
pub const BACKUP_FORMAT_VERSION: u32 = 1;

const FILE_PREFIX: &str = "backup_";
const FILE_EXTENSION: &str = "json";

/// One completed move, as recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMove {
    pub original: PathBuf,
    pub destination: PathBuf,
    pub kind: MoveKind,
    /// Extension the name is numbered before if the original is occupied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

/// Outcome counts of the execution a record was taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCounts {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

/// The persisted form of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub version: u32,
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub source_root: PathBuf,
    /// Completed moves in execution order.
    pub moves: Vec<BackupMove>,
    /// Informational only; restore ignores it.
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
    #[serde(default)]
    pub counts: BackupCounts,
}

/// Catalog entry for [`BackupStore::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
    pub id: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Local>,
    pub source_root: PathBuf,
    pub file_count: usize,
}

/// An entry that was put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredEntry {
    pub from: PathBuf,
    /// The original path, or a numbered sibling if that was occupied.
    pub to: PathBuf,
}

/// An entry that could not be put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of [`BackupStore::restore`].
#[derive(Debug, Clone, Default)]
pub struct RestoreResult {
    pub restored: Vec<RestoredEntry>,
    pub failures: Vec<RestoreFailure>,
}

impl RestoreResult {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A directory of backup records.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The `backups` folder next to the running executable.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Io`] if the executable path cannot be determined.
    pub fn default_location() -> Result<PathBuf, BackupError> {
        let exe = std::env::current_exe().map_err(|source| BackupError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(dir.join("backups"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists the completed moves of `result`.
    ///
    /// Failed and not-attempted moves are left out since there is nothing to
    /// undo for them. Returns `Ok(None)` without writing anything when no
    /// move completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog directory or the record file cannot be
    /// written. A partially written record never becomes visible.
    pub fn record(&self, result: &OrganizeResult) -> Result<Option<BackupRecord>, BackupError> {
        if result.completed.is_empty() {
            debug!("Nothing moved; no backup written");
            return Ok(None);
        }

        fs::create_dir_all(&self.dir).map_err(|source| self.io_error(&self.dir, source))?;

        let timestamp = Local::now();
        let id = self.unique_id(&timestamp);
        let record = BackupRecord {
            version: BACKUP_FORMAT_VERSION,
            id: id.clone(),
            timestamp,
            source_root: result.plan.root.clone(),
            moves: result
                .completed
                .iter()
                .map(|m| BackupMove {
                    original: m.source.clone(),
                    destination: m.destination.clone(),
                    kind: m.kind,
                    extension: m.extension.clone(),
                })
                .collect(),
            skipped: result.plan.skipped.clone(),
            counts: BackupCounts {
                moved: result.moved(),
                skipped: result.skipped(),
                failed: result.failed(),
                not_attempted: result.not_attempted,
            },
        };

        let json = serde_json::to_string_pretty(&record)?;
        let final_path = self.record_path(&id);
        let temp_path = self.dir.join(format!(".{}.{}.tmp", id, FILE_EXTENSION));
        fs::write(&temp_path, json).map_err(|source| self.io_error(&temp_path, source))?;
        if let Err(source) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.io_error(&final_path, source));
        }

        info!(id = %id, moves = record.moves.len(), "Backup written");
        Ok(Some(record))
    }

    /// Lists every readable record, most recent first.
    ///
    /// Unreadable or malformed files are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error only if the catalog directory exists but cannot be
    /// listed. A missing directory is an empty catalog.
    pub fn list(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(&self.dir, source)),
        };

        let mut backups = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(id) = record_id(&path) else {
                continue;
            };
            match read_record(&path) {
                Ok(record) => backups.push(BackupInfo {
                    id: id.to_string(),
                    file_count: record.moves.len(),
                    timestamp: record.timestamp,
                    source_root: record.source_root,
                    path,
                }),
                Err(e) => warn!("Ignoring backup {}: {}", path.display(), e),
            }
        }

        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(backups)
    }

    /// Reads one record by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] for an unknown identifier and
    /// [`BackupError::Malformed`] if the file cannot be parsed.
    pub fn load(&self, id: &str) -> Result<BackupRecord, BackupError> {
        let path = self.existing_record_path(id)?;
        read_record(&path)
    }

    /// Removes one record from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] for an unknown identifier.
    pub fn delete(&self, id: &str) -> Result<(), BackupError> {
        let path = self.existing_record_path(id)?;
        fs::remove_file(&path).map_err(|source| self.io_error(&path, source))?;
        info!(id = %id, "Backup deleted");
        Ok(())
    }

    /// Moves every recorded entry back, last move first.
    ///
    /// Missing original parent folders are recreated. If an original path is
    /// now occupied, the entry is restored next to it under a numbered name.
    /// An entry whose recorded destination no longer exists is reported as a
    /// failure and the rest of the restore continues.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::backup::BackupStore;
    /// use dirsort::progress::NoProgress;
    ///
    /// let store = BackupStore::new("backups");
    /// let record = store.load("backup_20250101_120000_000").expect("no such backup");
    /// let result = store.restore(&record, &mut NoProgress);
    /// println!("Restored {} entries", result.restored.len());
    /// ```
    pub fn restore(&self, record: &BackupRecord, progress: &mut dyn ProgressSink) -> RestoreResult {
        let mut result = RestoreResult::default();
        let total = record.moves.len();

        info!(id = %record.id, total, "Restoring backup");

        for (idx, entry) in record.moves.iter().rev().enumerate() {
            progress.report(ProgressUpdate {
                phase: Phase::Restoring,
                current: idx + 1,
                total: Some(total),
                name: entry
                    .destination
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            });

            match restore_entry(entry) {
                Ok(to) => {
                    debug!(from = %entry.destination.display(), to = %to.display(), "Restored");
                    result.restored.push(RestoredEntry {
                        from: entry.destination.clone(),
                        to,
                    });
                }
                Err(error) => {
                    warn!(path = %entry.destination.display(), "Restore failed: {}", error);
                    result.failures.push(RestoreFailure {
                        path: entry.destination.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            restored = result.restored.len(),
            failed = result.failures.len(),
            "Restore finished"
        );
        result
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, FILE_EXTENSION))
    }

    fn existing_record_path(&self, id: &str) -> Result<PathBuf, BackupError> {
        let valid = id.starts_with(FILE_PREFIX)
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let path = self.record_path(id);
        if !valid || !path.is_file() {
            return Err(BackupError::NotFound(id.to_string()));
        }
        Ok(path)
    }

    /// `backup_<YYYYMMDD>_<HHMMSS>_<millis>`, suffixed if that name is taken.
    fn unique_id(&self, timestamp: &DateTime<Local>) -> String {
        let base = format!("{}{}", FILE_PREFIX, timestamp.format("%Y%m%d_%H%M%S_%3f"));
        let mut id = base.clone();
        let mut counter = 1;
        while self.record_path(&id).exists() {
            id = format!("{}_{}", base, counter);
            counter += 1;
        }
        id
    }

    fn io_error(&self, path: &Path, source: io::Error) -> BackupError {
        BackupError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn record_id(path: &Path) -> Option<&str> {
    if path.extension()? != FILE_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.starts_with(FILE_PREFIX).then_some(stem)
}

fn read_record(path: &Path) -> Result<BackupRecord, BackupError> {
    let content = fs::read_to_string(path).map_err(|source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let record: BackupRecord =
        serde_json::from_str(&content).map_err(|e| BackupError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if record.version > BACKUP_FORMAT_VERSION {
        return Err(BackupError::Malformed {
            path: path.to_path_buf(),
            reason: format!("unsupported format version {}", record.version),
        });
    }
    Ok(record)
}

fn restore_entry(entry: &BackupMove) -> Result<PathBuf, String> {
    if fs::symlink_metadata(&entry.destination).is_err() {
        return Err("not found at organized location".to_string());
    }

    if let Some(parent) = entry.original.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("could not recreate {}: {}", parent.display(), e))?;
    }

    let taken = |path: &Path| fs::symlink_metadata(path).is_ok();
    let target = match entry.kind {
        MoveKind::File => next_free_path(&entry.original, entry.extension.as_deref(), taken),
        MoveKind::Folder => next_free_folder_path(&entry.original, taken),
    };

    executor::rename_or_copy(&entry.destination, &target).map_err(|e| e.to_string())?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CompletedMove;
    use crate::plan::{Plan, ScanOptions};
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    fn result_with(root: &Path, completed: Vec<CompletedMove>) -> OrganizeResult {
        let plan = Plan {
            root: root.to_path_buf(),
            options: ScanOptions::default(),
            file_moves: Vec::new(),
            folder_moves: Vec::new(),
            skipped: Vec::new(),
        };
        let mut result = OrganizeResult::new(plan);
        result.completed = completed;
        result
    }

    fn file_move(root: &Path, from: &str, to: &str) -> CompletedMove {
        CompletedMove {
            source: root.join(from),
            destination: root.join(to),
            kind: MoveKind::File,
            extension: Path::new(to)
                .extension()
                .map(|e| e.to_string_lossy().to_string()),
        }
    }

    #[test]
    fn test_record_nothing_moved_writes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BackupStore::new(temp_dir.path().join("backups"));
        let result = result_with(temp_dir.path(), Vec::new());

        assert!(store.record(&result).unwrap().is_none());
        assert!(!store.dir().exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_record_then_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BackupStore::new(temp_dir.path().join("backups"));
        let result = result_with(
            temp_dir.path(),
            vec![file_move(temp_dir.path(), "a.txt", "Documents/a.txt")],
        );

        let record = store.record(&result).unwrap().expect("record written");
        assert_eq!(record.version, BACKUP_FORMAT_VERSION);
        assert!(record.id.starts_with("backup_"));
        assert_eq!(record.counts.moved, 1);

        let loaded = store.load(&record.id).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_list_newest_first_and_skips_malformed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BackupStore::new(temp_dir.path().join("backups"));
        let result = result_with(
            temp_dir.path(),
            vec![file_move(temp_dir.path(), "a.txt", "Documents/a.txt")],
        );

        let first = store.record(&result).unwrap().unwrap();
        let second = store.record(&result).unwrap().unwrap();
        assert_ne!(first.id, second.id);
        fs::write(store.dir().join("backup_broken.json"), "{ not json").unwrap();
        fs::write(store.dir().join("notes.json"), "{}").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(listed[0].file_count, 1);

        assert!(matches!(
            store.load("backup_broken"),
            Err(BackupError::Malformed { .. })
        ));
    }

    #[test]
    fn test_load_and_delete_unknown_id() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BackupStore::new(temp_dir.path());

        assert!(matches!(store.load("backup_missing"), Err(BackupError::NotFound(_))));
        assert!(matches!(store.delete("../etc/passwd"), Err(BackupError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_record() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BackupStore::new(temp_dir.path().join("backups"));
        let result = result_with(
            temp_dir.path(),
            vec![file_move(temp_dir.path(), "a.txt", "Documents/a.txt")],
        );
        let record = store.record(&result).unwrap().unwrap();

        store.delete(&record.id).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_restore_recreates_parents_and_reports_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Documents")).unwrap();
        fs::write(root.join("Documents/a.txt"), "a").unwrap();

        let store = BackupStore::new(root.join("backups"));
        let result = result_with(
            root,
            vec![
                file_move(root, "nested/dir/a.txt", "Documents/a.txt"),
                file_move(root, "b.txt", "Documents/b.txt"),
            ],
        );
        let record = store.record(&result).unwrap().unwrap();

        let mut updates: Vec<ProgressUpdate> = Vec::new();
        let restored = store.restore(&record, &mut updates);

        assert_eq!(restored.restored.len(), 1);
        assert_eq!(restored.failures.len(), 1);
        assert!(restored.failures[0].path.ends_with("Documents/b.txt"));
        assert!(root.join("nested/dir/a.txt").exists());
        assert_eq!(updates.len(), 2);
        // Reverse order: the last recorded move is restored first
        assert_eq!(updates[0].name, "b.txt");
    }

    #[test]
    fn test_restore_numbers_occupied_original() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Archives")).unwrap();
        fs::write(root.join("Archives/data.zip"), "moved").unwrap();
        fs::write(root.join("data.zip"), "newcomer").unwrap();

        let store = BackupStore::new(root.join("backups"));
        let result = result_with(root, vec![file_move(root, "data.zip", "Archives/data.zip")]);
        let record = store.record(&result).unwrap().unwrap();

        let restored = store.restore(&record, &mut NoProgress);
        assert!(restored.is_complete_success());
        assert_eq!(restored.restored[0].to, root.join("data_1.zip"));
        assert_eq!(fs::read_to_string(root.join("data.zip")).unwrap(), "newcomer");
        assert_eq!(fs::read_to_string(root.join("data_1.zip")).unwrap(), "moved");
    }

    #[test]
    fn test_restore_numbers_occupied_original_before_compound_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Archives")).unwrap();
        fs::write(root.join("Archives/site.tar.gz"), "moved").unwrap();
        fs::write(root.join("site.tar.gz"), "newcomer").unwrap();

        let store = BackupStore::new(root.join("backups"));
        let mut entry = file_move(root, "site.tar.gz", "Archives/site.tar.gz");
        entry.extension = Some("tar.gz".to_string());
        let record = store.record(&result_with(root, vec![entry])).unwrap().unwrap();
        assert_eq!(
            store.load(&record.id).unwrap().moves[0].extension.as_deref(),
            Some("tar.gz")
        );

        let restored = store.restore(&record, &mut NoProgress);
        assert!(restored.is_complete_success());
        assert_eq!(restored.restored[0].to, root.join("site_1.tar.gz"));
        assert_eq!(fs::read_to_string(root.join("site_1.tar.gz")).unwrap(), "moved");
        assert!(!root.join("site.tar_1.gz").exists());
    }
}
