//! dirsort - Sort a folder into category and date subfolders, reversibly
//!
//! The library plans a reorganization without touching the filesystem,
//! executes the plan move by move, and records every completed move so the
//! run can be undone later.
//!
//! - [`scanner`] walks a root folder and produces a [`plan::Plan`]
//! - [`classifier`], [`date_resolver`] and [`path_planner`] decide where
//!   each entry goes
//! - [`executor`] applies a plan; [`worker`] runs scans and executions on a
//!   background thread with throttled progress
//! - [`backup`] persists and replays undo records
//! - [`config`] loads category mappings, default options and exclusion rules

pub mod backup;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod date_resolver;
pub mod error;
pub mod executor;
pub mod output;
pub mod path_planner;
pub mod plan;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod worker;

pub use backup::{BackupInfo, BackupRecord, BackupStore, RestoreResult};
pub use classifier::{CategoryTable, Classifier};
pub use config::{AppConfig, CompiledFilters, ConfigError, FilterConfig};
pub use error::{BackupError, OrganizeError};
pub use executor::{CancelToken, Executor, OrganizeResult};
pub use plan::{FileMove, FolderMove, Plan, ScanOptions, SkipReason, SkippedFile, SortMode};
pub use scanner::Scanner;
