//! Date buckets from file timestamps.
//!
//! The creation time is preferred; the modification time is used when the
//! creation time is missing or implausible. A timestamp is plausible when it
//! lies strictly after the Unix epoch and maps onto a calendar date.

use crate::scanner::FileEntry;
use chrono::{DateTime, Datelike, Local};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Folder name used when no usable timestamp exists.
pub const UNKNOWN_BUCKET: &str = "Unknown";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// The date-derived part of a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateBucket {
    Dated { year: i32, month: u32 },
    Unknown,
}

impl DateBucket {
    pub fn year(&self) -> Option<i32> {
        match self {
            DateBucket::Dated { year, .. } => Some(*year),
            DateBucket::Unknown => None,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            DateBucket::Dated { month, .. } => Some(*month),
            DateBucket::Unknown => None,
        }
    }

    /// Folder segments for this bucket: `["2024", "03-March"]` or `["Unknown"]`.
    pub fn segments(&self) -> Vec<String> {
        match self {
            DateBucket::Dated { year, month } => {
                vec![year.to_string(), month_folder_name(*month)]
            }
            DateBucket::Unknown => vec![UNKNOWN_BUCKET.to_string()],
        }
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

/// Resolves the bucket for a scanned entry.
pub fn resolve_date(entry: &FileEntry) -> DateBucket {
    entry
        .created
        .and_then(to_local_date)
        .or_else(|| entry.modified.and_then(to_local_date))
        .map(|date| DateBucket::Dated {
            year: date.year(),
            month: date.month(),
        })
        .unwrap_or(DateBucket::Unknown)
}

/// Two-digit month number paired with its English name, e.g. `03-March`.
///
/// ```
/// use dirsort::date_resolver::month_folder_name;
///
/// assert_eq!(month_folder_name(1), "01-January");
/// assert_eq!(month_folder_name(12), "12-December");
/// ```
pub fn month_folder_name(month: u32) -> String {
    let name = month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
        .unwrap_or(UNKNOWN_BUCKET);
    format!("{:02}-{}", month, name)
}

/// Returns true if `segment` is a folder name produced by [`month_folder_name`].
pub fn is_month_folder(segment: &str) -> bool {
    (1..=12).any(|month| month_folder_name(month) == segment)
}

/// Returns true if `segment` looks like a year folder.
pub fn is_year_folder(segment: &str) -> bool {
    segment.len() == 4 && segment.bytes().all(|b| b.is_ascii_digit())
}

fn to_local_date(time: SystemTime) -> Option<DateTime<Local>> {
    let since_epoch = time.duration_since(UNIX_EPOCH).ok()?;
    if since_epoch.is_zero() {
        return None;
    }
    let secs = i64::try_from(since_epoch.as_secs()).ok()?;
    DateTime::from_timestamp(secs, since_epoch.subsec_nanos()).map(|utc| utc.with_timezone(&Local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::time::Duration;

    fn entry(created: Option<SystemTime>, modified: Option<SystemTime>) -> FileEntry {
        FileEntry {
            path: PathBuf::from("/tmp/example.txt"),
            size: 0,
            created,
            modified,
            is_dir: false,
            hidden: false,
            symlink: false,
            system: false,
        }
    }

    fn local_time(year: i32, month: u32, day: u32) -> SystemTime {
        let date = Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("unambiguous local time");
        SystemTime::from(date)
    }

    #[test]
    fn test_month_folder_names() {
        assert_eq!(month_folder_name(3), "03-March");
        assert_eq!(month_folder_name(9), "09-September");
        assert!(is_month_folder("05-May"));
        assert!(!is_month_folder("5-May"));
        assert!(!is_month_folder("05-June"));
    }

    #[test]
    fn test_year_folder_detection() {
        assert!(is_year_folder("2024"));
        assert!(!is_year_folder("24"));
        assert!(!is_year_folder("20a4"));
    }

    #[test]
    fn test_prefers_creation_time() {
        let bucket = resolve_date(&entry(
            Some(local_time(2021, 6, 15)),
            Some(local_time(2023, 1, 10)),
        ));
        assert_eq!(
            bucket,
            DateBucket::Dated {
                year: 2021,
                month: 6
            }
        );
    }

    #[test]
    fn test_falls_back_to_modified_time() {
        let bucket = resolve_date(&entry(None, Some(local_time(2019, 11, 2))));
        assert_eq!(
            bucket,
            DateBucket::Dated {
                year: 2019,
                month: 11
            }
        );
    }

    #[test]
    fn test_epoch_creation_time_is_implausible() {
        let bucket = resolve_date(&entry(Some(UNIX_EPOCH), Some(local_time(2020, 2, 20))));
        assert_eq!(bucket.year(), Some(2020));
        assert_eq!(bucket.month(), Some(2));
    }

    #[test]
    fn test_before_epoch_is_implausible() {
        let before = UNIX_EPOCH - Duration::from_secs(3600);
        assert_eq!(
            resolve_date(&entry(Some(before), Some(UNIX_EPOCH))),
            DateBucket::Unknown
        );
    }

    #[test]
    fn test_missing_timestamps_give_unknown() {
        let bucket = resolve_date(&entry(None, None));
        assert_eq!(bucket, DateBucket::Unknown);
        assert_eq!(bucket.segments(), vec!["Unknown".to_string()]);
        assert_eq!(bucket.year(), None);
    }

    #[test]
    fn test_bucket_display() {
        let bucket = DateBucket::Dated {
            year: 2024,
            month: 3,
        };
        assert_eq!(bucket.to_string(), "2024/03-March");
    }
}
